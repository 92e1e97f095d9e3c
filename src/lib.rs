//! Palladio: capability routing and conversation orchestration for agents.
//!
//! A consumer ("agent") holds a multi-turn conversation with a language
//! model, and the model reaches tools, prompts, and resources hosted by
//! external providers. Palladio connects to those providers, decides what
//! each consumer may see and call, routes every invocation to the provider
//! that owns it, and drives the conversation until the model answers or a
//! limit is reached.
//!
//! # Architecture
//!
//! Palladio follows hexagonal architecture principles:
//!
//! - **Domain**: Identifiers, descriptors, messages, and run state with no
//!   infrastructure dependencies
//! - **Ports**: Trait interfaces for provider transports, models, session
//!   storage, and configuration sources
//! - **Adapters**: In-process and stdio providers, scripted models, and
//!   in-memory or file-backed session stores
//!
//! # Modules
//!
//! - [`provider`]: Provider descriptors, transports, and live connections
//! - [`routing`]: Capability index, conflict resolution, and access filtering
//! - [`host`]: Just-in-time provider registration and capability invocation
//! - [`conversation`]: Messages, the conversation loop, and its ports
//! - [`config`]: Runtime configuration and instruction templates
//! - [`facade`]: Running agents and workflows end to end

pub mod config;
pub mod conversation;
pub mod facade;
pub mod host;
pub mod provider;
pub mod routing;
