//! Adapters for the conversation ports.

pub mod file;
pub mod memory;
pub mod scripted;

pub use file::FileSessionStore;
pub use memory::InMemorySessionStore;
pub use scripted::{RecordedRequest, ScriptedModelClient};
