//! JSON-RPC 2.0 over a child process's STDIO.
//!
//! Providers are spawned with `kill_on_drop`, speak one JSON object per line,
//! and are asked for `tools/list`, `prompts/list`, and `resources/list` right
//! after the `initialize` handshake.

mod connection;
mod protocol;
mod transport;

pub use connection::StdioProviderConnection;
