// MCP (Model Context Protocol) adapter for the Prometheus query tools
// Turns one JSON-RPC request into one response, with no state between calls.

pub mod protocol;
pub mod server;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use server::{McpReply, McpServer};
