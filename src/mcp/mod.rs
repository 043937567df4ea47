//! Model Context Protocol (MCP) server.
//!
//! Exposes chip loading, connection editing and fixture generation as MCP
//! tools over stdio, using JSON-RPC 2.0 messages.
//!
//! ```text
//!   stdin ──▶ transport ──▶ server ──▶ tools (session) ──▶ interconnect
//!   stdout ◀─────────────────────┘
//! ```
//!
//! Targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use tools::{Session, ToolCallResult};
pub use transport::StdioTransport;
