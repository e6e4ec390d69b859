//! Model Context Protocol adapter over newline-delimited stdio.
//!
//! Each report method of [`MetrikaClient`](crate::MetrikaClient) is registered
//! as a schema-validated tool. Tool failures come back as text results so a
//! single bad call never stops the server.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
pub use tools::{Tool, ToolCatalog};
