/// MCP protocol implementation
///
/// Serves the questionnaire, patient and sync tools over JSON-RPC on
/// stdin/stdout.

pub mod protocol;
pub mod server;

pub use server::McpServer;
