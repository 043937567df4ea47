//! MCP server lifecycle.
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Tool calls against the session chip and connections
//! 3. **Shutdown**: EOF on stdin, SIGINT or SIGTERM

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::LayoutConfig;
use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, MCP_PROTOCOL_VERSION,
    SERVER_NAME,
};
use crate::mcp::tools::{Session, ToolCallParams};
use crate::mcp::transport::StdioTransport;

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ToolCapabilities::default()),
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "std::ops::Not::not")]
    pub list_changed: bool,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// The MCP server for interconnect fixture generation.
pub struct McpServer {
    state: ServerState,
    transport: StdioTransport,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    session: Session,
}

impl McpServer {
    /// Creates a server with the given allowed paths and layout settings.
    #[must_use]
    pub fn new(allowed_paths: Vec<PathBuf>, layout: LayoutConfig) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport: StdioTransport::new(),
            protocol_version: None,
            session: Session::new(allowed_paths, layout),
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Protocol version agreed during initialisation.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// The tool session, e.g. to preload a chip before serving.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Runs the MCP server main loop with graceful shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.run_with_shutdown().await
    }

    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(std::io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(std::io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles one read from the transport. Returns `true` to shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: std::io::Result<Option<String>>,
    ) -> std::io::Result<bool> {
        let Some(line) = line_result? else {
            tracing::info!("stdin closed");
            self.state = ServerState::ShuttingDown;
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        match self.handle_line(&line) {
            Some(Ok(response)) => self.transport.write_response(&response).await?,
            Some(Err(error)) => self.transport.write_error(&error).await?,
            None => {}
        }

        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Handles one line of input. Returns `None` for notifications.
    pub fn handle_line(&mut self, line: &str) -> Option<Result<JsonRpcResponse, JsonRpcError>> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => Some(self.handle_request(&req)),
            Ok(IncomingMessage::Notification(notif)) => {
                self.handle_notification(&notif);
                None
            }
            Err(error) => Some(Err(error)),
        }
    }

    fn handle_request(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        tracing::trace!(id = %req.id, method = %req.method, "Request");
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req),
            "ping" => Ok(JsonRpcResponse::success(req.id.clone(), json!({}))),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        }
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            tracing::debug!("Client initialised");
            self.state = ServerState::Running;
        }
    }

    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = req.parse_params()?;
        if params.protocol_version != MCP_PROTOCOL_VERSION {
            tracing::debug!(
                requested = %params.protocol_version,
                offered = MCP_PROTOCOL_VERSION,
                "Client requested a different protocol version"
            );
        }
        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, version = ?client.version, "Client connected");
        }

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();
        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "protocolVersion": negotiated_version,
                "capabilities": ServerCapabilities::default(),
                "serverInfo": ServerInfo::default(),
            }),
        ))
    }

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": Session::definitions() }),
        ))
    }

    fn handle_tools_call(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: ToolCallParams = req.parse_params()?;
        let result = self.session.call(&params.name, &params.arguments);

        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> McpServer {
        McpServer::new(vec![PathBuf::from(".")], LayoutConfig::default())
    }

    fn initialise(server: &mut McpServer) {
        let init = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "test" }
            }
        });
        assert!(server.handle_line(&init.to_string()).unwrap().is_ok());
        assert_eq!(server.state(), ServerState::Initialising);
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .is_none());
        assert_eq!(server.state(), ServerState::Running);
    }

    #[test]
    fn server_initial_state() {
        assert_eq!(server().state(), ServerState::AwaitingInit);
    }

    #[test]
    fn tools_require_initialisation() {
        let mut server = server();
        let err = server
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .unwrap()
            .unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidRequest.code());
    }

    #[test]
    fn lifecycle_and_tools_list() {
        let mut server = server();
        initialise(&mut server);

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .unwrap()
            .unwrap();
        let names: Vec<&str> = response.result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert!(names.contains(&"generate_fixture"));
        assert!(names.contains(&"add_pin"));
    }

    #[test]
    fn second_initialize_rejected() {
        let mut server = server();
        initialise(&mut server);
        let again = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "initialize",
            "params": { "protocolVersion": "2024-11-05" }
        });
        assert!(server.handle_line(&again.to_string()).unwrap().is_err());
    }

    #[test]
    fn tool_errors_are_results_not_rpc_errors() {
        let mut server = server();
        initialise(&mut server);
        let call = json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": { "name": "list_outer_pins" }
        });
        let response = server.handle_line(&call.to_string()).unwrap().unwrap();
        assert_eq!(response.result["isError"], true);
    }
}
