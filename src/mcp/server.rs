/// MCP server implementation that handles JSON-RPC communication
///
/// This module implements the actual MCP server that:
/// 1. Reads JSON-RPC requests from stdin
/// 2. Processes tool calls against the local store and the sync engine
/// 3. Sends responses and notifications to stdout through one writer task
///
/// `sync_run` is answered late: the sync runs in a background task that
/// streams its progress as notifications and sends the summary as the
/// response once it is done. Other requests keep being served meanwhile.

use std::collections::HashMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::mcp::protocol::*;
use crate::sync::SyncEvent;
use crate::tools;
use crate::{AppError, PulmoSyncApp};

/// MCP server that handles communication with the client
pub struct McpServer {
    app: Arc<PulmoSyncApp>,
    /// Messages queued for the stdout writer
    outgoing: mpsc::UnboundedSender<Value>,
    /// Whether the client has sent its initialized notification
    initialized: bool,
}

impl McpServer {
    /// Create a new MCP server writing its messages to `outgoing`
    pub fn new(app: Arc<PulmoSyncApp>, outgoing: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            app,
            outgoing,
            initialized: false,
        }
    }

    /// Serve JSON-RPC over stdin/stdout until stdin closes
    pub async fn serve(app: Arc<PulmoSyncApp>) -> Result<(), AppError> {
        let (outgoing, mut messages) = mpsc::unbounded_channel::<Value>();

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(message) = messages.recv().await {
                let line = serde_json::to_string(&message)?;

                // Write message + newline
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;

                debug!("Sent message: {}", line);
            }
            Ok::<(), AppError>(())
        });

        let mut server = McpServer::new(app.clone(), outgoing);
        server.read_requests().await;

        // Nobody is listening any more; stop a sync that is still going
        app.cancel_sync();
        drop(server);

        writer
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))?
    }

    async fn read_requests(&mut self) {
        info!("Starting MCP server, waiting for JSON-RPC requests...");

        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();

            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("MCP server shutting down (stdin closed)");
                    break;
                }
                Ok(_) => {
                    if let Some(response) = self.process_line(&line).await {
                        send_message(&self.outgoing, &response);
                    }
                }
                Err(e) => {
                    error!("Failed to read from stdin: {}", e);
                    break;
                }
            }
        }
    }

    /// Process a single line of JSON-RPC input
    ///
    /// Returns the response to send now, if any.
    async fn process_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        debug!("Processing request: {}", line);

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse JSON-RPC request: {}", e);
                return Some(JsonRpcResponse::error(
                    json!(null),
                    error_codes::PARSE_ERROR,
                    format!("Invalid JSON: {}", e),
                    None,
                ));
            }
        };

        self.handle_request(request).await
    }

    /// Handle a JSON-RPC request
    async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request)),
            "initialized" | "notifications/initialized" => {
                self.initialized = true;
                if request.is_notification() {
                    None
                } else {
                    Some(JsonRpcResponse::success(request.id, json!(null)))
                }
            }
            "ping" => Some(JsonRpcResponse::success(request.id, json!({}))),
            "tools/list" => Some(self.handle_tools_list(request)),
            "tools/call" => self.handle_tools_call(request).await,
            _ if request.is_notification() => {
                debug!("Ignoring notification {}", request.method);
                None
            }
            _ => Some(JsonRpcResponse::error(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method '{}' not found", request.method),
                None,
            )),
        }
    }

    /// Handle MCP initialization request
    fn handle_initialize(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        info!("MCP client connected");

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                logging: Some(json!({})),
            },
            server_info: ServerInfo {
                name: "PulmoPulse Sync".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(
                request.id,
                error_codes::INTERNAL_ERROR,
                e.to_string(),
                None,
            ),
        }
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let tools = vec![
            tool::<tools::SchemaParams>(
                "questionnaire_schema",
                "Show the daily questionnaire: every question and the answers it accepts",
            ),
            tool::<tools::SubmitQuestionnaireParams>(
                "questionnaire_submit",
                "Submit today's questionnaire. It is stored on this device until the next sync",
            ),
            tool::<tools::ListQuestionnairesParams>(
                "questionnaire_list",
                "List questionnaires that have not been uploaded yet, newest first",
            ),
            tool::<tools::UpdateQuestionnaireParams>(
                "questionnaire_update",
                "Replace the answers of a stored questionnaire (the entry gets a new ID)",
            ),
            tool::<tools::DeleteQuestionnaireParams>(
                "questionnaire_delete",
                "Delete a stored questionnaire that has not been uploaded",
            ),
            tool::<tools::UpdatePatientParams>(
                "patient_update",
                "Update the patient's name and birth date",
            ),
            tool::<tools::SyncRunParams>(
                "sync_run",
                "Upload questionnaires, patient metadata and the last days of health data",
            ),
            tool::<tools::SyncCancelParams>(
                "sync_cancel",
                "Stop the running sync after the writes already in flight",
            ),
            tool::<tools::SyncStatusParams>(
                "sync_status",
                "Show pending questionnaires and how far each health metric has been uploaded",
            ),
        ];

        JsonRpcResponse::success(request.id, json!({ "tools": tools }))
    }

    /// Handle tools/call request
    async fn handle_tools_call(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if !self.initialized {
            debug!("Tool called before the initialized notification");
        }

        let tool_params: ToolCallParams = match request.params {
            Some(params) => match serde_json::from_value(params) {
                Ok(p) => p,
                Err(e) => {
                    return Some(JsonRpcResponse::error(
                        request.id,
                        error_codes::INVALID_PARAMS,
                        format!("Invalid parameters: {}", e),
                        None,
                    ));
                }
            },
            None => {
                return Some(JsonRpcResponse::error(
                    request.id,
                    error_codes::INVALID_PARAMS,
                    "Missing parameters".to_string(),
                    None,
                ));
            }
        };

        let args = tool_params.arguments;
        let result = match tool_params.name.as_str() {
            "questionnaire_schema" => self.call_questionnaire_schema(args),
            "questionnaire_submit" => self.call_questionnaire_submit(args),
            "questionnaire_list" => self.call_questionnaire_list(args),
            "questionnaire_update" => self.call_questionnaire_update(args),
            "questionnaire_delete" => self.call_questionnaire_delete(args),
            "patient_update" => self.call_patient_update(args),
            "sync_run" => {
                let token = tool_params.meta.and_then(|m| m.progress_token);
                return self.start_sync(request.id, token);
            }
            "sync_cancel" => self.call_sync_cancel(),
            "sync_status" => self.call_sync_status().await,
            _ => ToolCallResult::error(format!("Unknown tool: {}", tool_params.name)),
        };

        Some(JsonRpcResponse::tool_result(request.id, result))
    }

    fn call_questionnaire_schema(&self, args: HashMap<String, Value>) -> ToolCallResult {
        match parse_args::<tools::SchemaParams>(args) {
            Ok(params) => ToolCallResult::success(tools::questionnaire_schema(params).message),
            Err(result) => result,
        }
    }

    fn call_questionnaire_submit(&self, args: HashMap<String, Value>) -> ToolCallResult {
        let params = match parse_args::<tools::SubmitQuestionnaireParams>(args) {
            Ok(params) => params,
            Err(result) => return result,
        };

        match tools::submit_questionnaire(self.app.storage(), params) {
            Ok(response) => ToolCallResult::success(response.message),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn call_questionnaire_list(&self, args: HashMap<String, Value>) -> ToolCallResult {
        let params = match parse_args::<tools::ListQuestionnairesParams>(args) {
            Ok(params) => params,
            Err(result) => return result,
        };

        match tools::list_questionnaires(self.app.storage(), params) {
            Ok(response) => ToolCallResult::success(response.message),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn call_questionnaire_update(&self, args: HashMap<String, Value>) -> ToolCallResult {
        let params = match parse_args::<tools::UpdateQuestionnaireParams>(args) {
            Ok(params) => params,
            Err(result) => return result,
        };

        match tools::update_questionnaire(self.app.storage(), params) {
            Ok(response) => ToolCallResult::success(response.message),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn call_questionnaire_delete(&self, args: HashMap<String, Value>) -> ToolCallResult {
        let params = match parse_args::<tools::DeleteQuestionnaireParams>(args) {
            Ok(params) => params,
            Err(result) => return result,
        };

        match tools::delete_questionnaire(self.app.storage(), params) {
            Ok(response) => ToolCallResult::success(response.message),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn call_patient_update(&self, args: HashMap<String, Value>) -> ToolCallResult {
        let params = match parse_args::<tools::UpdatePatientParams>(args) {
            Ok(params) => params,
            Err(result) => return result,
        };

        match tools::update_patient(self.app.storage(), params) {
            Ok(response) => ToolCallResult::success(response.message),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn call_sync_cancel(&self) -> ToolCallResult {
        self.app.cancel_sync();
        ToolCallResult::success(
            "Cancellation requested. Writes already in flight will finish.".to_string(),
        )
    }

    async fn call_sync_status(&self) -> ToolCallResult {
        let status = self.app.orchestrator().status().await;
        ToolCallResult::success(tools::format_sync_status(&status))
    }

    /// Start a sync in the background
    ///
    /// The response for `id` is sent by the background task once the sync has
    /// finished, so nothing is returned here unless a sync is already running.
    fn start_sync(&self, id: Value, progress_token: Option<Value>) -> Option<JsonRpcResponse> {
        let Some(guard) = self.app.try_begin_sync() else {
            return Some(JsonRpcResponse::tool_result(
                id,
                ToolCallResult::error("A sync is already running".to_string()),
            ));
        };

        let app = self.app.clone();
        let outgoing = self.outgoing.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let (run, mut events) = app.begin_run();

            let forward = async {
                while let Some(event) = events.recv().await {
                    if let Some(notification) = event_notification(&event, progress_token.as_ref())
                    {
                        send_message(&outgoing, &notification);
                    }
                }
            };
            let sync = async move {
                let summary = app.orchestrator().run_full_sync(&run).await;
                // Closes the event channel so forwarding ends
                drop(run);
                summary
            };

            let (summary, ()) = tokio::join!(sync, forward);
            send_message(
                &outgoing,
                &JsonRpcResponse::tool_result(id, ToolCallResult::success(summary.to_string())),
            );
        });

        None
    }
}

/// Describe a tool whose arguments deserialize into `T`
fn tool<T: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    let schema = schemars::schema_for!(T);
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::to_value(schema)
            .unwrap_or_else(|_| json!({ "type": "object" })),
    }
}

fn parse_args<T: DeserializeOwned>(args: HashMap<String, Value>) -> Result<T, ToolCallResult> {
    let object: serde_json::Map<String, Value> = args.into_iter().collect();
    serde_json::from_value(Value::Object(object))
        .map_err(|e| ToolCallResult::error(format!("Invalid arguments: {}", e)))
}

/// Notification for a sync event; progress needs a token from the client
fn event_notification(event: &SyncEvent, progress_token: Option<&Value>) -> Option<JsonRpcNotification> {
    match event {
        SyncEvent::Progress { current, total } => progress_token.map(|token| {
            JsonRpcNotification::new(
                "notifications/progress",
                json!({ "progressToken": token, "progress": current, "total": total }),
            )
        }),
        SyncEvent::Log(line) => Some(JsonRpcNotification::new(
            "notifications/message",
            json!({ "level": "info", "logger": "pulmo-sync", "data": line }),
        )),
        // The summary is the response itself
        SyncEvent::Completed(_) => None,
    }
}

fn send_message<T: Serialize>(outgoing: &mpsc::UnboundedSender<Value>, message: &T) {
    match serde_json::to_value(message) {
        Ok(value) => {
            if outgoing.send(value).is_err() {
                warn!("Output closed, dropping message");
            }
        }
        Err(e) => error!("Failed to encode message: {}", e),
    }
}
