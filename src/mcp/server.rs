use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::mcp::protocol::{ErrorCode, JsonRpcRequest, JsonRpcResponse, McpError};
use crate::mcp::tools::{Tool, ToolCatalog};
use crate::MetrikaClient;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = [PROTOCOL_VERSION, "2025-03-26", "2024-11-05"];
const JSONRPC_VERSION: &str = "2.0";
const SERVER_NAME: &str = "yandex-metrika-mcp-server";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP server exposing Metrika reports as tools.
pub struct McpServer {
    client: MetrikaClient,
    catalog: ToolCatalog,
}

impl McpServer {
    pub fn new(client: MetrikaClient) -> Self {
        Self {
            client,
            catalog: ToolCatalog::new(),
        }
    }

    fn handle_initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .filter(|requested| SUPPORTED_PROTOCOL_VERSIONS.contains(requested))
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
            "instructions": "Server for getting data from Yandex Metrika",
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({ "tools": self.catalog.list() })
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, McpError> {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        if name.is_empty() {
            return Err(McpError::new(ErrorCode::InvalidParams, "Missing tool name"));
        }
        let tool = Tool::from_name(name).ok_or_else(|| {
            McpError::new(ErrorCode::InvalidParams, format!("Unknown tool: {name}"))
        })?;
        let args = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        #[cfg(feature = "tracing")]
        tracing::info!(tool = name, "tool call");

        let (text, is_error) = match self.catalog.call(&self.client, tool, args).await {
            Ok(text) => (text, false),
            Err(text) => (text, true),
        };
        Ok(json!({
            "content": [{"type": "text", "text": text}],
            "isError": is_error,
        }))
    }

    /// Handles one line of input; `None` means nothing is written back.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let parsed: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(_) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::ParseError,
                    "Parse error",
                ))
            }
        };

        let request: JsonRpcRequest = match serde_json::from_value(parsed) {
            Ok(req) => req,
            Err(_) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::InvalidRequest,
                    "Invalid request",
                ))
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return request.id.map(|id| {
                JsonRpcResponse::failure(id, ErrorCode::InvalidRequest, "Invalid request")
            });
        }

        // Notifications never get a reply.
        let id = request.id?;

        let response = match request.method.as_str() {
            "initialize" => {
                JsonRpcResponse::success(id, self.handle_initialize(&request.params))
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.handle_tools_list()),
            "tools/call" => match self.handle_tools_call(&request.params).await {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(err) => JsonRpcResponse::failure(id, err.code, err.message),
            },
            _ => JsonRpcResponse::failure(id, ErrorCode::MethodNotFound, "Method not found"),
        };
        Some(response)
    }

    /// Serves newline-delimited JSON-RPC until `reader` reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut writer = BufWriter::new(writer);

        while let Some(line) = lines.next_line().await? {
            if let Some(response) = self.handle_line(&line).await {
                let payload = serde_json::to_string(&response)?;
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Serves on process stdin/stdout.
    pub async fn run_stdio(&self) -> std::io::Result<()> {
        #[cfg(feature = "tracing")]
        tracing::info!("MCP server started on stdin/stdout");

        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::McpServer;
    use crate::MetrikaClient;

    fn server() -> McpServer {
        let client = MetrikaClient::new("token")
            .and_then(|client| client.with_base_url("http://127.0.0.1:9"))
            .expect("valid client");
        McpServer::new(client)
    }

    async fn roundtrip(server: &McpServer, line: &str) -> Value {
        let response = server.handle_line(line).await.expect("response expected");
        serde_json::to_value(response).expect("response serializes")
    }

    #[tokio::test]
    async fn initialize_echoes_requested_version() {
        let response = roundtrip(
            &server(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
        )
        .await;
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(
            response["result"]["serverInfo"]["name"],
            "yandex-metrika-mcp-server"
        );
    }

    #[tokio::test]
    async fn initialize_falls_back_for_unknown_version() {
        let response = roundtrip(
            &server(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#,
        )
        .await;
        assert_eq!(response["result"]["protocolVersion"], "2025-06-18");
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_invalid_request() {
        let response = roundtrip(
            &server(),
            r#"{"jsonrpc":"1.0","id":2,"method":"tools/list"}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(response["id"], 2);
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn null_id_request_gets_a_reply() {
        let response = roundtrip(&server(), r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).await;
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn notifications_are_silent() {
        let server = server();
        let line = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(server.handle_line(line).await.is_none());
        assert!(server.handle_line("   ").await.is_none());
    }

    #[tokio::test]
    async fn malformed_input_maps_to_json_rpc_errors() {
        let server = server();
        let parse = roundtrip(&server, "{not json").await;
        assert_eq!(parse["error"]["code"], -32700);
        assert_eq!(parse["id"], Value::Null);

        let invalid = roundtrip(&server, r#"{"id":3}"#).await;
        assert_eq!(invalid["error"]["code"], -32600);

        let unknown = roundtrip(&server, r#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#).await;
        assert_eq!(unknown["error"]["code"], -32601);
        assert_eq!(unknown["id"], 4);
    }

    #[tokio::test]
    async fn tools_call_requires_known_tool() {
        let server = server();
        let missing = roundtrip(
            &server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{}}"#,
        )
        .await;
        assert_eq!(missing["error"]["code"], -32602);

        let unknown = roundtrip(
            &server,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"delete_counter"}}"#,
        )
        .await;
        assert_eq!(unknown["error"]["code"], -32602);
        assert!(unknown["error"]["message"]
            .as_str()
            .is_some_and(|msg| msg.contains("delete_counter")));
    }

    #[tokio::test]
    async fn invalid_arguments_become_text_result() {
        let response = roundtrip(
            &server(),
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"get_account_info","arguments":{}}}"#,
        )
        .await;
        let result = &response["result"];
        assert_eq!(result["isError"], json!(true));
        assert_eq!(result["content"][0]["type"], "text");
        assert!(result["content"][0]["text"]
            .as_str()
            .is_some_and(|text| text.starts_with("Something went wrong. Error:")));
    }
}
