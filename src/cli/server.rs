use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use testsmith::contexts::{
    OperationDispatcher, ANALYZE_SERVICE, GENERATE_BATCH_TESTS, GENERATE_INTEGRATION_TEST,
    GENERATE_UNIT_TEST, VALIDATE_TEST,
};
use testsmith::data::{AnalyzeRequest, BatchRequest, GenerateRequest, ValidateRequest};

/// MCP tool surface over the operation dispatcher.
#[derive(Clone)]
pub struct TestsmithServer {
    dispatcher: Arc<OperationDispatcher>,
    tool_router: ToolRouter<Self>,
}

impl TestsmithServer {
    pub fn new(dispatcher: OperationDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            tool_router: Self::tool_router(),
        }
    }

    /// Runs one operation. A report with `success: false` and a rejected
    /// request both come back as error results carrying the JSON text.
    async fn dispatch<T: Serialize>(&self, operation: &str, request: T) -> Result<CallToolResult, McpError> {
        debug!(operation, "Tool call");
        let arguments = serde_json::to_value(request)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let (report, failed) = match self.dispatcher.call(operation, arguments).await {
            Ok(report) => {
                let failed = report.get("success").and_then(Value::as_bool) == Some(false);
                (report, failed)
            }
            Err(e) => (json!({ "success": false, "error": e.to_string() }), true),
        };
        let text = serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string());
        let content = vec![Content::text(text)];
        Ok(if failed {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        })
    }
}

#[tool_router]
impl TestsmithServer {
    #[tool(description = "Extract package, class, dependencies and methods of a service class")]
    async fn analyze_service(
        &self,
        Parameters(req): Parameters<AnalyzeRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(ANALYZE_SERVICE, req).await
    }

    #[tool(description = "Generate a unit test for a service and verify it compiles and passes")]
    async fn generate_unit_test(
        &self,
        Parameters(req): Parameters<GenerateRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(GENERATE_UNIT_TEST, req).await
    }

    #[tool(description = "Generate an integration-tagged test for a service and verify it")]
    async fn generate_integration_test(
        &self,
        Parameters(req): Parameters<GenerateRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(GENERATE_INTEGRATION_TEST, req).await
    }

    #[tool(description = "Generate unit tests for several services in order")]
    async fn generate_batch_tests(
        &self,
        Parameters(req): Parameters<BatchRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(GENERATE_BATCH_TESTS, req).await
    }

    #[tool(description = "Compile and run an existing test, optionally producing a coverage report")]
    async fn validate_test(
        &self,
        Parameters(req): Parameters<ValidateRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(VALIDATE_TEST, req).await
    }
}

#[tool_handler]
impl ServerHandler for TestsmithServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                title: Some("testsmith".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Generates Kotlin service tests and verifies them with the project's Gradle build."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serves the tools over stdio until the client disconnects.
pub async fn serve(dispatcher: OperationDispatcher) -> Result<()> {
    info!("Test generation server listening on stdio");
    let running = TestsmithServer::new(dispatcher)
        .serve(stdio())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e:?}"))?;
    let reason = running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server task failed: {e:?}"))?;
    info!(reason = ?reason, "Input closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use testsmith::config::AppConfig;
    use testsmith::registries::{FileStandardsRegistry, GradleToolchain, MarkerScanDetector};
    use tokio::io::{
        AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
    };

    fn dispatcher() -> OperationDispatcher {
        let config = AppConfig::default();
        OperationDispatcher::new(
            Box::new(GradleToolchain::new(config.toolchain.clone())),
            Box::new(MarkerScanDetector::new(config.generation.framework_marker.clone())),
            Box::new(FileStandardsRegistry::new(std::env::temp_dir().join("testsmith-no-standards"))),
            &config.generation,
        )
    }

    struct Client {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        async fn connect() -> Self {
            let (client_io, server_io) = tokio::io::duplex(1 << 16);
            tokio::spawn(async move {
                let running = TestsmithServer::new(dispatcher())
                    .serve(tokio::io::split(server_io))
                    .await
                    .unwrap();
                running.waiting().await.ok();
            });

            let (reader, writer) = tokio::io::split(client_io);
            let mut client = Client {
                lines: BufReader::new(reader).lines(),
                writer,
            };
            client
                .send(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "initialize",
                    "params": {
                        "protocolVersion": "2024-11-05",
                        "capabilities": {},
                        "clientInfo": { "name": "testsmith-tests", "version": "0.0.0" }
                    }
                }))
                .await;
            let init = client.receive().await;
            assert_eq!(init["result"]["serverInfo"]["name"], "testsmith");
            client
                .send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
                .await;
            client
        }

        async fn send(&mut self, message: Value) {
            let mut line = message.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.flush().await.unwrap();
        }

        async fn receive(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
            self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
                .await;
            let response = self.receive().await;
            assert_eq!(response["id"], id);
            response
        }
    }

    #[tokio::test]
    async fn lists_all_five_tools_with_schemas() {
        let mut client = Client::connect().await;
        let response = client.request(2, "tools/list", json!({})).await;

        let tools = response["result"]["tools"].as_array().unwrap();
        let mut names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                ANALYZE_SERVICE,
                GENERATE_BATCH_TESTS,
                GENERATE_INTEGRATION_TEST,
                GENERATE_UNIT_TEST,
                VALIDATE_TEST
            ]
        );

        let generate = tools.iter().find(|t| t["name"] == GENERATE_UNIT_TEST).unwrap();
        let required = generate["inputSchema"]["required"].as_array().unwrap();
        assert!(required.contains(&json!("project_root")));
        assert!(required.contains(&json!("service_path")));
        assert!(generate["inputSchema"]["properties"].get("serena_analysis").is_some());
    }

    #[tokio::test]
    async fn answers_ping() {
        let mut client = Client::connect().await;
        let response = client.request(3, "ping", json!({})).await;
        assert!(response.get("error").is_none(), "{}", response);
        assert!(response["result"].is_object());
    }

    #[tokio::test]
    async fn failed_analysis_is_flagged() {
        let mut client = Client::connect().await;
        let response = client
            .request(
                4,
                "tools/call",
                json!({
                    "name": ANALYZE_SERVICE,
                    "arguments": { "project_root": "/definitely/missing", "service_path": "a/Foo.kt" }
                }),
            )
            .await;

        let result = &response["result"];
        assert_eq!(result["isError"], true);
        let report: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(report["success"], false);
        assert!(report["stack"].is_string());
    }

    #[tokio::test]
    async fn zero_retries_is_rejected_as_an_error_result() {
        let mut client = Client::connect().await;
        let response = client
            .request(
                5,
                "tools/call",
                json!({
                    "name": VALIDATE_TEST,
                    "arguments": {
                        "project_root": "/definitely/missing",
                        "test_path": "a/FooTest.kt",
                        "max_retries": 0
                    }
                }),
            )
            .await;

        let result = &response["result"];
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("max_retries"));
    }
}
