use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::client::{TestingFarmClient, TestingFarmGateway};
use crate::compose::{filter_composes, Ranch};
use crate::config::Config;
use crate::request::{
    build_payload, Architecture, SubmitParams, DEFAULT_GIT_REF, DEFAULT_METADATA_ROOT_DIR,
};
use crate::request_id::extract_request_id;
use crate::status::describe_request;

// Some MCP clients are strict about the server echoing a compatible protocol
// version; stay on the widely deployed baseline.
const MCP_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "testing-farm-mcp-rs";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutcome {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitToolArgs {
    url: String,
    compose: String,
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
    #[serde(default)]
    metadata_root_dir: Option<String>,
    #[serde(default)]
    arch: Option<String>,
    #[serde(default)]
    plan_name: Option<String>,
    #[serde(default)]
    test_name: Option<String>,
    #[serde(default)]
    context: Option<BTreeMap<String, String>>,
    #[serde(default)]
    environment: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct ComposesToolArgs {
    #[serde(default)]
    ranch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetRequestToolArgs {
    request_id: String,
}

pub struct McpServer {
    config: Config,
    initialized: bool,
}

impl McpServer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            initialized: false,
        }
    }

    pub async fn run_stdio(mut self) -> Result<()> {
        info!("serving testing farm tools over stdio (api={})", self.config.api_url);

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response = match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) => self.handle(request).await,
                Err(err) => Some(json_rpc_error(None, -32700, &format!("parse error: {err}"))),
            };
            if let Some(response) = response {
                let mut rendered = response.to_string();
                rendered.push('\n');
                stdout.write_all(rendered.as_bytes()).await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    pub async fn handle(&mut self, request: JsonRpcRequest) -> Option<Value> {
        let method = request.method.as_str();
        debug!("handling rpc method {method}");

        if method == "initialize" {
            return Some(json_rpc_response(
                request.id,
                json!({
                    "protocolVersion": MCP_VERSION,
                    "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
                    "capabilities": { "tools": {} }
                }),
            ));
        }

        if !self.initialized && method != "notifications/initialized" {
            return Some(json_rpc_error(request.id, -32002, "Server not initialized"));
        }

        if method == "notifications/initialized" {
            self.initialized = true;
            return None;
        }

        if method == "ping" {
            return Some(json_rpc_response(request.id, json!({})));
        }

        // Some clients probe optional resources methods by default; advertise
        // an empty set instead of erroring.
        if method == "resources/list" {
            return Some(json_rpc_response(request.id, json!({ "resources": [] })));
        }
        if method == "resources/read" {
            return Some(json_rpc_response(request.id, json!({ "contents": [] })));
        }

        if method == "tools/list" {
            return Some(json_rpc_response(
                request.id,
                json!({ "tools": tool_definitions() }),
            ));
        }

        if method == "tools/call" {
            let Some(params) = request.params.as_ref().and_then(Value::as_object) else {
                return Some(json_rpc_error(request.id, -32602, "params must be an object"));
            };
            let tool_name = params.get("name").and_then(Value::as_str).unwrap_or("");
            let args = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));

            let outcome = self.call_tool(tool_name, args).await;
            if outcome.is_error {
                warn!("tool {tool_name} failed: {}", outcome.text);
            }
            return Some(json_rpc_response(
                request.id,
                json!({
                    "content": [{ "type": "text", "text": outcome.text }],
                    "isError": outcome.is_error
                }),
            ));
        }

        Some(json_rpc_error(
            request.id,
            -32601,
            &format!("Method not found: {method}"),
        ))
    }

    async fn call_tool(&self, name: &str, args: Value) -> ToolOutcome {
        // One transport session per tool invocation, dropped on every exit
        // path.
        let client = match TestingFarmClient::new(&self.config) {
            Ok(value) => value,
            Err(err) => return ToolOutcome::error(format!("{err:#}")),
        };
        self.dispatch_tool(&client, name, args).await
    }

    pub(crate) async fn dispatch_tool(
        &self,
        gateway: &dyn TestingFarmGateway,
        name: &str,
        args: Value,
    ) -> ToolOutcome {
        match name {
            "submit_request" => self.run_submit_request(gateway, args).await,
            "list_composes" => self.run_list_composes(gateway, args).await,
            "get_request" => self.run_get_request(gateway, args).await,
            other => ToolOutcome::error(format!("unknown tool: {other}")),
        }
    }

    async fn run_submit_request(
        &self,
        gateway: &dyn TestingFarmGateway,
        args: Value,
    ) -> ToolOutcome {
        let args = match serde_json::from_value::<SubmitToolArgs>(args) {
            Ok(value) => value,
            Err(err) => return ToolOutcome::error(format!("invalid submit_request args: {err}")),
        };
        let arch = match Architecture::parse(args.arch.as_deref().unwrap_or("x86_64")) {
            Ok(value) => value,
            Err(err) => return ToolOutcome::error(format!("{err:#}")),
        };

        let params = SubmitParams {
            url: args.url,
            compose: args.compose,
            git_ref: args.git_ref.unwrap_or_else(|| DEFAULT_GIT_REF.to_owned()),
            metadata_root_dir: args
                .metadata_root_dir
                .unwrap_or_else(|| DEFAULT_METADATA_ROOT_DIR.to_owned()),
            arch,
            plan_name: args.plan_name,
            test_name: args.test_name,
            context: args.context.unwrap_or_default(),
            environment: args.environment.unwrap_or_default(),
        };

        match gateway.submit_request(&build_payload(&params)).await {
            Ok(response) => ToolOutcome::ok(render_json(&response)),
            Err(err) => ToolOutcome::error(format!("{err:#}")),
        }
    }

    async fn run_list_composes(
        &self,
        gateway: &dyn TestingFarmGateway,
        args: Value,
    ) -> ToolOutcome {
        let args = match serde_json::from_value::<ComposesToolArgs>(args) {
            Ok(value) => value,
            Err(err) => return ToolOutcome::error(format!("invalid list_composes args: {err}")),
        };
        let ranch = match args.ranch.as_deref() {
            Some(raw) => match Ranch::parse(raw) {
                Ok(value) => value,
                Err(err) => return ToolOutcome::error(format!("{err:#}")),
            },
            None => Ranch::default(),
        };

        match gateway.list_composes(ranch).await {
            Ok(names) => ToolOutcome::ok(render_json(&json!(filter_composes(names)))),
            Err(err) => ToolOutcome::error(format!("{err:#}")),
        }
    }

    async fn run_get_request(
        &self,
        gateway: &dyn TestingFarmGateway,
        args: Value,
    ) -> ToolOutcome {
        let args = match serde_json::from_value::<GetRequestToolArgs>(args) {
            Ok(value) => value,
            Err(err) => return ToolOutcome::error(format!("invalid get_request args: {err}")),
        };

        let Some(request_id) = extract_request_id(&args.request_id) else {
            return ToolOutcome::error(format!(
                "Error: could not find request ID in {}",
                args.request_id
            ));
        };

        match gateway.get_request(request_id).await {
            Ok(record) => ToolOutcome::ok(describe_request(&record)),
            Err(err) => ToolOutcome::error(format!("{err:#}")),
        }
    }
}

fn render_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn json_rpc_response(id: Option<Value>, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn json_rpc_error(id: Option<Value>, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "submit_request",
            "description": "Submit a test request to Testing Farm. The test repository must contain tmt metadata which define the test plans to be executed.",
            "inputSchema": {
                "type": "object",
                "required": ["url", "compose"],
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Git repository URL containing the tmt metadata."
                    },
                    "compose": {
                        "type": "string",
                        "description": "Compose to run tests against."
                    },
                    "ref": {
                        "type": "string",
                        "description": "Git branch, tag or commit specifying the desired git revision.",
                        "default": "main"
                    },
                    "metadata_root_dir": {
                        "type": "string",
                        "description": "Path to the metadata tree root directory. By default git repository root.",
                        "default": "."
                    },
                    "arch": {
                        "type": "string",
                        "enum": ["x86_64", "aarch64", "ppc64le", "s390x"],
                        "description": "Architecture to test against, by default 'x86_64'.",
                        "default": "x86_64"
                    },
                    "plan_name": {
                        "type": "string",
                        "description": "Selected plans to be executed. Can be a regular expression."
                    },
                    "test_name": {
                        "type": "string",
                        "description": "Select tests to be executed. Can be a regular expression."
                    },
                    "context": {
                        "type": "object",
                        "additionalProperties": { "type": "string" },
                        "description": "TMT context variables as key-value pairs (e.g., {'distro': 'centos-stream', 'arch': 'x86_64'})."
                    },
                    "environment": {
                        "type": "object",
                        "additionalProperties": { "type": "string" },
                        "description": "TMT environment variables as key-value pairs (e.g., {'ROOTLESS_USER': 'ec2-user'})."
                    }
                }
            }
        },
        {
            "name": "list_composes",
            "description": "List available composes for a ranch. Composes are the base operating system images that tests will run on.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "ranch": {
                        "type": "string",
                        "enum": ["redhat", "public"],
                        "description": "Ranch to list composes for, redhat or public.",
                        "default": "public"
                    }
                }
            }
        },
        {
            "name": "get_request",
            "description": "Get details about a Testing Farm request. Extracts the request ID from the provided string and retrieves request details.",
            "inputSchema": {
                "type": "object",
                "required": ["request_id"],
                "properties": {
                    "request_id": {
                        "type": "string",
                        "description": "Testing Farm request ID or a string containing the ID, like an API request URL or artifacts URL."
                    }
                }
            }
        }
    ])
}
