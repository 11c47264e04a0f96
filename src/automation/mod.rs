//! Client for the external browser-automation tool server.
//!
//! The server exposes named remote operations over JSON-RPC 2.0 on a
//! single HTTP endpoint (`tools/list` to enumerate, `tools/call` to
//! invoke). The core only assumes navigate, structured snapshot,
//! arbitrary-script execution, the structured thread extraction, and tool
//! enumeration; anything else goes through the allow-listed proxy in the
//! dispatcher. All operations share one mutable browser session on the
//! remote side, so callers must never overlap them.

use crate::cascade::{ExtractionPlan, ExtractionReport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const REMOTE_NAVIGATE: &str = "browser.navigate";
const REMOTE_SNAPSHOT: &str = "browser.snapshot";
const REMOTE_RUN_CODE: &str = "browser.run_code";
const REMOTE_EXTRACT_THREAD: &str = "browser.extract_thread";

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("automation transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("automation server error ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected automation response shape: {0}")]
    Shape(String),
}

/// Seam over the remote tool server. One implementation speaks HTTP;
/// tests substitute scripted fakes.
#[async_trait]
pub trait AutomationClient: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<Value, AutomationError>;
    async fn snapshot(&self) -> Result<Value, AutomationError>;
    async fn run_code(&self, code: &str) -> Result<Value, AutomationError>;
    async fn list_tools(&self) -> Result<Vec<String>, AutomationError>;
    async fn call_tool(&self, name: &str, args: Value) -> Result<Value, AutomationError>;
    async fn extract_thread(
        &self,
        plan: &ExtractionPlan,
    ) -> Result<ExtractionReport, AutomationError>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ToolListing {
    tools: Vec<ToolListingEntry>,
}

#[derive(Debug, Deserialize)]
struct ToolListingEntry {
    name: String,
}

/// HTTP implementation against the server's `/mcp` endpoint.
pub struct HttpAutomationClient {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpAutomationClient {
    pub fn new(base_url: &str, request_timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            endpoint: format!("{}/mcp", base_url.trim_end_matches('/')),
            http,
        })
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, AutomationError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        tracing::debug!(method, "automation rpc");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: RpcResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(AutomationError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        body.result
            .ok_or_else(|| AutomationError::Shape("missing result and error".to_string()))
    }
}

#[async_trait]
impl AutomationClient for HttpAutomationClient {
    async fn navigate(&self, url: &str) -> Result<Value, AutomationError> {
        self.call_tool(REMOTE_NAVIGATE, json!({ "url": url })).await
    }

    async fn snapshot(&self) -> Result<Value, AutomationError> {
        self.call_tool(REMOTE_SNAPSHOT, json!({})).await
    }

    async fn run_code(&self, code: &str) -> Result<Value, AutomationError> {
        self.call_tool(REMOTE_RUN_CODE, json!({ "code": code })).await
    }

    async fn list_tools(&self) -> Result<Vec<String>, AutomationError> {
        let result = self.rpc("tools/list", json!({})).await?;
        let listing: ToolListing = serde_json::from_value(result)
            .map_err(|e| AutomationError::Shape(format!("tools/list: {e}")))?;
        Ok(listing.tools.into_iter().map(|t| t.name).collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<Value, AutomationError> {
        self.rpc("tools/call", json!({ "name": name, "arguments": args }))
            .await
    }

    async fn extract_thread(
        &self,
        plan: &ExtractionPlan,
    ) -> Result<ExtractionReport, AutomationError> {
        let plan_value = serde_json::to_value(plan)
            .map_err(|e| AutomationError::Shape(format!("plan encode: {e}")))?;
        let result = self.call_tool(REMOTE_EXTRACT_THREAD, plan_value).await?;
        serde_json::from_value(result)
            .map_err(|e| AutomationError::Shape(format!("extraction report: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_request_serializes_jsonrpc_envelope() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "tools/call",
            params: json!({ "name": "browser.navigate", "arguments": { "url": "https://x" } }),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["jsonrpc"], "2.0");
        assert_eq!(encoded["method"], "tools/call");
        assert_eq!(encoded["params"]["name"], "browser.navigate");
    }

    #[test]
    fn rpc_response_error_takes_priority() {
        let body: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"boom"}}"#,
        )
        .unwrap();
        let err = body.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn tool_listing_extracts_names() {
        let listing: ToolListing = serde_json::from_str(
            r#"{"tools":[{"name":"pw.click","description":"click"},{"name":"pw.fill"}]}"#,
        )
        .unwrap();
        let names: Vec<String> = listing.tools.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["pw.click", "pw.fill"]);
    }
}
