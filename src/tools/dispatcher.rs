//! Routes typed tool invocations to their backends.
//!
//! Every dispatch resolves to a well-formed [`ToolResult`], including for
//! malformed payloads and refused proxy calls, so the reasoning loop
//! always receives something structured. Only the transport to the
//! completion service itself may abort a run.

use super::catalog;
use super::request::ToolRequest;
use super::result::{FailureCode, ToolResult};
use crate::automation::{AutomationClient, AutomationError};
use crate::capture::ScreenshotSource;
use crate::cascade::{self, CascadeSettings};
use crate::selectors::{sanitize_candidates, SelectorStore};
use crate::util::truncate_with_ellipsis;
use serde_json::{json, Value};
use std::sync::Arc;

/// Fixed refusal text for proxy calls outside the capability allow-list.
const PROXY_DENIAL_REASON: &str =
    "proxy call refused: tool is not in the allow-listed namespace advertised by the automation server";

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Namespace prefix a proxied tool name must carry.
    pub proxy_prefix: String,
    /// Character budget for snapshot output fed back to the model.
    pub snapshot_char_budget: usize,
    pub cascade: CascadeSettings,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            proxy_prefix: "pw.".to_string(),
            snapshot_char_budget: 60_000,
            cascade: CascadeSettings::default(),
        }
    }
}

pub struct ToolDispatcher {
    store: Arc<dyn SelectorStore>,
    automation: Arc<dyn AutomationClient>,
    capture: Arc<dyn ScreenshotSource>,
    settings: DispatchSettings,
}

impl ToolDispatcher {
    pub fn new(
        store: Arc<dyn SelectorStore>,
        automation: Arc<dyn AutomationClient>,
        capture: Arc<dyn ScreenshotSource>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            automation,
            capture,
            settings,
        }
    }

    /// Execute one named tool call. Synchronous from the caller's view:
    /// returns exactly one result, never partially completes.
    pub async fn dispatch(&self, name: &str, args: &Value) -> ToolResult {
        let request = match ToolRequest::parse(name, args) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(tool = name, %err, "rejecting malformed tool call");
                return ToolResult::failure(FailureCode::InvalidArguments, err.to_string());
            }
        };

        tracing::debug!(tool = name, "dispatching tool call");
        match request {
            ToolRequest::ReadChat(args) => self.read_chat(&args).await,
            ToolRequest::Navigate(args) => match self.automation.navigate(&args.url).await {
                Ok(value) => ToolResult::success(value),
                Err(err) => remote_failure(err),
            },
            ToolRequest::Snapshot => match self.automation.snapshot().await {
                Ok(value) => self.compact_snapshot(value),
                Err(err) => remote_failure(err),
            },
            ToolRequest::RunCode(args) => match self.automation.run_code(&args.code).await {
                Ok(value) => ToolResult::success(value),
                Err(AutomationError::Rpc { message, .. }) => {
                    // Remote script diagnostics pass through verbatim.
                    ToolResult::failure(FailureCode::RunCodeError, message)
                }
                Err(err) => ToolResult::failure(FailureCode::Unknown, err.to_string()),
            },
            ToolRequest::Screenshot(args) => match self.capture.fetch(args.max_age_ms).await {
                Ok(frame) => ToolResult::success(json!({
                    "media_type": frame.media_type,
                    "data": frame.data,
                    "age_ms": frame.age_ms,
                })),
                Err(err) => ToolResult::failure(FailureCode::Unknown, err.to_string()),
            },
            ToolRequest::ListTools => match self.automation.list_tools().await {
                Ok(tools) => ToolResult::success(json!({ "tools": tools })),
                Err(err) => remote_failure(err),
            },
            ToolRequest::Proxy(args) => self.proxy_call(&args.tool, &args.args_json).await,
            ToolRequest::GetHints(args) => ToolResult::success(json!({
                "feature": args.feature,
                "selectors": self.store.selectors_for(args.feature),
            })),
            ToolRequest::SaveHints(args) => {
                let sanitized = sanitize_candidates(&args.selectors);
                let stored = sanitized.len();
                self.store.save(args.feature, &sanitized, &args.reason);
                // Malformed candidate lists degrade to a no-op, never an
                // error, so a cosmetic mistake cannot stall the loop.
                ToolResult::success(json!({ "feature": args.feature, "stored": stored }))
            }
        }
    }

    async fn read_chat(&self, args: &super::request::ReadChatArgs) -> ToolResult {
        let plan = cascade::build_plan(
            self.store.as_ref(),
            &self.settings.cascade,
            &args.profile_url,
            args.limit,
            &args.thread_hint,
        );
        match self.automation.extract_thread(&plan).await {
            Ok(report) => match cascade::interpret(&report, args.limit, &args.thread_hint) {
                Ok(read) => match serde_json::to_value(&read) {
                    Ok(value) => ToolResult::success(value),
                    Err(err) => ToolResult::failure(FailureCode::Unknown, err.to_string()),
                },
                Err(signal) => {
                    tracing::info!(code = signal.code().as_str(), "extraction aborted");
                    ToolResult::failure(signal.code(), signal.message())
                }
            },
            Err(AutomationError::Rpc { message, .. }) => {
                ToolResult::failure(FailureCode::RunCodeError, message)
            }
            Err(err) => ToolResult::failure(FailureCode::Unknown, err.to_string()),
        }
    }

    async fn proxy_call(&self, tool: &str, args_json: &str) -> ToolResult {
        if !tool.starts_with(&self.settings.proxy_prefix) {
            tracing::warn!(tool, "proxy call outside required namespace");
            return ToolResult::failure(FailureCode::CapabilityDenied, PROXY_DENIAL_REASON);
        }

        let advertised = match self.automation.list_tools().await {
            Ok(tools) => tools,
            Err(err) => return remote_failure(err),
        };
        if !advertised.iter().any(|name| name == tool) {
            tracing::warn!(tool, "proxy call to unadvertised tool");
            return ToolResult::failure(FailureCode::CapabilityDenied, PROXY_DENIAL_REASON);
        }

        let arguments: Value = match serde_json::from_str(args_json) {
            Ok(value) => value,
            Err(err) => {
                return ToolResult::failure(
                    FailureCode::InvalidArguments,
                    format!("args_json is not valid JSON: {err}"),
                )
            }
        };

        match self.automation.call_tool(tool, arguments).await {
            Ok(value) => ToolResult::success(value),
            Err(err) => remote_failure(err),
        }
    }

    fn compact_snapshot(&self, value: Value) -> ToolResult {
        let rendered = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let compact = truncate_with_ellipsis(&rendered, self.settings.snapshot_char_budget);
        ToolResult::success(json!({ "snapshot": compact }))
    }

    /// The fixed catalog advertised alongside every first turn.
    pub fn catalog(&self) -> Vec<catalog::ToolSpec> {
        catalog::catalog()
    }
}

fn remote_failure(err: AutomationError) -> ToolResult {
    match err {
        AutomationError::Rpc { message, .. } => ToolResult::failure(FailureCode::Unknown, message),
        other => ToolResult::failure(FailureCode::Unknown, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CachedFrame;
    use crate::cascade::{ExtractionPlan, ExtractionReport};
    use crate::selectors::{Feature, MemorySelectorStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Scripted automation backend that counts what the dispatcher sends.
    #[derive(Default)]
    struct FakeAutomation {
        advertised: Vec<String>,
        report_json: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeAutomation {
        fn recorded(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, what: impl Into<String>) {
            self.calls.lock().push(what.into());
        }
    }

    #[async_trait]
    impl AutomationClient for FakeAutomation {
        async fn navigate(&self, url: &str) -> Result<Value, AutomationError> {
            self.record(format!("navigate {url}"));
            Ok(json!({ "url": url }))
        }

        async fn snapshot(&self) -> Result<Value, AutomationError> {
            self.record("snapshot");
            Ok(json!("node tree"))
        }

        async fn run_code(&self, _code: &str) -> Result<Value, AutomationError> {
            self.record("run_code");
            Err(AutomationError::Rpc {
                code: -32000,
                message: "ReferenceError: q is not defined".into(),
            })
        }

        async fn list_tools(&self) -> Result<Vec<String>, AutomationError> {
            self.record("list_tools");
            Ok(self.advertised.clone())
        }

        async fn call_tool(&self, name: &str, _args: Value) -> Result<Value, AutomationError> {
            self.record(format!("call_tool {name}"));
            Ok(json!({ "called": name }))
        }

        async fn extract_thread(
            &self,
            plan: &ExtractionPlan,
        ) -> Result<ExtractionReport, AutomationError> {
            self.record(format!("extract {}", plan.profile_url));
            let raw = self
                .report_json
                .clone()
                .unwrap_or_else(|| r#"{"status":"failed","signal":"OVERLAY_NOT_FOUND"}"#.into());
            Ok(serde_json::from_str(&raw).expect("fixture report"))
        }
    }

    struct FakeCapture;

    #[async_trait]
    impl ScreenshotSource for FakeCapture {
        async fn fetch(&self, _max_age_ms: u64) -> anyhow::Result<CachedFrame> {
            Ok(CachedFrame {
                data: "aGVsbG8=".into(),
                media_type: "image/png".into(),
                age_ms: 900,
            })
        }
    }

    fn dispatcher(automation: Arc<FakeAutomation>) -> ToolDispatcher {
        ToolDispatcher::new(
            Arc::new(MemorySelectorStore::default()),
            automation,
            Arc::new(FakeCapture),
            DispatchSettings::default(),
        )
    }

    #[tokio::test]
    async fn proxy_refuses_foreign_namespace_without_remote_traffic() {
        let automation = Arc::new(FakeAutomation {
            advertised: vec!["pw.click".into()],
            ..FakeAutomation::default()
        });
        let dispatcher = dispatcher(automation.clone());

        let result = dispatcher
            .dispatch("pw_call", &json!({"tool": "shell.exec", "args_json": "{}"}))
            .await;

        assert!(!result.ok);
        assert_eq!(result.code, Some(FailureCode::CapabilityDenied));
        assert_eq!(result.error.as_deref(), Some(PROXY_DENIAL_REASON));
        assert!(automation.recorded().is_empty());
    }

    #[tokio::test]
    async fn proxy_refuses_unadvertised_tool_without_invoking_it() {
        let automation = Arc::new(FakeAutomation {
            advertised: vec!["pw.click".into()],
            ..FakeAutomation::default()
        });
        let dispatcher = dispatcher(automation.clone());

        let result = dispatcher
            .dispatch("pw_call", &json!({"tool": "pw.teleport", "args_json": "{}"}))
            .await;

        assert!(!result.ok);
        assert_eq!(result.code, Some(FailureCode::CapabilityDenied));
        assert_eq!(automation.recorded(), vec!["list_tools".to_string()]);
    }

    #[tokio::test]
    async fn proxy_invokes_advertised_tool() {
        let automation = Arc::new(FakeAutomation {
            advertised: vec!["pw.click".into()],
            ..FakeAutomation::default()
        });
        let dispatcher = dispatcher(automation.clone());

        let result = dispatcher
            .dispatch(
                "pw_call",
                &json!({"tool": "pw.click", "args_json": "{\"selector\":\"#go\"}"}),
            )
            .await;

        assert!(result.ok);
        assert_eq!(
            automation.recorded(),
            vec!["list_tools".to_string(), "call_tool pw.click".to_string()]
        );
    }

    #[tokio::test]
    async fn proxy_rejects_unparseable_args_json_locally() {
        let automation = Arc::new(FakeAutomation {
            advertised: vec!["pw.click".into()],
            ..FakeAutomation::default()
        });
        let dispatcher = dispatcher(automation.clone());

        let result = dispatcher
            .dispatch("pw_call", &json!({"tool": "pw.click", "args_json": "{not json"}))
            .await;

        assert!(!result.ok);
        assert_eq!(result.code, Some(FailureCode::InvalidArguments));
        assert_eq!(automation.recorded(), vec!["list_tools".to_string()]);
    }

    #[tokio::test]
    async fn read_chat_success_slices_to_limit() {
        let automation = Arc::new(FakeAutomation {
            report_json: Some(
                r#"{"status":"ok","root_matched_by":"fallback",
                    "items":["m1","m2","m3","m4","m5"]}"#
                    .into(),
            ),
            ..FakeAutomation::default()
        });
        let dispatcher = dispatcher(automation);

        let result = dispatcher
            .dispatch(
                "attempt_read_chat",
                &json!({"profileUrl": "https://example/in/alice", "limit": 3, "threadHint": ""}),
            )
            .await;

        assert!(result.ok);
        let rendered: Value = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(rendered["limit"], 3);
        assert_eq!(rendered["messages"], json!(["m3", "m4", "m5"]));
        assert!(rendered["extracted_at"].is_string());
    }

    #[tokio::test]
    async fn read_chat_poll_exhaustion_reports_overlay_code() {
        let dispatcher = dispatcher(Arc::new(FakeAutomation::default()));

        let result = dispatcher
            .dispatch(
                "attempt_read_chat",
                &json!({"profileUrl": "https://example/in/alice", "limit": 3, "threadHint": ""}),
            )
            .await;

        assert!(!result.ok);
        assert_eq!(result.code, Some(FailureCode::OverlayNotFound));
    }

    #[tokio::test]
    async fn run_code_failure_passes_diagnostic_verbatim() {
        let dispatcher = dispatcher(Arc::new(FakeAutomation::default()));

        let result = dispatcher
            .dispatch("pw_run_code", &json!({"code": "q()"}))
            .await;

        assert!(!result.ok);
        assert_eq!(result.code, Some(FailureCode::RunCodeError));
        assert_eq!(
            result.error.as_deref(),
            Some("ReferenceError: q is not defined")
        );
    }

    #[tokio::test]
    async fn malformed_arguments_become_validation_failures() {
        let dispatcher = dispatcher(Arc::new(FakeAutomation::default()));

        let result = dispatcher.dispatch("pw_navigate", &json!({"href": "x"})).await;
        assert!(!result.ok);
        assert_eq!(result.code, Some(FailureCode::InvalidArguments));

        let result = dispatcher.dispatch("no_such_tool", &json!({})).await;
        assert!(!result.ok);
        assert_eq!(result.code, Some(FailureCode::InvalidArguments));
    }

    #[tokio::test]
    async fn snapshot_output_is_budgeted() {
        let automation = Arc::new(FakeAutomation::default());
        let mut settings = DispatchSettings::default();
        settings.snapshot_char_budget = 4;
        let dispatcher = ToolDispatcher::new(
            Arc::new(MemorySelectorStore::default()),
            automation,
            Arc::new(FakeCapture),
            settings,
        );

        let result = dispatcher.dispatch("pw_snapshot", &json!({})).await;
        assert!(result.ok);
        let rendered: Value = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(rendered["snapshot"], "node...");
    }

    #[tokio::test]
    async fn selector_hints_round_trip_through_dispatch() {
        let dispatcher = dispatcher(Arc::new(FakeAutomation::default()));

        let saved = dispatcher
            .dispatch(
                "save_selector_hints",
                &json!({
                    "feature": "conversation_root",
                    "selectors": ["div.discovered", 13, "  ", "div.discovered"],
                    "reason": "visible in snapshot"
                }),
            )
            .await;
        assert!(saved.ok);
        let rendered: Value = serde_json::from_str(&saved.render()).unwrap();
        assert_eq!(rendered["stored"], 1);

        let hints = dispatcher
            .dispatch("get_selector_hints", &json!({"feature": "conversation_root"}))
            .await;
        let rendered: Value = serde_json::from_str(&hints.render()).unwrap();
        assert_eq!(rendered["selectors"][0], "div.discovered");
    }

    #[tokio::test]
    async fn screenshot_read_returns_frame_fields() {
        let dispatcher = dispatcher(Arc::new(FakeAutomation::default()));

        let result = dispatcher
            .dispatch("get_screenshot", &json!({"maxAgeMs": 2000}))
            .await;

        assert!(result.ok);
        let rendered: Value = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(rendered["media_type"], "image/png");
        assert_eq!(rendered["age_ms"], 900);
    }

    #[tokio::test]
    async fn get_hints_reflects_feature_entry() {
        let store = Arc::new(MemorySelectorStore::default());
        store.save(Feature::SendButton, &["button.fresh".to_string()], "test");
        let dispatcher = ToolDispatcher::new(
            store,
            Arc::new(FakeAutomation::default()),
            Arc::new(FakeCapture),
            DispatchSettings::default(),
        );

        let result = dispatcher
            .dispatch("get_selector_hints", &json!({"feature": "send_button"}))
            .await;
        let rendered: Value = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(rendered["feature"], "send_button");
        assert_eq!(rendered["selectors"][0], "button.fresh");
    }
}
