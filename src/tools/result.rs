use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Enumerated failure vocabulary carried on tool results.
///
/// Structural codes are expected outcomes of UI drift and are recoverable
/// by the self-heal cycle; `RUN_CODE` means the remote execution itself
/// failed and is not auto-retried; validation and capability codes are
/// produced locally before any remote traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCode {
    #[serde(rename = "CTA_NOT_FOUND")]
    CtaNotFound,
    #[serde(rename = "CTA_NOT_FOUND_IN_MORE_MENU")]
    CtaNotFoundInMoreMenu,
    #[serde(rename = "CTA_HEADER_MISSELECTION")]
    CtaHeaderMisselection,
    #[serde(rename = "OVERLAY_NOT_FOUND")]
    OverlayNotFound,
    #[serde(rename = "MCP_RUN_CODE_ERROR")]
    RunCodeError,
    #[serde(rename = "INVALID_ARGUMENTS")]
    InvalidArguments,
    #[serde(rename = "CAPABILITY_DENIED")]
    CapabilityDenied,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl FailureCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCode::CtaNotFound => "CTA_NOT_FOUND",
            FailureCode::CtaNotFoundInMoreMenu => "CTA_NOT_FOUND_IN_MORE_MENU",
            FailureCode::CtaHeaderMisselection => "CTA_HEADER_MISSELECTION",
            FailureCode::OverlayNotFound => "OVERLAY_NOT_FOUND",
            FailureCode::RunCodeError => "MCP_RUN_CODE_ERROR",
            FailureCode::InvalidArguments => "INVALID_ARGUMENTS",
            FailureCode::CapabilityDenied => "CAPABILITY_DENIED",
            FailureCode::Unknown => "UNKNOWN",
        }
    }
}

/// Every tool execution resolves to one of these: a JSON-serializable
/// value with an `ok` flag and, on failure, a taxonomy code. Dispatch
/// never raises across the loop boundary, so the model always has
/// something structured to reason over.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<FailureCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ToolResult {
    pub fn success(value: Value) -> Self {
        let mut data = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        // The envelope owns these keys; a payload echo would duplicate
        // them in the flattened output.
        data.remove("ok");
        data.remove("code");
        data.remove("error");
        Self {
            ok: true,
            code: None,
            error: None,
            data,
        }
    }

    pub fn failure(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: Some(code),
            error: Some(message.into()),
            data: Map::new(),
        }
    }

    /// Serialize for the model transcript.
    pub fn render(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"ok":false,"code":"UNKNOWN","error":"unserializable tool result"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_codes_use_wire_names() {
        assert_eq!(
            serde_json::to_string(&FailureCode::CtaNotFound).unwrap(),
            r#""CTA_NOT_FOUND""#
        );
        assert_eq!(
            serde_json::to_string(&FailureCode::RunCodeError).unwrap(),
            r#""MCP_RUN_CODE_ERROR""#
        );
        for code in [
            FailureCode::CtaNotFound,
            FailureCode::CtaNotFoundInMoreMenu,
            FailureCode::CtaHeaderMisselection,
            FailureCode::OverlayNotFound,
            FailureCode::RunCodeError,
            FailureCode::InvalidArguments,
            FailureCode::CapabilityDenied,
            FailureCode::Unknown,
        ] {
            let wire = serde_json::to_string(&code).unwrap();
            assert_eq!(wire.trim_matches('"'), code.as_str());
        }
    }

    #[test]
    fn success_flattens_object_payload() {
        let result = ToolResult::success(json!({"tools": ["pw.click"]}));
        let rendered: Value = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(rendered["ok"], true);
        assert_eq!(rendered["tools"][0], "pw.click");
        assert!(rendered.get("code").is_none());
    }

    #[test]
    fn success_payload_cannot_shadow_the_envelope() {
        let result = ToolResult::success(json!({"ok": true, "limit": 2, "messages": []}));
        let rendered = result.render();
        assert_eq!(rendered.matches("\"ok\"").count(), 1);
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["limit"], 2);
    }

    #[test]
    fn success_wraps_scalar_payload() {
        let result = ToolResult::success(json!(42));
        let rendered: Value = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(rendered["result"], 42);
    }

    #[test]
    fn failure_carries_code_and_message() {
        let result = ToolResult::failure(FailureCode::OverlayNotFound, "poll budget spent");
        let rendered: Value = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(rendered["ok"], false);
        assert_eq!(rendered["code"], "OVERLAY_NOT_FOUND");
        assert_eq!(rendered["error"], "poll budget spent");
    }
}
