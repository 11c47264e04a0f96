//! Typed tool-call variants.
//!
//! Raw `(name, arguments)` pairs from the model are parsed into this
//! tagged union before dispatch. Each variant rejects undeclared fields
//! and enforces its declared ranges, so an invalid payload becomes an
//! explicit validation failure instead of a best-effort coercion.

use super::catalog;
use crate::selectors::Feature;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ToolParseError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {detail}")]
    InvalidArguments { tool: String, detail: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadChatArgs {
    #[serde(rename = "profileUrl")]
    pub profile_url: String,
    pub limit: u32,
    #[serde(rename = "threadHint")]
    pub thread_hint: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavigateArgs {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunCodeArgs {
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenshotArgs {
    #[serde(rename = "maxAgeMs")]
    pub max_age_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyArgs {
    pub tool: String,
    pub args_json: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HintsArgs {
    pub feature: Feature,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveHintsArgs {
    pub feature: Feature,
    /// Raw values; non-string entries are dropped by the store sanitizer.
    pub selectors: Vec<Value>,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyArgs {}

#[derive(Debug, Clone)]
pub enum ToolRequest {
    ReadChat(ReadChatArgs),
    Navigate(NavigateArgs),
    Snapshot,
    RunCode(RunCodeArgs),
    Screenshot(ScreenshotArgs),
    ListTools,
    Proxy(ProxyArgs),
    GetHints(HintsArgs),
    SaveHints(SaveHintsArgs),
}

impl ToolRequest {
    pub fn parse(name: &str, args: &Value) -> Result<Self, ToolParseError> {
        match name {
            catalog::ATTEMPT_READ_CHAT => {
                let parsed: ReadChatArgs = typed(name, args)?;
                if !(1..=100).contains(&parsed.limit) {
                    return Err(invalid(name, "limit must be between 1 and 100"));
                }
                Ok(ToolRequest::ReadChat(parsed))
            }
            catalog::PW_NAVIGATE => Ok(ToolRequest::Navigate(typed(name, args)?)),
            catalog::PW_SNAPSHOT => {
                let _: EmptyArgs = typed(name, args)?;
                Ok(ToolRequest::Snapshot)
            }
            catalog::PW_RUN_CODE => Ok(ToolRequest::RunCode(typed(name, args)?)),
            catalog::GET_SCREENSHOT => {
                let parsed: ScreenshotArgs = typed(name, args)?;
                if parsed.max_age_ms > 5_000 {
                    return Err(invalid(name, "maxAgeMs must be between 0 and 5000"));
                }
                Ok(ToolRequest::Screenshot(parsed))
            }
            catalog::LIST_MCP_TOOLS => {
                let _: EmptyArgs = typed(name, args)?;
                Ok(ToolRequest::ListTools)
            }
            catalog::PW_CALL => Ok(ToolRequest::Proxy(typed(name, args)?)),
            catalog::GET_SELECTOR_HINTS => Ok(ToolRequest::GetHints(typed(name, args)?)),
            catalog::SAVE_SELECTOR_HINTS => {
                let parsed: SaveHintsArgs = typed(name, args)?;
                if parsed.selectors.is_empty() || parsed.selectors.len() > 12 {
                    return Err(invalid(name, "selectors must hold 1 to 12 entries"));
                }
                Ok(ToolRequest::SaveHints(parsed))
            }
            other => Err(ToolParseError::UnknownTool(other.to_string())),
        }
    }
}

fn typed<T: for<'de> Deserialize<'de>>(tool: &str, args: &Value) -> Result<T, ToolParseError> {
    // A missing argument object is treated as empty, matching the
    // zero-parameter schemas.
    let effective = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args.clone()
    };
    serde_json::from_value(effective).map_err(|e| invalid(tool, e.to_string()))
}

fn invalid(tool: &str, detail: impl Into<String>) -> ToolParseError {
    ToolParseError::InvalidArguments {
        tool: tool.to_string(),
        detail: detail.into(),
    }
}
