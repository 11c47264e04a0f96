use serde::Serialize;
use serde_json::json;

pub const ATTEMPT_READ_CHAT: &str = "attempt_read_chat";
pub const PW_NAVIGATE: &str = "pw_navigate";
pub const PW_SNAPSHOT: &str = "pw_snapshot";
pub const PW_RUN_CODE: &str = "pw_run_code";
pub const GET_SCREENSHOT: &str = "get_screenshot";
pub const LIST_MCP_TOOLS: &str = "list_mcp_tools";
pub const PW_CALL: &str = "pw_call";
pub const GET_SELECTOR_HINTS: &str = "get_selector_hints";
pub const SAVE_SELECTOR_HINTS: &str = "save_selector_hints";

const FEATURE_VALUES: &[&str] = &[
    "message_cta",
    "conversation_root",
    "conversation_items",
    "message_textbox",
    "send_button",
];

/// A tool as advertised to the completion service.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The fixed catalog. Every schema forbids undeclared properties and
/// lists all of its fields as required.
pub fn catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: ATTEMPT_READ_CHAT.into(),
            description: "Open the conversation for a profile and read its most recent messages. \
                          Prefer this over low-level browser operations."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "profileUrl": { "type": "string", "description": "Profile page URL" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 100,
                               "description": "How many of the most recent messages to return" },
                    "threadHint": { "type": "string",
                                    "description": "Optional thread identifier hint; empty string when unknown" }
                },
                "required": ["profileUrl", "limit", "threadHint"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: PW_NAVIGATE.into(),
            description: "Navigate the shared browser session to a URL.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string" }
                },
                "required": ["url"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: PW_SNAPSHOT.into(),
            description: "Take a structured snapshot of the current page for selector discovery.".into(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: PW_RUN_CODE.into(),
            description: "Run a script in the remote browser session and return its value.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string" }
                },
                "required": ["code"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: GET_SCREENSHOT.into(),
            description: "Read the most recent cached screenshot no older than the given bound.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "maxAgeMs": { "type": "integer", "minimum": 0, "maximum": 5000 }
                },
                "required": ["maxAgeMs"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: LIST_MCP_TOOLS.into(),
            description: "Enumerate the tools the automation server currently advertises.".into(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: PW_CALL.into(),
            description: "Invoke an allow-listed automation-server tool by name with JSON-encoded arguments.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "tool": { "type": "string", "description": "Remote tool name, namespace-prefixed" },
                    "args_json": { "type": "string", "description": "JSON-encoded argument object" }
                },
                "required": ["tool", "args_json"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: GET_SELECTOR_HINTS.into(),
            description: "Current locator candidates for a UI feature, learned entries first.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "feature": { "type": "string", "enum": FEATURE_VALUES }
                },
                "required": ["feature"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: SAVE_SELECTOR_HINTS.into(),
            description: "Persist newly discovered locator candidates for a UI feature before retrying.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "feature": { "type": "string", "enum": FEATURE_VALUES },
                    "selectors": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "maxItems": 12
                    },
                    "reason": { "type": "string" }
                },
                "required": ["feature", "selectors", "reason"],
                "additionalProperties": false
            }),
        },
    ]
}
