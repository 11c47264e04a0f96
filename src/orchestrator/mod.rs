//! Top-level action entry.
//!
//! Turns a caller's high-level action into task instructions plus seed
//! input for the agent loop, then post-processes the model's final
//! output. Self-heal policy lives in the instruction block: the loop
//! itself never counts retry cycles.

use crate::agent::{AgentLoop, TaskInput};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::LazyLock;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("static fence pattern compiles")
});

/// Autonomy rules sent with every run.
const AUTONOMY_INSTRUCTIONS: &str = "\
You drive a real browser session against a professional-network web UI \
through the tools provided. Follow these rules:
- Prefer attempt_read_chat over low-level browser operations for reading \
conversations.
- When a tool result carries ok:false with code OVERLAY_NOT_FOUND or \
another structural code, call pw_snapshot and inspect the page structure \
first. Only propose new selector candidates if a clear pattern is visible \
in the snapshot.
- Persist proposed candidates with save_selector_hints before retrying \
the read.
- Attempt at most 2 self-heal retry cycles per request, then stop.
- Tool calls execute one at a time against a single shared browser \
session; never assume parallel execution.
- Never fabricate a successful result. If the action cannot be completed, \
report the failure explicitly, including the failure code you observed.";

/// High-level actions accepted from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum Action {
    ReadChat {
        #[serde(rename = "profileUrl")]
        profile_url: String,
        limit: u32,
        #[serde(rename = "threadHint", default)]
        thread_hint: Option<String>,
    },
    SendMessage {
        #[serde(rename = "profileUrl")]
        profile_url: String,
        message: String,
    },
    SendConnection {
        #[serde(rename = "profileUrl")]
        profile_url: String,
        note: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::ReadChat { .. } => "read_chat",
            Action::SendMessage { .. } => "send_message",
            Action::SendConnection { .. } => "send_connection",
        }
    }
}

/// Final answer returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub ok: bool,
    pub action: &'static str,
    /// Continuation identifier of the last completion-service turn.
    pub turn_id: String,
    pub data: Value,
}

pub struct ActionOrchestrator {
    agent: AgentLoop,
}

impl ActionOrchestrator {
    pub fn new(agent: AgentLoop) -> Self {
        Self { agent }
    }

    pub async fn run(&self, action: &Action) -> Result<ActionOutcome> {
        let task = TaskInput {
            instructions: AUTONOMY_INSTRUCTIONS.to_string(),
            input: task_text(action),
        };

        tracing::info!(action = action.name(), "starting action run");
        let outcome = self.agent.run(&task).await?;
        if outcome.exhausted {
            tracing::warn!(
                action = action.name(),
                round_trips = outcome.round_trips,
                "run truncated at iteration budget"
            );
        }

        let data = match action {
            Action::ReadChat { .. } => parse_read_result(&outcome.final_text),
            _ => json!({ "text": outcome.final_text }),
        };

        Ok(ActionOutcome {
            ok: true,
            action: action.name(),
            turn_id: outcome.turn_id,
            data,
        })
    }
}

fn task_text(action: &Action) -> String {
    match action {
        Action::ReadChat {
            profile_url,
            limit,
            thread_hint,
        } => {
            let hint = thread_hint.as_deref().unwrap_or("");
            format!(
                "Read the conversation with the profile at {profile_url}. \
                 Return the {limit} most recent messages in chronological order. \
                 Thread hint: {hint:?}. \
                 When done, respond with only the JSON result of the successful \
                 attempt_read_chat call."
            )
        }
        Action::SendMessage {
            profile_url,
            message,
        } => format!(
            "Open the conversation with the profile at {profile_url} and send \
             exactly this message, with no additions: {message:?}. \
             Confirm what was sent, or report the failure."
        ),
        Action::SendConnection { profile_url, note } => format!(
            "Send a connection request to the profile at {profile_url} with \
             exactly this note: {note:?}. \
             Confirm the request was sent, or report the failure."
        ),
    }
}

/// Parse the model's final text as the structured read result; a parse
/// miss degrades to a raw-text wrapper, never a request failure.
fn parse_read_result(text: &str) -> Value {
    if let Some(value) = extract_json_object(text) {
        if value.get("messages").map_or(false, Value::is_array) {
            return value;
        }
    }
    json!({ "ok": true, "raw": text })
}

/// Pull the first JSON object out of free-form model text, tolerating
/// fenced code blocks and surrounding prose.
fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value.is_object().then_some(value);
    }

    if let Some(captures) = FENCED_JSON.captures(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(captures[1].trim()) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(Value::is_object)
}
