use crate::tools::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments exactly as the service produced them.
    pub arguments: String,
}

/// A serialized tool result keyed to the call that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub output: String,
}

/// One request to the completion service. The first turn of a run carries
/// instructions, seed input, and the tool catalog; follow-up turns carry
/// only the tool outputs plus the continuation identifier. The service
/// retains prior context server-side, so the transcript is never resent.
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub instructions: Option<&'a str>,
    pub input_text: Option<&'a str>,
    pub tool_outputs: &'a [ToolOutput],
    pub previous_turn_id: Option<&'a str>,
    pub tools: &'a [ToolSpec],
}

/// The service's reply: zero or more tool-call requests and/or final text,
/// plus the identifier a follow-up turn must reference.
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub id: String,
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl TurnResponse {
    /// True when the model wants to invoke at least one tool.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Convenience: final text or empty string.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn create_turn(
        &self,
        request: TurnRequest<'_>,
        model: &str,
    ) -> anyhow::Result<TurnResponse>;
}
