use crate::providers::{CompletionService, ToolOutput, TurnRequest, TurnResponse};
use crate::tools::ToolDispatcher;
use crate::util::truncate_with_ellipsis;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

/// Maximum completion-service round trips per run unless configured
/// otherwise. Hitting the bound is a deliberate truncation, not an error.
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// Cap on tool output preview length in debug logs.
const LOG_PREVIEW_CHARS: usize = 300;

/// Instructions plus seed input for one run.
#[derive(Debug, Clone)]
pub struct TaskInput {
    pub instructions: String,
    pub input: String,
}

/// What a run ended with.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// The model's final text, empty if it never produced any.
    pub final_text: String,
    /// Continuation identifier of the last turn.
    pub turn_id: String,
    /// Completion-service round trips consumed.
    pub round_trips: usize,
    /// True when the iteration budget ran out while tools were still
    /// being requested.
    pub exhausted: bool,
}

/// Bounded conversation with the completion service.
///
/// `INIT → AWAIT_MODEL → (EXEC_TOOLS → AWAIT_MODEL)* → DONE`. Tool calls
/// within an iteration execute strictly sequentially: they all drive one
/// mutable browser session, and overlapping navigation or DOM operations
/// against it would race. Each follow-up turn references the previous
/// turn's identifier and carries only the new tool outputs.
pub struct AgentLoop {
    completion: Arc<dyn CompletionService>,
    dispatcher: ToolDispatcher,
    model: String,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        dispatcher: ToolDispatcher,
        model: impl Into<String>,
        max_iterations: usize,
    ) -> Self {
        Self {
            completion,
            dispatcher,
            model: model.into(),
            max_iterations: max_iterations.max(1),
        }
    }

    pub async fn run(&self, task: &TaskInput) -> Result<LoopOutcome> {
        let specs = self.dispatcher.catalog();

        let mut response = self
            .completion
            .create_turn(
                TurnRequest {
                    instructions: Some(&task.instructions),
                    input_text: Some(&task.input),
                    tool_outputs: &[],
                    previous_turn_id: None,
                    tools: &specs,
                },
                &self.model,
            )
            .await?;
        let mut round_trips = 1;

        while response.has_tool_calls() {
            if round_trips == self.max_iterations {
                tracing::warn!(
                    round_trips,
                    "iteration budget exhausted with tools still requested; returning last response"
                );
                return Ok(Self::outcome(response, round_trips, true));
            }

            let outputs = self.execute_tool_calls(&response).await;

            response = self
                .completion
                .create_turn(
                    TurnRequest {
                        instructions: None,
                        input_text: None,
                        tool_outputs: &outputs,
                        previous_turn_id: Some(&response.id),
                        tools: &specs,
                    },
                    &self.model,
                )
                .await?;
            round_trips += 1;
        }

        Ok(Self::outcome(response, round_trips, false))
    }

    /// Execute the turn's tool calls one at a time, in order.
    async fn execute_tool_calls(&self, response: &TurnResponse) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            let args: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
            let result = self.dispatcher.dispatch(&call.name, &args).await;
            let rendered = result.render();
            tracing::debug!(
                tool = %call.name,
                ok = result.ok,
                output = %truncate_with_ellipsis(&rendered, LOG_PREVIEW_CHARS),
                "tool call finished"
            );
            outputs.push(ToolOutput {
                call_id: call.id.clone(),
                output: rendered,
            });
        }
        outputs
    }

    fn outcome(response: TurnResponse, round_trips: usize, exhausted: bool) -> LoopOutcome {
        LoopOutcome {
            final_text: response.text.unwrap_or_default(),
            turn_id: response.id,
            round_trips,
            exhausted,
        }
    }
}
