use crate::providers::traits::{CompletionService, ToolCallRequest, TurnRequest, TurnResponse};
use crate::tools::ToolSpec;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the OpenAI responses endpoint.
///
/// Continuation uses `previous_response_id`: the service retains prior
/// turns server-side, so each follow-up request ships only the new tool
/// outputs. Parallel tool calls are disabled on every request because all
/// tools share one mutable browser session.
pub struct OpenAiResponsesService {
    base_url: String,
    credential: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
    parallel_tool_calls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputItem {
    Message { role: String, content: String },
    FunctionCallOutput { call_id: String, output: String },
}

#[derive(Debug, Serialize)]
struct ToolDefinition {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    description: String,
    parameters: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    id: String,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    FunctionCall {
        name: String,
        arguments: String,
        #[serde(default)]
        call_id: Option<String>,
    },
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl OpenAiResponsesService {
    pub fn new(base_url: Option<&str>, credential: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            credential: credential.map(ToString::to_string),
        }
    }

    fn http_client(&self) -> anyhow::Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?)
    }

    fn convert_tools(tools: &[ToolSpec]) -> Option<Vec<ToolDefinition>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| ToolDefinition {
                    kind: "function".to_string(),
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                    strict: true,
                })
                .collect(),
        )
    }

    fn convert_input(request: &TurnRequest<'_>) -> Vec<InputItem> {
        let mut input = Vec::new();
        if let Some(text) = request.input_text {
            input.push(InputItem::Message {
                role: "user".to_string(),
                content: text.to_string(),
            });
        }
        for output in request.tool_outputs {
            input.push(InputItem::FunctionCallOutput {
                call_id: output.call_id.clone(),
                output: output.output.clone(),
            });
        }
        input
    }

    fn parse_reply(reply: ResponsesReply) -> TurnResponse {
        let mut text_parts: Vec<String> = Vec::new();
        let mut tool_calls = Vec::new();

        for item in reply.output {
            match item {
                OutputItem::FunctionCall {
                    name,
                    arguments,
                    call_id,
                } => tool_calls.push(ToolCallRequest {
                    id: call_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    name,
                    arguments,
                }),
                OutputItem::Message { content } => {
                    for part in content {
                        if part.kind == "output_text" && !part.text.is_empty() {
                            text_parts.push(part.text);
                        }
                    }
                }
                OutputItem::Other => {}
            }
        }

        TurnResponse {
            id: reply.id,
            text: if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join("\n"))
            },
            tool_calls,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiResponsesService {
    async fn create_turn(
        &self,
        request: TurnRequest<'_>,
        model: &str,
    ) -> anyhow::Result<TurnResponse> {
        let credential = self.credential.as_ref().ok_or_else(|| {
            anyhow::anyhow!("OpenAI API key not set. Set LINKCLAW_API_KEY or edit config.toml.")
        })?;

        let body = ResponsesRequest {
            model: model.to_string(),
            instructions: request.instructions.map(ToString::to_string),
            input: Self::convert_input(&request),
            tools: Self::convert_tools(request.tools),
            parallel_tool_calls: false,
            previous_response_id: request.previous_turn_id.map(ToString::to_string),
        };

        let response = self
            .http_client()?
            .post(format!("{}/responses", self.base_url))
            .header("Authorization", format!("Bearer {credential}"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("OpenAI", response).await);
        }

        let reply: ResponsesReply = response.json().await?;
        Ok(Self::parse_reply(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ToolOutput;
    use serde_json::json;

    #[test]
    fn creates_with_and_without_key() {
        let with = OpenAiResponsesService::new(None, Some("test-credential"));
        assert_eq!(with.credential.as_deref(), Some("test-credential"));
        let without = OpenAiResponsesService::new(None, None);
        assert!(without.credential.is_none());
    }

    #[tokio::test]
    async fn create_turn_fails_without_key() {
        let service = OpenAiResponsesService::new(None, None);
        let request = TurnRequest {
            instructions: Some("do the thing"),
            input_text: Some("hello"),
            tool_outputs: &[],
            previous_turn_id: None,
            tools: &[],
        };
        let err = service.create_turn(request, "gpt-4o-mini").await.unwrap_err();
        assert!(err.to_string().contains("API key not set"));
    }

    #[test]
    fn first_turn_serializes_instructions_and_disables_parallel_calls() {
        let body = ResponsesRequest {
            model: "gpt-4o-mini".into(),
            instructions: Some("rules".into()),
            input: vec![InputItem::Message {
                role: "user".into(),
                content: "task".into(),
            }],
            tools: None,
            parallel_tool_calls: false,
            previous_response_id: None,
        };
        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(encoded["instructions"], "rules");
        assert_eq!(encoded["parallel_tool_calls"], false);
        assert_eq!(encoded["input"][0]["type"], "message");
        assert!(encoded.get("previous_response_id").is_none());
    }

    #[test]
    fn follow_up_turn_serializes_only_the_delta() {
        let request = TurnRequest {
            instructions: None,
            input_text: None,
            tool_outputs: &[ToolOutput {
                call_id: "call_7".into(),
                output: r#"{"ok":true}"#.into(),
            }],
            previous_turn_id: Some("resp_abc"),
            tools: &[],
        };
        let body = ResponsesRequest {
            model: "gpt-4o-mini".into(),
            instructions: request.instructions.map(ToString::to_string),
            input: OpenAiResponsesService::convert_input(&request),
            tools: None,
            parallel_tool_calls: false,
            previous_response_id: request.previous_turn_id.map(ToString::to_string),
        };
        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(encoded["previous_response_id"], "resp_abc");
        assert_eq!(encoded["input"][0]["type"], "function_call_output");
        assert_eq!(encoded["input"][0]["call_id"], "call_7");
        assert!(encoded.get("instructions").is_none());
    }

    #[test]
    fn tool_definitions_are_strict_functions() {
        let specs = vec![ToolSpec {
            name: "pw_navigate".into(),
            description: "Navigate the browser".into(),
            parameters: json!({"type": "object"}),
        }];
        let tools = OpenAiResponsesService::convert_tools(&specs).unwrap();
        let encoded = serde_json::to_value(&tools).unwrap();
        assert_eq!(encoded[0]["type"], "function");
        assert_eq!(encoded[0]["strict"], true);
    }

    #[test]
    fn reply_parses_function_calls_and_text() {
        let raw = json!({
            "id": "resp_1",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "function_call", "name": "pw_snapshot", "arguments": "{}", "call_id": "call_1"},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "inspecting the page"}
                ]}
            ]
        });
        let reply: ResponsesReply = serde_json::from_value(raw).unwrap();
        let turn = OpenAiResponsesService::parse_reply(reply);
        assert_eq!(turn.id, "resp_1");
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].name, "pw_snapshot");
        assert_eq!(turn.tool_calls[0].id, "call_1");
        assert_eq!(turn.text_or_empty(), "inspecting the page");
    }

    #[test]
    fn reply_without_call_id_gets_a_generated_one() {
        let raw = json!({
            "id": "resp_2",
            "output": [
                {"type": "function_call", "name": "list_mcp_tools", "arguments": "{}"}
            ]
        });
        let reply: ResponsesReply = serde_json::from_value(raw).unwrap();
        let turn = OpenAiResponsesService::parse_reply(reply);
        assert!(!turn.tool_calls[0].id.is_empty());
    }

    #[test]
    fn reply_with_empty_output_is_a_quiet_turn() {
        let reply: ResponsesReply = serde_json::from_str(r#"{"id":"resp_3"}"#).unwrap();
        let turn = OpenAiResponsesService::parse_reply(reply);
        assert!(!turn.has_tool_calls());
        assert!(turn.text.is_none());
    }
}
