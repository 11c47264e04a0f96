//! Completion-service backends.
//!
//! Each backend implements [`CompletionService`] from [`traits`]. Only the
//! OpenAI responses endpoint is wired today; the trait keeps the agent
//! loop blind to the provider behind it.

pub mod openai;
pub mod traits;

pub use openai::OpenAiResponsesService;
pub use traits::{CompletionService, ToolCallRequest, ToolOutput, TurnRequest, TurnResponse};

const MAX_API_ERROR_CHARS: usize = 200;

/// Truncate provider error text to a transcript-safe length.
pub fn sanitize_api_error(input: &str) -> String {
    if input.chars().count() <= MAX_API_ERROR_CHARS {
        return input.to_string();
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &input[..end])
}

/// Build a provider-tagged error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_error_passes_through() {
        assert_eq!(sanitize_api_error("quota exceeded"), "quota exceeded");
    }

    #[test]
    fn long_error_is_truncated_with_ellipsis() {
        let long = "e".repeat(500);
        let out = sanitize_api_error(&long);
        assert!(out.len() <= MAX_API_ERROR_CHARS + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(300);
        let out = sanitize_api_error(&long);
        assert!(out.ends_with("..."));
        assert!(out.is_char_boundary(out.len() - 3));
    }
}
