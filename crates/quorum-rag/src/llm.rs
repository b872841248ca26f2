//! Generation gateway trait and the Gemini implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use quorum_vector::API_KEY_HEADER;

use crate::error::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One message of a prompt sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// Text completion over a list of prompt messages.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, GenerationError>;
}

// ---------------------------------------------------------------------------
// UnconfiguredGeneration
// ---------------------------------------------------------------------------

/// Stand-in used when no model is configured. Every call fails permanently.
#[derive(Debug, Clone)]
pub struct UnconfiguredGeneration {
    reason: String,
}

impl UnconfiguredGeneration {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl GenerationGateway for UnconfiguredGeneration {
    async fn complete(&self, _messages: &[PromptMessage]) -> Result<String, GenerationError> {
        Err(GenerationError::Permanent(format!(
            "generation not configured: {}",
            self.reason
        )))
    }
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        max_output_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Permanent(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            max_output_tokens,
        })
    }

    fn build_request(&self, messages: &[PromptMessage]) -> GeminiRequest {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == PromptRole::System)
            .map(|m| m.content.as_str())
            .collect();
        let system_instruction = (!system.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: system.join("\n\n"),
            }],
        });

        let contents = messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    PromptRole::System => return None,
                    PromptRole::User => "user",
                    PromptRole::Assistant => "model",
                };
                Some(GeminiContent {
                    role: Some(role.to_string()),
                    parts: vec![GeminiPart {
                        text: m.content.clone(),
                    }],
                })
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> GenerationError {
    let message = format!("Gemini API error {}: {}", status, body);
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        GenerationError::Transient(message)
    } else {
        GenerationError::Permanent(message)
    }
}

/// Text of the first candidate, or empty when the model returned nothing.
fn extract_text(response: GeminiResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
        .unwrap_or_default()
}

#[async_trait]
impl GenerationGateway for GeminiClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.build_request(messages);

        let resp = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                if e.is_timeout() || e.is_connect() {
                    GenerationError::Transient(e.to_string())
                } else {
                    GenerationError::Permanent(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| {
                GenerationError::Transient(format!("unreadable Gemini response: {}", e.without_url()))
            })?;
        let text = extract_text(parsed);
        debug!(model = %self.model, chars = text.len(), "Gemini completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(
            "https://example.invalid/v1beta/",
            "key",
            "gemini-2.5-flash",
            0.7,
            2048,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_request_splits_system_and_roles() {
        let messages = vec![
            PromptMessage::system("be helpful"),
            PromptMessage::user("hi"),
            PromptMessage::assistant("hello"),
            PromptMessage::user("what are the support hours"),
        ];
        let json = serde_json::to_value(client().build_request(&messages)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert!(json["systemInstruction"].get("role").is_none());
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "what are the support hours");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_request_without_system() {
        let json =
            serde_json::to_value(client().build_request(&[PromptMessage::user("q")])).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_extract_text() {
        let resp: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Nine "}, {"text": "to five."}]}}]
        }))
        .unwrap();
        assert_eq!(extract_text(resp), "Nine to five.");
    }

    #[test]
    fn test_extract_text_no_candidates() {
        let resp: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(extract_text(resp), "");
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(!classify_status(StatusCode::FORBIDDEN, "").is_transient());
    }

    #[tokio::test]
    async fn test_transport_error_omits_api_key() {
        let client = GeminiClient::new(
            "http://127.0.0.1:1/v1beta",
            "SECRET-KEY-123",
            "gemini-2.5-flash",
            0.7,
            64,
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.complete(&[PromptMessage::user("q")]).await.unwrap_err();
        assert!(err.is_transient());
        assert!(!err.to_string().contains("SECRET-KEY-123"));
    }

    #[tokio::test]
    async fn test_unconfigured_is_permanent() {
        let gateway = UnconfiguredGeneration::new("GOOGLE_API_KEY is not set");
        let err = gateway.complete(&[PromptMessage::user("q")]).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }
}
