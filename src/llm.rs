use crate::config::Config;
use crate::dispatcher::ConversationEndpoint;
use crate::error::EndpointError;
use crate::events::{ConversationEntry, ConversationRole};
use crate::prompts::SYSTEM_PROMPT;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

const GENERATE_CONTENT: &str = "generateContent";

/// Multi-turn dialogue state replayed to the stateless `generateContent` API.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub model: String,
    pub system_instruction: String,
    history: Vec<ConversationEntry>,
}

impl Conversation {
    pub fn new(model: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_instruction: system_instruction.into(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    /// Record a completed exchange. Only called after the remote side answered.
    pub fn push_exchange(&mut self, user_text: &str, model_text: &str) {
        self.history.push(ConversationEntry::new(ConversationRole::User, user_text));
        self.history.push(ConversationEntry::new(ConversationRole::Model, model_text));
    }

    fn contents_with(&self, user_text: &str) -> Vec<Content> {
        self.history
            .iter()
            .map(|entry| Content::text(entry.role, &entry.content))
            .chain(std::iter::once(Content::text(ConversationRole::User, user_text)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ConversationRole>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: ConversationRole, text: &str) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part { text: Some(text.to_string()) }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

/// Gemini REST client: model directory plus the conversational endpoint
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    system_prompt: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.get_api_key().ok_or_else(|| {
            anyhow!(
                "{} not found! Add it to your environment or to ~/.learnr/config.toml.",
                crate::config::API_KEY_ENV
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
        })
    }

    /// Fresh conversation against `model` with the configured system prompt
    pub fn start_chat(&self, model: &str) -> Conversation {
        Conversation::new(model, self.system_prompt.clone())
    }

    /// List model ids that support `generateContent`, without the `models/` prefix
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("key", self.api_key.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.context("Failed to fetch models")?;
            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!("Gemini API error listing models ({}): {}", status, error_text));
            }

            let page: ModelsResponse = response
                .json()
                .await
                .context("Failed to parse models response")?;
            models.extend(chat_capable_models(page.models));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(count = models.len(), "fetched chat-capable models");
        Ok(models)
    }

    async fn generate(&self, conversation: &Conversation, text: &str) -> Result<String, EndpointError> {
        let url = format!("{}/models/{}:{}", self.base_url, conversation.model, GENERATE_CONTENT);

        let system_instruction = (!conversation.system_instruction.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part { text: Some(conversation.system_instruction.clone()) }],
        });
        let payload = GenerateContentRequest {
            contents: conversation.contents_with(text),
            system_instruction,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .context("Failed to reach the Gemini API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Gemini response body")?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .context("Malformed response from the Gemini API")?;
        Ok(extract_text(parsed)?)
    }
}

#[async_trait]
impl ConversationEndpoint for GeminiClient {
    async fn send(&self, conversation: &mut Conversation, text: &str) -> Result<String, EndpointError> {
        let reply = self.generate(conversation, text).await?;
        conversation.push_exchange(text, &reply);
        Ok(reply)
    }
}

fn chat_capable_models(models: Vec<ModelInfo>) -> impl Iterator<Item = String> {
    models
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_CONTENT))
        .map(|m| m.name.strip_prefix("models/").unwrap_or(&m.name).to_string())
}

/// Map a non-success response onto the error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> EndpointError {
    let detail = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);

    let quota = status == StatusCode::TOO_MANY_REQUESTS
        || detail.as_ref().is_some_and(|d| d.status == "RESOURCE_EXHAUSTED");

    let message = detail
        .map(|d| d.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    if quota {
        EndpointError::QuotaExhausted(message)
    } else {
        EndpointError::Transport(anyhow!("Gemini API error ({}): {}", status, message))
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(anyhow!("Prompt was blocked by the API: {}", reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Gemini API returned no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(anyhow!("Gemini API returned an empty response (finish reason: {})", reason));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_generate_content_models_are_listed() {
        let page: ModelsResponse = serde_json::from_str(
            r#"{
                "models": [
                    {"name": "models/gemini-1.5-flash", "supportedGenerationMethods": ["generateContent", "countTokens"]},
                    {"name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"]},
                    {"name": "models/gemini-1.5-pro", "supportedGenerationMethods": ["generateContent"]}
                ]
            }"#,
        )
        .unwrap();

        let names: Vec<_> = chat_capable_models(page.models).collect();
        assert_eq!(names, ["gemini-1.5-flash", "gemini-1.5-pro"]);
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn too_many_requests_is_quota_exhaustion() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, EndpointError::QuotaExhausted(_)));
    }

    #[test]
    fn resource_exhausted_status_is_quota_exhaustion() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        match classify_failure(StatusCode::TOO_MANY_REQUESTS, body) {
            EndpointError::QuotaExhausted(message) => assert_eq!(message, "Quota exceeded"),
            other => panic!("expected quota exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn other_failures_are_transport_errors() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, EndpointError::Transport(_)));
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn response_parts_are_concatenated() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "Photosynthesis "}, {"text": "converts light."}]}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Photosynthesis converts light.");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let parsed: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(extract_text(parsed).unwrap_err().to_string().contains("SAFETY"));
    }

    #[test]
    fn request_replays_history_and_system_instruction() {
        let mut conversation = Conversation::new("gemini-1.5-flash", "be kind");
        conversation.push_exchange("hi", "hello!");

        let payload = GenerateContentRequest {
            contents: conversation.contents_with("what is 2+2?"),
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part { text: Some(conversation.system_instruction.clone()) }],
            }),
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "what is 2+2?");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be kind");
        assert!(json["systemInstruction"].get("role").is_none());
    }
}
