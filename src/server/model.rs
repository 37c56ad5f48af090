//! Anthropic Messages API client, constrained to flat string-map output.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::fields::{sanitize_answers, AnswerMap, FillRequest};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOKENS: u32 = 4096;

/// Name of the forced tool the model must call with its answers.
const ANSWER_TOOL: &str = "record_answers";

/// Something that turns a fill request into an answer map.
///
/// The server handler depends on this seam rather than on the Anthropic
/// client directly, so tests can substitute a stub generator.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, request: &FillRequest) -> Result<AnswerMap>;
}

/// Anthropic API request.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    tools: Vec<ApiTool>,
    tool_choice: Value,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { input: Value },
}

/// Generator backed by the Anthropic Messages API.
pub struct AnthropicGenerator {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicGenerator {
    pub fn new(api_key: String) -> Self {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_key: String, timeout: Duration) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: ANTHROPIC_API_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the generator at a different API host (used by tests).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The schema the model's answers must satisfy: a flat object whose
    /// values are all strings. Nested objects and arrays are forbidden.
    fn answer_tool() -> ApiTool {
        ApiTool {
            name: ANSWER_TOOL.to_string(),
            description: "Record one answer per form field, keyed by field id.".to_string(),
            input_schema: json!({
                "type": "object",
                "additionalProperties": { "type": "string" }
            }),
        }
    }

    fn build_request(&self, request: &FillRequest) -> Result<ApiRequest> {
        Ok(ApiRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: build_prompt(request)?,
            }],
            max_tokens: MAX_TOKENS,
            tools: vec![Self::answer_tool()],
            tool_choice: json!({ "type": "tool", "name": ANSWER_TOOL }),
        })
    }
}

#[async_trait]
impl AnswerGenerator for AnthropicGenerator {
    async fn generate(&self, request: &FillRequest) -> Result<AnswerMap> {
        let api_request = self.build_request(request)?;
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::ModelError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            // Anthropic error JSON: {"error": {"message": "...", "type": "..."}}
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(String::from))
                .unwrap_or(body);
            return Err(Error::ModelError(format!("API error ({status}): {message}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::ModelError(e.to_string()))?;

        for block in api_response.content {
            match block {
                ContentBlock::ToolUse { input } => {
                    debug!("model returned tool input");
                    return Ok(sanitize_answers(input));
                }
                // Some models answer in text despite a forced tool; accept
                // a bare JSON object there as a fallback.
                ContentBlock::Text { text } => {
                    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
                        if value.is_object() {
                            warn!("model answered in text instead of tool input");
                            return Ok(sanitize_answers(value));
                        }
                    }
                }
            }
        }

        Err(Error::ModelError(
            "model returned no structured answers".to_string(),
        ))
    }
}

/// Build the single prompt sent for one fill request. The profile and the
/// field list are embedded verbatim as pretty-printed JSON.
pub fn build_prompt(request: &FillRequest) -> Result<String> {
    let name = request
        .profile
        .get("name")
        .map(String::as_str)
        .unwrap_or("the user");
    let profile_json = serde_json::to_string_pretty(&request.profile)?;
    let fields_json = serde_json::to_string_pretty(&request.form_fields)?;

    Ok(format!(
        "You are filling out a form for {name}.\n\
         Use their profile information to answer each question authentically.\n\
         Match their writing style if samples are provided.\n\
         Return a JSON object where keys are field IDs and values are the answers.\n\
         \n\
         USER PROFILE:\n\
         {profile_json}\n\
         \n\
         FORM FIELDS TO FILL:\n\
         {fields_json}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldDescriptor;
    use std::collections::BTreeMap;

    fn sample_request() -> FillRequest {
        FillRequest {
            profile: BTreeMap::from([
                ("name".to_string(), "Ada Lovelace".to_string()),
                ("email".to_string(), "ada@example.com".to_string()),
            ]),
            form_fields: vec![FieldDescriptor {
                id: "bio".into(),
                r#type: "textarea".into(),
                label: "Short bio".into(),
                placeholder: String::new(),
            }],
        }
    }

    #[test]
    fn test_prompt_embeds_profile_and_fields_verbatim() {
        let request = sample_request();
        let prompt = build_prompt(&request).unwrap();

        let profile_json = serde_json::to_string_pretty(&request.profile).unwrap();
        let fields_json = serde_json::to_string_pretty(&request.form_fields).unwrap();
        assert!(prompt.contains(&profile_json));
        assert!(prompt.contains(&fields_json));
        assert!(prompt.contains("filling out a form for Ada Lovelace"));
    }

    #[test]
    fn test_prompt_without_name_entry() {
        let mut request = sample_request();
        request.profile.remove("name");
        let prompt = build_prompt(&request).unwrap();
        assert!(prompt.contains("filling out a form for the user"));
    }

    #[test]
    fn test_answer_schema_forbids_nested_values() {
        let tool = AnthropicGenerator::answer_tool();
        let schema = tool.input_schema;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"]["type"], "string");
        // No nested structures are admitted anywhere in the schema.
        assert!(schema.get("properties").is_none());
    }

    #[test]
    fn test_api_request_forces_answer_tool() {
        let generator = AnthropicGenerator::new("test-key".into());
        let api_request = generator.build_request(&sample_request()).unwrap();
        let json = serde_json::to_value(&api_request).unwrap();
        assert_eq!(json["tool_choice"]["type"], "tool");
        assert_eq!(json["tool_choice"]["name"], "record_answers");
        assert_eq!(json["tools"][0]["name"], "record_answers");
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
