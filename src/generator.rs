//! Landing-page copy from the Anthropic Messages API.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::content::GeneratedContent;
use crate::error::{PageGenError, Result};
use crate::http::{self, AttemptError};
use crate::integrations::IntegrationRecord;
use crate::pipeline::ContentGenerator;
use crate::settings::Settings;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    hero_image: String,
    backoff: Duration,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Instruction sent for one integration.
pub fn build_prompt(record: &IntegrationRecord) -> String {
    format!(
        r#"You are a marketing copywriter creating a landing page for a Bucketlist integration with {name}.

Bucketlist is an employee recognition and rewards platform. The integration with {name} (a {category} tool) allows seamless connectivity between the two platforms.

Generate compelling, professional landing page content in JSON format with these exact fields:
- HEADLINE: A catchy, benefit-driven headline (max 10 words)
- SUBHEADLINE: A supporting subheadline that explains the value (max 20 words)
- FEATURE_1_TITLE: First key feature title (max 5 words)
- FEATURE_1_DESC: Description of first feature (max 25 words)
- FEATURE_2_TITLE: Second key feature title (max 5 words)
- FEATURE_2_DESC: Description of second feature (max 25 words)

Return ONLY valid JSON with these exact keys. No additional text or markdown."#,
        name = record.name,
        category = record.category,
    )
}

/// Pull the outermost `{...}` object out of a model reply that may be
/// wrapped in prose or code fences.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap());
    let candidate = re.find(text)?.as_str();
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

impl AnthropicGenerator {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = http::build_client(settings.http_timeout())
            .map_err(|e| PageGenError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: settings.anthropic_api_key.clone(),
            base_url: settings.anthropic_base_url.trim_end_matches('/').to_string(),
            model: settings.anthropic_model.clone(),
            max_tokens: settings.anthropic_max_tokens,
            hero_image: settings.hero_image_url.clone(),
            backoff: http::default_backoff(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    async fn call_api(&self, prompt: &str) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&serde_json::json!({
                "model": &self.model,
                "max_tokens": self.max_tokens,
                "messages": [{"role": "user", "content": prompt}]
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AttemptError::Transient(e.to_string())
                } else {
                    AttemptError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => format!("{}: {}", err.error.kind, err.error.message),
                Err(_) => body,
            };
            let msg = format!("Anthropic API error {}: {}", status.as_u16(), detail);
            return Err(if http::is_transient_llm_status(status) {
                AttemptError::Transient(msg)
            } else {
                AttemptError::Permanent(msg)
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Permanent(format!("unexpected response body: {}", e)))?;
        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| AttemptError::Permanent("Empty response from Anthropic".into()))
    }
}

#[async_trait]
impl ContentGenerator for AnthropicGenerator {
    async fn generate(&self, record: &IntegrationRecord) -> Result<GeneratedContent> {
        info!("Calling {} for {}", self.model, record.name);
        let prompt = build_prompt(record);
        let label = format!("generate {}", record.name);

        let reply = http::with_retry(&label, self.backoff, || self.call_api(&prompt))
            .await
            .map_err(|e| PageGenError::GenerationApiError(e.to_string()))?;
        debug!("Raw reply for {}: {}", record.name, reply);

        let object = extract_json_object(&reply).ok_or_else(|| {
            PageGenError::GenerationApiError("could not extract a JSON object from the reply".into())
        })?;
        GeneratedContent::from_llm_json(&object, record, &self.hero_image)
    }
}
