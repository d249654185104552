//! Ground-truth oracle
//!
//! Labels spreads by asking a vision-capable model where the binding is.
//! Only used to build training sets; inference never calls out.
//!
//! Supports multiple backends:
//! - Ollama vision models (local LLM)
//! - OpenAI-compatible chat completion APIs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gutter_server::split::oracle::{build_oracle, OracleConfig, OracleOutcome};
//!
//! let oracle = build_oracle(&OracleConfig::default())?;
//! match oracle.label_split(&png_bytes).await? {
//!     OracleOutcome::Split(label) => println!("split at {}", label.position),
//!     OracleOutcome::SinglePage { .. } => println!("not a spread"),
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Highest value on the split scale
pub const SPLIT_SCALE_MAX: u16 = 1000;

/// Instructions sent with every labeling request
pub const SPLIT_PROMPT: &str = r#"You are looking at a scanned image that may show two facing book pages (a spread).
Decide whether it is one page or two, and if two, where the binding gutter is.

Rules:
- Never place the cut through text. If text crosses the middle, it is a single page.
- Follow the physical binding: if the gutter is tilted, report where it crosses the vertical middle of the image.
- The gutter may be a dark shadow where the pages curve into the spine, or a bright gap between the pages. Handle both.
- When unsure of the exact column, err toward the blank margin rather than toward text.

Express the position on a 0-1000 scale from the left edge (500 = exact center).
Respond with a single JSON object and nothing else:
{"is_spread": true, "split_position": 497, "confidence": "high", "reasoning": "one short sentence"}
Use "confidence" values "high", "medium" or "low". For a single page use "is_spread": false and "split_position": null."#;

/// Oracle backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleProvider {
    /// Ollama vision model (local LLM)
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions API
    OpenAI,
}

/// Confidence tier reported by the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(OracleError::MalformedResponse(format!(
                "unknown confidence '{}'",
                other
            ))),
        }
    }
}

/// A split label on the 0-1000 scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitLabel {
    pub position: u16,
    pub confidence: Confidence,
    pub reasoning: String,
}

/// What the oracle concluded about an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OracleOutcome {
    /// Two pages, cut at the labeled position
    Split(SplitLabel),
    /// No gutter: the image is a single page
    SinglePage {
        confidence: Confidence,
        reasoning: String,
    },
}

/// Oracle error types
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),
}

/// Any capability that can label a page given its image
#[async_trait]
pub trait SplitOracle: Send + Sync {
    /// Short backend name for logs and records
    fn name(&self) -> &str;

    /// Check if the backend is reachable
    async fn is_available(&self) -> bool;

    /// Label one encoded page image
    async fn label_split(&self, image_data: &[u8]) -> Result<OracleOutcome, OracleError>;
}

/// Oracle connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OracleConfig {
    pub provider: OracleProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Per-request timeout; retries belong to the caller
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// Build the configured oracle backend
pub fn build_oracle(config: &OracleConfig) -> Result<Arc<dyn SplitOracle>, OracleError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()
        .map_err(|e| OracleError::ApiError(format!("Failed to build HTTP client: {}", e)))?;

    let oracle: Arc<dyn SplitOracle> = match config.provider {
        OracleProvider::Ollama => Arc::new(OllamaOracle::with_client(
            client,
            &config.base_url,
            &config.model,
        )),
        OracleProvider::OpenAI => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                OracleError::ProviderNotAvailable("OpenAI oracle requires an API key".to_string())
            })?;
            Arc::new(OpenAiOracle::with_client(
                client,
                &config.base_url,
                &config.model,
                &api_key,
            ))
        }
    };
    Ok(oracle)
}

#[derive(Deserialize)]
struct RawVerdict {
    is_spread: bool,
    #[serde(default)]
    split_position: Option<i64>,
    confidence: String,
    #[serde(default)]
    reasoning: String,
}

/// Parse the model's text output into an outcome
///
/// A Markdown code fence around the object is accepted; any other deviation
/// from the expected shape is an error, never a default.
pub fn parse_oracle_response(text: &str) -> Result<OracleOutcome, OracleError> {
    let body = strip_code_fence(text.trim());
    let raw: RawVerdict = serde_json::from_str(body)
        .map_err(|e| OracleError::MalformedResponse(format!("{}: {}", e, truncate(text, 200))))?;

    let confidence: Confidence = raw.confidence.parse()?;
    let reasoning = raw.reasoning.trim().to_string();

    if !raw.is_spread {
        return Ok(OracleOutcome::SinglePage {
            confidence,
            reasoning,
        });
    }

    let position = raw.split_position.ok_or_else(|| {
        OracleError::MalformedResponse("spread without split_position".to_string())
    })?;
    if !(0..=SPLIT_SCALE_MAX as i64).contains(&position) {
        return Err(OracleError::MalformedResponse(format!(
            "split_position {} outside 0-{}",
            position, SPLIT_SCALE_MAX
        )));
    }

    Ok(OracleOutcome::Split(SplitLabel {
        position: position as u16,
        confidence,
        reasoning,
    }))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn mime_type(image_data: &[u8]) -> &'static str {
    image::guess_format(image_data)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/png")
}

/// Ollama vision model oracle
pub struct OllamaOracle {
    client: reqwest::Client,
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llava", "qwen2.5vl")
    model: String,
}

impl OllamaOracle {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, model)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl SplitOracle for OllamaOracle {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn label_split(&self, image_data: &[u8]) -> Result<OracleOutcome, OracleError> {
        let url = format!("{}/api/generate", self.base_url);
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = serde_json::json!({
            "model": self.model,
            "prompt": SPLIT_PROMPT,
            "images": [image_base64],
            "stream": false,
            "format": "json",
            "options": { "temperature": 0 }
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::ApiError(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::ApiError(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| {
                OracleError::MalformedResponse(format!("Failed to parse response: {}", e))
            })?;

        let text = result["response"].as_str().ok_or_else(|| {
            OracleError::MalformedResponse("Ollama response has no 'response' field".to_string())
        })?;

        parse_oracle_response(text)
    }
}

/// OpenAI-compatible chat completions oracle
pub struct OpenAiOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiOracle {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, model, api_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl SplitOracle for OpenAiOracle {
    fn name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn label_split(&self, image_data: &[u8]) -> Result<OracleOutcome, OracleError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let data_url = format!(
            "data:{};base64,{}",
            mime_type(image_data),
            base64::engine::general_purpose::STANDARD.encode(image_data)
        );

        let request = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": SPLIT_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }]
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::ApiError(format!("Failed to call chat API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::ApiError(format!(
                "Chat API returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| {
                OracleError::MalformedResponse(format!("Failed to parse response: {}", e))
            })?;

        let text = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                OracleError::MalformedResponse("chat response has no message content".to_string())
            })?;

        parse_oracle_response(text)
    }
}

/// Mock oracle for testing
#[cfg(test)]
pub struct MockOracle {
    pub response: Result<OracleOutcome, String>,
    pub available: bool,
}

#[cfg(test)]
#[async_trait]
impl SplitOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn label_split(&self, _image_data: &[u8]) -> Result<OracleOutcome, OracleError> {
        self.response
            .clone()
            .map_err(OracleError::MalformedResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_defaults_to_ollama() {
        assert_eq!(OracleProvider::default(), OracleProvider::Ollama);

        let config: OracleConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.provider, OracleProvider::Ollama);
    }

    #[test]
    fn test_parse_split() {
        let outcome = parse_oracle_response(
            r#"{"is_spread": true, "split_position": 512, "confidence": "high", "reasoning": "dark shadow at center"}"#,
        )
        .unwrap();

        assert_eq!(
            outcome,
            OracleOutcome::Split(SplitLabel {
                position: 512,
                confidence: Confidence::High,
                reasoning: "dark shadow at center".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"is_spread\": true, \"split_position\": 480, \"confidence\": \"Medium\", \"reasoning\": \"gap\"}\n```";
        match parse_oracle_response(text).unwrap() {
            OracleOutcome::Split(label) => {
                assert_eq!(label.position, 480);
                assert_eq!(label.confidence, Confidence::Medium);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_parse_single_page_is_not_an_error() {
        let outcome = parse_oracle_response(
            r#"{"is_spread": false, "split_position": null, "confidence": "low", "reasoning": "text crosses the middle"}"#,
        )
        .unwrap();

        assert!(matches!(
            outcome,
            OracleOutcome::SinglePage {
                confidence: Confidence::Low,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_rejects_prose() {
        let result = parse_oracle_response("The split is at about 500.");
        assert!(matches!(result, Err(OracleError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        let result = parse_oracle_response(
            r#"{"is_spread": true, "split_position": 1200, "confidence": "high", "reasoning": ""}"#,
        );
        assert!(matches!(result, Err(OracleError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_rejects_missing_position() {
        let result = parse_oracle_response(
            r#"{"is_spread": true, "confidence": "high", "reasoning": "?"}"#,
        );
        assert!(matches!(result, Err(OracleError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_confidence() {
        let result = parse_oracle_response(
            r#"{"is_spread": true, "split_position": 500, "confidence": "certain", "reasoning": ""}"#,
        );
        assert!(matches!(result, Err(OracleError::MalformedResponse(_))));
    }

    #[test]
    fn test_build_openai_requires_key() {
        let config = OracleConfig {
            provider: OracleProvider::OpenAI,
            ..OracleConfig::default()
        };
        assert!(matches!(
            build_oracle(&config),
            Err(OracleError::ProviderNotAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_oracle() {
        let oracle = MockOracle {
            response: Err("garbage".to_string()),
            available: true,
        };

        assert!(oracle.is_available().await);
        assert!(oracle.label_split(b"png").await.is_err());
    }
}
