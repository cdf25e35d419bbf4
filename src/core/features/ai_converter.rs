//! Natural-language conversions backed by a hosted language model
//!
//! The model is asked for a JSON object with seven required fields. Its reply is
//! checked against a JSON schema before being deserialized, so anything
//! malformed surfaces as an adapter failure rather than a half-filled result.

use async_trait::async_trait;
use jsonschema::JSONSchema;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::features::unit_converter::display_number;
use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::AiSettings;
use crate::shared::types::{AiConversionResult, ConversionRecord};

/// Unit value the model uses for "this is not a conversion request"
pub const ERROR_SENTINEL: &str = "Error";

/// Category recorded when the model leaves it blank
pub const FALLBACK_CATEGORY: &str = "AI Custom";

/// Transport seam for natural-language conversions
#[async_trait]
pub trait ConversionModel: Send + Sync {
    /// Interpret `query`. Transport, credential and parse problems are errors;
    /// an uninterpretable query comes back as a result carrying the sentinel.
    async fn convert(&self, query: &str) -> AppResult<AiConversionResult>;
}

/// What a natural-language conversion attempt produced
#[derive(Debug)]
pub enum AiOutcome {
    Success(AiConversionResult),
    /// The model replied but could not read the query as a conversion
    SemanticError(AiConversionResult),
    /// No structured result could be produced
    TransportFailure(AppError),
}

impl AiOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AiOutcome::Success(_))
    }
}

impl AiConversionResult {
    pub fn is_sentinel(&self) -> bool {
        self.source_unit == ERROR_SENTINEL
    }

    /// History entry for this result; `None` for the sentinel
    pub fn to_record(&self) -> Option<ConversionRecord> {
        if self.is_sentinel() {
            return None;
        }

        let category = if self.category.trim().is_empty() {
            FALLBACK_CATEGORY.to_string()
        } else {
            self.category.clone()
        };

        Some(ConversionRecord {
            id: Uuid::new_v4(),
            from_value: display_number(self.source_value),
            from_unit: self.source_unit.clone(),
            to_value: display_number(self.target_value),
            to_unit: self.target_unit.clone(),
            category,
            timestamp: chrono::Utc::now().timestamp_millis(),
            explanation: Some(self.explanation.clone()),
            is_ai_generated: Some(true),
        })
    }
}

/// Run one query through `model` and classify the result. No retries.
pub async fn interpret(model: &dyn ConversionModel, query: &str) -> AiOutcome {
    let query = query.trim();
    if query.is_empty() {
        return AiOutcome::TransportFailure(AppError::Validation("Query cannot be empty".to_string()));
    }

    match model.convert(query).await {
        Ok(result) if result.is_sentinel() => {
            info!("[AiConverter] Query not understood as a conversion");
            AiOutcome::SemanticError(result)
        }
        Ok(result) => AiOutcome::Success(result),
        Err(e) => {
            error!(error = %e, "[AiConverter] Conversion failed");
            AiOutcome::TransportFailure(e)
        }
    }
}

// ============================================================================
// Gemini
// ============================================================================

/// Gemini `generateContent` client with schema-constrained JSON output
pub struct GeminiConverter {
    http: Client,
    endpoint: String,
    api_key: String,
    temperature: f64,
}

impl GeminiConverter {
    pub fn new(settings: &AiSettings) -> AppResult<Self> {
        let api_key = settings.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(AppError::Config("API key not configured".to_string()));
        }

        let http = Client::builder()
            .user_agent("unit-converter/ai")
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Network(e.to_string()))?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            settings.base_url.trim_end_matches('/'),
            urlencoding::encode(&settings.model)
        );

        Ok(Self {
            http,
            endpoint,
            api_key,
            temperature: settings.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ConversionModel for GeminiConverter {
    async fn convert(&self, query: &str) -> AppResult<AiConversionResult> {
        debug!(endpoint = %self.endpoint, "[Gemini] Sending conversion query");

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(query, self.temperature))
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Model request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("Failed to read model response: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Network(format!(
                "Model API returned {}: {}",
                status,
                api_error_message(&body).unwrap_or_else(|| "no details".to_string())
            )));
        }

        parse_generate_content(&body)
    }
}

fn prompt_for(query: &str) -> String {
    format!(
        "Convert the following units. If the request involves abstract or complex comparisons \
         (like 'football fields' or 'blue whales'), provide the best estimate.\n\n\
         User Query: \"{}\"\n\n\
         If the query is invalid or not a conversion request, return 0 for values and '{}' for units/explanation.",
        query, ERROR_SENTINEL
    )
}

/// Schema in the model API's own dialect, sent with the request
fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "sourceValue": { "type": "NUMBER", "description": "The numeric value extracted from the source." },
            "sourceUnit": { "type": "STRING", "description": "The unit of the source value." },
            "targetValue": { "type": "NUMBER", "description": "The calculated converted numeric value." },
            "targetUnit": { "type": "STRING", "description": "The unit converted to." },
            "category": { "type": "STRING", "description": "The category of the unit (e.g., Length, Mass, Custom)." },
            "explanation": { "type": "STRING", "description": "A brief, friendly explanation of the conversion or context." },
            "formula": { "type": "STRING", "description": "The mathematical formula used for this conversion (e.g. x * 2.2)." }
        },
        "required": ["sourceValue", "sourceUnit", "targetValue", "targetUnit", "category", "explanation", "formula"]
    })
}

/// The same contract as JSON Schema, used to validate replies locally
fn validation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sourceValue": { "type": "number" },
            "sourceUnit": { "type": "string" },
            "targetValue": { "type": "number" },
            "targetUnit": { "type": "string" },
            "category": { "type": "string" },
            "explanation": { "type": "string" },
            "formula": { "type": "string" }
        },
        "required": ["sourceValue", "sourceUnit", "targetValue", "targetUnit", "category", "explanation", "formula"]
    })
}

pub fn build_request_body(query: &str, temperature: f64) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt_for(query) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
            "temperature": temperature
        }
    })
}

// -- Strict Serde Structs for the generateContent response --

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

/// Extract, validate and deserialize the structured reply from a raw response body
pub fn parse_generate_content(body: &str) -> AppResult<AiConversionResult> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Validation(format!("Malformed model response: {}", e)))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::Validation("No response from model".to_string()));
    }

    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| AppError::Validation(format!("Model reply is not valid JSON: {}", e)))?;

    validate_reply(&value)?;

    serde_json::from_value(value)
        .map_err(|e| AppError::Validation(format!("Model reply could not be read: {}", e)))
}

fn validate_reply(value: &Value) -> AppResult<()> {
    let schema = validation_schema();
    let compiled = JSONSchema::compile(&schema)
        .map_err(|e| AppError::Validation(format!("Failed to compile reply schema: {}", e)))?;

    if let Err(errors) = compiled.validate(value) {
        let messages: Vec<String> = errors
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{}: {}", path, error)
                }
            })
            .collect();
        return Err(AppError::Validation(format!(
            "Model reply does not match schema: {}",
            messages.join("; ")
        )));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Reply = Box<dyn Fn(&str) -> AppResult<AiConversionResult> + Send + Sync>;

    /// Model double answering from a closure and counting calls
    pub struct ScriptedModel {
        reply: Reply,
        pub calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub fn new(reply: impl Fn(&str) -> AppResult<AiConversionResult> + Send + Sync + 'static) -> Self {
            Self {
                reply: Box::new(reply),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConversionModel for ScriptedModel {
        async fn convert(&self, query: &str) -> AppResult<AiConversionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)(query)
        }
    }

    pub fn kelvin_to_fahrenheit() -> AiConversionResult {
        AiConversionResult {
            source_value: 300.0,
            source_unit: "K".to_string(),
            target_value: 80.33,
            target_unit: "°F".to_string(),
            category: "Temperature".to_string(),
            explanation: "300 K is a warm day".to_string(),
            formula: "(x - 273.15) * 9/5 + 32".to_string(),
        }
    }

    pub fn not_understood() -> AiConversionResult {
        AiConversionResult {
            source_value: 0.0,
            source_unit: ERROR_SENTINEL.to_string(),
            target_value: 0.0,
            target_unit: ERROR_SENTINEL.to_string(),
            category: String::new(),
            explanation: ERROR_SENTINEL.to_string(),
            formula: String::new(),
        }
    }
}
