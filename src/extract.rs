//! Extraction collaborator: turns a photographed sign-in sheet into raw
//! attendance rows.
//!
//! Reconciliation only depends on the [`SheetExtractor`] trait; the
//! provided implementation calls the Gemini vision API over plain HTTP with
//! the image inlined as base64 and a JSON response schema, so the reply
//! parses straight into [`ExtractedEntry`] rows. Any failure here is fatal
//! to the current scan attempt only — no directory state exists before
//! extraction succeeds.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::types::ExtractedEntry;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Environment variables checked for the API key, in order.
const API_KEY_VARS: &[&str] = &["ROLLBOOK_API_KEY", "GEMINI_API_KEY", "API_KEY"];

const SYSTEM_INSTRUCTION: &str = "\
You are an expert data entry assistant capable of reading complex documents \
with mixed printed and handwritten text. Your task is to extract a structured \
list of attendees from a networking meeting sign-in sheet.

The sheet typically has columns:
1. Row number
2. Member (name and company, often on two lines)
3. Specialty/sector
4. Contact/phone
5. Desired references — this is where handwritten notes usually appear.

Sometimes there is a section for guests/visitors. These rows often indicate \
who invited them (e.g. \"Invited by Juan\").

Instructions:
1. Identify every row in the list.
2. Extract the name and company from the first column.
3. Extract the sector/specialty and the phone number.
4. Mark guest rows with isGuest and transcribe the inviting member's name \
into invitedByName when visible.
5. Transcribe the handwritten note associated with each row into \
handwrittenRequest; return an empty string when there is none. Ignore header \
and footer text.";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(
        "Extraction API key is not configured. Set ROLLBOOK_API_KEY (or GEMINI_API_KEY)."
    )]
    MissingApiKey,

    #[error("Extraction request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction service returned an empty response")]
    EmptyResponse,

    #[error("Failed to parse extraction response: {0}")]
    InvalidResponse(String),
}

impl ExtractError {
    /// Network-level failures are worth retrying; a missing key or a
    /// malformed reply is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::Http(_))
    }
}

/// The interface reconciliation consumes: one image in, raw rows out.
#[async_trait]
pub trait SheetExtractor: Send + Sync {
    async fn extract(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Vec<ExtractedEntry>, ExtractError>;
}

/// Gemini-backed extractor.
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiExtractor {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Build from the environment, checking the supported key variables in
    /// order. Fails with a descriptive error when none is set.
    pub fn from_env() -> Result<Self, ExtractError> {
        for var in API_KEY_VARS {
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    return Ok(Self::new(key));
                }
            }
        }
        Err(ExtractError::MissingApiKey)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request_body(&self, image: &[u8], mime_type: &str) -> serde_json::Value {
        let data = base64::engine::general_purpose::STANDARD.encode(image);
        json!({
            "systemInstruction": {
                "parts": [{ "text": SYSTEM_INSTRUCTION }]
            },
            "contents": [{
                "parts": [
                    { "inlineData": { "mimeType": mime_type, "data": data } },
                    { "text": "Extract all attendance rows from this sign-in sheet." }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "rowNumber": { "type": "INTEGER" },
                            "name": { "type": "STRING" },
                            "company": { "type": "STRING" },
                            "sector": { "type": "STRING" },
                            "phone": { "type": "STRING" },
                            "handwrittenRequest": {
                                "type": "STRING",
                                "description": "The handwritten text found for this row"
                            },
                            "isGuest": {
                                "type": "BOOLEAN",
                                "description": "True if this row appears to be a guest/visitor"
                            },
                            "invitedByName": {
                                "type": "STRING",
                                "description": "Name of the member who invited this guest, if visible"
                            }
                        },
                        "required": ["name", "sector", "handwrittenRequest"]
                    }
                }
            }
        })
    }
}

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
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SheetExtractor for GeminiExtractor {
    async fn extract(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Vec<ExtractedEntry>, ExtractError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(image, mime_type))
            .send()
            .await?
            .error_for_status()?;

        let payload: GenerateContentResponse = response.json().await?;
        let text: String = payload
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        parse_entries(&text)
    }
}

/// Parse the model's JSON reply into rows. Tolerates markdown code fences
/// around the payload; anything else unparsable is a typed error with the
/// parser's message.
fn parse_entries(text: &str) -> Result<Vec<ExtractedEntry>, ExtractError> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Err(ExtractError::EmptyResponse);
    }
    serde_json::from_str(trimmed).map_err(|e| ExtractError::InvalidResponse(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries_plain_json() {
        let rows = parse_entries(
            r#"[{"rowNumber":1,"name":"Ana Gómez","sector":"Legal","handwrittenRequest":"Necesito contador"}]"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Ana Gómez");
        assert_eq!(rows[0].handwritten_request, "Necesito contador");
        assert!(!rows[0].is_guest);
    }

    #[test]
    fn test_parse_entries_strips_code_fence() {
        let rows = parse_entries(
            "```json\n[{\"name\":\"Luis\",\"sector\":\"\",\"handwrittenRequest\":\"\",\"isGuest\":true,\"invitedByName\":\"Ana\"}]\n```",
        )
        .unwrap();
        assert!(rows[0].is_guest);
        assert_eq!(rows[0].invited_by_name, "Ana");
    }

    #[test]
    fn test_parse_entries_empty_is_typed() {
        assert!(matches!(parse_entries(""), Err(ExtractError::EmptyResponse)));
        assert!(matches!(parse_entries("   "), Err(ExtractError::EmptyResponse)));
    }

    #[test]
    fn test_parse_entries_garbage_is_typed() {
        assert!(matches!(
            parse_entries("not json"),
            Err(ExtractError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_from_env_missing_key() {
        for var in API_KEY_VARS {
            std::env::remove_var(var);
        }
        assert!(matches!(
            GeminiExtractor::from_env(),
            Err(ExtractError::MissingApiKey)
        ));
    }
}
