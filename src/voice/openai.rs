//! OpenAI-backed implementations of the voice boundary traits.
//!
//! Speech-to-text goes through `POST /audio/transcriptions` (multipart);
//! extraction goes through `POST /chat/completions` with a JSON-only
//! instruction prompt. Everything service-specific - request shapes,
//! response shapes, the prompt - stays inside this module; callers only see
//! [`Transcriber`] and [`IntentExtractor`].

use super::{
    AudioFormat, CandidateTransaction, EXPENSE_CATEGORIES, Extraction, INCOME_CATEGORIES,
    IntentExtractor, Transcriber, categories_for,
};
use crate::config::AppConfig;
use crate::entities::Direction;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Client for the OpenAI speech and chat endpoints. Implements both voice
/// boundary traits so one configured instance serves the whole pipeline.
pub struct OpenAiVoice {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    stt_model: String,
    parse_model: String,
}

impl OpenAiVoice {
    /// Builds a client from application settings and an API key.
    pub fn new(config: &AppConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.external_timeout())
            .build()?;
        Ok(Self {
            http,
            api_base: config.openai_api_base.trim_end_matches('/').to_string(),
            api_key,
            stt_model: config.stt_model.clone(),
            parse_model: config.parse_model.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for OpenAiVoice {
    async fn transcribe(&self, audio: &[u8], format: AudioFormat) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(format!("voice.{}", format.extension()))
            .mime_str(format.mime_type())
            .map_err(|e| Error::TranscriptionFailed {
                message: format!("bad mime type: {e}"),
            })?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.stt_model.clone())
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::TranscriptionFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TranscriptionFailed {
                message: format!("{status}: {body}"),
            });
        }

        let parsed: TranscriptionResponse =
            response.json().await.map_err(|e| Error::TranscriptionFailed {
                message: format!("unreadable response: {e}"),
            })?;
        debug!("Transcribed {} bytes of audio", audio.len());
        Ok(parsed.text)
    }
}

#[async_trait]
impl IntentExtractor for OpenAiVoice {
    async fn extract(&self, utterance: &str) -> Result<Extraction> {
        let body = json!({
            "model": self.parse_model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": extraction_prompt() },
                { "role": "user", "content": utterance },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ExtractionFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExtractionFailed {
                message: format!("{status}: {body}"),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| Error::ExtractionFailed {
            message: format!("unreadable response: {e}"),
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::ExtractionFailed {
                message: "response contained no choices".to_string(),
            })?;

        parse_extraction_payload(&content).inspect_err(|e| {
            warn!("Extractor contract violation: {e}; raw content: {content}");
        })
    }
}

/// Instruction prompt for the extraction model. The category lists are part
/// of the contract: the model must never invent values outside them.
fn extraction_prompt() -> String {
    format!(
        "You classify personal finance transactions.\n\
         Convert the user's message into a single JSON object with fields:\n\
         - \"type\": one of \"income\", \"expense\", or \"none\" when the \
         message describes no transaction\n\
         - \"sum\": the amount as a decimal string, e.g. \"12.50\"\n\
         - \"category\": strictly one of the allowed values below; never \
         add new values\n\
         - \"description\": optional free text\n\
         Allowed expense categories: {EXPENSE_CATEGORIES:?}\n\
         Allowed income categories: {INCOME_CATEGORIES:?}\n\
         Respond with valid JSON only, no explanations."
    )
}

/// Parses the model's JSON payload into an [`Extraction`], enforcing the
/// adapter contract: a known type, a parseable positive-scale amount, and a
/// category drawn from the list matching the direction.
fn parse_extraction_payload(content: &str) -> Result<Extraction> {
    let wire: WirePayload =
        serde_json::from_str(content.trim()).map_err(|e| Error::ExtractionInvalid {
            message: format!("payload is not valid JSON for the schema: {e}"),
        })?;

    if wire.kind.eq_ignore_ascii_case("none") {
        return Ok(Extraction::NoTransaction);
    }

    let direction = match wire.kind.to_ascii_lowercase().as_str() {
        "income" => Direction::Income,
        "expense" => Direction::Expense,
        other => {
            return Err(Error::ExtractionInvalid {
                message: format!("unknown transaction type '{other}'"),
            });
        }
    };

    let amount = parse_wire_amount(wire.sum.as_ref())?;

    let category = wire.category.unwrap_or_default();
    if !categories_for(direction)
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(category.trim()))
    {
        return Err(Error::ExtractionInvalid {
            message: format!("category '{category}' is not allowed for {direction}"),
        });
    }

    let description = wire
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(Extraction::Candidate(CandidateTransaction {
        direction,
        amount,
        category: category.trim().to_string(),
        description,
    }))
}

/// Amounts arrive as decimal strings per the contract, but models sometimes
/// emit bare numbers; both are accepted, anything else is a violation.
fn parse_wire_amount(sum: Option<&serde_json::Value>) -> Result<Decimal> {
    let raw = match sum {
        Some(serde_json::Value::String(s)) => s.replace(',', "."),
        Some(value @ serde_json::Value::Number(_)) => value.to_string(),
        Some(other) => {
            return Err(Error::ExtractionInvalid {
                message: format!("sum has unexpected shape: {other}"),
            });
        }
        None => {
            return Err(Error::ExtractionInvalid {
                message: "sum is missing".to_string(),
            });
        }
    };
    raw.trim()
        .parse::<Decimal>()
        .map(|d| d.round_dp(2))
        .map_err(|e| Error::ExtractionInvalid {
            message: format!("sum '{raw}' is not a decimal: {e}"),
        })
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct WirePayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sum: Option<serde_json::Value>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn parses_expense_candidate() {
        let extraction = parse_extraction_payload(
            r#"{"type":"expense","sum":"12.50","category":"Food","description":"lunch"}"#,
        )
        .unwrap();
        let Extraction::Candidate(candidate) = extraction else {
            panic!("expected a candidate");
        };
        assert_eq!(candidate.direction, Direction::Expense);
        assert_eq!(candidate.amount, "12.50".parse::<Decimal>().unwrap());
        assert_eq!(candidate.category, "Food");
        assert_eq!(candidate.description.as_deref(), Some("lunch"));
    }

    #[test]
    fn parses_no_transaction_signal() {
        let extraction = parse_extraction_payload(r#"{"type":"none"}"#).unwrap();
        assert_eq!(extraction, Extraction::NoTransaction);
    }

    #[test]
    fn accepts_numeric_sum_and_comma_decimal() {
        let numeric =
            parse_extraction_payload(r#"{"type":"income","sum":1000,"category":"Salary"}"#)
                .unwrap();
        let Extraction::Candidate(candidate) = numeric else {
            panic!("expected a candidate");
        };
        assert_eq!(candidate.amount, Decimal::from(1000));

        let comma =
            parse_extraction_payload(r#"{"type":"expense","sum":"7,25","category":"Transport"}"#)
                .unwrap();
        let Extraction::Candidate(candidate) = comma else {
            panic!("expected a candidate");
        };
        assert_eq!(candidate.amount, "7.25".parse::<Decimal>().unwrap());
    }

    #[test]
    fn rejects_category_outside_direction_list() {
        // "Salary" is an income category; invalid for an expense.
        let err = parse_extraction_payload(r#"{"type":"expense","sum":"5","category":"Salary"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionInvalid { .. }));
    }

    #[test]
    fn rejects_unknown_type_and_missing_sum() {
        let err = parse_extraction_payload(r#"{"type":"transfer","sum":"5","category":"Food"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionInvalid { .. }));

        let err =
            parse_extraction_payload(r#"{"type":"expense","category":"Food"}"#).unwrap_err();
        assert!(matches!(err, Error::ExtractionInvalid { .. }));
    }

    #[test]
    fn rejects_non_json_payload() {
        let err = parse_extraction_payload("sorry, I can't help with that").unwrap_err();
        assert!(matches!(err, Error::ExtractionInvalid { .. }));
    }

    #[test]
    fn rounds_amount_to_cents() {
        let extraction = parse_extraction_payload(
            r#"{"type":"expense","sum":"3.14159","category":"Food"}"#,
        )
        .unwrap();
        let Extraction::Candidate(candidate) = extraction else {
            panic!("expected a candidate");
        };
        assert_eq!(candidate.amount, "3.14".parse::<Decimal>().unwrap());
    }
}
