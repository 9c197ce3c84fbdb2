use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::FALLBACK_MESSAGE;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// A vehicle listing returned by the car bot service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarRecord {
    pub manufacturer: String,
    pub model: String,
    #[serde(deserialize_with = "de::integer")]
    pub year: i64,
    #[serde(deserialize_with = "de::text")]
    pub fuel: String,
    #[serde(deserialize_with = "de::text")]
    pub engine: String,
    pub mileage: f64,
    pub price: f64,
    // Only some of the service's datasets carry these two.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// The answer to one question: a sentence plus any matching cars.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryResult {
    pub message: String,
    pub cars: Vec<CarRecord>,
}

impl QueryResult {
    /// The fixed apology used in place of any failed exchange.
    pub fn fallback() -> Self {
        Self {
            message: FALLBACK_MESSAGE.to_string(),
            cars: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.message == FALLBACK_MESSAGE && self.cars.is_empty()
    }
}

/// Body of `POST /ask` as the service expects it.
#[derive(Debug, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
}

/// Body returned by the service. Missing fields decode to empty values.
#[derive(Debug, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reply: Vec<CarRecord>,
    // The service reports its own exceptions this way, with a 200 status.
    #[serde(default)]
    pub error: Option<String>,
}

impl From<AskResponse> for QueryResult {
    fn from(response: AskResponse) -> Self {
        Self {
            message: response.message,
            cars: response.reply,
        }
    }
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cars: Option<Vec<CarRecord>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            cars: None,
        }
    }

    pub fn bot(result: QueryResult) -> Self {
        Self {
            role: Role::Bot,
            content: result.message,
            cars: Some(result.cars),
        }
    }

    pub fn cars(&self) -> &[CarRecord] {
        self.cars.as_deref().unwrap_or_default()
    }
}

mod de {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    /// Accepts `"1.6L"` as well as `1.6`.
    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match TextOrNumber::deserialize(deserializer)? {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Number(n) => n.to_string(),
        })
    }

    /// Accepts `2020` as well as `2020.0`.
    pub fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        if value.fract() != 0.0 || !value.is_finite() {
            return Err(serde::de::Error::custom(format!(
                "expected an integral year, got {}",
                value
            )));
        }
        // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
        if value < i64::MIN as f64 || value >= i64::MAX as f64 {
            return Err(serde::de::Error::custom(format!(
                "year {} is out of range",
                value
            )));
        }
        Ok(value as i64)
    }
}
