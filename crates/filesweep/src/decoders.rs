//! Built-in record decoders, selected by configuration.
//!
//! Each decoder turns one raw record into timestamped structured fields, or
//! reports not-matched. A decoder configured with a `time_key` consumes that
//! field as the event timestamp (unix seconds, RFC 3339, or a chrono
//! `time_format` pattern); without one, events are stamped at decode time.

use crate::config::ConfigError;
use crate::parse::{DecodedEvent, Decoder};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Decoder selection and options, deserialized from the `decoder` table of
/// the engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum DecoderConfig {
    /// Whole record as a single text field.
    Plain {
        #[serde(default = "default_message_key")]
        message_key: String,
    },
    /// Delimiter-separated values mapped onto a fixed key list.
    Tsv {
        keys: Vec<String>,
        #[serde(default = "default_field_delimiter")]
        field_delimiter: String,
        #[serde(default)]
        time_key: Option<String>,
        #[serde(default)]
        time_format: Option<String>,
    },
    /// One JSON object per record.
    Json {
        #[serde(default)]
        time_key: Option<String>,
        #[serde(default)]
        time_format: Option<String>,
    },
    /// Named capture groups of a regular expression become fields.
    Regex {
        pattern: String,
        #[serde(default)]
        time_key: Option<String>,
        #[serde(default)]
        time_format: Option<String>,
    },
}

fn default_message_key() -> String {
    "message".to_string()
}

fn default_field_delimiter() -> String {
    "\t".to_string()
}

impl DecoderConfig {
    pub fn build(&self) -> Result<Box<dyn Decoder>, ConfigError> {
        match self {
            DecoderConfig::Plain { message_key } => Ok(Box::new(PlainDecoder {
                message_key: message_key.clone(),
            })),
            DecoderConfig::Tsv {
                keys,
                field_delimiter,
                time_key,
                time_format,
            } => {
                if keys.is_empty() {
                    return Err(ConfigError::Invalid(
                        "`decoder.keys` must name at least one field".to_string(),
                    ));
                }
                if field_delimiter.is_empty() {
                    return Err(ConfigError::Invalid(
                        "`decoder.field_delimiter` must not be empty".to_string(),
                    ));
                }
                Ok(Box::new(TsvDecoder {
                    keys: keys.clone(),
                    field_delimiter: field_delimiter.clone(),
                    time: TimeSpec::new(time_key.clone(), time_format.clone()),
                }))
            }
            DecoderConfig::Json {
                time_key,
                time_format,
            } => Ok(Box::new(JsonDecoder {
                time: TimeSpec::new(time_key.clone(), time_format.clone()),
            })),
            DecoderConfig::Regex {
                pattern,
                time_key,
                time_format,
            } => {
                let regex = Regex::new(pattern).map_err(|e| {
                    ConfigError::Invalid(format!("invalid decoder regex {pattern:?}: {e}"))
                })?;
                Ok(Box::new(RegexDecoder {
                    regex,
                    time: TimeSpec::new(time_key.clone(), time_format.clone()),
                }))
            }
        }
    }
}

/// Where an event's timestamp comes from.
#[derive(Debug, Clone)]
struct TimeSpec {
    time_key: Option<String>,
    time_format: Option<String>,
}

impl TimeSpec {
    fn new(time_key: Option<String>, time_format: Option<String>) -> Self {
        Self {
            time_key,
            time_format,
        }
    }

    /// Extract the timestamp, consuming the time field. A configured
    /// `time_key` that is missing or unparsable makes the record not-matched.
    fn take(&self, fields: &mut Map<String, Value>) -> Option<DateTime<Utc>> {
        match &self.time_key {
            None => Some(Utc::now()),
            Some(key) => {
                let value = fields.remove(key)?;
                parse_time(&value, self.time_format.as_deref())
            }
        }
    }
}

fn parse_time(value: &Value, format: Option<&str>) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => Utc.timestamp_opt(n.as_i64()?, 0).single(),
        Value::String(s) => parse_time_str(s, format),
        _ => None,
    }
}

fn parse_time_str(s: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(format) = format {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
        return NaiveDateTime::parse_from_str(s, format)
            .ok()
            .map(|naive| naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

struct PlainDecoder {
    message_key: String,
}

impl Decoder for PlainDecoder {
    fn decode(&self, record: &[u8]) -> Option<DecodedEvent> {
        let mut fields = Map::new();
        fields.insert(
            self.message_key.clone(),
            Value::String(String::from_utf8_lossy(record).into_owned()),
        );
        Some(DecodedEvent {
            timestamp: Utc::now(),
            fields,
        })
    }
}

struct TsvDecoder {
    keys: Vec<String>,
    field_delimiter: String,
    time: TimeSpec,
}

impl Decoder for TsvDecoder {
    fn decode(&self, record: &[u8]) -> Option<DecodedEvent> {
        let text = std::str::from_utf8(record).ok()?;
        let values: Vec<&str> = text.split(self.field_delimiter.as_str()).collect();
        if values.len() != self.keys.len() {
            return None;
        }
        let mut fields = Map::new();
        for (key, value) in self.keys.iter().zip(values) {
            fields.insert(key.clone(), Value::String(value.to_string()));
        }
        let timestamp = self.time.take(&mut fields)?;
        Some(DecodedEvent { timestamp, fields })
    }
}

struct JsonDecoder {
    time: TimeSpec,
}

impl Decoder for JsonDecoder {
    fn decode(&self, record: &[u8]) -> Option<DecodedEvent> {
        let value: Value = serde_json::from_slice(record).ok()?;
        let mut fields = match value {
            Value::Object(map) => map,
            _ => return None,
        };
        let timestamp = self.time.take(&mut fields)?;
        Some(DecodedEvent { timestamp, fields })
    }
}

struct RegexDecoder {
    regex: Regex,
    time: TimeSpec,
}

impl Decoder for RegexDecoder {
    fn decode(&self, record: &[u8]) -> Option<DecodedEvent> {
        let text = std::str::from_utf8(record).ok()?;
        let captures = self.regex.captures(text)?;
        let mut fields = Map::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                fields.insert(name.to_string(), Value::String(m.as_str().to_string()));
            }
        }
        let timestamp = self.time.take(&mut fields)?;
        Some(DecodedEvent { timestamp, fields })
    }
}
