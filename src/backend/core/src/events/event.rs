//! Event wire model.
//!
//! This module provides:
//! - `SubjectId`: canonical subject identifier (integers and strings unify)
//! - `Event`: an immutable, timestamped behavioral event
//! - `NewEvent`: the inbound shape accepted before validation

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{MindcraftError, Result};

/// Milliseconds since the Unix epoch, the unit of `Event::time`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Subject IDs
// =============================================================================

/// Identifier of one participant/session within an experiment.
///
/// Stored in textual form so that `1` and `"1"` denote the same subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectId(String);

impl SubjectId {
    /// Build a subject id from a JSON value.
    ///
    /// Accepts integers and non-empty strings; anything else is an `InvalidEvent`.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self(u.to_string()))
                } else {
                    Err(MindcraftError::invalid_event(format!(
                        "subject must be an integer or a string, got {}",
                        n
                    )))
                }
            }
            Value::String(s) => s.parse(),
            Value::Null => Err(MindcraftError::invalid_event("subject is null")),
            other => Err(MindcraftError::invalid_event(format!(
                "subject must be an integer or a string, got {}",
                json_kind(other)
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value when the id is the canonical form of an integer.
    pub fn as_integer(&self) -> Option<i64> {
        self.0
            .parse::<i64>()
            .ok()
            .filter(|i| i.to_string() == self.0)
    }
}

impl From<i64> for SubjectId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for SubjectId {
    type Err = MindcraftError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(MindcraftError::invalid_event("subject must not be empty"));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integer ids sort numerically and ahead of textual ids, which sort lexically.
impl Ord for SubjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_integer(), other.as_integer()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for SubjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for SubjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.as_integer() {
            Some(i) => serializer.serialize_i64(i),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for SubjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SubjectId::from_json(&value).map_err(|e| serde::de::Error::custom(e.user_message()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Event
// =============================================================================

/// A behavioral event recorded during an experiment session.
///
/// Immutable once created. `time` is assigned at ingestion when the client
/// did not supply one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub experiment: String,
    pub subject: SubjectId,
    /// Event kind, e.g. `Start`, `ButtonPress`, `End`.
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Milliseconds since the Unix epoch.
    pub time: i64,
}

impl Event {
    pub fn new(
        experiment: impl Into<String>,
        subject: impl Into<SubjectId>,
        event: impl Into<String>,
        time: i64,
    ) -> Self {
        Self {
            experiment: experiment.into(),
            subject: subject.into(),
            event: event.into(),
            args: None,
            time,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    /// Look up a field of `args`, when `args` is an object.
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.as_ref().and_then(|a| a.get(key))
    }

    /// Whether this event is of the given kind.
    pub fn is(&self, kind: &str) -> bool {
        self.event == kind
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// An event as submitted by an experiment client, before validation.
///
/// Every field is optional at this stage so that shape problems surface as
/// `InvalidEvent` rather than a generic decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    #[serde(default)]
    pub experiment: Option<String>,
    #[serde(default)]
    pub subject: Option<Value>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

impl NewEvent {
    pub fn new(
        experiment: impl Into<String>,
        subject: impl Into<Value>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            experiment: Some(experiment.into()),
            subject: Some(subject.into()),
            event: Some(event.into()),
            args: None,
            time: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    /// Decode a request body. Any decoding problem is an `InvalidEvent`.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| MindcraftError::invalid_event(e.to_string()))
    }

    /// Validate the minimal shape and stamp `time` when absent.
    pub fn into_event(self, now: i64) -> Result<Event> {
        let experiment = required_text(self.experiment, "experiment")?;
        let event = required_text(self.event, "event")?;
        let subject = match self.subject {
            Some(value) => SubjectId::from_json(&value)?,
            None => return Err(MindcraftError::invalid_event("missing field 'subject'")),
        };

        Ok(Event {
            experiment,
            subject,
            event,
            args: self.args.filter(|a| !a.is_null()),
            time: self.time.unwrap_or(now),
        })
    }
}

impl From<Event> for NewEvent {
    fn from(event: Event) -> Self {
        Self {
            experiment: Some(event.experiment),
            subject: serde_json::to_value(&event.subject).ok(),
            event: Some(event.event),
            args: event.args,
            time: Some(event.time),
        }
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(MindcraftError::invalid_event(format!(
            "field '{}' must not be empty",
            field
        ))),
        None => Err(MindcraftError::invalid_event(format!(
            "missing field '{}'",
            field
        ))),
    }
}
