//! Keystroke event schema
//!
//! One row of a keystroke export: a keydown or keyup of one key, stamped with the
//! session, the test being taken and optionally the form field being typed into.

use crate::error::ComputeError;
use crate::schema::timestamp::{parse_timestamp, to_epoch_ms};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Column holding the session identifier
pub const COL_SESSION_ID: &str = "session_id";
/// Column holding the test type
pub const COL_TEST_TYPE: &str = "test_type";
/// Column holding keydown/keyup
pub const COL_EVENT_TYPE: &str = "event_type";
/// Column holding the key identifier
pub const COL_KEY: &str = "key";
/// Optional column holding the form field / question
pub const COL_FIELD_NAME: &str = "field_name";
/// Column holding the event timestamp
pub const COL_PRESSED_AT: &str = "pressed_at";
/// Legacy name accepted when `pressed_at` is absent
pub const COL_TIMESTAMP_FALLBACK: &str = "timestamp";

/// Required columns, in the order they are checked
pub const REQUIRED_COLUMNS: &[&str] = &[
    COL_SESSION_ID,
    COL_TEST_TYPE,
    COL_EVENT_TYPE,
    COL_KEY,
    COL_PRESSED_AT,
];

/// Test condition a keystroke was captured under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Free,
    Timed,
    Multitasking,
    /// Synthetic label for all tests of a session combined
    Overall,
    /// For studies with additional conditions
    #[serde(untagged)]
    Other(String),
}

impl TestType {
    pub fn as_str(&self) -> &str {
        match self {
            TestType::Free => "free",
            TestType::Timed => "timed",
            TestType::Multitasking => "multitasking",
            TestType::Overall => "overall",
            TestType::Other(name) => name.as_str(),
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "free" => TestType::Free,
            "timed" => TestType::Timed,
            "multitasking" => TestType::Multitasking,
            "overall" => TestType::Overall,
            other => TestType::Other(other.to_string()),
        }
    }

    pub fn is_overall(&self) -> bool {
        matches!(self, TestType::Overall)
    }
}

impl From<&str> for TestType {
    fn from(value: &str) -> Self {
        TestType::parse(value)
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Ordered by label so table output sorts the way the labels read.
impl Ord for TestType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for TestType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "keydown")]
    KeyDown,
    #[serde(rename = "keyup")]
    KeyUp,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::KeyDown => "keydown",
            EventType::KeyUp => "keyup",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keydown" => Some(EventType::KeyDown),
            "keyup" => Some(EventType::KeyUp),
            _ => None,
        }
    }
}

/// A single validated keystroke event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Participant session identifier
    pub session_id: String,
    /// Test condition
    pub test_type: TestType,
    /// Form field / question the event belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// keydown or keyup
    pub event_type: EventType,
    /// Key identifier as reported by the browser (e.g. "a", "Backspace", " ")
    pub key: String,
    /// Event time (UTC)
    pub pressed_at: DateTime<Utc>,
}

impl KeyEvent {
    pub fn new(
        session_id: impl Into<String>,
        test_type: impl Into<TestType>,
        event_type: EventType,
        key: impl Into<String>,
        pressed_at: DateTime<Utc>,
    ) -> Self {
        KeyEvent {
            session_id: session_id.into(),
            test_type: test_type.into(),
            field_name: None,
            event_type,
            key: key.into(),
            pressed_at,
        }
    }

    /// Attach a field name to the event
    pub fn with_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Event time in epoch milliseconds
    pub fn pressed_at_ms(&self) -> i64 {
        to_epoch_ms(&self.pressed_at)
    }

    pub fn is_keydown(&self) -> bool {
        self.event_type == EventType::KeyDown
    }

    pub fn is_keyup(&self) -> bool {
        self.event_type == EventType::KeyUp
    }

    /// Field name if present and not blank
    pub fn non_blank_field(&self) -> Option<&str> {
        self.field_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

/// An unvalidated row as read from CSV or JSON, after column normalization.
///
/// Empty cells are already `None`.
#[derive(Debug, Clone, Default)]
pub struct RawKeystrokeRecord {
    /// Zero-based data row index (header excluded)
    pub row: usize,
    pub session_id: Option<String>,
    pub test_type: Option<String>,
    pub event_type: Option<String>,
    pub key: Option<String>,
    pub field_name: Option<String>,
    pub pressed_at: Option<String>,
}

impl RawKeystrokeRecord {
    /// Validate the record and convert it to a [`KeyEvent`]
    pub fn into_event(self) -> Result<KeyEvent, ComputeError> {
        let row = self.row;
        let missing = |field: &str| ComputeError::MissingField {
            row,
            field: field.to_string(),
        };

        let session_id = self.session_id.ok_or_else(|| missing(COL_SESSION_ID))?;
        let test_type = self.test_type.ok_or_else(|| missing(COL_TEST_TYPE))?;
        let event_type_raw = self.event_type.ok_or_else(|| missing(COL_EVENT_TYPE))?;
        let key = self.key.ok_or_else(|| missing(COL_KEY))?;
        let pressed_at_raw = self.pressed_at.ok_or_else(|| missing(COL_PRESSED_AT))?;

        let event_type =
            EventType::parse(&event_type_raw).ok_or_else(|| ComputeError::InvalidEventType {
                row,
                value: event_type_raw.clone(),
            })?;

        let pressed_at =
            parse_timestamp(&pressed_at_raw).ok_or_else(|| ComputeError::TimestampParse {
                row,
                value: pressed_at_raw.clone(),
            })?;

        Ok(KeyEvent {
            session_id,
            test_type: TestType::parse(&test_type),
            field_name: self.field_name,
            event_type,
            key,
            pressed_at,
        })
    }
}
