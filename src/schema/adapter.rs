//! Adapter for reading keystroke exports into [`KeyEvent`]s
//!
//! Accepts CSV (the usual database export), NDJSON and JSON arrays. Column names
//! are normalized (trimmed, lower-cased) before the schema check, so `Session_ID `
//! and `session_id` are the same column.

use crate::error::ComputeError;
use crate::schema::key_event::*;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Supported input encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
    /// JSON array of objects
    Json,
}

/// Adapter for converting keystroke exports to events
pub struct KeystrokeAdapter;

impl KeystrokeAdapter {
    /// Parse and validate an input document in one step
    pub fn load(input: &str, format: InputFormat) -> Result<Vec<KeyEvent>, ComputeError> {
        let records = Self::parse(input, format)?;
        Self::to_events(records)
    }

    /// Parse an input document into unvalidated records
    pub fn parse(input: &str, format: InputFormat) -> Result<Vec<RawKeystrokeRecord>, ComputeError> {
        let records = match format {
            InputFormat::Csv => Self::parse_csv(input)?,
            InputFormat::Ndjson => Self::parse_ndjson(input)?,
            InputFormat::Json => Self::parse_array(input)?,
        };
        info!("Parsed {} keystroke rows ({:?})", records.len(), format);
        Ok(records)
    }

    /// Parse CSV with a header row
    pub fn parse_csv(csv_text: &str) -> Result<Vec<RawKeystrokeRecord>, ComputeError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::None)
            .from_reader(csv_text.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(normalize_column)
            .collect();
        let columns = ColumnMap::resolve(&headers)?;

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };
            records.push(RawKeystrokeRecord {
                row,
                session_id: cell(Some(columns.session_id)),
                test_type: cell(Some(columns.test_type)),
                event_type: cell(Some(columns.event_type)),
                key: cell(Some(columns.key)),
                field_name: cell(columns.field_name),
                pressed_at: cell(Some(columns.pressed_at)),
            });
        }
        Ok(records)
    }

    /// Parse NDJSON (one JSON object per line)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawKeystrokeRecord>, ComputeError> {
        let mut objects = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(map)) => objects.push(map),
                Ok(_) => {
                    return Err(ComputeError::ParseError(format!(
                        "Line {} is not a JSON object",
                        line_num + 1
                    )));
                }
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        records_from_objects(objects)
    }

    /// Parse a JSON array of objects
    pub fn parse_array(json: &str) -> Result<Vec<RawKeystrokeRecord>, ComputeError> {
        let values: Vec<Value> = serde_json::from_str(json)?;
        let mut objects = Vec::with_capacity(values.len());
        for (idx, value) in values.into_iter().enumerate() {
            match value {
                Value::Object(map) => objects.push(map),
                _ => {
                    return Err(ComputeError::ParseError(format!(
                        "Array element {} is not a JSON object",
                        idx
                    )));
                }
            }
        }
        records_from_objects(objects)
    }

    /// Validate every record, failing on the first bad row
    pub fn to_events(records: Vec<RawKeystrokeRecord>) -> Result<Vec<KeyEvent>, ComputeError> {
        records
            .into_iter()
            .map(RawKeystrokeRecord::into_event)
            .collect()
    }

    /// Validate every record and collect all row-level problems
    pub fn validate_records(records: &[RawKeystrokeRecord]) -> Vec<RecordIssue> {
        records
            .iter()
            .filter_map(|record| {
                record.clone().into_event().err().map(|e| RecordIssue {
                    row: record.row,
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

/// A row that failed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordIssue {
    pub row: usize,
    pub message: String,
}

/// Positions of the known columns within a header row
struct ColumnMap {
    session_id: usize,
    test_type: usize,
    event_type: usize,
    key: usize,
    field_name: Option<usize>,
    pressed_at: usize,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Result<Self, ComputeError> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        let pressed_at = find(COL_PRESSED_AT).or_else(|| find(COL_TIMESTAMP_FALLBACK));
        if pressed_at.is_some() && find(COL_PRESSED_AT).is_none() {
            debug!("Using '{}' column as {}", COL_TIMESTAMP_FALLBACK, COL_PRESSED_AT);
        }

        let require = |name: &str, idx: Option<usize>| {
            idx.ok_or_else(|| ComputeError::MissingColumn(name.to_string()))
        };

        let session_id = require(COL_SESSION_ID, find(COL_SESSION_ID))?;
        let test_type = require(COL_TEST_TYPE, find(COL_TEST_TYPE))?;
        let event_type = require(COL_EVENT_TYPE, find(COL_EVENT_TYPE))?;
        let key = require(COL_KEY, find(COL_KEY))?;
        let pressed_at = require(COL_PRESSED_AT, pressed_at)?;

        let field_name = find(COL_FIELD_NAME);
        if field_name.is_none() {
            warn!("No '{}' column in keystrokes; per-field metrics will be empty", COL_FIELD_NAME);
        }

        Ok(ColumnMap {
            session_id,
            test_type,
            event_type,
            key,
            field_name,
            pressed_at,
        })
    }
}

/// Trim and lower-case a column name
pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase()
}

fn records_from_objects(
    objects: Vec<Map<String, Value>>,
) -> Result<Vec<RawKeystrokeRecord>, ComputeError> {
    let objects: Vec<Map<String, Value>> = objects
        .into_iter()
        .map(|map| {
            map.into_iter()
                .map(|(k, v)| (normalize_column(&k), v))
                .collect()
        })
        .collect();

    if objects.is_empty() {
        return Ok(Vec::new());
    }

    // A column is present if any object carries it; per-row gaps surface later
    // as MissingField.
    let present: BTreeSet<&str> = objects
        .iter()
        .flat_map(|map| map.keys().map(String::as_str))
        .collect();
    let has_pressed_at = present.contains(COL_PRESSED_AT);
    let mut headers: Vec<String> = present.iter().map(|s| s.to_string()).collect();
    if !has_pressed_at && present.contains(COL_TIMESTAMP_FALLBACK) {
        headers.push(COL_PRESSED_AT.to_string());
    }
    ColumnMap::resolve(&headers)?;

    let timestamp_column = if has_pressed_at {
        COL_PRESSED_AT
    } else {
        COL_TIMESTAMP_FALLBACK
    };

    Ok(objects
        .iter()
        .enumerate()
        .map(|(row, map)| RawKeystrokeRecord {
            row,
            session_id: json_cell(map, COL_SESSION_ID),
            test_type: json_cell(map, COL_TEST_TYPE),
            event_type: json_cell(map, COL_EVENT_TYPE),
            key: json_cell(map, COL_KEY),
            field_name: json_cell(map, COL_FIELD_NAME),
            pressed_at: json_cell(map, timestamp_column),
        })
        .collect())
}

fn json_cell(map: &Map<String, Value>, column: &str) -> Option<String> {
    match map.get(column)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
