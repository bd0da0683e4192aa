//! Status line protocol: extracts structured status events from a worker's
//! interleaved log/status output.
//!
//! Workers report progress by printing lines of the form
//! `__STATUS__ {"phase":"battle","wave":17}` to stdout. Everything else they
//! print is ordinary log output. The classifier here tags each complete line
//! as one or the other; it never interprets log lines and it never buffers
//! (line framing is the reader's job).

use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::ProtocolError;

/// Fixed literal that opens every status line.
pub const STATUS_MARKER: &str = "__STATUS__";

/// One parsed status emission from a worker.
///
/// The payload is a flat map of field name to scalar JSON value. Applying an
/// event replaces the previous payload snapshot wholesale; events are
/// transient and never persisted.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub payload: BTreeMap<String, serde_json::Value>,
    pub received_at: Instant,
}

impl StatusEvent {
    /// Field lookup rendered as a bare string (no JSON quoting).
    pub fn field_str(&self, key: &str) -> Option<String> {
        self.payload.get(key).map(scalar_to_string)
    }
}

/// Classification of a single complete output line.
#[derive(Debug, Clone)]
pub enum WorkerLine {
    /// Marker-prefixed line with a well-formed payload.
    Status(StatusEvent),
    /// Any line without the marker, forwarded untouched.
    Log(String),
}

/// Classifies one complete line of worker output.
///
/// Returns `WorkerLine::Log` for lines without the marker (never an error),
/// `WorkerLine::Status` for marker lines with a valid flat JSON object
/// payload, and `ProtocolError` when the marker is present but the payload is
/// malformed. Callers log the error and drop the line; the worker keeps
/// running.
pub fn classify_line(line: &str) -> Result<WorkerLine, ProtocolError> {
    let Some(rest) = line.strip_prefix(STATUS_MARKER) else {
        return Ok(WorkerLine::Log(line.to_string()));
    };

    let raw: serde_json::Value = serde_json::from_str(rest.trim())
        .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
    let serde_json::Value::Object(object) = raw else {
        return Err(ProtocolError::NotAnObject);
    };

    let mut payload = BTreeMap::new();
    for (key, value) in object {
        if value.is_object() || value.is_array() {
            return Err(ProtocolError::NonScalarField { key });
        }
        payload.insert(key, value);
    }

    Ok(WorkerLine::Status(StatusEvent {
        payload,
        received_at: Instant::now(),
    }))
}

/// Renders a scalar JSON value without quoting strings.
pub fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
