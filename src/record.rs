//! Probe record parsing.
//!
//! One measurement per log line, encoded as a JSON object. Every field
//! is optional at the parse layer; consumers decide what a usable
//! record looks like. The original JSON object is retained so that
//! pass-through surfaces (raw tables, the relay) see fields this codec
//! does not model.

use serde::{Serialize, Serializer};
use serde_json::Value;

/// A single probe measurement, with typed views of the recognized
/// fields and the raw object preserved for pass-through.
///
/// Field tolerance:
/// - `sent`, `received`, `loss_pct` must be JSON numbers; any other
///   type leaves the typed field empty (the record itself still parses).
/// - `rtt_avg_ms` may be a JSON number or a numeric string.
#[derive(Debug, Clone)]
pub struct ProbeRecord {
    pub timestamp: Option<String>,
    pub target: Option<String>,
    pub dst_host: Option<String>,
    pub src_ip: Option<String>,
    pub public_ip: Option<String>,
    pub dst_ip: Option<String>,
    pub sent: Option<i64>,
    pub received: Option<i64>,
    pub loss_pct: Option<f64>,
    pub rtt_avg_ms: Option<f64>,
    raw: Value,
}

impl ProbeRecord {
    /// Parse one log line. Returns `None` for blank lines, invalid
    /// JSON, and JSON values that are not objects.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let raw: Value = serde_json::from_str(line).ok()?;
        let obj = raw.as_object()?;

        let timestamp = string_field(obj.get("timestamp"));
        let target = string_field(obj.get("target"));
        let dst_host = string_field(obj.get("dst_host"));
        let src_ip = string_field(obj.get("src_ip"));
        let public_ip = string_field(obj.get("public_ip"));
        let dst_ip = string_field(obj.get("dst_ip"));
        let sent = integer_field(obj.get("sent"));
        let received = integer_field(obj.get("received"));
        let loss_pct = number_field(obj.get("loss_pct"));
        let rtt_avg_ms = lenient_number_field(obj.get("rtt_avg_ms"));

        Some(Self {
            timestamp,
            target,
            dst_host,
            src_ip,
            public_ip,
            dst_ip,
            sent,
            received,
            loss_pct,
            rtt_avg_ms,
            raw,
        })
    }

    /// The endpoint identity: `target`, falling back to `dst_host`.
    /// Empty strings count as absent.
    pub fn endpoint(&self) -> Option<&str> {
        self.target
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.dst_host.as_deref().filter(|s| !s.is_empty()))
    }

    /// Calendar day key: the first 10 characters of the timestamp
    /// (`YYYY-MM-DD`). Shorter timestamps key on the whole string.
    pub fn day(&self) -> Option<&str> {
        let ts = self.timestamp.as_deref()?;
        if ts.is_empty() {
            return None;
        }
        Some(ts.get(..10).unwrap_or(ts))
    }

    /// Raw value of one field, for pass-through payloads.
    pub fn raw_field(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}

impl Serialize for ProbeRecord {
    /// Serializes the original object, unknown fields included.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn integer_field(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

fn number_field(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
}

/// Number, or a string that parses as one.
fn lenient_number_field(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}
