//! Position report validation
//!
//! Drones send one report per line, shaped like
//! ```text
//! {"long":31.9724315,"lat":23.7573327}
//! ```
//! Values may be quoted (`{"long":"31.9724315","lat":"23.7573327"}`), keys
//! may not be bare. Text that fails the shape check or does not parse as a
//! JSON object is rejected, never coerced.

use std::sync::OnceLock;

use bytes::Bytes;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while validating a report payload
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Payload is not valid UTF-8")]
    NotUtf8,

    #[error("Payload does not match report format: {0}")]
    Format(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not an object")]
    NotAnObject,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid coordinate value for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// A validated coordinate pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionReport {
    pub longitude: f64,
    pub latitude: f64,
}

impl PositionReport {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Report payload as it arrives at the table boundary
#[derive(Debug, Clone)]
pub enum RawPayload {
    /// One framed line from a drone connection
    Text(Bytes),
    /// An already-decoded object, e.g. from a management caller
    Structured(Value),
}

impl RawPayload {
    /// Validate this payload into a coordinate pair
    pub fn validate(&self) -> Result<PositionReport, ReportError> {
        match self {
            RawPayload::Text(bytes) => parse_text(bytes),
            RawPayload::Structured(value) => from_structured(value),
        }
    }
}

impl From<PositionReport> for RawPayload {
    fn from(report: PositionReport) -> Self {
        let mut fields = Map::new();
        fields.insert("long".into(), Value::from(report.longitude));
        fields.insert("lat".into(), Value::from(report.latitude));
        RawPayload::Structured(Value::Object(fields))
    }
}

fn report_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Quotes are optional in the pattern; the JSON parse that follows
        // rejects bare keys.
        Regex::new(r#"^\{\s*"?long"?:"?\d+\.\d+"?,\s*"?lat"?:"?\d+\.\d+"?\}$"#)
            .expect("report pattern is valid")
    })
}

/// Parse one text frame into a report
pub fn parse_text(payload: &[u8]) -> Result<PositionReport, ReportError> {
    let text = std::str::from_utf8(payload).map_err(|_| ReportError::NotUtf8)?;

    if !report_pattern().is_match(text) {
        return Err(ReportError::Format(text.to_string()));
    }

    let value: Value = serde_json::from_str(text)?;
    from_structured(&value)
}

/// Accept an already-structured payload exposing both coordinates
pub fn from_structured(value: &Value) -> Result<PositionReport, ReportError> {
    let fields = value.as_object().ok_or(ReportError::NotAnObject)?;

    let longitude = coordinate(fields, "long", "longitude")?;
    let latitude = coordinate(fields, "lat", "latitude")?;

    Ok(PositionReport {
        longitude,
        latitude,
    })
}

fn coordinate(
    fields: &Map<String, Value>,
    field: &'static str,
    alias: &'static str,
) -> Result<f64, ReportError> {
    let value = fields
        .get(field)
        .or_else(|| fields.get(alias))
        .ok_or(ReportError::MissingField(field))?;

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(ReportError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quoted_values_accepted() {
        let report = parse_text(br#"{"long":"37.9724315","lat":"23.7573327"}"#).unwrap();
        assert_eq!(report, PositionReport::new(37.9724315, 23.7573327));
    }

    #[test]
    fn test_unquoted_values_accepted() {
        let report = parse_text(br#"{"long":37.9724315,"lat":23.7573327}"#).unwrap();
        assert_eq!(report.longitude, 37.9724315);
        assert_eq!(report.latitude, 23.7573327);
    }

    #[test]
    fn test_whitespace_after_brace_and_comma() {
        let report = parse_text(br#"{ "long":1.5, "lat":2.5}"#).unwrap();
        assert_eq!(report, PositionReport::new(1.5, 2.5));
    }

    #[test]
    fn test_bare_keys_rejected() {
        let result = parse_text(b"{long:37.9724315,lat:23.7573327}");
        assert!(matches!(result, Err(ReportError::Json(_))));
    }

    #[test]
    fn test_wrong_shape_rejected() {
        for payload in [
            &br#"{"lat":23.7573327,"long":37.9724315}"#[..],
            br#"{"long":37,"lat":23}"#,
            br#"{"long":-37.5,"lat":23.5}"#,
            br#"{"long":37.5,"lat":23.5,"alt":1.0}"#,
            b"hello",
            b"",
        ] {
            assert!(
                matches!(parse_text(payload), Err(ReportError::Format(_))),
                "accepted {:?}",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_mismatched_quotes_rejected() {
        let result = parse_text(br#"{"long":"37.5,"lat":23.5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        assert!(matches!(parse_text(&[0xff, 0xfe]), Err(ReportError::NotUtf8)));
    }

    #[test]
    fn test_structured_payloads() {
        let report = from_structured(&json!({"long": 37.5, "lat": 23.5})).unwrap();
        assert_eq!(report, PositionReport::new(37.5, 23.5));

        let report = from_structured(&json!({"longitude": "37.5", "latitude": 23.5})).unwrap();
        assert_eq!(report, PositionReport::new(37.5, 23.5));

        assert!(matches!(
            from_structured(&json!({"long": 37.5})),
            Err(ReportError::MissingField("lat"))
        ));
        assert!(matches!(
            from_structured(&json!([1.0, 2.0])),
            Err(ReportError::NotAnObject)
        ));
        assert!(matches!(
            from_structured(&json!({"long": "east", "lat": 1.0})),
            Err(ReportError::InvalidNumber { field: "long", .. })
        ));
        assert!(matches!(
            from_structured(&json!({"long": "NaN", "lat": 1.0})),
            Err(ReportError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_raw_payload_dispatch() {
        let text = RawPayload::Text(Bytes::from_static(br#"{"long":1.25,"lat":2.75}"#));
        let structured: RawPayload = PositionReport::new(1.25, 2.75).into();
        assert_eq!(text.validate().unwrap(), structured.validate().unwrap());
    }
}
