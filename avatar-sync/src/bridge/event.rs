//! Runtime event normalization.

use serde_json::Value;

/// Name of an event emitted by an animation runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventName {
    Recognized(String),
    Unrecognized,
}

impl EventName {
    /// Case-insensitive comparison with an expected name.
    pub fn matches(&self, expected: &str) -> bool {
        match self {
            Self::Recognized(name) => name.eq_ignore_ascii_case(expected),
            Self::Unrecognized => false,
        }
    }
}

/// Where an event name may live in a payload, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameSource {
    DataName,
    Name,
    Type,
    Data,
}

const PRIORITY: [NameSource; 4] = [NameSource::DataName, NameSource::Name, NameSource::Type, NameSource::Data];

impl NameSource {
    fn probe(self, payload: &Value) -> Option<&str> {
        let value = match self {
            Self::DataName => payload.get("data")?.get("name")?,
            Self::Name => payload.get("name")?,
            Self::Type => payload.get("type")?,
            Self::Data => payload.get("data")?,
        };
        value.as_str()
    }
}

/// Extracts the event name from a runtime payload.
///
/// A bare string payload is its own name. Objects are probed for
/// `data.name`, `name`, `type` and a string `data`, in that order; the
/// first non-empty value wins.
pub fn normalize_event(payload: &Value) -> EventName {
    let name = match payload {
        Value::String(name) => Some(name.as_str()),
        _ => PRIORITY
            .iter()
            .filter_map(|source| source.probe(payload))
            .find(|name| !name.trim().is_empty()),
    };
    match name {
        Some(name) if !name.trim().is_empty() => EventName::Recognized(name.trim().to_string()),
        _ => EventName::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn name(payload: Value) -> EventName {
        normalize_event(&payload)
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(
            name(json!({"data": {"name": "A"}, "name": "B", "type": "C"})),
            EventName::Recognized("A".into())
        );
        assert_eq!(name(json!({"name": "B", "type": "C"})), EventName::Recognized("B".into()));
        assert_eq!(name(json!({"type": "C", "data": "D"})), EventName::Recognized("C".into()));
        assert_eq!(name(json!({"data": "D"})), EventName::Recognized("D".into()));
    }

    #[test]
    fn test_empty_values_are_skipped() {
        assert_eq!(
            name(json!({"data": {"name": ""}, "name": "  ", "type": "AbrirPanel"})),
            EventName::Recognized("AbrirPanel".into())
        );
    }

    #[test]
    fn test_bare_string() {
        assert_eq!(name(json!("AbrirPanel")), EventName::Recognized("AbrirPanel".into()));
        assert_eq!(name(json!("")), EventName::Unrecognized);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(name(json!({"data": {"value": 1}})), EventName::Unrecognized);
        assert_eq!(name(json!(42)), EventName::Unrecognized);
        assert_eq!(name(Value::Null), EventName::Unrecognized);
    }

    #[test]
    fn test_matches_ignores_case() {
        assert!(EventName::Recognized("abrirpanel".into()).matches("AbrirPanel"));
        assert!(!EventName::Unrecognized.matches("AbrirPanel"));
    }
}
