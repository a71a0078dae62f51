//! Response envelope extraction.
//!
//! The API is inconsistent about where it puts records: some endpoints answer
//! with a bare array, others nest it under one of a few wrapper keys. This
//! module picks exactly one interpretation per response and never fails.

use serde_json::Value;

/// Wrapper keys probed for a record array, in priority order.
pub const ENVELOPE_KEYS: [&str; 4] = ["data", "Data", "items", "results"];

/// Where the records of an [`Envelope::List`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeSource {
    /// The response itself was an array.
    Bare,
    /// The array was found under this wrapper key.
    Key(&'static str),
    /// No wrapper key matched; the whole object is treated as one record.
    WholeObject,
}

/// Result of extracting records from a raw response.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A record sequence was found (it may still be empty).
    List {
        /// Which interpretation won.
        source: EnvelopeSource,
        /// The records, unchanged.
        records: Vec<Value>,
    },
    /// Nothing record-like: null, a scalar, or an empty object.
    Empty,
}

impl Envelope {
    /// Returns the interpretation that won, if any.
    #[must_use]
    pub fn source(&self) -> Option<EnvelopeSource> {
        match self {
            Self::List { source, .. } => Some(*source),
            Self::Empty => None,
        }
    }

    /// Returns the extracted records (empty for [`Envelope::Empty`]).
    #[must_use]
    pub fn records(&self) -> &[Value] {
        match self {
            Self::List { records, .. } => records,
            Self::Empty => &[],
        }
    }

    /// Consumes the envelope, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::List { records, .. } => records,
            Self::Empty => Vec::new(),
        }
    }

    /// Returns true when there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// Extracts the record sequence from a raw response.
///
/// 1. An array is returned unchanged.
/// 2. Otherwise the first of [`ENVELOPE_KEYS`] holding an array wins.
/// 3. Otherwise a non-empty object becomes a single record.
/// 4. Anything else yields [`Envelope::Empty`].
#[must_use]
pub fn extract_records(raw: Value) -> Envelope {
    match raw {
        Value::Array(records) => Envelope::List {
            source: EnvelopeSource::Bare,
            records,
        },
        Value::Object(mut map) => {
            if let Some(key) = first_list_key(&map) {
                if let Some(Value::Array(records)) = map.remove(key) {
                    return Envelope::List {
                        source: EnvelopeSource::Key(key),
                        records,
                    };
                }
            }
            if map.is_empty() {
                Envelope::Empty
            } else {
                Envelope::List {
                    source: EnvelopeSource::WholeObject,
                    records: vec![Value::Object(map)],
                }
            }
        }
        _ => Envelope::Empty,
    }
}

/// Reports whether a response carries at least one data record.
///
/// Uses the same key priority as [`extract_records`], but an object without
/// any wrapper key does *not* count as data: at this stage it is far more
/// likely to be an error or status envelope than a lone record.
#[must_use]
pub fn has_data(raw: &Value) -> bool {
    match raw {
        Value::Array(records) => !records.is_empty(),
        Value::Object(map) => first_list_key(map)
            .and_then(|key| map.get(key))
            .and_then(Value::as_array)
            .is_some_and(|records| !records.is_empty()),
        _ => false,
    }
}

fn first_list_key(map: &serde_json::Map<String, Value>) -> Option<&'static str> {
    ENVELOPE_KEYS
        .into_iter()
        .find(|key| map.get(*key).is_some_and(Value::is_array))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extract_bare_array_unchanged() {
        let raw = json!([{"a": 1}, {"a": 2}]);
        let envelope = extract_records(raw.clone());
        assert_eq!(envelope.source(), Some(EnvelopeSource::Bare));
        assert_eq!(Value::Array(envelope.into_records()), raw);
    }

    #[test]
    fn test_extract_empty_array_is_empty_list() {
        let envelope = extract_records(json!([]));
        assert_eq!(envelope.source(), Some(EnvelopeSource::Bare));
        assert!(envelope.is_empty());
    }

    #[test]
    fn test_extract_each_wrapper_key() {
        for key in ENVELOPE_KEYS {
            let raw = json!({ key: [{"x": 1}], "meta": {"total": 1} });
            let envelope = extract_records(raw);
            assert_eq!(envelope.source(), Some(EnvelopeSource::Key(key)));
            assert_eq!(envelope.records(), &[json!({"x": 1})]);
        }
    }

    #[test]
    fn test_extract_respects_key_priority() {
        let raw = json!({"results": [{"r": 1}], "items": [{"i": 1}], "Data": [{"D": 1}]});
        let envelope = extract_records(raw);
        assert_eq!(envelope.source(), Some(EnvelopeSource::Key("Data")));
        assert_eq!(envelope.records(), &[json!({"D": 1})]);
    }

    #[test]
    fn test_extract_skips_wrapper_key_that_is_not_array() {
        let raw = json!({"data": {"nested": true}, "items": [{"i": 1}]});
        let envelope = extract_records(raw);
        assert_eq!(envelope.source(), Some(EnvelopeSource::Key("items")));
    }

    #[test]
    fn test_extract_plain_object_wraps_whole_mapping() {
        let raw = json!({"status": 200, "text": "hello"});
        let envelope = extract_records(raw.clone());
        assert_eq!(envelope.source(), Some(EnvelopeSource::WholeObject));
        assert_eq!(envelope.records(), &[raw]);
    }

    #[test]
    fn test_extract_empty_object_and_scalars_are_empty() {
        for raw in [json!({}), Value::Null, json!("text"), json!(3), json!(true)] {
            assert_eq!(extract_records(raw), Envelope::Empty);
        }
    }

    #[test]
    fn test_has_data_cases() {
        assert!(has_data(&json!([{"a": 1}])));
        assert!(!has_data(&json!([])));
        assert!(has_data(&json!({"data": [{"a": 1}]})));
        assert!(!has_data(&json!({"data": []})));
        assert!(!has_data(&json!({"status": 500, "message": "boom"})));
        assert!(!has_data(&Value::Null));
        assert!(!has_data(&json!("ok")));
    }

    #[test]
    fn test_has_data_uses_first_list_key_only() {
        // "data" wins even though it is empty; "items" is never consulted.
        assert!(!has_data(&json!({"data": [], "items": [{"a": 1}]})));
    }
}
