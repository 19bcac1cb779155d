//! Changefeed batch decoding.
//!
//! A batch is newline-delimited JSON, one `{"key": [...], "after": {...}|null}`
//! record per line. Decoding is all-or-nothing: one bad line fails the whole
//! batch, and nothing has been applied at that point.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::IngestError;
use crate::models::{ChangeEvent, TableAddress};

/// Wire shape of one changefeed record. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawRecord {
    key: Vec<KeyComponent>,
    /// Required, but may be `null` (delete).
    #[serde(deserialize_with = "nullable_object")]
    after: Option<Map<String, Value>>,
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyComponent {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl KeyComponent {
    fn into_string(self) -> String {
        match self {
            KeyComponent::Text(s) => s,
            KeyComponent::Number(n) => n.to_string(),
            KeyComponent::Bool(b) => b.to_string(),
        }
    }
}

fn nullable_object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map<String, Value>>::deserialize(deserializer)
}

/// Decodes every record of `batch`, in file order.
///
/// Whitespace-only input yields no events. Blank lines between records are
/// skipped.
pub fn decode(batch: &[u8], address: &TableAddress) -> Result<Vec<ChangeEvent>, IngestError> {
    let text = std::str::from_utf8(batch).map_err(|e| IngestError::MalformedRecord {
        line_number: 0,
        line: String::from_utf8_lossy(batch).chars().take(200).collect(),
        reason: format!("batch is not valid UTF-8: {}", e),
    })?;

    let mut events = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        events.push(decode_line(idx + 1, line)?);
    }

    debug!(table = %address, events = events.len(), "decoded batch");
    Ok(events)
}

fn decode_line(line_number: usize, line: &str) -> Result<ChangeEvent, IngestError> {
    let record: RawRecord =
        serde_json::from_str(line).map_err(|e| IngestError::MalformedRecord {
            line_number,
            line: line.to_string(),
            reason: e.to_string(),
        })?;

    Ok(ChangeEvent {
        row_key: record
            .key
            .into_iter()
            .map(KeyComponent::into_string)
            .collect(),
        after: record.after,
        updated: record.updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn address() -> TableAddress {
        TableAddress {
            database: "defaultdb".to_string(),
            schema: "public".to_string(),
            table: "docs".to_string(),
        }
    }

    #[test]
    fn decodes_upserts_and_deletes_in_order() {
        let batch = br#"{"after": {"uri": "a", "content": "x"}, "key": ["a"], "updated": "1585860523.0"}
{"after": null, "key": ["b"]}
"#;
        let events = decode(batch, &address()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].row_key, vec!["a"]);
        assert_eq!(events[0].updated.as_deref(), Some("1585860523.0"));
        let after = events[0].after.as_ref().unwrap();
        assert_eq!(after.get("content"), Some(&json!("x")));
        assert!(events[1].is_delete());
        assert_eq!(events[1].row_key, vec!["b"]);
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert!(decode(b"", &address()).unwrap().is_empty());
        assert!(decode(b"  \n\n \r\n", &address()).unwrap().is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let batch = b"{\"key\": [1], \"after\": null}\r\n\r\n{\"key\": [2], \"after\": null}\r\n";
        let events = decode(batch, &address()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].row_key, vec!["2"]);
    }

    #[test]
    fn scalar_key_components_are_rendered() {
        let batch = br#"{"key": [7, "x", true, 1.5], "after": null}"#;
        let events = decode(batch, &address()).unwrap();
        assert_eq!(events[0].row_key, vec!["7", "x", "true", "1.5"]);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let batch = br#"{"key": ["a"], "after": {"n": 1}, "before": null, "topic": "docs"}"#;
        assert_eq!(decode(batch, &address()).unwrap().len(), 1);
    }

    #[test]
    fn malformed_line_fails_whole_batch() {
        let batch = b"{\"key\": [\"1\"], \"after\": null}\n{\"key\": [\"2\"], \"after\": null}\nnot json\n{\"key\": [\"4\"], \"after\": null}\n{\"key\": [\"5\"], \"after\": null}";
        match decode(batch, &address()) {
            Err(IngestError::MalformedRecord {
                line_number, line, ..
            }) => {
                assert_eq!(line_number, 3);
                assert_eq!(line, "not json");
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn line_numbers_count_leading_blank_lines() {
        let batch = b"\n\n{\"key\": [\"1\"], \"after\": null}\nnot json\n";
        match decode(batch, &address()) {
            Err(IngestError::MalformedRecord { line_number, .. }) => assert_eq!(line_number, 4),
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn missing_key_is_malformed() {
        let batch = br#"{"after": {"a": 1}}"#;
        assert!(matches!(
            decode(batch, &address()),
            Err(IngestError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn missing_after_is_malformed() {
        let batch = br#"{"key": ["a"]}"#;
        assert!(matches!(
            decode(batch, &address()),
            Err(IngestError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn non_object_after_is_malformed() {
        let batch = br#"{"key": ["a"], "after": [1, 2]}"#;
        assert!(matches!(
            decode(batch, &address()),
            Err(IngestError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        assert!(matches!(
            decode(&[0xff, 0xfe, b'\n'], &address()),
            Err(IngestError::MalformedRecord { .. })
        ));
    }
}
