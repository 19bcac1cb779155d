//! Document identifier derivation.
//!
//! A row's identifier is `<schema>-<table>-<k1>-<k2>...`, with every `-`
//! stripped from the key components so the composed string cannot be read
//! two ways, then form-urlencoded. The store treats `/` as a path separator,
//! so the encoded form never contains one.

use url::form_urlencoded;

use crate::error::IngestError;
use crate::models::DocumentId;

const DELIMITER: char = '-';

/// Derives the store identifier for the row `row_key` of `schema.table`.
///
/// The same `(schema, table, row_key)` always yields the same identifier,
/// which is what makes redelivered events land on the same document.
pub fn derive<S: AsRef<str>>(
    schema: &str,
    table: &str,
    row_key: &[S],
) -> Result<DocumentId, IngestError> {
    if row_key.is_empty() {
        return Err(IngestError::InvalidKey);
    }

    let mut composed = String::with_capacity(schema.len() + table.len() + 16 * row_key.len());
    composed.push_str(schema);
    composed.push(DELIMITER);
    composed.push_str(table);
    for component in row_key {
        composed.push(DELIMITER);
        composed.extend(component.as_ref().chars().filter(|&c| c != DELIMITER));
    }

    let encoded: String = form_urlencoded::byte_serialize(composed.as_bytes()).collect();
    Ok(DocumentId::new(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_type_and_key() {
        let id = derive("public", "orders", &["42"]).unwrap();
        assert_eq!(id.as_str(), "public-orders-42");
    }

    #[test]
    fn strips_dashes_from_components() {
        let id = derive("public", "docs", &["a-b", "c"]).unwrap();
        assert_eq!(id.as_str(), "public-docs-ab-c");
    }

    #[test]
    fn deterministic() {
        let key = ["https://example.com/a b", "7"];
        assert_eq!(
            derive("public", "docs", &key).unwrap(),
            derive("public", "docs", &key).unwrap()
        );
    }

    #[test]
    fn different_keys_differ() {
        let a = derive("public", "docs", &["1"]).unwrap();
        let b = derive("public", "docs", &["2"]).unwrap();
        let c = derive("public", "other", &["1"]).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn never_contains_slash() {
        let id = derive("public", "docs", &["https://www.example.com/path/to/page"]).unwrap();
        assert!(!id.as_str().contains('/'));
        assert_eq!(
            id.as_str(),
            "public-docs-https%3A%2F%2Fwww.example.com%2Fpath%2Fto%2Fpage"
        );
    }

    #[test]
    fn spaces_become_plus() {
        let id = derive("public", "docs", &["hello world"]).unwrap();
        assert_eq!(id.as_str(), "public-docs-hello+world");
    }

    #[test]
    fn empty_key_is_invalid() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            derive("public", "docs", &empty),
            Err(IngestError::InvalidKey)
        ));
    }
}
