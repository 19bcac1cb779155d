//! Elasticsearch-backed [`DocumentStore`].
//!
//! Each changefeed database maps to one index; documents live at
//! `/{index}/_doc/{id}`. Writes use `POST`, which replaces the stored source
//! entirely. Requests authenticate with HTTP basic auth.
//!
//! The client does not retry. A failed write is reported to the caller, and
//! the changefeed's redelivery is the recovery path.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::{SearchConfig, StoreConfig};
use crate::error::StoreError;
use crate::models::{DocumentId, StoreOutcome};

use super::{DocumentStore, IndexStatus};

const ALREADY_EXISTS: &str = "resource_already_exists_exception";

/// HTTP client for an Elasticsearch cluster.
pub struct ElasticStore {
    client: Client,
    base_url: String,
    user: String,
    password: Option<String>,
}

impl ElasticStore {
    /// Builds a client from the store configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn doc_url(&self, index: &str, id: &DocumentId) -> String {
        // `id` is already encoded; joining as text keeps it from being encoded twice.
        format!("{}/{}/_doc/{}", self.base_url, index, id)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.user, self.password.as_deref())
    }

    /// Runs a `match_phrase` query against `config.field` with highlighting.
    ///
    /// Returns the raw search response.
    pub async fn search_phrase(
        &self,
        config: &SearchConfig,
        phrase: &str,
    ) -> Result<Value, StoreError> {
        let url = format!("{}/{}/_search", self.base_url, config.index);
        let response = self
            .authed(self.client.post(&url))
            .json(&phrase_query(config, phrase))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        match status {
            s if s.is_success() => Ok(serde_json::from_str(&text).unwrap_or(Value::String(text))),
            StatusCode::UNAUTHORIZED => Err(StoreError::Unauthorized),
            s => Err(StoreError::Status {
                status: s.as_u16(),
                body: text,
            }),
        }
    }
}

/// Builds the highlighted phrase query body.
pub(crate) fn phrase_query(config: &SearchConfig, phrase: &str) -> Value {
    let mut matcher = Map::new();
    matcher.insert(config.field.clone(), Value::String(phrase.to_string()));
    let mut highlight = Map::new();
    highlight.insert(
        config.field.clone(),
        json!({
            "fragment_size": config.fragment_size,
            "number_of_fragments": config.fragments,
        }),
    );
    json!({
        "_source": false,
        "query": { "match_phrase": matcher },
        "highlight": { "fields": highlight },
    })
}

/// Maps a write response onto an outcome. `missing_ok` turns a 404 into a
/// successful "not found" outcome.
fn write_outcome(
    status: StatusCode,
    text: String,
    missing_ok: bool,
) -> Result<StoreOutcome, StoreError> {
    let body = serde_json::from_str::<Value>(&text).ok();
    match status {
        s if s.is_success() => Ok(StoreOutcome {
            status: s.as_u16(),
            found: true,
            body,
        }),
        StatusCode::NOT_FOUND if missing_ok => Ok(StoreOutcome {
            status: status.as_u16(),
            found: false,
            body,
        }),
        StatusCode::UNAUTHORIZED => Err(StoreError::Unauthorized),
        s => Err(StoreError::Status {
            status: s.as_u16(),
            body: text,
        }),
    }
}

fn index_status(status: StatusCode, text: String) -> Result<IndexStatus, StoreError> {
    match status {
        s if s.is_success() => Ok(IndexStatus::Created),
        StatusCode::BAD_REQUEST if text.contains(ALREADY_EXISTS) => Ok(IndexStatus::AlreadyExists),
        StatusCode::UNAUTHORIZED => Err(StoreError::Unauthorized),
        s => Err(StoreError::Status {
            status: s.as_u16(),
            body: text,
        }),
    }
}

#[async_trait]
impl DocumentStore for ElasticStore {
    async fn put(
        &self,
        index: &str,
        id: &DocumentId,
        doc: &Map<String, Value>,
    ) -> Result<StoreOutcome, StoreError> {
        let url = self.doc_url(index, id);
        debug!(%url, "store put");
        let response = self.authed(self.client.post(&url)).json(doc).send().await?;
        let status = response.status();
        let text = response.text().await?;
        write_outcome(status, text, false)
    }

    async fn delete(&self, index: &str, id: &DocumentId) -> Result<StoreOutcome, StoreError> {
        let url = self.doc_url(index, id);
        debug!(%url, "store delete");
        let response = self.authed(self.client.delete(&url)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        write_outcome(status, text, true)
    }

    async fn create_index(&self, index: &str) -> Result<IndexStatus, StoreError> {
        let url = format!("{}/{}", self.base_url, index);
        let response = self.authed(self.client.put(&url)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        index_status(status, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_id::derive;

    fn store(url: &str) -> ElasticStore {
        ElasticStore::new(&StoreConfig {
            url: url.to_string(),
            user: "elastic".to_string(),
            password_env: "ES_PASSWD".to_string(),
            password: None,
            accept_invalid_certs: true,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn doc_url_keeps_encoded_id() {
        let s = store("https://localhost:9200/");
        let id = derive("public", "docs", &["https://a.b/c"]).unwrap();
        assert_eq!(
            s.doc_url("defaultdb", &id),
            "https://localhost:9200/defaultdb/_doc/public-docs-https%3A%2F%2Fa.b%2Fc"
        );
    }

    #[test]
    fn delete_404_is_not_found_outcome() {
        let out = write_outcome(StatusCode::NOT_FOUND, r#"{"result":"not_found"}"#.into(), true)
            .unwrap();
        assert!(!out.found);
        assert_eq!(out.body.unwrap()["result"], "not_found");
    }

    #[test]
    fn put_404_is_an_error() {
        let err = write_outcome(StatusCode::NOT_FOUND, String::new(), false).unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 404, .. }));
    }

    #[test]
    fn unauthorized_is_distinct() {
        let err = write_outcome(StatusCode::UNAUTHORIZED, String::new(), false).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));
    }

    #[test]
    fn existing_index_is_not_an_error() {
        let body = r#"{"error":{"type":"resource_already_exists_exception"},"status":400}"#;
        assert_eq!(
            index_status(StatusCode::BAD_REQUEST, body.into()).unwrap(),
            IndexStatus::AlreadyExists
        );
        assert!(index_status(StatusCode::BAD_REQUEST, "{}".into()).is_err());
        assert_eq!(
            index_status(StatusCode::OK, "{}".into()).unwrap(),
            IndexStatus::Created
        );
    }

    #[test]
    fn phrase_query_shape() {
        let q = phrase_query(&SearchConfig::default(), "rust async");
        assert_eq!(q["_source"], false);
        assert_eq!(q["query"]["match_phrase"]["content"], "rust async");
        assert_eq!(q["highlight"]["fields"]["content"]["fragment_size"], 80);
        assert_eq!(q["highlight"]["fields"]["content"]["number_of_fragments"], 4);
    }
}
