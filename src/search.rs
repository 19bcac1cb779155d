//! Phrase search over the indexed pages.
//!
//! Sends a `match_phrase` query with highlighting to the configured index
//! and prints the store's response as pretty JSON.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::store::ElasticStore;

pub async fn run_search(config: &Config, words: &[String], index: Option<String>) -> Result<()> {
    let phrase = words.join(" ");
    if phrase.trim().is_empty() {
        bail!("search query must not be empty");
    }

    if config.store.password.is_none() {
        bail!(
            "environment variable {} must be set to search",
            config.store.password_env
        );
    }

    let mut search = config.search.clone();
    if let Some(index) = index {
        search.index = index;
    }

    let store = ElasticStore::new(&config.store)?;
    let response = store.search_phrase(&search, &phrase).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
