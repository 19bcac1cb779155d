//! Administrative index provisioning.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::store::{DocumentStore, ElasticStore, IndexStatus};

/// Creates `index` in the document store. An existing index is not an error.
pub async fn run_create_index(config: &Config, index: &str) -> Result<()> {
    if index.trim().is_empty() {
        bail!("index name must not be empty");
    }

    let store = ElasticStore::new(&config.store)?;
    match store.create_index(index).await? {
        IndexStatus::Created => println!("index {} created", index),
        IndexStatus::AlreadyExists => println!("index {} already exists", index),
    }
    Ok(())
}
