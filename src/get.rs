//! Document access CLI commands: get, list, delete.
//!
//! These wrap the owner-scoped store operations for the reference CLI
//! surface. The `--owner` flag stands in for the auth collaborator that a
//! surrounding service would provide.

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::store::sqlite::SqliteStore;
use crate::store::{DocumentStore, StoreError};

fn open_store(config: &Config, pool: sqlx::SqlitePool) -> Result<Arc<SqliteStore>> {
    let dims = config
        .embedding
        .dims
        .ok_or_else(|| anyhow::anyhow!("embedding.dims required"))?;
    Ok(Arc::new(SqliteStore::new(pool, dims)))
}

/// Print a document's metadata, summary, and full content.
pub async fn run_get(config: &Config, id: &str, owner: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = open_store(config, pool.clone())?;

    let doc = match store.fetch(id, owner).await {
        Ok(doc) => doc,
        Err(StoreError::NotFound) => {
            eprintln!("Error: document not found");
            pool.close().await;
            std::process::exit(1);
        }
        Err(e) => {
            pool.close().await;
            return Err(e.into());
        }
    };

    println!("--- Document ---");
    println!("id:          {}", doc.id);
    println!("name:        {}", doc.name);
    println!("media_type:  {}", doc.media_type);
    println!("size_bytes:  {}", doc.size_bytes);
    if let Some(ref fp) = doc.fingerprint {
        println!("fingerprint: {}", fp);
    }
    println!("created_at:  {}", format_ts_iso(doc.created_at));
    println!("updated_at:  {}", format_ts_iso(doc.updated_at));
    println!();
    println!("--- Summary ---");
    println!("{}", doc.summary);
    println!();
    println!("--- Content ---");
    println!("{}", doc.content);

    pool.close().await;
    Ok(())
}

/// List an owner's documents, newest first.
pub async fn run_list(config: &Config, owner: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = open_store(config, pool.clone())?;

    let docs = store.list(owner).await?;
    if docs.is_empty() {
        println!("No documents.");
        pool.close().await;
        return Ok(());
    }

    for doc in &docs {
        println!(
            "{}  {}  {}  {} bytes",
            doc.id,
            format_ts_iso(doc.created_at),
            doc.name,
            doc.size_bytes
        );
    }
    println!("{} document(s)", docs.len());

    pool.close().await;
    Ok(())
}

/// Delete a document. Idempotent: deleting an absent id is not an error.
pub async fn run_delete(config: &Config, id: &str, owner: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = open_store(config, pool.clone())?;

    store.delete(id, owner).await?;
    println!("deleted {}", id);
    println!("ok");

    pool.close().await;
    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
