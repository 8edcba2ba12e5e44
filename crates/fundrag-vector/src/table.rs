use arrow_array::RecordBatchIterator;
use arrow_schema::Schema;
use lancedb::database::CreateTableMode;
use lancedb::{connect, Connection};
use std::sync::Arc;

use fundrag_core::error::{Error, Result};

pub(crate) const SERVICE: &str = "vector store";

pub(crate) fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::unavailable(SERVICE, e)
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(unavailable)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(unavailable)?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await.map_err(unavailable)?;
    Ok(())
}

/// Replaces the table with an empty one in a single commit, so readers see
/// either the old version or the empty one.
pub async fn recreate_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter))
        .mode(CreateTableMode::Overwrite)
        .execute()
        .await
        .map_err(unavailable)?;
    Ok(())
}
