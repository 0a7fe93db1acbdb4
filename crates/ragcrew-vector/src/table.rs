//! LanceDB connection and housekeeping helpers.
//!
//! Provides the connection opener, an ensure helper for tables and a small
//! key/value metadata table recording per-collection index and load state.
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::Utc;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::sync::Arc;
use std::time::Duration;

use ragcrew_core::error::{Error, Result};

pub const META_TABLE: &str = "ragcrew_meta";

/// Open a connection whose reads always observe the latest committed writes.
pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri)
        .read_consistency_interval(Duration::ZERO)
        .execute()
        .await
        .map_err(|e| Error::Connection(format!("{uri}: {e}")))
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(|e| Error::index("has_collection", e))?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    conn.create_empty_table(name, schema)
        .execute()
        .await
        .map_err(|e| Error::index("create_collection", format!("{name}: {e}")))?;
    Ok(())
}

fn build_meta_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, false),
        Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}

pub async fn ensure_meta_table(conn: &Connection) -> Result<()> {
    ensure_table(conn, META_TABLE, build_meta_schema()).await
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub async fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let meta_err = |e: lancedb::Error| Error::index("set_meta", e);
    ensure_meta_table(conn).await?;
    let t = conn.open_table(META_TABLE).execute().await.map_err(meta_err)?;
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key.to_string()])),
            Arc::new(StringArray::from(vec![value.to_string()])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )
    .map_err(|e| Error::index("set_meta", e))?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    // key is unique: update in place or insert
    let mut mi = t.merge_insert(&["key"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await.map_err(meta_err)?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    let meta_err = |e: lancedb::Error| Error::index("get_meta", e);
    if !table_exists(conn, META_TABLE).await? {
        return Ok(None);
    }
    let t = conn.open_table(META_TABLE).execute().await.map_err(meta_err)?;
    let mut stream = t
        .query()
        .only_if(format!("key = {}", quote(key)))
        .execute()
        .await
        .map_err(meta_err)?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(meta_err)? {
        if batch.num_rows() == 0 {
            continue;
        }
        let val = batch
            .column_by_name("value")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::index("get_meta", "meta.value column missing"))?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}

pub async fn delete_meta(conn: &Connection, keys: &[String]) -> Result<()> {
    if keys.is_empty() || !table_exists(conn, META_TABLE).await? {
        return Ok(());
    }
    let t = conn
        .open_table(META_TABLE)
        .execute()
        .await
        .map_err(|e| Error::index("delete_meta", e))?;
    let list = keys.iter().map(|k| quote(k)).collect::<Vec<_>>().join(", ");
    t.delete(&format!("key IN ({list})")).await.map_err(|e| Error::index("delete_meta", e))?;
    Ok(())
}
