//! LanceDB-backed collections.
//!
//! Each collection is a Lance table under the connection root. Index and
//! load state live in the meta table; searches run an exact scan with the
//! metric recorded at index time.
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use ragcrew_core::config::VectorTimeouts;
use ragcrew_core::error::{Error, Result};
use ragcrew_core::types::{Metric, SearchHit};

use crate::backend::{CollectionSchema, InsertColumns, SearchRequest, VectorBackend};
use crate::schema::{build_arrow_schema, text_max_len, vector_dim};
use crate::table::{delete_meta, get_meta, open_db, set_meta, table_exists};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize, Deserialize)]
struct IndexRecord {
    field: String,
    metric: Metric,
}

fn index_key(name: &str) -> String {
    format!("{name}/index")
}

fn load_key(name: &str) -> String {
    format!("{name}/load")
}

fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::Cosine => DistanceType::Cosine,
        Metric::L2 => DistanceType::L2,
        Metric::Dot => DistanceType::Dot,
    }
}

pub struct LanceBackend {
    conn: Connection,
    timeouts: VectorTimeouts,
    runtime: Runtime,
}

impl LanceBackend {
    /// Open (creating if needed) a local LanceDB directory.
    pub fn connect(root: &Path, timeouts: VectorTimeouts) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let uri = root.to_string_lossy().to_string();
        let conn = runtime.block_on(open_db(&uri))?;
        info!(uri = %uri, "connected to LanceDB");
        Ok(Self { conn, timeouts, runtime })
    }

    fn block_on<T>(&self, op: &'static str, deadline: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.runtime.block_on(async { tokio::time::timeout(deadline, fut).await }) {
            Ok(result) => result,
            Err(_) => {
                let message = format!("timed out after {deadline:?}");
                Err(if op == "search" { Error::Search(message) } else { Error::index(op, message) })
            }
        }
    }

    async fn open(&self, op: &'static str, name: &str) -> Result<Table> {
        self.conn
            .open_table(name)
            .execute()
            .await
            .map_err(|e| Error::index(op, format!("{name}: {e}")))
    }

    async fn poll_meta(&self, key: String) -> Result<()> {
        loop {
            if get_meta(&self.conn, &key).await?.is_some() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl VectorBackend for LanceBackend {
    fn has_collection(&self, name: &str) -> Result<bool> {
        self.block_on("has_collection", self.timeouts.manage, table_exists(&self.conn, name))
    }

    fn drop_collection(&self, name: &str) -> Result<()> {
        self.block_on("drop_collection", self.timeouts.manage, async {
            if table_exists(&self.conn, name).await? {
                self.conn
                    .drop_table(name, &[])
                    .await
                    .map_err(|e| Error::index("drop_collection", format!("{name}: {e}")))?;
            }
            delete_meta(&self.conn, &[index_key(name), load_key(name)]).await
        })?;
        info!(collection = name, "dropped collection");
        Ok(())
    }

    fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()> {
        let arrow_schema = build_arrow_schema(schema)?;
        self.block_on("create_collection", self.timeouts.manage, async {
            self.conn
                .create_empty_table(name, arrow_schema)
                .execute()
                .await
                .map_err(|e| Error::index("create_collection", format!("{name}: {e}")))?;
            Ok(())
        })?;
        info!(collection = name, dim = schema.dim, "created collection");
        Ok(())
    }

    fn vector_dim(&self, name: &str, field: &str) -> Result<usize> {
        self.block_on("vector_dim", self.timeouts.manage, async {
            let table = self.open("vector_dim", name).await?;
            let schema = table.schema().await.map_err(|e| Error::index("vector_dim", e))?;
            vector_dim(&schema, field)
                .ok_or_else(|| Error::index("vector_dim", format!("{name} has no vector field '{field}'")))
        })
    }

    fn create_index(&self, name: &str, field: &str, metric: Metric) -> Result<()> {
        self.block_on("create_index", self.timeouts.manage, async {
            let table = self.open("create_index", name).await?;
            let schema = table.schema().await.map_err(|e| Error::index("create_index", e))?;
            if vector_dim(&schema, field).is_none() {
                return Err(Error::index("create_index", format!("{name} has no vector field '{field}'")));
            }
            let record = serde_json::to_string(&IndexRecord { field: field.to_string(), metric })
                .map_err(|e| Error::index("create_index", e))?;
            set_meta(&self.conn, &index_key(name), &record).await
        })?;
        debug!(collection = name, field, %metric, "index recorded");
        Ok(())
    }

    fn wait_for_index(&self, name: &str, field: &str, deadline: Duration) -> Result<()> {
        self.block_on("wait_for_index", deadline, self.poll_meta(index_key(name)))?;
        debug!(collection = name, field, "index ready");
        Ok(())
    }

    fn load_collection(&self, name: &str) -> Result<()> {
        self.block_on("load_collection", self.timeouts.manage, async {
            self.open("load_collection", name).await?;
            set_meta(&self.conn, &load_key(name), "loaded").await
        })
    }

    fn wait_for_load(&self, name: &str, deadline: Duration) -> Result<()> {
        self.block_on("wait_for_load", deadline, self.poll_meta(load_key(name)))
    }

    fn insert(&self, name: &str, columns: &InsertColumns) -> Result<usize> {
        if columns.vectors.len() != columns.len() || columns.texts.len() != columns.len() {
            return Err(Error::index("insert", "column lengths differ"));
        }
        if columns.is_empty() {
            return Ok(0);
        }
        self.block_on("insert", self.timeouts.manage, async {
            let table = self.open("insert", name).await?;
            let schema = table.schema().await.map_err(|e| Error::index("insert", e))?;
            let fields = schema.fields();
            if fields.len() < 3 {
                return Err(Error::index("insert", format!("{name} has an unexpected schema")));
            }
            let (id_field, vector_field, text_field) = (fields[0].name(), fields[1].name(), fields[2].name());
            let dim = vector_dim(&schema, vector_field)
                .ok_or_else(|| Error::index("insert", format!("{name} has no vector field")))?;
            if let Some(bad) = columns.vectors.iter().find(|v| v.len() != dim) {
                return Err(Error::index("insert", format!("vector has {} dims, collection expects {dim}", bad.len())));
            }
            if let Some(limit) = text_max_len(&schema, text_field) {
                if let Some(long) = columns.texts.iter().find(|t| t.len() > limit) {
                    return Err(Error::index("insert", format!("text of {} bytes exceeds {limit}", long.len())));
                }
            }
            debug!(collection = name, id_field = %id_field, rows = columns.len(), "inserting");

            let vectors = columns.vectors.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));
            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(Int64Array::from(columns.ids.clone())),
                    Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim as i32)),
                    Arc::new(StringArray::from(columns.texts.clone())),
                ],
            )
            .map_err(|e| Error::index("insert", e))?;
            let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
            table.add(reader).execute().await.map_err(|e| Error::index("insert", e))?;
            Ok(columns.len())
        })
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<Vec<SearchHit>>> {
        let search_err = |e: lancedb::Error| Error::Search(e.to_string());
        self.block_on("search", self.timeouts.search, async {
            let name = request.collection.as_str();
            if get_meta(&self.conn, &load_key(name)).await?.is_none() {
                return Err(Error::Search(format!("collection {name} is not loaded")));
            }
            let metric = match get_meta(&self.conn, &index_key(name)).await? {
                Some(raw) => serde_json::from_str::<IndexRecord>(&raw)
                    .map(|r| r.metric)
                    .map_err(|e| Error::Search(format!("corrupt index record: {e}")))?,
                None => return Err(Error::Search(format!("collection {name} has no index"))),
            };
            let table = self.conn.open_table(name).execute().await.map_err(search_err)?;
            debug!(collection = name, queries = request.vectors.len(), top_k = request.top_k, consistency = ?request.consistency, "searching");

            let mut out = Vec::with_capacity(request.vectors.len());
            for vector in &request.vectors {
                let mut stream = table
                    .vector_search(vector.clone())
                    .map_err(search_err)?
                    .column(&request.vector_field)
                    .distance_type(distance_type(metric))
                    .bypass_vector_index()
                    .limit(request.top_k)
                    .select(Select::columns(&[request.id_field.as_str(), request.output_field.as_str()]))
                    .execute()
                    .await
                    .map_err(search_err)?;
                let mut hits = Vec::new();
                while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(search_err)? {
                    collect_hits(&batch, request, &mut hits)?;
                }
                out.push(hits);
            }
            Ok(out)
        })
    }

    fn count(&self, name: &str) -> Result<usize> {
        self.block_on("count", self.timeouts.manage, async {
            let table = self.open("count", name).await?;
            table.count_rows(None).await.map_err(|e| Error::index("count", e))
        })
    }
}

fn collect_hits(batch: &RecordBatch, request: &SearchRequest, hits: &mut Vec<SearchHit>) -> Result<()> {
    let ids = batch
        .column_by_name(&request.id_field)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| Error::Search(format!("id field '{}' missing or not i64", request.id_field)))?;
    let texts = batch
        .column_by_name(&request.output_field)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Search(format!("output field '{}' is not a string column", request.output_field)))?;
    let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
    for i in 0..batch.num_rows() {
        let score = distances.filter(|d| d.is_valid(i)).map(|d| d.value(i)).unwrap_or(0.0);
        hits.push(SearchHit { id: ids.value(i), score, text: texts.value(i).to_string() });
    }
    Ok(())
}
