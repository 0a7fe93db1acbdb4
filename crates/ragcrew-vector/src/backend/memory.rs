//! In-process backend with exact search.
//!
//! Records every call by operation name and can be told to fail at one of
//! them, which makes lifecycle and short-circuit behaviour observable in
//! tests. Clones share state.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use ragcrew_core::error::{Error, Result};
use ragcrew_core::types::{Metric, SearchHit};

use crate::backend::{CollectionSchema, InsertColumns, SearchRequest, VectorBackend};

struct Record {
    id: i64,
    vector: Vec<f32>,
    text: String,
}

struct MemoryCollection {
    schema: CollectionSchema,
    index: Option<(String, Metric)>,
    loaded: bool,
    records: Vec<Record>,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, MemoryCollection>,
    calls: Vec<String>,
    fail_at: Option<String>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose `op` call always fails.
    pub fn failing_at(op: &str) -> Self {
        let backend = Self::default();
        backend.fail_at(Some(op));
        backend
    }

    pub fn fail_at(&self, op: Option<&str>) {
        self.state().fail_at = op.map(str::to_string);
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Stored ids of `name`, in insertion order.
    pub fn record_ids(&self, name: &str) -> Vec<i64> {
        self.state()
            .collections
            .get(name)
            .map(|c| c.records.iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, op: &'static str) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.state();
        state.calls.push(op.to_string());
        if state.fail_at.as_deref() == Some(op) {
            return Err(if op == "search" {
                Error::Search("injected failure".to_string())
            } else {
                Error::index(op, "injected failure")
            });
        }
        Ok(state)
    }
}

fn missing(op: &'static str, name: &str) -> Error {
    Error::index(op, format!("collection {name} does not exist"))
}

fn collection_mut<'a>(state: &'a mut MemoryState, op: &'static str, name: &str) -> Result<&'a mut MemoryCollection> {
    state.collections.get_mut(name).ok_or_else(|| missing(op, name))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Higher is better for every metric.
fn similarity(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => {
            let norm = (dot(a, a).sqrt() * dot(b, b).sqrt()).max(1e-12);
            dot(a, b) / norm
        }
        Metric::Dot => dot(a, b),
        Metric::L2 => -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>(),
    }
}

impl VectorBackend for MemoryBackend {
    fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.enter("has_collection")?.collections.contains_key(name))
    }

    fn drop_collection(&self, name: &str) -> Result<()> {
        self.enter("drop_collection")?.collections.remove(name);
        Ok(())
    }

    fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()> {
        let mut state = self.enter("create_collection")?;
        if schema.dim == 0 {
            return Err(Error::Config("collection dimension must be positive".to_string()));
        }
        if state.collections.contains_key(name) {
            return Err(Error::index("create_collection", format!("collection {name} already exists")));
        }
        state.collections.insert(
            name.to_string(),
            MemoryCollection { schema: schema.clone(), index: None, loaded: false, records: Vec::new() },
        );
        Ok(())
    }

    fn vector_dim(&self, name: &str, field: &str) -> Result<usize> {
        let mut state = self.enter("vector_dim")?;
        let collection = collection_mut(&mut state, "vector_dim", name)?;
        if collection.schema.vector_field != field {
            return Err(Error::index("vector_dim", format!("{name} has no vector field '{field}'")));
        }
        Ok(collection.schema.dim)
    }

    fn create_index(&self, name: &str, field: &str, metric: Metric) -> Result<()> {
        let mut state = self.enter("create_index")?;
        let collection = collection_mut(&mut state, "create_index", name)?;
        if collection.schema.vector_field != field {
            return Err(Error::index("create_index", format!("{name} has no vector field '{field}'")));
        }
        collection.index = Some((field.to_string(), metric));
        Ok(())
    }

    fn wait_for_index(&self, name: &str, field: &str, _deadline: Duration) -> Result<()> {
        let mut state = self.enter("wait_for_index")?;
        let collection = collection_mut(&mut state, "wait_for_index", name)?;
        match &collection.index {
            Some((indexed, _)) if indexed == field => Ok(()),
            _ => Err(Error::index("wait_for_index", format!("no index on {name}.{field}"))),
        }
    }

    fn load_collection(&self, name: &str) -> Result<()> {
        let mut state = self.enter("load_collection")?;
        collection_mut(&mut state, "load_collection", name)?.loaded = true;
        Ok(())
    }

    fn wait_for_load(&self, name: &str, _deadline: Duration) -> Result<()> {
        let mut state = self.enter("wait_for_load")?;
        if collection_mut(&mut state, "wait_for_load", name)?.loaded {
            Ok(())
        } else {
            Err(Error::index("wait_for_load", format!("{name} is not loaded")))
        }
    }

    fn insert(&self, name: &str, columns: &InsertColumns) -> Result<usize> {
        let mut state = self.enter("insert")?;
        let collection = collection_mut(&mut state, "insert", name)?;
        if columns.vectors.len() != columns.len() || columns.texts.len() != columns.len() {
            return Err(Error::index("insert", "column lengths differ"));
        }
        let dim = collection.schema.dim;
        if let Some(bad) = columns.vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::index("insert", format!("vector has {} dims, collection expects {dim}", bad.len())));
        }
        let limit = collection.schema.text_max_len;
        if let Some(long) = columns.texts.iter().find(|t| t.len() > limit) {
            return Err(Error::index("insert", format!("text of {} bytes exceeds {limit}", long.len())));
        }
        for ((id, vector), text) in columns.ids.iter().zip(&columns.vectors).zip(&columns.texts) {
            collection.records.push(Record { id: *id, vector: vector.clone(), text: text.clone() });
        }
        debug!(collection = name, rows = columns.len(), "inserted");
        Ok(columns.len())
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<Vec<SearchHit>>> {
        let state = self.enter("search")?;
        let name = request.collection.as_str();
        let collection = state
            .collections
            .get(name)
            .ok_or_else(|| Error::Search(format!("collection {name} does not exist")))?;
        if !collection.loaded {
            return Err(Error::Search(format!("collection {name} is not loaded")));
        }
        let metric = match &collection.index {
            Some((field, metric)) if *field == request.vector_field => *metric,
            _ => return Err(Error::Search(format!("no index on {name}.{}", request.vector_field))),
        };
        if request.output_field != collection.schema.text_field {
            return Err(Error::Search(format!("output field '{}' is not a string column", request.output_field)));
        }

        let mut out = Vec::with_capacity(request.vectors.len());
        for query in &request.vectors {
            if query.len() != collection.schema.dim {
                return Err(Error::Search(format!(
                    "query has {} dims, collection expects {}",
                    query.len(),
                    collection.schema.dim
                )));
            }
            let mut scored: Vec<SearchHit> = collection
                .records
                .iter()
                .map(|r| SearchHit { id: r.id, score: similarity(metric, query, &r.vector), text: r.text.clone() })
                .collect();
            scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(request.top_k);
            out.push(scored);
        }
        Ok(out)
    }

    fn count(&self, name: &str) -> Result<usize> {
        let state = self.enter("count")?;
        state.collections.get(name).map(|c| c.records.len()).ok_or_else(|| missing("count", name))
    }
}
