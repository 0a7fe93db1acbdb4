use tracing::{debug, info};

use ragcrew_core::config::{VectorConfig, VectorTimeouts};
use ragcrew_core::error::{Error, Result};
use ragcrew_core::traits::Embedder;
use ragcrew_core::types::Metric;

use crate::aggregate::aggregate;
use crate::backend::{CollectionSchema, Consistency, InsertColumns, SearchRequest, VectorBackend};

/// Lifecycle of the managed collection. Only `Loaded` accepts inserts and
/// searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Absent,
    Created,
    Indexed,
    Loaded,
}

/// One named collection on a backend, plus the embedder that feeds it.
///
/// `ensure_collection` and `attach` take `&mut self`; everything after setup
/// takes `&self`, so a ready store can be shared behind an `Arc`.
pub struct VectorStore {
    backend: Box<dyn VectorBackend>,
    embedder: Box<dyn Embedder>,
    collection: String,
    id_field: String,
    vector_field: String,
    text_field: String,
    text_max_len: usize,
    metric: Metric,
    timeouts: VectorTimeouts,
    state: CollectionState,
    dim: Option<usize>,
}

impl VectorStore {
    pub fn new(backend: Box<dyn VectorBackend>, embedder: Box<dyn Embedder>, cfg: &VectorConfig) -> Self {
        Self {
            backend,
            embedder,
            collection: cfg.collection.clone(),
            id_field: cfg.id_field.clone(),
            vector_field: cfg.vector_field.clone(),
            text_field: cfg.text_field.clone(),
            text_max_len: cfg.text_max_len,
            metric: cfg.metric,
            timeouts: cfg.timeouts(),
            state: CollectionState::Absent,
            dim: None,
        }
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    fn schema(&self, dim: usize) -> CollectionSchema {
        CollectionSchema {
            id_field: self.id_field.clone(),
            vector_field: self.vector_field.clone(),
            text_field: self.text_field.clone(),
            dim,
            text_max_len: self.text_max_len,
            dynamic_fields: true,
            shards: 1,
        }
    }

    /// Reset the collection to an empty, indexed, loaded one of `dim`
    /// dimensions. Any existing collection of the same name is dropped.
    ///
    /// On failure the state is left at the last completed step.
    pub fn ensure_collection(&mut self, dim: usize) -> Result<()> {
        if dim == 0 {
            return Err(Error::Config("collection dimension must be positive".to_string()));
        }
        if dim != self.embedder.dim() {
            return Err(Error::Config(format!(
                "collection dimension {dim} does not match embedder dimension {}",
                self.embedder.dim()
            )));
        }
        let name = self.collection.clone();
        self.state = CollectionState::Absent;
        self.dim = None;

        if self.backend.has_collection(&name)? {
            info!(collection = %name, "dropping existing collection");
            self.backend.drop_collection(&name)?;
        }

        self.backend.create_collection(&name, &self.schema(dim))?;
        self.state = CollectionState::Created;
        self.dim = Some(dim);

        self.backend.create_index(&name, &self.vector_field, self.metric)?;
        self.backend.wait_for_index(&name, &self.vector_field, self.timeouts.index)?;
        self.state = CollectionState::Indexed;

        self.backend.load_collection(&name)?;
        self.backend.wait_for_load(&name, self.timeouts.load)?;
        self.state = CollectionState::Loaded;

        info!(collection = %name, dim, metric = %self.metric, "collection ready");
        Ok(())
    }

    /// Adopt an existing, already indexed collection without resetting it.
    /// Its vector dimension must match the embedder's. Only the load step runs.
    pub fn attach(&mut self) -> Result<()> {
        let name = self.collection.clone();
        self.state = CollectionState::Absent;
        self.dim = None;
        if !self.backend.has_collection(&name)? {
            return Err(Error::index("attach", format!("collection {name} does not exist")));
        }
        let stored = self.backend.vector_dim(&name, &self.vector_field)?;
        if stored != self.embedder.dim() {
            return Err(Error::Config(format!(
                "collection {name} stores {stored}-dim vectors, embedder produces {}",
                self.embedder.dim()
            )));
        }
        self.backend.load_collection(&name)?;
        self.backend.wait_for_load(&name, self.timeouts.load)?;
        self.state = CollectionState::Loaded;
        self.dim = Some(self.embedder.dim());
        info!(collection = %name, "attached to existing collection");
        Ok(())
    }

    fn require_loaded(&self, op: &str) -> Result<usize> {
        match (self.state, self.dim) {
            (CollectionState::Loaded, Some(dim)) => Ok(dim),
            (state, _) => {
                let message = format!("{op}: collection {} is not ready (state {state:?})", self.collection);
                Err(if op == "search" { Error::Search(message) } else { Error::index("insert", message) })
            }
        }
    }

    fn check_dims(&self, vectors: &[Vec<f32>], dim: usize) -> Result<()> {
        match vectors.iter().find(|v| v.len() != dim) {
            Some(bad) => Err(Error::Embedding(format!("vector has {} dims, collection expects {dim}", bad.len()))),
            None => Ok(()),
        }
    }

    /// Embed `texts` and insert them with ids `1..=N`. Ids restart at 1 on
    /// every call.
    pub fn insert_batch(&self, texts: &[String]) -> Result<usize> {
        let dim = self.require_loaded("insert")?;
        if texts.is_empty() {
            return Err(Error::EmptyInput("insert batch"));
        }
        if let Some(long) = texts.iter().find(|t| t.len() > self.text_max_len) {
            return Err(Error::index(
                "insert",
                format!("text of {} bytes exceeds {}", long.len(), self.text_max_len),
            ));
        }
        let vectors = self.embedder.embed_batch(texts)?;
        self.check_dims(&vectors, dim)?;

        let columns = InsertColumns { ids: (1..=texts.len() as i64).collect(), vectors, texts: texts.to_vec() };
        let inserted = self.backend.insert(&self.collection, &columns)?;
        info!(collection = %self.collection, inserted, "inserted batch");
        Ok(inserted)
    }

    /// Nearest-neighbour texts for each query vector, best first.
    pub fn search(&self, vectors: &[Vec<f32>], top_k: usize) -> Result<Vec<Vec<String>>> {
        let dim = self.require_loaded("search")?;
        if top_k == 0 {
            return Err(Error::Search("top_k must be positive".to_string()));
        }
        if vectors.is_empty() {
            return Err(Error::EmptyInput("search vectors"));
        }
        self.check_dims(vectors, dim)?;

        let request = SearchRequest {
            collection: self.collection.clone(),
            vector_field: self.vector_field.clone(),
            id_field: self.id_field.clone(),
            output_field: self.text_field.clone(),
            vectors: vectors.to_vec(),
            top_k,
            consistency: Consistency::Strong,
        };
        let hits = self.backend.search(&request)?;
        if hits.len() != vectors.len() {
            return Err(Error::Search(format!("expected {} result sets, got {}", vectors.len(), hits.len())));
        }
        debug!(queries = vectors.len(), top_k, "search done");
        Ok(hits.into_iter().map(|h| h.into_iter().map(|hit| hit.text).collect()).collect())
    }

    /// Embed the queries, then search. Arguments are validated before any
    /// embedding call.
    pub fn search_texts(&self, queries: &[String], top_k: usize) -> Result<Vec<Vec<String>>> {
        self.require_loaded("search")?;
        if top_k == 0 {
            return Err(Error::Search("top_k must be positive".to_string()));
        }
        if queries.is_empty() {
            return Err(Error::EmptyInput("queries"));
        }
        let vectors = self.embedder.embed_batch(queries)?;
        self.search(&vectors, top_k)
    }

    /// One context string per query: its top-k hit texts joined by newlines.
    pub fn aggregate_batch(&self, queries: &[String], top_k: usize) -> Result<Vec<String>> {
        if queries.is_empty() {
            return Err(Error::EmptyInput("queries"));
        }
        Ok(aggregate(self.search_texts(queries, top_k)?))
    }

    pub fn record_count(&self) -> Result<usize> {
        self.backend.count(&self.collection)
    }
}
