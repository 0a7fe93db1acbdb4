//! The vector index backend seam.
//!
//! A backend owns named collections of `(id, vector, text)` records and
//! exposes the management calls the store drives through its lifecycle:
//! create, index, load, then insert and search. Every call blocks.

use std::time::Duration;

use ragcrew_core::config::VectorConfig;
use ragcrew_core::error::Result;
use ragcrew_core::types::{Metric, SearchHit};

pub mod lance;
pub mod memory;

pub use lance::LanceBackend;
pub use memory::MemoryBackend;

/// Shape of a collection: primary `i64` id, one `f32` vector of `dim`
/// elements, one text field bounded to `text_max_len` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub id_field: String,
    pub vector_field: String,
    pub text_field: String,
    pub dim: usize,
    pub text_max_len: usize,
    pub dynamic_fields: bool,
    pub shards: u32,
}

impl CollectionSchema {
    pub fn from_config(cfg: &VectorConfig, dim: usize) -> Self {
        Self {
            id_field: cfg.id_field.clone(),
            vector_field: cfg.vector_field.clone(),
            text_field: cfg.text_field.clone(),
            dim,
            text_max_len: cfg.text_max_len,
            dynamic_fields: true,
            shards: 1,
        }
    }
}

/// Column-oriented insert payload; all three columns have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertColumns {
    pub ids: Vec<i64>,
    pub vectors: Vec<Vec<f32>>,
    pub texts: Vec<String>,
}

impl InsertColumns {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Reads observe every write acknowledged before the search started.
    #[default]
    Strong,
    Eventually,
}

/// One nearest-neighbour query per entry in `vectors`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub collection: String,
    pub vector_field: String,
    pub id_field: String,
    pub output_field: String,
    pub vectors: Vec<Vec<f32>>,
    pub top_k: usize,
    pub consistency: Consistency,
}

pub trait VectorBackend: Send + Sync {
    fn has_collection(&self, name: &str) -> Result<bool>;
    fn drop_collection(&self, name: &str) -> Result<()>;
    fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()>;
    /// Declared dimension of the vector `field` of an existing collection.
    fn vector_dim(&self, name: &str, field: &str) -> Result<usize>;

    fn create_index(&self, name: &str, field: &str, metric: Metric) -> Result<()>;
    /// Block until the index on `field` is usable or `deadline` passes.
    fn wait_for_index(&self, name: &str, field: &str, deadline: Duration) -> Result<()>;

    fn load_collection(&self, name: &str) -> Result<()>;
    /// Block until the collection is searchable or `deadline` passes.
    fn wait_for_load(&self, name: &str, deadline: Duration) -> Result<()>;

    /// Insert all rows in one call; returns the number of rows written.
    fn insert(&self, name: &str, columns: &InsertColumns) -> Result<usize>;

    /// Hits per query vector, best first.
    fn search(&self, request: &SearchRequest) -> Result<Vec<Vec<SearchHit>>>;

    fn count(&self, name: &str) -> Result<usize>;
}
