//! Vector index for ragcrew.
//!
//! `VectorStore` drives a `VectorBackend` through the collection lifecycle
//! (absent, created, indexed, loaded), inserts embedded chunks and answers
//! nearest-neighbour queries. Two backends ship here: LanceDB on local disk
//! and an in-memory one for tests and dry runs.

pub mod aggregate;
pub mod backend;
pub mod schema;
pub mod store;
pub mod table;

pub use aggregate::aggregate;
pub use backend::{
    CollectionSchema, Consistency, InsertColumns, LanceBackend, MemoryBackend, SearchRequest, VectorBackend,
};
pub use store::{CollectionState, VectorStore};

use std::path::Path;

use ragcrew_core::config::{resolve_with_base, VectorConfig};
use ragcrew_core::error::{Error, Result};

/// Build the configured backend. Relative LanceDB paths resolve against `base`.
pub fn open_backend(cfg: &VectorConfig, base: &Path) -> Result<Box<dyn VectorBackend>> {
    match cfg.backend.as_str() {
        "lance" => Ok(Box::new(LanceBackend::connect(&resolve_with_base(base, &cfg.uri), cfg.timeouts())?)),
        "memory" => Ok(Box::new(MemoryBackend::new())),
        other => Err(Error::Config(format!("unknown vector backend '{other}'"))),
    }
}
