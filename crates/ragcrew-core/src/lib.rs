//! Core types and plumbing for the ragcrew pipeline.
//!
//! Holds the error taxonomy, the collaborator traits (`Embedder`, `Generator`,
//! `Renderer`), the paragraph chunker and the figment-backed configuration.
#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
