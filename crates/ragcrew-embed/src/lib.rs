//! Embedding gateway: an OpenAI-compatible HTTP embedder and a deterministic
//! offline stand-in, both behind `ragcrew_core::traits::Embedder`.

mod fake;
mod openai;

pub use fake::FakeEmbedder;
pub use openai::OpenAiEmbedder;

use ragcrew_core::config::EmbeddingConfig;
use ragcrew_core::error::{Error, Result};
use ragcrew_core::traits::Embedder;
use tracing::info;

/// True when `APP_USE_FAKE_EMBEDDINGS` is `1` or `true`.
pub fn fake_embeddings_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Build the configured embedder. The fake embedder wins when requested
/// through the environment, keeping the configured dimension.
pub fn get_default_embedder(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    if fake_embeddings_requested() {
        info!(dim = cfg.dimension, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(cfg.dimension)?));
    }
    match cfg.api_type.to_ascii_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiEmbedder::new(cfg)?)),
        other => Err(Error::Config(format!("unsupported embedding api_type '{other}'"))),
    }
}
