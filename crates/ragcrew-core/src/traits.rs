use crate::error::{Error, Result};

/// Texts per embedding group. Groups bound a future batched request; today
/// each text in a group is still embedded with its own call.
pub const EMBED_BATCH_SIZE: usize = 25;

pub trait Embedder: Send + Sync {
    /// Dimension of every vector this embedder returns.
    fn dim(&self) -> usize;

    /// Embed one text. Empty text is rejected with `EmptyInput`.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed `texts` in input order, group by group. The first failure aborts
    /// the whole batch; no partial result is returned.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(Error::EmptyInput("embedding batch"));
        }
        let mut out = Vec::with_capacity(texts.len());
        for group in texts.chunks(EMBED_BATCH_SIZE) {
            for text in group {
                out.push(self.embed(text)?);
            }
        }
        Ok(out)
    }
}

pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

pub trait Renderer: Send + Sync {
    /// Persist `text` under `filename` and return a human-readable status.
    fn render(&self, text: &str, filename: &str) -> Result<String>;
}
