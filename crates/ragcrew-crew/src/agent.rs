use std::sync::Arc;

use tracing::{debug, info};

use ragcrew_core::error::Result;
use ragcrew_core::traits::{Generator, Renderer};
use ragcrew_vector::VectorStore;

/// Placeholder replaced by each stage input in prompt templates.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

pub const DEFAULT_GENERATION_TEMPLATE: &str = "Answer the user's question using only the reference material below. \
If the material does not contain the answer, say so.\n\nReference material:\n{context}";

pub const DEFAULT_REPORT_TEMPLATE: &str =
    "Rewrite the following answer as a short Markdown report with a title and a summary section:\n\n{context}";

/// One stage of a pipeline: a batch of strings in, a batch of strings out.
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, input: &[String], top_k: usize) -> Result<Vec<String>>;
}

fn fill(template: &str, context: &str) -> String {
    template.replace(CONTEXT_PLACEHOLDER, context)
}

/// Queries in, one aggregated context per query out.
pub struct RetrievalAgent {
    store: Arc<VectorStore>,
}

impl RetrievalAgent {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }
}

impl Agent for RetrievalAgent {
    fn name(&self) -> &str {
        "retrieval"
    }

    fn run(&self, input: &[String], top_k: usize) -> Result<Vec<String>> {
        self.store.aggregate_batch(input, top_k)
    }
}

/// Contexts in, one completion per context out, in input order.
pub struct GenerationAgent {
    generator: Arc<dyn Generator>,
    template: String,
}

impl GenerationAgent {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator, template: DEFAULT_GENERATION_TEMPLATE.to_string() }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

impl Agent for GenerationAgent {
    fn name(&self) -> &str {
        "generation"
    }

    fn run(&self, input: &[String], _top_k: usize) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(input.len());
        for (i, context) in input.iter().enumerate() {
            debug!(item = i, "generating");
            out.push(self.generator.generate(&fill(&self.template, context))?);
        }
        Ok(out)
    }
}

/// Answers in, rendered reports out. Item `i` is rendered as `report_{i}.md`;
/// the renderer decides how name clashes with earlier runs resolve.
pub struct FormattingAgent {
    renderer: Box<dyn Renderer>,
    rewriter: Option<Arc<dyn Generator>>,
    template: String,
}

impl FormattingAgent {
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self { renderer, rewriter: None, template: DEFAULT_REPORT_TEMPLATE.to_string() }
    }

    /// Rewrite each answer through `generator` before rendering.
    pub fn with_rewriter(mut self, generator: Arc<dyn Generator>) -> Self {
        self.rewriter = Some(generator);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

impl Agent for FormattingAgent {
    fn name(&self) -> &str {
        "report"
    }

    fn run(&self, input: &[String], _top_k: usize) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(input.len());
        for (i, answer) in input.iter().enumerate() {
            let report = match &self.rewriter {
                Some(generator) => generator.generate(&fill(&self.template, answer))?,
                None => answer.clone(),
            };
            let status = self.renderer.render(&report, &format!("report_{i}.md"))?;
            info!("{status}");
            out.push(report);
        }
        Ok(out)
    }
}
