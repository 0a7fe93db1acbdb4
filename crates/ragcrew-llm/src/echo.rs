use ragcrew_core::error::Result;
use ragcrew_core::traits::Generator;

/// Offline generator: returns the prompt under a fixed heading.
#[derive(Debug, Clone)]
pub struct EchoGenerator {
    heading: String,
}

impl Default for EchoGenerator {
    fn default() -> Self {
        Self { heading: "## Echo".to_string() }
    }
}

impl EchoGenerator {
    pub fn with_heading(heading: impl Into<String>) -> Self {
        Self { heading: heading.into() }
    }
}

impl Generator for EchoGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        Ok(format!("{}\n\n{}", self.heading, prompt))
    }
}
