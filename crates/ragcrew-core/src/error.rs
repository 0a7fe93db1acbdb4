use thiserror::Error;

/// Every failure the RAG core can report. Each variant names the operation
/// that produced it; callers pass errors up unmodified.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Index operation '{op}' failed: {message}")]
    Index { op: &'static str, message: String },

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Generation failed: empty response from {0}")]
    EmptyResponse(String),

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Agent '{agent}' failed: {source}")]
    AgentStage {
        agent: String,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn index(op: &'static str, message: impl std::fmt::Display) -> Self {
        Error::Index { op, message: message.to_string() }
    }

    /// Wrap a pipeline stage failure with the name of the agent that raised it.
    pub fn stage(agent: impl Into<String>, source: Error) -> Self {
        Error::AgentStage { agent: agent.into(), source: Box::new(source) }
    }

    /// Name of the failing agent when this is a pipeline stage error.
    pub fn failed_agent(&self) -> Option<&str> {
        match self {
            Error::AgentStage { agent, .. } => Some(agent),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
