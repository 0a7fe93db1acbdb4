//! Agents, pipelines and the task registry.
//!
//! A `Pipeline` is an ordered list of agents; each stage consumes the previous
//! stage's outputs. A `Crew` maps task names to pipelines and is the single
//! entry point for a batch of queries.

pub mod agent;
pub mod crew;
pub mod pipeline;
pub mod render;

pub use agent::{Agent, FormattingAgent, GenerationAgent, RetrievalAgent};
pub use crew::Crew;
pub use pipeline::{Pipeline, Task};
pub use render::FileRenderer;
