use tracing::{debug, warn};

use ragcrew_core::error::{Error, Result};

use crate::agent::Agent;

/// Ordered stages. The first failing stage stops the run; its error comes
/// back wrapped with the stage's agent name.
#[derive(Default)]
pub struct Pipeline {
    agents: Vec<Box<dyn Agent>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent: impl Agent + 'static) -> Self {
        self.agents.push(Box::new(agent));
        self
    }

    pub fn then(self, agent: impl Agent + 'static) -> Self {
        self.with_agent(agent)
    }

    pub fn push(&mut self, agent: Box<dyn Agent>) {
        self.agents.push(agent);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// Thread `input` through every stage; `top_k` reaches each one unchanged.
    /// With no stages the input is returned as is.
    pub fn run(&self, input: &[String], top_k: usize) -> Result<Vec<String>> {
        let mut current = input.to_vec();
        for agent in &self.agents {
            debug!(agent = agent.name(), items = current.len(), "running stage");
            current = agent.run(&current, top_k).map_err(|e| {
                warn!(agent = agent.name(), error = %e, "stage failed");
                Error::stage(agent.name(), e)
            })?;
        }
        Ok(current)
    }
}

pub struct Task {
    name: String,
    pipeline: Pipeline,
}

impl Task {
    pub fn new(name: impl Into<String>, pipeline: Pipeline) -> Self {
        Self { name: name.into(), pipeline }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
