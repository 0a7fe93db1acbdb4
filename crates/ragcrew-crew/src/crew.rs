use std::collections::BTreeMap;

use tracing::{info, warn};

use ragcrew_core::error::{Error, Result};

use crate::pipeline::Task;

/// Task registry: name to pipeline.
#[derive(Default)]
pub struct Crew {
    tasks: BTreeMap<String, Task>,
}

impl Crew {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.register(task);
        self
    }

    /// Register `task`; an existing task of the same name is replaced.
    pub fn register(&mut self, task: Task) {
        let name = task.name().to_string();
        if self.tasks.insert(name.clone(), task).is_some() {
            warn!(task = %name, "replaced existing task");
        }
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    pub fn run(&self, task: &str, queries: &[String], top_k: usize) -> Result<Vec<String>> {
        if queries.is_empty() {
            return Err(Error::EmptyInput("queries"));
        }
        let entry = self.tasks.get(task).ok_or_else(|| Error::TaskNotFound(task.to_string()))?;
        info!(task, queries = queries.len(), top_k, "running task");
        entry.pipeline().run(queries, top_k)
    }
}
