use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ragcrew_core::config::VectorConfig;
use ragcrew_core::error::{Error, Result};
use ragcrew_core::traits::{Embedder, Generator, Renderer};
use ragcrew_crew::{Agent, Crew, FileRenderer, FormattingAgent, GenerationAgent, Pipeline, RetrievalAgent, Task};
use ragcrew_embed::FakeEmbedder;
use ragcrew_llm::EchoGenerator;
use ragcrew_vector::{MemoryBackend, VectorStore};
use tempfile::TempDir;

const DIM: usize = 32;

struct CountingEmbedder {
    inner: FakeEmbedder,
    calls: Arc<AtomicUsize>,
}

impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::Generation("status 503 Service Unavailable: upstream busy".to_string()))
    }
}

/// Remembers every render; never touches the filesystem.
#[derive(Clone, Default)]
struct RecordingRenderer {
    rendered: Arc<Mutex<Vec<(String, String)>>>,
}

impl Renderer for RecordingRenderer {
    fn render(&self, text: &str, filename: &str) -> Result<String> {
        self.rendered.lock().unwrap().push((filename.to_string(), text.to_string()));
        Ok(format!("report saved to {filename}"))
    }
}

/// Records the `top_k` it was given and passes input through.
struct ProbeAgent {
    name: &'static str,
    seen_top_k: Arc<Mutex<Vec<usize>>>,
}

impl Agent for ProbeAgent {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, input: &[String], top_k: usize) -> Result<Vec<String>> {
        self.seen_top_k.lock().unwrap().push(top_k);
        Ok(input.iter().map(|s| format!("{}:{s}", self.name)).collect())
    }
}

fn knowledge() -> Vec<String> {
    [
        "rainwater barrels need a fine mesh screen",
        "compost piles should be turned weekly",
        "chickens need four hours of daylight to lay",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn loaded_store(backend: &MemoryBackend) -> (Arc<VectorStore>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let embedder = CountingEmbedder { inner: FakeEmbedder::new(DIM).unwrap(), calls: calls.clone() };
    let cfg = VectorConfig { backend: "memory".to_string(), ..VectorConfig::default() };
    let mut store = VectorStore::new(Box::new(backend.clone()), Box::new(embedder), &cfg);
    store.ensure_collection(DIM).unwrap();
    store.insert_batch(&knowledge()).unwrap();
    (Arc::new(store), calls)
}

#[test]
fn stage_two_failure_names_agent_and_skips_rendering() {
    let backend = MemoryBackend::new();
    let (store, _) = loaded_store(&backend);
    let renderer = RecordingRenderer::default();

    let pipeline = Pipeline::new()
        .with_agent(RetrievalAgent::new(store))
        .then(GenerationAgent::new(Arc::new(FailingGenerator)))
        .then(FormattingAgent::new(Box::new(renderer.clone())));
    let crew = Crew::new().with_task(Task::new("report_task", pipeline));

    let err = crew.run("report_task", &["compost piles".to_string()], 1).unwrap_err();
    assert_eq!(err.failed_agent(), Some("generation"));
    match err {
        Error::AgentStage { source, .. } => assert!(matches!(*source, Error::Generation(_))),
        other => panic!("unexpected error: {other}"),
    }
    assert!(renderer.rendered.lock().unwrap().is_empty(), "stage 3 must not run");
}

#[test]
fn empty_query_batch_is_rejected_before_any_call() {
    let backend = MemoryBackend::new();
    let (store, embed_calls) = loaded_store(&backend);
    let embeds_before = embed_calls.load(Ordering::SeqCst);
    backend.clear_calls();

    let crew = Crew::new().with_task(Task::new("report_task", Pipeline::new().with_agent(RetrievalAgent::new(store))));
    assert!(matches!(crew.run("report_task", &[], 3), Err(Error::EmptyInput(_))));
    assert!(matches!(crew.run("no_such_task", &[], 3), Err(Error::EmptyInput(_))), "emptiness is checked first");
    assert_eq!(embed_calls.load(Ordering::SeqCst), embeds_before);
    assert!(backend.calls().is_empty());
}

#[test]
fn unknown_task_is_reported() {
    let crew = Crew::new().with_task(Task::new("report_task", Pipeline::new()));
    match crew.run("summary_task", &["q".to_string()], 3) {
        Err(Error::TaskNotFound(name)) => assert_eq!(name, "summary_task"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn empty_pipeline_returns_input() {
    let crew = Crew::new().with_task(Task::new("noop", Pipeline::new()));
    let out = crew.run("noop", &["a".to_string(), "b".to_string()], 3).unwrap();
    assert_eq!(out, vec!["a", "b"]);
}

#[test]
fn stages_thread_outputs_and_share_top_k() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new()
        .with_agent(ProbeAgent { name: "one", seen_top_k: seen.clone() })
        .then(ProbeAgent { name: "two", seen_top_k: seen.clone() });
    assert_eq!(pipeline.agent_names(), vec!["one", "two"]);

    let out = pipeline.run(&["q".to_string()], 7).unwrap();
    assert_eq!(out, vec!["two:one:q"]);
    assert_eq!(*seen.lock().unwrap(), vec![7, 7]);
}

#[test]
fn duplicate_task_name_replaces_earlier_task() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut crew = Crew::new().with_task(Task::new("t", Pipeline::new()));
    crew.register(Task::new("t", Pipeline::new().with_agent(ProbeAgent { name: "new", seen_top_k: seen })));

    assert_eq!(crew.task_names(), vec!["t"]);
    assert_eq!(crew.run("t", &["x".to_string()], 1).unwrap(), vec!["new:x"]);
}

#[test]
fn full_flow_writes_reports_with_retrieved_context() {
    let tmp = TempDir::new().unwrap();
    let backend = MemoryBackend::new();
    let (store, _) = loaded_store(&backend);
    let generator: Arc<dyn Generator> = Arc::new(EchoGenerator::with_heading("# Answer"));

    let pipeline = Pipeline::new()
        .with_agent(RetrievalAgent::new(store))
        .then(GenerationAgent::new(generator.clone()).with_template("Context:\n{context}"))
        .then(
            FormattingAgent::new(Box::new(FileRenderer::new(tmp.path().join("output"))))
                .with_rewriter(generator)
                .with_template("Report:\n{context}"),
        );
    let crew = Crew::new().with_task(Task::new("report_task", pipeline));

    let queries = vec!["compost piles should be turned weekly".to_string(), "rainwater barrels".to_string()];
    let reports = crew.run("report_task", &queries, 2).unwrap();

    assert_eq!(reports.len(), 2);
    assert!(reports[0].starts_with("# Answer\n\nReport:\n# Answer\n\nContext:\ncompost piles should be turned weekly\n"));
    let written = fs::read_to_string(tmp.path().join("output/report_0.md")).unwrap();
    assert_eq!(written, reports[0]);
    assert!(tmp.path().join("output/report_1.md").exists());
}

#[test]
fn file_renderer_reports_saved_path() {
    let tmp = TempDir::new().unwrap();
    let renderer = FileRenderer::new(tmp.path().join("nested/out"));
    let status = renderer.render("hello", "report_0.md").unwrap();
    assert!(status.starts_with("report saved to "));
    assert!(status.ends_with("report_0.md"));
    assert_eq!(fs::read_to_string(tmp.path().join("nested/out/report_0.md")).unwrap(), "hello");
}

#[test]
fn file_renderer_keeps_earlier_reports() {
    let tmp = TempDir::new().unwrap();
    let renderer = FileRenderer::new(tmp.path());
    renderer.render("first", "report_0.md").unwrap();
    let status = renderer.render("second", "report_0.md").unwrap();
    assert!(status.ends_with("report_0-1.md"), "{status}");
    renderer.render("third", "report_0.md").unwrap();

    assert_eq!(fs::read_to_string(tmp.path().join("report_0.md")).unwrap(), "first");
    assert_eq!(fs::read_to_string(tmp.path().join("report_0-1.md")).unwrap(), "second");
    assert_eq!(fs::read_to_string(tmp.path().join("report_0-2.md")).unwrap(), "third");
}
