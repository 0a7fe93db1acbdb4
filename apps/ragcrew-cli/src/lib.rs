//! Wiring shared by the `ragcrew` and `ragcrew-indexer` binaries: settings,
//! ingestion, crew assembly and the interactive query loop.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ragcrew_core::config::{resolve_with_base, Config, Settings};
use ragcrew_core::data_processor::DataProcessor;
use ragcrew_core::traits::Generator;
use ragcrew_crew::{Crew, FileRenderer, FormattingAgent, GenerationAgent, Pipeline, RetrievalAgent, Task};
use ragcrew_embed::get_default_embedder;
use ragcrew_llm::get_default_generator;
use ragcrew_vector::{open_backend, VectorStore};

pub const REPORT_TASK: &str = "report_task";
pub const REPORT_BANNER: &str = "===== Report Generated =====";

#[derive(Parser, Debug)]
#[command(name = "ragcrew", version, about = "Retrieval-augmented report generation over local text files")]
pub struct Cli {
    /// Input query; without one an interactive prompt starts
    #[arg(long, default_value = "")]
    pub query: String,

    /// Number of chunks retrieved per query
    #[arg(long, default_value_t = 3)]
    pub topk: usize,

    /// Directory holding config.toml (defaults to the working directory)
    #[arg(long, env = "RAGCREW_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory of .txt files to ingest (overrides data.raw_txt_dir)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Reuse the existing collection instead of rebuilding it
    #[arg(long)]
    pub skip_ingest: bool,
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

/// Load and validate settings. Relative paths in them resolve against the
/// returned base directory.
pub fn load_settings(config_dir: Option<&Path>) -> anyhow::Result<(Settings, PathBuf)> {
    let base = config_dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let settings = Config::load_from(&base)
        .and_then(|config| config.settings())
        .with_context(|| format!("loading config from {}", base.display()))?;
    Ok((settings, base))
}

pub fn open_store(settings: &Settings, base: &Path) -> anyhow::Result<VectorStore> {
    let backend = open_backend(&settings.vector, base)?;
    let embedder = get_default_embedder(&settings.embedding)?;
    Ok(VectorStore::new(backend, embedder, &settings.vector))
}

/// Rebuild the collection from every `.txt` file under `data_dir`.
/// Returns the number of chunks inserted.
pub fn ingest(store: &mut VectorStore, settings: &Settings, data_dir: &Path) -> anyhow::Result<usize> {
    let processor = DataProcessor::with_max_chunk_chars(settings.data.max_chunk_chars)?;
    let chunks = processor
        .process_directory(data_dir)
        .with_context(|| format!("reading documents from {}", data_dir.display()))?;
    if chunks.is_empty() {
        warn!(dir = %data_dir.display(), "nothing to ingest");
        bail!("no text chunks found under {}", data_dir.display());
    }
    store.ensure_collection(settings.embedding.dimension)?;
    let texts: Vec<String> = chunks.into_iter().map(|c| c.content).collect();
    let inserted = store.insert_batch(&texts)?;
    info!(inserted, collection = store.collection(), "ingestion complete");
    Ok(inserted)
}

/// Retrieval, generation and (when enabled) report rendering, registered as
/// `report_task`.
pub fn build_crew(store: Arc<VectorStore>, settings: &Settings, base: &Path) -> anyhow::Result<Crew> {
    let generator: Arc<dyn Generator> = Arc::from(get_default_generator(&settings.llm)?);
    let mut pipeline = Pipeline::new()
        .with_agent(RetrievalAgent::new(store))
        .then(GenerationAgent::new(generator.clone()));
    if settings.report.enabled {
        let renderer = FileRenderer::new(resolve_with_base(base, &settings.report.output_dir));
        let mut formatter = FormattingAgent::new(Box::new(renderer));
        if settings.report.use_llm {
            formatter = formatter.with_rewriter(generator);
        }
        pipeline = pipeline.then(formatter);
    }
    Ok(Crew::new().with_task(Task::new(REPORT_TASK, pipeline)))
}

pub fn print_reports<W: Write>(out: &mut W, reports: &[String]) -> io::Result<()> {
    for report in reports {
        writeln!(out, "\n{REPORT_BANNER}")?;
        writeln!(out, "{report}")?;
    }
    Ok(())
}

/// Prompt for queries until `exit` (any case) or end of input. Blank lines
/// re-prompt; a failed query is reported and the loop goes on.
pub fn run_interactive<R, W, F>(mut input: R, mut output: W, mut handler: F) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(&str) -> anyhow::Result<Vec<String>>,
{
    writeln!(output, "Enter your query (type 'exit' to quit):")?;
    let mut line = String::new();
    loop {
        write!(output, "> ")?;
        output.flush()?;
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                writeln!(output, "read input failed: {e}")?;
                continue;
            }
            Err(e) => return Err(e),
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }
        match handler(query) {
            Ok(reports) => print_reports(&mut output, &reports)?,
            Err(e) => writeln!(output, "Query failed: {e:#}")?,
        }
    }
    Ok(())
}
