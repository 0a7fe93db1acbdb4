use std::path::PathBuf;

use clap::Parser;
use ragcrew_cli::{ingest, init_tracing, load_settings, open_store};
use ragcrew_core::config::resolve_with_base;

/// Rebuild the vector collection from a directory of .txt files.
#[derive(Parser, Debug)]
#[command(name = "ragcrew-indexer", version)]
struct Args {
    /// Directory of .txt files (overrides data.raw_txt_dir)
    data_dir: Option<PathBuf>,

    /// Directory holding config.toml
    #[arg(long, env = "RAGCREW_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let (settings, base) = load_settings(args.config_dir.as_deref()).map_err(|e| {
        eprintln!("Error loading config: {:#}", e);
        e
    })?;
    let data_dir = args.data_dir.unwrap_or_else(|| resolve_with_base(&base, &settings.data.raw_txt_dir));

    println!("ragcrew indexer\n===============");
    println!("Data directory: {}", data_dir.display());
    println!("Collection: {} ({} backend)", settings.vector.collection, settings.vector.backend);

    let mut store = open_store(&settings, &base)?;
    let inserted = ingest(&mut store, &settings, &data_dir)?;

    println!("\n✅ Indexing completed successfully!");
    println!("📊 Inserted {} chunks, collection now holds {}", inserted, store.record_count()?);
    println!("\n💡 To query, use: cargo run --bin ragcrew -- --skip-ingest --query '<query>'");
    Ok(())
}
