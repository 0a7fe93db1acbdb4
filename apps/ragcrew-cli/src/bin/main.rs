use std::io;
use std::sync::Arc;

use clap::Parser;
use ragcrew_cli::{build_crew, ingest, init_tracing, load_settings, open_store, print_reports, run_interactive, Cli, REPORT_TASK};
use ragcrew_core::config::resolve_with_base;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let (settings, base) = load_settings(cli.config_dir.as_deref()).map_err(|e| {
        eprintln!("Error loading config: {:#}", e);
        e
    })?;
    println!("Multi-Agent RAG System Starting...");

    let mut store = open_store(&settings, &base)?;
    if cli.skip_ingest {
        store.attach()?;
        println!("📦 Using existing collection '{}'", store.collection());
    } else {
        let data_dir = cli.data_dir.clone().unwrap_or_else(|| resolve_with_base(&base, &settings.data.raw_txt_dir));
        let inserted = ingest(&mut store, &settings, &data_dir)?;
        println!("📊 Indexed {} chunks from {}", inserted, data_dir.display());
    }

    let crew = build_crew(Arc::new(store), &settings, &base)?;
    let top_k = cli.topk;
    if !cli.query.trim().is_empty() {
        let reports = crew.run(REPORT_TASK, &[cli.query.trim().to_string()], top_k)?;
        print_reports(&mut io::stdout().lock(), &reports)?;
    } else {
        run_interactive(io::stdin().lock(), io::stdout().lock(), |query| {
            Ok(crew.run(REPORT_TASK, &[query.to_string()], top_k)?)
        })?;
    }

    println!("System Finished");
    Ok(())
}
