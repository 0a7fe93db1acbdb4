use std::cell::RefCell;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use clap::Parser;
use ragcrew_cli::{build_crew, ingest, open_store, run_interactive, Cli, REPORT_BANNER, REPORT_TASK};
use ragcrew_core::config::Settings;
use ragcrew_vector::CollectionState;
use tempfile::TempDir;

fn run_script(script: &str, fail_on: Option<&str>) -> (String, Vec<String>) {
    let seen = RefCell::new(Vec::new());
    let mut output = Vec::new();
    run_interactive(Cursor::new(script.as_bytes().to_vec()), &mut output, |query| {
        seen.borrow_mut().push(query.to_string());
        if Some(query) == fail_on {
            anyhow::bail!("backend unavailable");
        }
        Ok(vec![format!("report for {query}")])
    })
    .expect("loop");
    (String::from_utf8(output).unwrap(), seen.into_inner())
}

#[test]
fn exit_in_any_case_stops_without_calling_handler() {
    for word in ["exit", "EXIT", "Exit", "  eXiT  "] {
        let (out, seen) = run_script(&format!("{word}\nnever asked\n"), None);
        assert!(seen.is_empty(), "{word:?} must not reach the handler");
        assert!(out.starts_with("Enter your query (type 'exit' to quit):\n> "));
    }
}

#[test]
fn blank_lines_reprompt_and_are_never_handled() {
    let (out, seen) = run_script("\n   \n\t\nwhat is compost?\nexit\n", None);
    assert_eq!(seen, vec!["what is compost?"]);
    assert_eq!(out.matches("> ").count(), 5);
    assert!(out.contains(&format!("\n{REPORT_BANNER}\nreport for what is compost?\n")));
}

#[test]
fn end_of_input_terminates_loop() {
    let (_, seen) = run_script("first\nsecond", None);
    assert_eq!(seen, vec!["first", "second"]);
}

#[test]
fn failed_query_is_reported_and_loop_continues() {
    let (out, seen) = run_script("bad\ngood\nexit\n", Some("bad"));
    assert_eq!(seen, vec!["bad", "good"]);
    assert!(out.contains("Query failed: backend unavailable"));
    assert!(out.contains("report for good"));
}

#[test]
fn cli_defaults() {
    let cli = Cli::try_parse_from(["ragcrew"]).unwrap();
    assert_eq!(cli.topk, 3);
    assert!(cli.query.is_empty());
    assert!(!cli.skip_ingest);

    let cli = Cli::try_parse_from(["ragcrew", "--query", "hello", "--topk", "5", "--skip-ingest"]).unwrap();
    assert_eq!(cli.query, "hello");
    assert_eq!(cli.topk, 5);
    assert!(cli.skip_ingest);
}

fn offline_settings(tmp: &TempDir) -> Settings {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    std::env::set_var("APP_USE_FAKE_LLM", "1");
    let mut settings = Settings::default();
    settings.embedding.dimension = 32;
    settings.vector.backend = "memory".to_string();
    settings.report.output_dir = tmp.path().join("output").to_string_lossy().to_string();
    settings
}

#[test]
fn ingest_and_single_query_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("txt");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("garden.txt"), "Tomatoes need staking.\n\nGarlic is planted in autumn.").unwrap();
    fs::write(data.join("water.txt"), "Boil water for one minute to disinfect it.").unwrap();
    let settings = offline_settings(&tmp);

    let mut store = open_store(&settings, tmp.path()).unwrap();
    assert_eq!(ingest(&mut store, &settings, &data).unwrap(), 3);
    assert_eq!(store.state(), CollectionState::Loaded);

    let crew = build_crew(Arc::new(store), &settings, tmp.path()).unwrap();
    let reports = crew.run(REPORT_TASK, &["Garlic is planted in autumn.".to_string()], 1).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("Garlic is planted in autumn."));
    assert!(tmp.path().join("output/report_0.md").exists());
}

#[test]
fn ingest_of_empty_directory_fails() {
    let tmp = TempDir::new().unwrap();
    let settings = offline_settings(&tmp);
    let mut store = open_store(&settings, tmp.path()).unwrap();
    let err = ingest(&mut store, &settings, tmp.path()).unwrap_err();
    assert!(err.to_string().contains("no text chunks"));
    assert_eq!(store.state(), CollectionState::Absent);
}
