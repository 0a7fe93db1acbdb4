use std::fs;
use std::io::Cursor;
use std::num::NonZeroUsize;
use tempfile::TempDir;

use ragcrew_core::config::{resolve_with_base, Config, Settings};
use ragcrew_core::data_processor::{chunk_reader, chunk_text, split_to_chunks, DataProcessor};
use ragcrew_core::error::Error;
use ragcrew_core::types::Metric;

fn limit(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[test]
fn long_paragraph_splits_at_limit() {
    let text = "a".repeat(300);
    let chunks = chunk_text(&text, limit(170));
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].chars().count(), 170);
    assert_eq!(chunks[1].chars().count(), 130);
}

#[test]
fn limit_counts_chars_not_bytes() {
    let text = "检索增强生成".repeat(50); // 300 chars, 900 bytes
    let chunks = chunk_text(&text, limit(170));
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].chars().count(), 170);
    assert!(chunks[0].len() <= 512);
    assert_eq!(chunks.concat(), text);
}

#[test]
fn blank_input_yields_no_chunks() {
    assert!(chunk_text("", limit(10)).is_empty());
    assert!(chunk_text("   \n\n\t\n  ", limit(10)).is_empty());
}

#[test]
fn lines_are_trimmed_and_joined_per_paragraph() {
    let text = "  first line  \nsecond line\n\n\n third paragraph \n";
    let chunks = chunk_text(text, limit(170));
    assert_eq!(chunks, vec!["first line second line".to_string(), "third paragraph".to_string()]);
}

#[test]
fn chunks_reconstruct_paragraph_and_stay_bounded() {
    let lines = ["The quick brown fox", "jumps over the lazy dog", "while the cat watches"];
    let text = lines.join("\n");
    let joined = lines.join(" ");
    for max in 1..=joined.chars().count() + 1 {
        let chunks = chunk_text(&text, limit(max));
        for c in &chunks {
            assert!(!c.is_empty());
            assert!(c.chars().count() <= max, "chunk exceeds {max}");
        }
        assert_eq!(chunks.concat(), joined, "reconstruction failed at {max}");
    }
}

#[test]
fn split_has_no_word_boundary_awareness() {
    let chunks = split_to_chunks("hello world", limit(4));
    assert_eq!(chunks, vec!["hell", "o wo", "rld"]);
}

#[test]
fn reader_matches_in_memory_chunker() {
    let text = "alpha\nbeta\n\ngamma delta epsilon\n";
    let from_reader = chunk_reader(Cursor::new(text.as_bytes()), limit(8)).expect("read");
    assert_eq!(from_reader, chunk_text(text, limit(8)));
}

#[test]
fn reader_surfaces_decode_errors() {
    let bytes: &[u8] = &[b'o', b'k', b'\n', 0xff, 0xfe, b'\n'];
    let err = chunk_reader(Cursor::new(bytes), limit(8)).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "Short text\n").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_directory(tmp.path()).expect("process");

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].content, "Short text");
    assert_eq!(chunks[0].doc_id, "a");
    assert_eq!(chunks[0].chunk_index, 0);
}

#[test]
fn process_directory_is_sorted_recursive_and_skips_other_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir(dir.join("nested")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("a.txt"), "alpha\n\nalpha two").unwrap();
    fs::write(dir.join("nested/c.txt"), "charlie").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let chunks = DataProcessor::new().process_directory(dir).expect("process");
    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["alpha", "alpha two", "bravo", "charlie"]);
    assert_eq!(chunks[1].chunk_index, 1);
}

#[test]
fn process_directory_decodes_invalid_utf8_lossily() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bad.txt"), [b'o', b'k', 0xff]).unwrap();
    let chunks = DataProcessor::new().process_directory(tmp.path()).expect("process");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].content.starts_with("ok"));
}

#[test]
fn process_directory_empty_dir_is_empty() {
    let tmp = TempDir::new().unwrap();
    let chunks = DataProcessor::new().process_directory(tmp.path()).expect("process");
    assert!(chunks.is_empty());
}

#[test]
fn process_directory_missing_dir_is_read_error() {
    let tmp = TempDir::new().unwrap();
    let err = DataProcessor::new().process_directory(&tmp.path().join("missing")).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err}");
}

#[test]
fn zero_chunk_limit_is_config_error() {
    assert!(matches!(DataProcessor::with_max_chunk_chars(0), Err(Error::Config(_))));
    assert_eq!(DataProcessor::with_max_chunk_chars(5).unwrap().max_chunk_chars(), 5);
}

#[test]
fn settings_defaults_validate() {
    let settings = Settings::default();
    settings.validate().expect("defaults are valid");
    assert_eq!(settings.embedding.dimension, 1536);
    assert_eq!(settings.vector.text_max_len, 512);
    assert_eq!(settings.vector.metric, Metric::Cosine);
    assert_eq!(settings.data.max_chunk_chars, 170);
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[vector]\nbackend = \"memory\"\ncollection = \"from_file\"\nmetric = \"l2\"\n\n[data]\nmax_chunk_chars = 64\n",
    )
    .unwrap();

    let config = Config::load_from(tmp.path()).expect("load");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.vector.backend, "memory");
    assert_eq!(settings.vector.collection, "from_file");
    assert_eq!(settings.vector.metric, Metric::L2);
    assert_eq!(settings.data.max_chunk_chars, 64);
    assert_eq!(settings.vector.id_field, "my_id", "untouched keys keep defaults");

    let collection: String = config.get("vector.collection").expect("get");
    assert_eq!(collection, "from_file");
}

#[test]
fn invalid_settings_are_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[vector]\nbackend = \"milvus\"\n").unwrap();
    let err = Config::load_from(tmp.path()).unwrap().settings().unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let mut settings = Settings::default();
    settings.vector.text_field = settings.vector.id_field.clone();
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.embedding.dimension = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn metric_parses_aliases() {
    assert_eq!("COSINE".parse::<Metric>().unwrap(), Metric::Cosine);
    assert_eq!("ip".parse::<Metric>().unwrap(), Metric::Dot);
    assert!("hamming".parse::<Metric>().is_err());
}

#[test]
fn config_metric_accepts_aliases_and_case() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[vector]\nmetric = \"IP\"\n").unwrap();
    let settings = Config::load_from(tmp.path()).unwrap().settings().expect("settings");
    assert_eq!(settings.vector.metric, Metric::Dot);

    fs::write(tmp.path().join("config.toml"), "[vector]\nmetric = \"hamming\"\n").unwrap();
    assert!(Config::load_from(tmp.path()).unwrap().settings().is_err());
}

#[test]
fn resolve_keeps_absolute_and_joins_relative() {
    let base = std::path::Path::new("/srv/ragcrew");
    assert_eq!(resolve_with_base(base, "data/txt"), base.join("data/txt"));
    assert_eq!(resolve_with_base(base, "/abs/path"), std::path::PathBuf::from("/abs/path"));
}
