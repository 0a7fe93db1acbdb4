//! Document reading and paragraph chunking.
//!
//! Lines are trimmed; consecutive non-blank lines form a paragraph joined by
//! single spaces; a blank line (or end of input) flushes the paragraph, which
//! is then cut into runs of at most `max_chars` characters. Lengths count
//! `char`s, not bytes, so the worst-case UTF-8 size of a chunk is
//! `4 * max_chars` (3 for CJK text, the usual input).

use std::fs;
use std::io::{self, BufRead};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Document, DocumentChunk};

/// 170 chars × 3 bytes stays under a 512-byte text field.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 170;

/// Cut one paragraph into contiguous runs of at most `max_chars` characters.
/// No word-boundary awareness: a run may end mid-word.
pub fn split_to_chunks(paragraph: &str, max_chars: NonZeroUsize) -> Vec<String> {
    let chars: Vec<char> = paragraph.chars().collect();
    chars.chunks(max_chars.get()).map(|run| run.iter().collect()).collect()
}

struct ParagraphBuffer {
    lines: Vec<String>,
    max_chars: NonZeroUsize,
    chunks: Vec<String>,
}

impl ParagraphBuffer {
    fn new(max_chars: NonZeroUsize) -> Self {
        Self { lines: Vec::new(), max_chars, chunks: Vec::new() }
    }

    fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            self.flush();
        } else {
            self.lines.push(line.to_string());
        }
    }

    fn flush(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        let paragraph = self.lines.join(" ");
        self.chunks.extend(split_to_chunks(&paragraph, self.max_chars));
        self.lines.clear();
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Chunk in-memory text. Never fails; all-blank input yields no chunks.
pub fn chunk_text(text: &str, max_chars: NonZeroUsize) -> Vec<String> {
    let mut buffer = ParagraphBuffer::new(max_chars);
    for line in text.lines() {
        buffer.push_line(line);
    }
    buffer.finish()
}

/// Chunk a line-oriented reader. Fails only when reading fails.
pub fn chunk_reader<R: BufRead>(reader: R, max_chars: NonZeroUsize) -> Result<Vec<String>> {
    let mut buffer = ParagraphBuffer::new(max_chars);
    for line in reader.lines() {
        buffer.push_line(&line?);
    }
    Ok(buffer.finish())
}

#[derive(Debug, Clone)]
pub struct DataProcessor {
    max_chunk_chars: NonZeroUsize,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self { max_chunk_chars: NonZeroUsize::new(DEFAULT_MAX_CHUNK_CHARS).unwrap_or(NonZeroUsize::MIN) }
    }
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chunk_chars(max_chunk_chars: usize) -> Result<Self> {
        let max_chunk_chars = NonZeroUsize::new(max_chunk_chars)
            .ok_or_else(|| Error::Config("max_chunk_chars must be positive".to_string()))?;
        Ok(Self { max_chunk_chars })
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars.get()
    }

    /// Read and chunk every `*.txt` file under `data_dir`, in sorted path order.
    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<DocumentChunk>> {
        let files = self.list_txt_files(data_dir)?;
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let document = self.read_document(file_path)?;
            all_chunks.extend(self.chunk_document(&document));
        }
        info!(files = files.len(), chunks = all_chunks.len(), "processed documents");
        Ok(all_chunks)
    }

    pub fn read_document(&self, file_path: &Path) -> Result<Document> {
        let text = match fs::read_to_string(file_path) {
            Ok(content) => content,
            Err(_) => String::from_utf8_lossy(&fs::read(file_path)?).to_string(),
        };
        Ok(Document { source: file_path.to_string_lossy().to_string(), text })
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<DocumentChunk> {
        let doc_id = Path::new(&document.source)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| document.source.clone());
        chunk_text(&document.text, self.max_chunk_chars)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| DocumentChunk {
                doc_id: doc_id.clone(),
                doc_path: document.source.clone(),
                chunk_index,
                content,
            })
            .collect()
    }

    fn list_txt_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root) {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().and_then(|s| s.to_str()) == Some("txt") {
                txt_files.push(entry.into_path());
            }
        }
        txt_files.sort();
        Ok(txt_files)
    }
}
