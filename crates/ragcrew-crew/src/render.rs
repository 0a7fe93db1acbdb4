use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ragcrew_core::error::Result;
use ragcrew_core::traits::Renderer;

/// Writes each report as UTF-8 text under `output_dir`.
///
/// Existing files are never overwritten: when `report_0.md` is taken the
/// report goes to `report_0-1.md`, then `report_0-2.md`, and so on.
#[derive(Debug, Clone)]
pub struct FileRenderer {
    output_dir: PathBuf,
}

impl FileRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    fn candidate(&self, filename: &str, attempt: usize) -> PathBuf {
        if attempt == 0 {
            return self.output_dir.join(filename);
        }
        let path = Path::new(filename);
        let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        match path.extension() {
            Some(ext) => self.output_dir.join(format!("{stem}-{attempt}.{}", ext.to_string_lossy())),
            None => self.output_dir.join(format!("{stem}-{attempt}")),
        }
    }
}

impl Renderer for FileRenderer {
    fn render(&self, text: &str, filename: &str) -> Result<String> {
        fs::create_dir_all(&self.output_dir)?;
        let mut attempt = 0;
        loop {
            let path = self.candidate(filename, attempt);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(text.as_bytes())?;
                    return Ok(format!("report saved to {}", path.display()));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
