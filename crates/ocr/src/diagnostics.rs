use std::path::{Path, PathBuf};

/// Receives intermediate page images as the pipeline produces them.
pub trait DiagnosticsSink: Send + Sync {
    /// `source_name` is the file name of the document the page came from.
    fn page_image(&self, source_name: &str, page_index: usize, image: &[u8]);
}

/// Discards everything. The pipeline default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn page_image(&self, _source_name: &str, _page_index: usize, _image: &[u8]) {}
}

/// Writes each page to `<dir>/<source>_page<N>.png`, N counting from 1.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn page_path(&self, source_name: &str, page_index: usize) -> PathBuf {
        self.dir.join(format!("{source_name}_page{}.png", page_index + 1))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DiagnosticsSink for DirectorySink {
    fn page_image(&self, source_name: &str, page_index: usize, image: &[u8]) {
        let path = self.page_path(source_name, page_index);
        let written = std::fs::create_dir_all(&self.dir).and_then(|()| std::fs::write(&path, image));
        match written {
            Ok(()) => tracing::debug!(path = %path.display(), "Saved page image"),
            Err(e) => tracing::warn!(path = %path.display(), "Could not save page image: {e}"),
        }
    }
}
