use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;

/// A rendered document and where it goes.
#[derive(Debug)]
pub struct RenderedPage {
    /// The target location on disk for the output file.
    pub file_path: PathBuf,

    /// The complete HTML document.
    pub html: String,
}

/// Writes [`RenderedPage`]s to disk, creating parent directories on the way.
#[derive(Default)]
pub struct Writer {
    seen_dirs: HashSet<PathBuf>,
}

impl Writer {
    pub fn new() -> Writer {
        Writer::default()
    }

    /// Writes `page`, replacing any existing file.
    pub fn write(&mut self, page: &RenderedPage) -> io::Result<()> {
        if let Some(dir) = page.file_path.parent() {
            if self.seen_dirs.insert(dir.to_owned()) {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&page.file_path, &page.html)
    }
}
