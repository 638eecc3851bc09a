//! Sinks for the training engine's progress output

use mvaplug_core::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for training output
pub trait LogSink {
    /// Append one line
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Push buffered output to its destination
    fn flush(&mut self) -> Result<()>;
}

/// Writes training output to a file, truncating it on open.
///
/// Buffered output is flushed on drop, so the file is complete even when
/// training returns early with an error.
pub struct FileLogSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileLogSink {
    /// Create (or truncate) the log file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for FileLogSink {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Failed to flush training log {}: {}", self.path.display(), e);
        }
    }
}
