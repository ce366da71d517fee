//! # Log Destination
//!
//! Provisioning of the log directory and file, and the [`LogSink`] that
//! workers append lines to.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;

/// Errors raised while preparing the log destination
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Failed to get info about log directory {path}: {source}")]
    InspectDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("Failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProvisionError {
    /// Path the failed provisioning step was working on
    pub fn path(&self) -> &Path {
        match self {
            Self::InspectDirectory { path, .. }
            | Self::CreateDirectory { path, .. }
            | Self::NotADirectory { path }
            | Self::OpenFile { path, .. } => path,
        }
    }
}

/// Make sure `dir` exists and is a directory, creating it when absent
pub fn ensure_log_directory(dir: &Path) -> Result<PathBuf, ProvisionError> {
    match fs::metadata(dir) {
        Ok(info) if info.is_dir() => Ok(dir.to_path_buf()),
        Ok(_) => Err(ProvisionError::NotADirectory {
            path: dir.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|source| ProvisionError::CreateDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
            Ok(dir.to_path_buf())
        }
        Err(source) => Err(ProvisionError::InspectDirectory {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Provision `dir` and open `dir/file_name` for appending
pub fn open_log_file(dir: &Path, file_name: &str) -> Result<LogSink, ProvisionError> {
    let dir = ensure_log_directory(dir)?;
    LogSink::open_file(&dir.join(file_name))
}

/// Append-only, line-oriented log destination
///
/// Lines from concurrent writers never interleave: each line is written with
/// a single `write_all` under the sink's lock. The sink is closed at most
/// once; writes after [`close`](Self::close) fail.
pub struct LogSink {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    description: String,
}

impl LogSink {
    /// Open (or create) `path` in append mode
    pub fn open_file(path: &Path) -> Result<Self, ProvisionError> {
        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ProvisionError::OpenFile {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_writer(
            LineWriter::new(file),
            path.display().to_string(),
        ))
    }

    /// Wrap an arbitrary writer
    pub fn from_writer(
        writer: impl Write + Send + 'static,
        description: impl Into<String>,
    ) -> Self {
        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            description: description.into(),
        }
    }

    /// Human-readable name of the destination, e.g. the file path
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Append `line` followed by a newline
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        match self.lock().as_mut() {
            Some(writer) => writer.write_all(buf.as_bytes()),
            None => Err(io::Error::other("log sink is closed")),
        }
    }

    /// Flush and release the underlying writer
    ///
    /// Calling this on an already closed sink is a no-op.
    pub fn close(&self) -> io::Result<()> {
        let writer = self.lock().take();
        match writer {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Write + Send>>> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("description", &self.description)
            .field("closed", &self.is_closed())
            .finish()
    }
}
