//! Append-only destinations for diagnostic reports.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::SinkError;

/// Where rendered reports go. Implementations only ever append.
pub trait ReportSink: Send + Sync {
    /// Human-readable location, shown in the console echo.
    fn location(&self) -> String;

    /// Append one complete record.
    fn append(&self, text: &str) -> Result<(), SinkError>;
}

/// Report file inside a module-owned data directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    data_dir: PathBuf,
    file_name: String,
}

impl FileSink {
    pub fn new(data_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }

    /// Return the report file, creating it and the data directory if absent.
    pub fn get_or_create_file(&self) -> Result<PathBuf, SinkError> {
        let path = self.path();
        if path.exists() {
            return Ok(path);
        }
        create_dir(&self.data_dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Create {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

fn create_dir(dir: &Path) -> Result<(), SinkError> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| SinkError::Create {
        path: dir.to_path_buf(),
        source,
    })
}

impl ReportSink for FileSink {
    fn location(&self) -> String {
        self.path().display().to_string()
    }

    fn append(&self, text: &str) -> Result<(), SinkError> {
        let path = self.get_or_create_file()?;
        let write_err = |source: std::io::Error| SinkError::Write {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(write_err)?;
        file.write_all(text.as_bytes()).map_err(write_err)?;
        file.flush().map_err(write_err)
    }
}

/// In-memory sink, optionally rejecting every write.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    records: Mutex<Vec<String>>,
    failing: Option<String>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every append fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: Some(reason.into()),
        }
    }

    pub fn records(&self) -> Vec<String> {
        self.records.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.records.lock().len()
    }

    pub fn contents(&self) -> String {
        self.records.lock().concat()
    }
}

impl ReportSink for MemoryReportSink {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn append(&self, text: &str) -> Result<(), SinkError> {
        if let Some(reason) = &self.failing {
            return Err(SinkError::Rejected(reason.clone()));
        }
        self.records.lock().push(text.to_string());
        Ok(())
    }
}
