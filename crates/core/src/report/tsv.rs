//! Tab-separated report buffer.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors that can occur while assembling or writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A row does not have as many fields as the header.
    #[error("Row has {found} fields, header has {expected}")]
    ColumnCount { expected: usize, found: usize },

    /// Report file could not be written.
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A TSV table accumulated in memory and written to disk once.
///
/// Fields containing a tab, a quote, a line break or leading whitespace are
/// quoted with embedded quotes doubled, so the output reads back with any
/// standard CSV reader configured for tabs.
#[derive(Debug, Clone)]
pub struct TsvReport {
    columns: usize,
    rows: usize,
    buffer: String,
}

impl TsvReport {
    /// Starts a report with the given header row.
    pub fn new(header: &[&str]) -> Self {
        let mut report = Self {
            columns: header.len(),
            rows: 0,
            buffer: String::new(),
        };
        report.append(header);
        report
    }

    /// Appends one data row.
    pub fn push_row<S: AsRef<str>>(&mut self, row: &[S]) -> Result<(), ReportError> {
        if row.len() != self.columns {
            return Err(ReportError::ColumnCount {
                expected: self.columns,
                found: row.len(),
            });
        }
        self.append(row);
        self.rows += 1;
        Ok(())
    }

    /// Appends a row whose width is known to match the header.
    pub(super) fn append_unchecked<S: AsRef<str>>(&mut self, row: &[S]) {
        debug_assert_eq!(row.len(), self.columns);
        self.append(row);
        self.rows += 1;
    }

    /// Number of data rows, excluding the header.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The report text as it will be written.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Writes the report to `path`, creating parent directories as needed.
    pub async fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        let io_err = |source: std::io::Error| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, self.buffer.as_bytes())
            .await
            .map_err(io_err)?;

        info!(path = %path.display(), rows = self.rows, "Report written");
        Ok(())
    }

    fn append<S: AsRef<str>>(&mut self, row: &[S]) {
        for (i, field) in row.iter().enumerate() {
            if i > 0 {
                self.buffer.push('\t');
            }
            push_field(&mut self.buffer, field.as_ref());
        }
        self.buffer.push('\n');
    }
}

fn needs_quotes(field: &str) -> bool {
    if field.is_empty() {
        return false;
    }
    field.contains(['\t', '"', '\r', '\n'])
        || field.chars().next().is_some_and(char::is_whitespace)
}

fn push_field(buffer: &mut String, field: &str) {
    if !needs_quotes(field) {
        buffer.push_str(field);
        return;
    }
    buffer.push('"');
    for c in field.chars() {
        if c == '"' {
            buffer.push('"');
        }
        buffer.push(c);
    }
    buffer.push('"');
}
