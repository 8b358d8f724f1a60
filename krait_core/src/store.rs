use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default crash log location.
pub const DEFAULT_CRASH_LOG: &str = "fuzz/crash_cases.txt";
/// Default minimization log location.
pub const DEFAULT_MINIMIZED_LOG: &str = "fuzz/minimized_cases.txt";
/// Default reproducer output slot.
pub const DEFAULT_REPRODUCER_SLOT: &str = "fuzz/reproduced_case.txt";

/// Errors raised by the crash store and its sibling logs.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The log file does not exist, or exists but holds no records.
    #[error("No crash cases found in {0:?}")]
    NoCases(PathBuf),

    /// The requested record index is outside the stored range.
    #[error("Index {index} out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A stored line's kind field is neither `EXC` nor `500`; the log is
    /// corrupt and indexing into it would be meaningless.
    #[error("Malformed record at {path:?} line {line}: unknown kind {kind:?}")]
    Malformed {
        path: PathBuf,
        line: usize,
        kind: String,
    },

    /// An I/O error while reading or appending the log.
    #[error("Crash store I/O error on {path:?}: {message}")]
    Io { path: PathBuf, message: String },
}

/// Distinguishes a transport-level exception from an application-level
/// error status in a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashKind {
    /// Serialized as `EXC`.
    Exception,
    /// Serialized as `500`.
    ServerError,
}

impl CrashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrashKind::Exception => "EXC",
            CrashKind::ServerError => "500",
        }
    }

    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "EXC" => Some(CrashKind::Exception),
            "500" => Some(CrashKind::ServerError),
            _ => None,
        }
    }
}

/// One crash-inducing submission: what kind of failure, the diagnostic
/// detail, and the payload that caused it. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashRecord {
    pub kind: CrashKind,
    pub detail: String,
    pub payload: String,
}

/// An `{original, minimized}` payload pair produced by a minimization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimizedRecord {
    pub original: String,
    pub minimized: String,
}

/// Replaces line breaks so a field cannot span records.
fn strip_newlines(field: &str) -> String {
    field.replace(['\n', '\r'], " ")
}

/// Detail fields additionally lose tabs, which are the record delimiters.
fn strip_delimiters(field: &str) -> String {
    strip_newlines(field).replace('\t', " ")
}

/// Append-only, newline-delimited crash log.
///
/// Each record is one line, `kind<TAB>detail<TAB>payload`; the first two
/// tabs delimit, so the payload may itself contain tabs. One store instance
/// owns a write handle (opened on first append) and an index cache that is
/// invalidated on append, so in-process `get` calls do not re-parse the
/// whole log. External readers of the same file simply re-scan.
pub struct CrashStore {
    log_path: PathBuf,
    writer: Option<File>,
    cache: Option<Vec<CrashRecord>>,
}

impl CrashStore {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            writer: None,
            cache: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    fn io_error(&self, e: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.log_path.clone(),
            message: e.to_string(),
        }
    }

    /// Appends one record as a single line.
    ///
    /// The whole line goes through one `write_all` on an append-mode handle,
    /// so concurrent appenders cannot interleave partial lines. Embedded
    /// newlines are stripped from every field; tabs only from kind/detail.
    pub fn append(&mut self, record: &CrashRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let line = format!(
            "{}\t{}\t{}\n",
            record.kind.as_str(),
            strip_delimiters(&record.detail),
            strip_newlines(&record.payload)
        );
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)
                .map_err(|e| self.io_error(e))?;
            self.writer = Some(file);
        }
        let path = self.log_path.clone();
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes()).map_err(|e| StoreError::Io {
                path,
                message: e.to_string(),
            })?;
        }
        self.cache = None;
        Ok(())
    }

    fn scan(&self) -> Result<Vec<CrashRecord>, StoreError> {
        let text = match fs::read_to_string(&self.log_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoCases(self.log_path.clone()));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let mut records = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, '\t');
            let kind_field = parts.next().unwrap_or_default();
            let detail = parts.next().unwrap_or_default().to_string();
            let payload = parts.next().unwrap_or_default().to_string();
            let kind = CrashKind::parse(kind_field).ok_or_else(|| StoreError::Malformed {
                path: self.log_path.clone(),
                line: line_no + 1,
                kind: kind_field.to_string(),
            })?;
            records.push(CrashRecord {
                kind,
                detail,
                payload,
            });
        }
        Ok(records)
    }

    /// Reads every stored record, in append order.
    ///
    /// A missing log file is `StoreError::NoCases`. The parsed records are
    /// cached until the next append.
    pub fn read_all(&mut self) -> Result<&[CrashRecord], StoreError> {
        if self.cache.is_none() {
            self.cache = Some(self.scan()?);
        }
        Ok(self.cache.as_deref().unwrap_or(&[]))
    }

    /// Retrieves the `index`-th record (0-based, append order).
    ///
    /// An empty log yields `NoCases` (nothing to reproduce), a bad index
    /// yields `IndexOutOfRange`; neither is ever defaulted to record 0.
    pub fn get(&mut self, index: usize) -> Result<CrashRecord, StoreError> {
        let path = self.log_path.clone();
        let records = self.read_all()?;
        if records.is_empty() {
            return Err(StoreError::NoCases(path));
        }
        records
            .get(index)
            .cloned()
            .ok_or(StoreError::IndexOutOfRange {
                index,
                len: records.len(),
            })
    }

    /// Number of stored records.
    pub fn len(&mut self) -> Result<usize, StoreError> {
        Ok(self.read_all()?.len())
    }
}

/// Append-only log of minimization results, one `ORIG`/`MIN` line pair per
/// run. Distinct from the crash store; never overwritten.
pub struct MinimizeLog {
    path: PathBuf,
}

impl MinimizeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &MinimizedRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                    path: self.path.clone(),
                    message: e.to_string(),
                })?;
            }
        }
        let lines = format!(
            "ORIG\t{}\nMIN\t{}\n",
            strip_newlines(&record.original),
            strip_newlines(&record.minimized)
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::Io {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        file.write_all(lines.as_bytes()).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}

/// Single-slot "last confirmed reproducer" file: the whole file content is
/// the raw payload, overwritten on every confirmed reproduction.
pub struct ReproducerSlot {
    path: PathBuf,
}

impl ReproducerSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self, payload: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                    path: self.path.clone(),
                    message: e.to_string(),
                })?;
            }
        }
        fs::write(&self.path, payload).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}
