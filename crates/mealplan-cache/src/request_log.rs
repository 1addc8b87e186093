//! Append-only request outcome log (`request_logs.jsonl`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::StorageError;

pub const REQUEST_LOG_FILE: &str = "request_logs.jsonl";

/// How a request was served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    CacheHit,
    ApiCall,
    Error,
}

/// One line of the request log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub timestamp: DateTime<Utc>,
    pub cache_key: String,
    #[serde(rename = "type")]
    pub outcome: Outcome,
    pub duration_seconds: f64,
}

/// Aggregates over the request log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogStats {
    pub cache_hits: usize,
    pub api_calls: usize,
    pub errors: usize,
    pub total_api_seconds: f64,
}

impl LogStats {
    pub fn total_requests(&self) -> usize {
        self.cache_hits + self.api_calls + self.errors
    }

    /// Mean duration of successful generations
    pub fn avg_api_seconds(&self) -> Option<f64> {
        (self.api_calls > 0).then(|| self.total_api_seconds / self.api_calls as f64)
    }

    /// Share of successful requests served from the cache, in `[0, 1]`.
    /// Errors are not counted.
    pub fn hit_rate(&self) -> Option<f64> {
        let served = self.cache_hits + self.api_calls;
        (served > 0).then(|| self.cache_hits as f64 / served as f64)
    }
}

/// Serialized appender for the request log
pub struct RequestLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RequestLog {
    /// Log into `<log_dir>/request_logs.jsonl`, creating the directory
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self, StorageError> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir).map_err(StorageError::io(log_dir))?;

        Ok(Self {
            path: log_dir.join(REQUEST_LOG_FILE),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single JSON line
    pub fn append(&self, cache_key: &str, outcome: Outcome, duration_seconds: f64) -> Result<(), StorageError> {
        let entry = RequestLogEntry {
            timestamp: Utc::now(),
            cache_key: cache_key.to_string(),
            outcome,
            duration_seconds,
        };

        let mut line = serde_json::to_string(&entry).map_err(StorageError::serialization(&self.path))?;
        line.push('\n');

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(StorageError::io(&self.path))?;
        file.write_all(line.as_bytes()).map_err(StorageError::io(&self.path))?;

        log::debug!("Request logged: {:?} {:.2}s", outcome, duration_seconds);
        Ok(())
    }

    /// All parseable entries in file order; malformed lines are skipped
    pub fn entries(&self) -> Result<Vec<RequestLogEntry>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping malformed request log line: {}", e);
                    None
                }
            })
            .collect())
    }

    pub fn stats(&self) -> Result<LogStats, StorageError> {
        let mut stats = LogStats::default();
        for entry in self.entries()? {
            match entry.outcome {
                Outcome::CacheHit => stats.cache_hits += 1,
                Outcome::ApiCall => {
                    stats.api_calls += 1;
                    stats.total_api_seconds += entry.duration_seconds;
                }
                Outcome::Error => stats.errors += 1,
            }
        }
        Ok(stats)
    }
}
