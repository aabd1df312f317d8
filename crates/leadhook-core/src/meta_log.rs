//! Site-scoped webhook log.
//!
//! Every webhook request is recorded in `<dir>/<site>-meta.log` so operators
//! can see what the platform actually sent, independent of the process log
//! level. Writes are synchronous and size-rotated (`.1` is the newest
//! backup). Each line is mirrored to `tracing`.

use crate::config::LoggingConfig;
use chrono::Local;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Hands out one logger per site. Built once at startup and shared through
/// application state.
#[derive(Debug)]
pub struct LoggerFactory {
    dir: PathBuf,
    max_bytes: u64,
    backups: usize,
    loggers: Mutex<HashMap<String, Arc<SiteLogger>>>,
}

impl LoggerFactory {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_bytes: config.max_bytes,
            backups: config.backups,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn log_path(&self, site: &str) -> PathBuf {
        self.dir.join(format!("{site}-meta.log"))
    }

    pub fn for_site(&self, site: &str) -> Arc<SiteLogger> {
        let mut loggers = self.loggers.lock().unwrap_or_else(|e| e.into_inner());
        loggers
            .entry(site.to_string())
            .or_insert_with(|| {
                Arc::new(SiteLogger {
                    site: site.to_string(),
                    file: Mutex::new(RotatingFile::new(
                        self.log_path(site),
                        self.max_bytes,
                        self.backups,
                    )),
                })
            })
            .clone()
    }
}

#[derive(Debug)]
pub struct SiteLogger {
    site: String,
    file: Mutex<RotatingFile>,
}

/// The tail of a meta log, as returned by the diagnostics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LogTail {
    pub total_lines: usize,
    pub webhook_entries: usize,
    pub recent_webhook_logs: Vec<String>,
}

impl SiteLogger {
    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn path(&self) -> PathBuf {
        self.file
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .path
            .clone()
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message.as_ref());
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(Level::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message.as_ref());
    }

    pub fn log(&self, level: Level, message: &str) {
        match level {
            Level::Info => tracing::info!(site = %self.site, "{message}"),
            Level::Warning => tracing::warn!(site = %self.site, "{message}"),
            Level::Error => tracing::error!(site = %self.site, "{message}"),
        }

        let line = format!(
            "{} - {} - [{}] - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level.as_str(),
            self.site,
            message
        );

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = file.write_line(line.as_bytes()) {
            tracing::warn!(site = %self.site, error = %e, "Failed to write meta log");
        }
    }

    /// Last `window` lines of the log, of which the last `recent` are
    /// returned verbatim. `Ok(None)` when nothing has been logged yet.
    pub fn tail(&self, window: usize, recent: usize) -> io::Result<Option<LogTail>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        let last = &lines[lines.len().saturating_sub(window)..];
        let recent_lines = &last[last.len().saturating_sub(recent)..];

        Ok(Some(LogTail {
            total_lines: lines.len(),
            webhook_entries: last.len(),
            recent_webhook_logs: recent_lines.iter().map(|l| l.to_string()).collect(),
        }))
    }
}

/// Append-only file that rolls over once it would exceed `max_bytes`.
#[derive(Debug)]
struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: Option<File>,
    size: u64,
}

impl RotatingFile {
    fn new(path: PathBuf, max_bytes: u64, backups: usize) -> Self {
        Self {
            path,
            max_bytes,
            backups,
            file: None,
            size: 0,
        }
    }

    fn open(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.size = file.metadata()?.len();
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file not open"))
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.open()?;
        if self.should_rollover(line.len() as u64) {
            self.rollover()?;
        }
        let file = self.open()?;
        file.write_all(line)?;
        file.flush()?;
        self.size += line.len() as u64;
        Ok(())
    }

    fn should_rollover(&self, incoming: u64) -> bool {
        self.max_bytes > 0 && self.backups > 0 && self.size + incoming > self.max_bytes
    }

    fn rollover(&mut self) -> io::Result<()> {
        self.file = None;
        for n in (1..self.backups).rev() {
            let from = backup_path(&self.path, n);
            if from.exists() {
                fs::rename(&from, backup_path(&self.path, n + 1))?;
            }
        }
        if self.path.exists() {
            fs::rename(&self.path, backup_path(&self.path, 1))?;
        }
        self.size = 0;
        Ok(())
    }
}

fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory(dir: &Path, max_bytes: u64, backups: usize) -> LoggerFactory {
        LoggerFactory::new(&LoggingConfig {
            dir: dir.to_path_buf(),
            max_bytes,
            backups,
        })
    }

    #[test]
    fn one_file_per_site() {
        let tmp = tempfile::tempdir().unwrap();
        let factory = factory(tmp.path(), 1024 * 1024, 5);

        factory.for_site("alpha").info("hello");
        factory.for_site("beta").error("boom");

        let alpha = fs::read_to_string(tmp.path().join("alpha-meta.log")).unwrap();
        let beta = fs::read_to_string(tmp.path().join("beta-meta.log")).unwrap();
        assert!(alpha.contains(" - INFO - [alpha] - hello"));
        assert!(beta.contains(" - ERROR - [beta] - boom"));
        assert!(!alpha.contains("boom"));
    }

    #[test]
    fn same_site_reuses_logger() {
        let tmp = tempfile::tempdir().unwrap();
        let factory = factory(tmp.path(), 1024, 5);
        let a = factory.for_site("alpha");
        let b = factory.for_site("alpha");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn rotates_and_keeps_bounded_backups() {
        let tmp = tempfile::tempdir().unwrap();
        let factory = factory(tmp.path(), 200, 2);
        let logger = factory.for_site("s");

        for i in 0..40 {
            logger.info(format!("line number {i:03}"));
        }

        let base = tmp.path().join("s-meta.log");
        assert!(base.exists());
        assert!(backup_path(&base, 1).exists());
        assert!(backup_path(&base, 2).exists());
        assert!(!backup_path(&base, 3).exists());
        assert!(fs::metadata(&base).unwrap().len() <= 200);

        let current = fs::read_to_string(&base).unwrap();
        assert!(current.contains("line number 039"));
    }

    #[test]
    fn tail_returns_recent_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let factory = factory(tmp.path(), 10 * 1024 * 1024, 5);
        let logger = factory.for_site("s");
        assert!(logger.tail(100, 20).unwrap().is_none());

        for i in 0..150 {
            logger.info(format!("entry {i}"));
        }

        let tail = logger.tail(100, 20).unwrap().unwrap();
        assert_eq!(tail.total_lines, 150);
        assert_eq!(tail.webhook_entries, 100);
        assert_eq!(tail.recent_webhook_logs.len(), 20);
        assert!(tail.recent_webhook_logs[19].ends_with("entry 149"));
        assert!(tail.recent_webhook_logs[0].ends_with("entry 130"));
    }
}
