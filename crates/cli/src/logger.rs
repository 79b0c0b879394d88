//! File-based logging for the stencil CLI: messages go to
//! `~/.stencil/logs/{run_id}/log` and are mirrored to stderr.

use anyhow::{Context, Result};
use chrono::Local;
use dirs::home_dir;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

pub struct StencilLogger {
    level: LevelFilter,
    file: Mutex<File>,
}

impl StencilLogger {
    /// Create a logger writing to `~/.stencil/logs/{timestamp}_{uuid}/log`.
    fn new(level: LevelFilter) -> Result<(Self, PathBuf)> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let uuid_string = Uuid::new_v4().to_string();
        let uuid = uuid_string.split('-').next().unwrap_or("unknown");
        let run_id = format!("{timestamp}_{uuid}");

        let home = home_dir().context("could not find home directory")?;
        let log_dir = home.join(".stencil").join("logs").join(run_id);
        create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

        let log_path = log_dir.join("log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;

        Ok((
            Self {
                level,
                file: Mutex::new(file),
            },
            log_path,
        ))
    }

    /// Install the logger as the global `log` backend.
    pub fn init(level: LevelFilter) -> Result<()> {
        let (logger, log_path) = Self::new(level)?;
        log::set_boxed_logger(Box::new(logger))
            .map(|()| log::set_max_level(level))
            .map_err(|err| anyhow::anyhow!("failed to set logger: {err}"))?;
        log::debug!("log file: {}", log_path.display());
        Ok(())
    }
}

impl Log for StencilLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let message = format!(
            "{} {} [{}] {}",
            timestamp,
            record.level(),
            record.target(),
            record.args()
        );

        // Never let logging failures take the process down.
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{message}");
        }
        eprintln!("{message}");
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}
