//! src/logging.rs
//! ============================================================================
//! # Logging: Optional Subscriber Setup for Hosts
//!
//! The engine only emits `tracing` events (with `marker` / `operation_type`
//! fields); installing a subscriber is left to the host. This module is the
//! batteries-included way to do it: a human-readable layer on stderr, or JSON
//! lines through a rolling file when a log directory is configured.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::Directive, fmt::time::ChronoUtc,
    layer::SubscriberExt, util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// When set, events go to a rolling JSON file in this directory instead
    /// of stderr.
    pub log_dir: Option<PathBuf>,
    pub log_file_prefix: CompactString,
    pub log_level: CompactString,
    pub rotation: LogRotation,
    pub with_target: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    #[default]
    Daily,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Self::NEVER,
            LogRotation::Daily => Self::DAILY,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_file_prefix: CompactString::const_new("arbor"),
            log_level: CompactString::const_new("info"),
            rotation: LogRotation::Daily,
            with_target: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, Default)]
pub struct LoggerBuilder {
    config: LoggerConfig,
}

impl LoggerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.config.log_level = CompactString::new(level);
        self
    }

    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = Some(dir.into());
        self
    }

    /// Install the global subscriber. The returned guard (file output only)
    /// must be held for as long as events should be flushed.
    pub async fn build(self) -> Result<Option<WorkerGuard>> {
        validate_config(&self.config)?;
        let filter = make_filter(&self.config.log_level)?;

        let (layer, guard): (BoxedLayer, Option<WorkerGuard>) = match &self.config.log_dir {
            Some(dir) => {
                setup_log_directory(dir).await?;
                let appender = RollingFileAppender::new(
                    self.config.rotation.into(),
                    dir,
                    self.config.log_file_prefix.as_str(),
                );
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_target(self.config.with_target)
                    .with_writer(writer)
                    .with_filter(filter)
                    .boxed();
                (layer, Some(guard))
            }
            None => {
                let layer = tracing_subscriber::fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_target(self.config.with_target)
                    .with_writer(std::io::stderr)
                    .with_filter(filter)
                    .boxed();
                (layer, None)
            }
        };

        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .context("Failed to install global tracing subscriber")?;

        Ok(guard)
    }
}

fn make_filter(level: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive(Directive::from_str(level).context("Invalid log level in config")?))
}

fn validate_config(config: &LoggerConfig) -> Result<()> {
    if config.log_level.trim().is_empty() {
        return Err(LoggingError::ConfigError("Log level must not be empty".to_string()).into());
    }

    if config.log_file_prefix.trim().is_empty() {
        return Err(
            LoggingError::ConfigError("Log file prefix must not be empty".to_string()).into(),
        );
    }

    if let Some(dir) = &config.log_dir {
        validate_log_directory(dir)?;
    }
    Ok(())
}

fn validate_log_directory(path: &Path) -> Result<()> {
    if path.components().count() == 0 {
        return Err(LoggingError::InvalidLogDirectory("Empty path".to_string()).into());
    }

    for component in path.components() {
        if component == std::path::Component::ParentDir {
            return Err(LoggingError::InvalidLogDirectory(
                "Path contains parent directory references".to_string(),
            )
            .into());
        }
    }

    Ok(())
}

async fn setup_log_directory(log_dir: &Path) -> Result<()> {
    if !log_dir.exists() {
        TokioFs::create_dir_all(log_dir)
            .await
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(())
}

pub async fn init(config: &LoggerConfig) -> Result<Option<WorkerGuard>> {
    LoggerBuilder::new().with_config(config.clone()).build().await
}

pub async fn init_with_level(level: &str) -> Result<Option<WorkerGuard>> {
    LoggerBuilder::new().with_level(level).build().await
}
