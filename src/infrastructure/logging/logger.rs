//! Tracing-subscriber initialization (spec §10.2).

use super::config::{LogFormat, LoggingConfig, RotationPolicy};
use anyhow::{Context, Result};
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Holds the worker guard keeping a non-blocking file appender alive.
pub struct Logger {
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Initialize the global tracing subscriber from `config`.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;
        let env_filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy();

        let guard = if let Some(ref log_dir) = config.file_path {
            let file_appender = match config.rotation {
                RotationPolicy::Daily => rolling::daily(log_dir, "tripledb-sync.log"),
                RotationPolicy::Hourly => rolling::hourly(log_dir, "tripledb-sync.log"),
                RotationPolicy::Never => rolling::never(log_dir, "tripledb-sync.log"),
            };
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter.clone());

            if config.enable_stdout {
                match config.format {
                    LogFormat::Json => {
                        let stdout_layer = tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(io::stdout)
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_file(true)
                            .with_line_number(true)
                            .with_filter(env_filter);
                        tracing_subscriber::registry().with(file_layer).with(stdout_layer).init();
                    }
                    LogFormat::Pretty => {
                        let stdout_layer = tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(io::stdout)
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_file(true)
                            .with_span_events(FmtSpan::CLOSE)
                            .with_filter(env_filter);
                        tracing_subscriber::registry().with(file_layer).with(stdout_layer).init();
                    }
                }
            } else {
                tracing_subscriber::registry().with(file_layer).init();
            }

            Some(guard)
        } else {
            match config.format {
                LogFormat::Json => {
                    let stdout_layer = tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stdout)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_filter(env_filter);
                    tracing_subscriber::registry().with(stdout_layer).init();
                }
                LogFormat::Pretty => {
                    let stdout_layer = tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(io::stdout)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(env_filter);
                    tracing_subscriber::registry().with(stdout_layer).init();
                }
            }
            None
        };

        tracing::info!(
            level = %config.level,
            format = ?config.format,
            file_output = config.file_path.is_some(),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    level
        .parse::<Level>()
        .with_context(|| format!("invalid log level: {level}"))
}
