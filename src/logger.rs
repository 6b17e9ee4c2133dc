//! Initialise tracing for the process.

use std::{fmt, sync::OnceLock};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::{
    config,
    errors::{Error, Result},
};

const MODULE_WHITELIST: &[&str] = &["ontoeval"];

/// All log levels
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// The "off" level.
    Off,
    /// The "trace" level.
    Trace,
    /// The "debug" level.
    Debug,
    /// The "info" level.
    #[default]
    Info,
    /// The "warn" level.
    Warn,
    /// The "error" level.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// Log formats
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Rolling interval of the file appender.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

// Keeps the non-blocking writer flushing until the process exits.
static NONBLOCKING_WORK_GUARD_KEEP: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` wins over the configured filter. Calling this twice leaves the
/// first subscriber in place and returns an error.
///
/// # Errors
///
/// Fails when the log directory cannot be prepared or a subscriber is already
/// installed.
pub fn init(config: &config::Logger) -> Result<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

    if let Some(file_appender_config) = config.file_appender.as_ref() {
        if file_appender_config.enable {
            let dir = file_appender_config
                .dir
                .as_ref()
                .map_or_else(|| "./logs".to_string(), ToString::to_string);

            let rotation = match file_appender_config.rotation {
                Rotation::Minutely => tracing_appender::rolling::Rotation::MINUTELY,
                Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
                Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
                Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
            };
            let file_appender = tracing_appender::rolling::Builder::default()
                .max_log_files(file_appender_config.max_log_files)
                .rotation(rotation)
                .filename_prefix(
                    file_appender_config
                        .filename_prefix
                        .as_ref()
                        .map_or_else(String::new, ToString::to_string),
                )
                .filename_suffix(
                    file_appender_config
                        .filename_suffix
                        .as_ref()
                        .map_or_else(String::new, ToString::to_string),
                )
                .build(dir)
                .map_err(|err| Error::Logger(err.to_string()))?;

            let file_appender_layer = if file_appender_config.non_blocking {
                let (non_blocking_file_appender, work_guard) =
                    tracing_appender::non_blocking(file_appender);
                if NONBLOCKING_WORK_GUARD_KEEP.set(work_guard).is_err() {
                    return Err(Error::Logger(
                        "non-blocking file appender already initialised".to_string(),
                    ));
                }
                init_layer(non_blocking_file_appender, file_appender_config.format, false)
            } else {
                init_layer(file_appender, file_appender_config.format, false)
            };
            layers.push(file_appender_layer);
        }
    }

    if config.enable {
        layers.push(init_layer(std::io::stdout, config.format, true));
    }

    if layers.is_empty() {
        return Ok(());
    }

    let env_filter = init_env_filter(config.override_filter.as_ref(), config.level);
    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|err| Error::Logger(err.to_string()))
}

fn init_env_filter(override_filter: Option<&String>, level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            override_filter.map_or_else(
                || {
                    EnvFilter::try_new(
                        MODULE_WHITELIST
                            .iter()
                            .map(|module| format!("{module}={level}"))
                            .chain(std::iter::once("warn".to_string()))
                            .collect::<Vec<_>>()
                            .join(","),
                    )
                },
                EnvFilter::try_new,
            )
        })
        .unwrap_or_else(|err| {
            eprintln!("invalid log filter, falling back to `info`: {err}");
            EnvFilter::new("info")
        })
}

fn init_layer<W2>(make_writer: W2, format: Format, ansi: bool) -> Box<dyn Layer<Registry> + Sync + Send>
where
    W2: for<'writer> MakeWriter<'writer> + Sync + Send + 'static,
{
    match format {
        Format::Compact => tracing_subscriber::fmt::Layer::default()
            .with_ansi(ansi)
            .with_writer(make_writer)
            .compact()
            .boxed(),
        Format::Pretty => tracing_subscriber::fmt::Layer::default()
            .with_ansi(ansi)
            .with_writer(make_writer)
            .pretty()
            .boxed(),
        Format::Json => tracing_subscriber::fmt::Layer::default()
            .with_ansi(ansi)
            .with_writer(make_writer)
            .json()
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_match_filter_syntax() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        let level: LogLevel = serde_yaml::from_str("debug").expect("level");
        assert_eq!(level, LogLevel::Debug);
    }

    #[test]
    fn override_filter_is_used_when_rust_log_is_unset() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = init_env_filter(Some(&"ontoeval=trace".to_string()), LogLevel::Info);
        assert_eq!(filter.to_string(), "ontoeval=trace");
    }
}
