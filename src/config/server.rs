use clap::ValueEnum;
use std::time::Duration;
use tracing::Level;

use crate::Args;

// The environment variable overriding the bind port
pub(crate) const ENV_PORT: &str = "PORT";
pub(crate) const DEFAULT_PORT: u16 = 8000;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LogLevel {
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ServerConfig {
    pub(crate) port: u16,
    pub(crate) log_level: LogLevel,
    pub(crate) json: bool,
    pub(crate) metrics_port: Option<u16>,
    pub(crate) shutdown_timeout: Duration,
}

/// A `PORT` value that was ignored in favour of `fallback`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct InvalidPort {
    pub(crate) value: String,
    pub(crate) fallback: u16,
}

impl std::fmt::Display for InvalidPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid {ENV_PORT} value {:?}, falling back to {}",
            self.value, self.fallback
        )
    }
}

impl ServerConfig {
    /// `PORT` wins over `--port` when it holds a usable port number.
    pub(crate) fn resolve(args: &Args, env_port: Option<String>) -> (Self, Option<InvalidPort>) {
        let (port, invalid_port) = match env_port.filter(|value| !value.is_empty()) {
            None => (args.port, None),
            Some(value) => match value.trim().parse::<u16>() {
                Ok(port) if port > 0 => (port, None),
                _ => (
                    args.port,
                    Some(InvalidPort {
                        value,
                        fallback: args.port,
                    }),
                ),
            },
        };

        let config = ServerConfig {
            port,
            log_level: args.log_level,
            json: args.json,
            metrics_port: args.metrics_port,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        };
        (config, invalid_port)
    }
}
