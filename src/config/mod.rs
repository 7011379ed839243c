mod server;

pub(crate) use server::{LogLevel, ServerConfig, DEFAULT_PORT, ENV_PORT};
