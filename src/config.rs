use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://api.rootdata.com/open";
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Sse,
    Stdio,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base_url: String,
    pub language: String,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
    pub transport: Transport,
    pub mcp_api_token: Option<String>,
    pub bind_addr: String,
    pub bind_port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ROOTDATA_API_KEY is required and must not be empty")]
    MissingApiKey,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("ROOTDATA_TIMEOUT_SECS must be a positive integer")]
    InvalidTimeout,
    #[error("ROOTDATA_MAX_CONCURRENCY must be between 1 and 32")]
    InvalidConcurrency,
    #[error("MCP_TRANSPORT must be one of: sse, stdio")]
    InvalidTransport,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = non_empty_var("ROOTDATA_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let api_base_url = non_empty_var("ROOTDATA_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let language =
            non_empty_var("ROOTDATA_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let timeout_secs = non_empty_var("ROOTDATA_TIMEOUT_SECS")
            .map(|value| {
                value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or(ConfigError::InvalidTimeout)
            })
            .transpose()?
            .unwrap_or(30);

        let max_concurrency = non_empty_var("ROOTDATA_MAX_CONCURRENCY")
            .map(|value| {
                value
                    .parse::<usize>()
                    .ok()
                    .filter(|limit| (1..=32).contains(limit))
                    .ok_or(ConfigError::InvalidConcurrency)
            })
            .transpose()?
            .unwrap_or(4);

        let transport = match non_empty_var("MCP_TRANSPORT")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("sse") | Some("http") => Transport::Sse,
            Some("stdio") => Transport::Stdio,
            _ => return Err(ConfigError::InvalidTransport),
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8000);

        let config = Self {
            api_key,
            api_base_url,
            language,
            request_timeout: Duration::from_secs(timeout_secs),
            max_concurrency,
            transport,
            mcp_api_token: non_empty_var("MCP_API_TOKEN"),
            bind_addr,
            bind_port,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
