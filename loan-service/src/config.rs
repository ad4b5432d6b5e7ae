use std::net::{IpAddr, SocketAddr};

use loan_flow::FunnelPolicy;
use loan_flow::context::DEFAULT_MAX_CHAT_MESSAGES;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub log_format: LogFormat,
    pub max_salary_slip_attempts: u32,
    pub lender_name: String,
    pub max_chat_messages: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            database_url: None,
            log_format: LogFormat::Json,
            max_salary_slip_attempts: FunnelPolicy::default().max_salary_slip_attempts,
            lender_name: "Demo Capital".to_string(),
            max_chat_messages: DEFAULT_MAX_CHAT_MESSAGES,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; unset or blank variables
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let log_format = match var("LOG_FORMAT").as_deref().map(str::trim) {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Ok(Self {
            bind_addr: parse(var("BIND_ADDR"), "BIND_ADDR", "IP address", defaults.bind_addr)?,
            port: parse(var("PORT"), "PORT", "port number", defaults.port)?,
            database_url: var("DATABASE_URL"),
            log_format,
            max_salary_slip_attempts: parse(
                var("MAX_SALARY_SLIP_ATTEMPTS"),
                "MAX_SALARY_SLIP_ATTEMPTS",
                "positive integer",
                defaults.max_salary_slip_attempts,
            )?
            .max(1),
            lender_name: var("LENDER_NAME")
                .map(|name| name.trim().to_string())
                .unwrap_or(defaults.lender_name),
            max_chat_messages: parse(
                var("MAX_CHAT_MESSAGES"),
                "MAX_CHAT_MESSAGES",
                "positive integer",
                defaults.max_chat_messages,
            )?,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn policy(&self) -> FunnelPolicy {
        FunnelPolicy {
            max_salary_slip_attempts: self.max_salary_slip_attempts,
        }
    }
}

fn parse<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}
