//! Service configuration loaded from environment variables.
//!
//! Loading is fail-fast: a missing table name or a malformed value stops the
//! process before any component is built. Components receive their settings
//! explicitly from here; nothing else reads the environment.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use vending_provisioning::orchestrator::{
    DEFAULT_ASSOCIATION_COOLDOWN, DEFAULT_PORTFOLIO_PROVIDER, DEFAULT_PRODUCT_NAME,
    DEFAULT_PRODUCT_OWNER,
};
use vending_provisioning::{ProvisioningConfig, WorkflowConfig};

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Account request table (`DYNAMO_TABLE`). Required.
    pub table_name: String,
    /// Principal granted launch access to the factory portfolio (`PRINCIPAL_ARN`).
    pub principal_arn: Option<String>,
    /// Provisioning state machine (`SFN_ARN`).
    pub state_machine_arn: Option<String>,
    /// Region override (`AWS_REGION`); otherwise the SDK default chain decides.
    pub aws_region: Option<String>,
    pub product_owner: String,
    pub product_name: String,
    pub portfolio_provider: String,
    pub association_cooldown: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub bind_addr: SocketAddr,
    pub rust_log: String,
}

impl Config {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DYNAMO_TABLE` is unset or any value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let table_name =
            var("DYNAMO_TABLE").ok_or_else(|| ConfigError::MissingVar("DYNAMO_TABLE".to_string()))?;

        let association_cooldown = match var("ASSOCIATION_COOLDOWN_SECS") {
            Some(raw) => Duration::from_secs(parse("ASSOCIATION_COOLDOWN_SECS", &raw)?),
            None => DEFAULT_ASSOCIATION_COOLDOWN,
        };
        let defaults = WorkflowConfig::default();
        let poll_interval = match var("POLL_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(parse("POLL_INTERVAL_SECS", &raw)?),
            None => defaults.poll_interval,
        };
        let max_poll_attempts = match var("MAX_POLL_ATTEMPTS") {
            Some(raw) => parse("MAX_POLL_ATTEMPTS", &raw)?,
            None => defaults.max_poll_attempts,
        };
        let bind_addr = match var("BIND_ADDR") {
            Some(raw) => parse("BIND_ADDR", &raw)?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        Ok(Self {
            table_name,
            principal_arn: var("PRINCIPAL_ARN"),
            state_machine_arn: var("SFN_ARN"),
            aws_region: var("AWS_REGION"),
            product_owner: var("PRODUCT_OWNER").unwrap_or_else(|| DEFAULT_PRODUCT_OWNER.to_string()),
            product_name: var("PRODUCT_NAME").unwrap_or_else(|| DEFAULT_PRODUCT_NAME.to_string()),
            portfolio_provider: var("PORTFOLIO_PROVIDER")
                .unwrap_or_else(|| DEFAULT_PORTFOLIO_PROVIDER.to_string()),
            association_cooldown,
            poll_interval,
            max_poll_attempts,
            bind_addr,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Settings for the provisioning stage. Requires `PRINCIPAL_ARN`.
    pub fn provisioning(&self) -> Result<ProvisioningConfig, ConfigError> {
        let principal_arn = self
            .principal_arn
            .clone()
            .ok_or_else(|| ConfigError::MissingVar("PRINCIPAL_ARN".to_string()))?;

        let mut config = ProvisioningConfig::new(principal_arn)
            .with_association_cooldown(self.association_cooldown);
        config.product_owner = self.product_owner.clone();
        config.product_name = self.product_name.clone();
        config.portfolio_provider = self.portfolio_provider.clone();
        Ok(config)
    }

    #[must_use]
    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig {
            poll_interval: self.poll_interval,
            max_poll_attempts: self.max_poll_attempts,
        }
    }
}

fn parse<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var: var.to_string(),
        message: e.to_string(),
    })
}
