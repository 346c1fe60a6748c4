mod snapshot;
mod whitelist;

pub use snapshot::{AuthzSnapshot, ConfigHandle};
pub use whitelist::{TeamEntry, WhitelistConfig};

use reqwest::Url;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const MAX_PROBE_RETRIES: u32 = 10;

#[derive(Debug, Clone)]
pub struct AuthzConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub provider: ProviderConfig,
    pub whitelist: WhitelistConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

/// Identity providers this service knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Root of the provider's REST API, e.g. `https://api.github.com`.
    pub api_base_url: Url,
    /// Profile endpoint; the access token is appended verbatim.
    pub user_info_url: String,
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Upper bound for a single membership or profile request.
    pub timeout: Duration,
    pub max_retries: u32,
    /// Whitelist entries probed at the same time for one login.
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_retries: 2,
            concurrency: 8,
        }
    }
}

impl AuthzConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_str = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get = |key: &str, default: Option<&str>| get_env(&lookup, key, default, is_prod);

        let api_base_url = get("GITHUB_API_BASE_URL", Some("https://api.github.com"))?;
        let api_base_url = Url::parse(&api_base_url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid GITHUB_API_BASE_URL: {}", e))
        })?;

        let whitelist = WhitelistConfig::from_parts(
            parse_bool("ALLOW_ALL_USERS", &get("ALLOW_ALL_USERS", Some("false"))?)?,
            split_list(&get("WHITELIST", Some(""))?),
            split_list(&get("DOMAINS", Some(""))?),
            split_list(&get("TEAM_WHITELIST", Some(""))?),
        )
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let config = AuthzConfig {
            common,
            environment: environment.clone(),
            service_name: get("SERVICE_NAME", Some("authz-service"))?,
            log_level: get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),
            provider: ProviderConfig {
                kind: get("PROVIDER", Some("github"))?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                api_base_url,
                user_info_url: get(
                    "GITHUB_USER_INFO_URL",
                    Some("https://api.github.com/user?access_token="),
                )?,
            },
            whitelist,
            probe: ProbeConfig {
                timeout: Duration::from_millis(parse_num(
                    "PROBE_TIMEOUT_MS",
                    &get("PROBE_TIMEOUT_MS", Some("5000"))?,
                )?),
                max_retries: parse_num("PROBE_MAX_RETRIES", &get("PROBE_MAX_RETRIES", Some("2"))?)?,
                concurrency: parse_num(
                    "PROBE_CONCURRENCY",
                    &get("PROBE_CONCURRENCY", Some("8"))?,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if !matches!(self.provider.api_base_url.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GITHUB_API_BASE_URL must be an http(s) URL"
            )));
        }

        if Url::parse(&self.provider.user_info_url).is_err() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GITHUB_USER_INFO_URL is not a valid URL"
            )));
        }

        if self.probe.timeout.is_zero() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PROBE_TIMEOUT_MS must be positive"
            )));
        }

        if self.probe.max_retries > MAX_PROBE_RETRIES {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PROBE_MAX_RETRIES must be at most {}",
                MAX_PROBE_RETRIES
            )));
        }

        if self.probe.concurrency == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PROBE_CONCURRENCY must be positive"
            )));
        }

        if self.whitelist.is_empty() {
            tracing::warn!("No whitelist configured - every login will be denied");
        }

        if self.environment == Environment::Prod && self.whitelist.allow_all_users {
            tracing::warn!("ALLOW_ALL_USERS is enabled in production");
        }

        Ok(())
    }

    /// The per-request view of this configuration.
    pub fn snapshot(&self) -> AuthzSnapshot {
        AuthzSnapshot {
            whitelist: self.whitelist.clone(),
            user_info_url: self.provider.user_info_url.clone(),
        }
    }
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be a boolean, got '{}'",
            key,
            other
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            _ => Err(format!("Unsupported provider: {}", s)),
        }
    }
}
