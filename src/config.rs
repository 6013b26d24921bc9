/*
 * Responsibility
 * - 環境変数の読み込み (session-issuing service, prefixes, trusted origins)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    /// Origin of the external session-issuing service, e.g. `http://localhost:4000`.
    pub auth_service_url: Url,
    /// Provider namespace, mounted without the API prefix.
    pub auth_base_path: String,
    /// Session lookup endpoint, relative to `auth_base_path`.
    pub auth_session_path: String,
    pub auth_timeout: Duration,

    pub api_prefix: String,
    /// Normalized (`scheme://host[:port]`) origins allowed to call cross-origin.
    pub trusted_origins: Vec<String>,

    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup (env, test fixtures).
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match var("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));

        let auth_service_url = var("AUTH_SERVICE_URL")
            .ok_or(ConfigError::Missing("AUTH_SERVICE_URL"))
            .and_then(|raw| {
                Url::parse(raw.trim())
                    .map_err(|_| ConfigError::Invalid("AUTH_SERVICE_URL"))
            })?;

        if !matches!(auth_service_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("AUTH_SERVICE_URL"));
        }

        let auth_base_path = path_prefix(
            "AUTH_BASE_PATH",
            var("AUTH_BASE_PATH").unwrap_or_else(|| "/api/auth".to_string()),
        )?;

        let auth_session_path = path_prefix(
            "AUTH_SESSION_PATH",
            var("AUTH_SESSION_PATH").unwrap_or_else(|| "/get-session".to_string()),
        )?;

        let api_prefix = path_prefix(
            "API_PREFIX",
            var("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
        )?;

        // The provider namespace must stay distinguishable from application routes.
        if auth_base_path == api_prefix {
            return Err(ConfigError::Invalid("AUTH_BASE_PATH"));
        }

        let auth_timeout = Duration::from_millis(numeric(&var, "AUTH_TIMEOUT_MS", 5_000)?);

        let trusted_origins = var("TRUSTED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(normalize_origin)
            .collect::<Result<Vec<_>, _>>()?;

        let request_timeout =
            Duration::from_secs(numeric(&var, "REQUEST_TIMEOUT_SECONDS", 30)?);

        let body_limit_bytes = numeric(&var, "BODY_LIMIT_BYTES", 1024 * 1024)? as usize;

        Ok(Self {
            addr,
            app_env,
            auth_service_url,
            auth_base_path,
            auth_session_path,
            auth_timeout,
            api_prefix,
            trusted_origins,
            request_timeout,
            body_limit_bytes,
        })
    }

    /// Absolute URL of the provider's session lookup endpoint.
    pub fn session_endpoint(&self) -> Result<Url, ConfigError> {
        self.auth_service_url
            .join(&format!("{}{}", self.auth_base_path, self.auth_session_path))
            .map_err(|_| ConfigError::Invalid("AUTH_SESSION_PATH"))
    }
}

fn numeric<F>(var: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or(ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// `/api` style prefix: leading slash, no trailing slash, not the root.
fn path_prefix(key: &'static str, raw: String) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') || trimmed.len() < 2 || trimmed.ends_with('/') {
        return Err(ConfigError::Invalid(key));
    }
    if trimmed.contains(['{', '}', '*', '?', '#']) {
        return Err(ConfigError::Invalid(key));
    }
    Ok(trimmed.to_string())
}

/// Reduces an origin to `scheme://host[:port]` (the form browsers send in `Origin`).
fn normalize_origin(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::Invalid("TRUSTED_ORIGINS"))?;
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid("TRUSTED_ORIGINS"));
    }
    Ok(url.origin().ascii_serialization())
}
