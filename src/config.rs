// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact relay.
//!
//! Built once at startup by [`Config::from_env`] and handed to the
//! components that need it. Nothing downstream reads the environment.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Configuration for the contact relay service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:5000)
    pub bind_addr: String,

    /// SMTP relay configuration
    pub smtp: SmtpConfig,

    /// Address every contact submission is delivered to
    pub recipient: String,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// HTTP surface configuration
    pub http: HttpConfig,

    /// Deployment posture
    pub environment: Environment,
}

/// SMTP relay connection settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise
    pub secure: bool,
    pub user: String,
    pub pass: String,
}

/// Fixed-window rate limiting for the submission endpoint.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Window length in milliseconds (default: 900000, 15 minutes)
    pub window_ms: u64,

    /// Maximum requests per client address per window (default: 5)
    pub max_requests: u32,

    /// Table size above which expired windows are pruned (default: 10000)
    pub max_tracked_clients: usize,
}

/// HTTP surface settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Origins allowed to make cross-origin requests
    pub allowed_origins: Vec<String>,

    /// Maximum accepted request body in bytes (default: 10 MiB)
    pub body_limit_bytes: usize,

    /// Upper bound for the SMTP health probe in milliseconds (default: 10000)
    pub health_timeout_ms: u64,
}

/// Deployment posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Internal error text may only reach clients in development.
    pub fn expose_error_details(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_window_ms() -> u64 {
    900_000
}

fn default_max_requests() -> u32 {
    5
}

fn default_max_tracked_clients() -> usize {
    10_000
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_dev_origins() -> Vec<String> {
    [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:3001",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_health_timeout_ms() -> u64 {
    10_000
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            secure: false,
            user: String::new(),
            pass: String::new(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            max_tracked_clients: default_max_tracked_clients(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        let mut allowed_origins = vec![default_frontend_url()];
        allowed_origins.extend(default_dev_origins());
        allowed_origins.dedup();
        Self {
            allowed_origins,
            body_limit_bytes: default_body_limit_bytes(),
            health_timeout_ms: default_health_timeout_ms(),
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl HttpConfig {
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

impl Config {
    /// Load configuration from the process environment, reading a `.env`
    /// file first if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    /// Build and validate a configuration from a set of variables.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(&vars, key);

        let bind_addr = match (get("BIND_ADDR"), get("PORT")) {
            (Some(addr), _) => addr.to_string(),
            (None, Some(port)) => {
                let port: u16 = parse("PORT", port)?;
                format!("0.0.0.0:{port}")
            }
            (None, None) => default_bind_addr(),
        };

        let smtp = SmtpConfig {
            host: get("SMTP_HOST").map_or_else(default_smtp_host, String::from),
            port: get("SMTP_PORT")
                .map(|v| parse("SMTP_PORT", v))
                .transpose()?
                .unwrap_or_else(default_smtp_port),
            secure: get("SMTP_SECURE")
                .map(|v| parse_bool("SMTP_SECURE", v))
                .transpose()?
                .unwrap_or(false),
            user: get("SMTP_USER").unwrap_or_default().to_string(),
            pass: vars.get("SMTP_PASS").cloned().unwrap_or_default(),
        };

        let rate_limit = RateLimitConfig {
            window_ms: get("RATE_LIMIT_WINDOW_MS")
                .map(|v| parse("RATE_LIMIT_WINDOW_MS", v))
                .transpose()?
                .unwrap_or_else(default_window_ms),
            max_requests: get("RATE_LIMIT_MAX_REQUESTS")
                .map(|v| parse("RATE_LIMIT_MAX_REQUESTS", v))
                .transpose()?
                .unwrap_or_else(default_max_requests),
            ..Default::default()
        };

        let mut allowed_origins =
            vec![get("FRONTEND_URL").map_or_else(default_frontend_url, String::from)];
        match get("ALLOWED_ORIGINS") {
            Some(list) => allowed_origins.extend(
                list.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from),
            ),
            None => allowed_origins.extend(default_dev_origins()),
        }
        let mut seen = std::collections::HashSet::new();
        allowed_origins.retain(|o| seen.insert(o.clone()));

        let http = HttpConfig {
            allowed_origins,
            body_limit_bytes: get("BODY_LIMIT_BYTES")
                .map(|v| parse("BODY_LIMIT_BYTES", v))
                .transpose()?
                .unwrap_or_else(default_body_limit_bytes),
            health_timeout_ms: get("HEALTH_TIMEOUT_MS")
                .map(|v| parse("HEALTH_TIMEOUT_MS", v))
                .transpose()?
                .unwrap_or_else(default_health_timeout_ms),
        };

        let environment = match get("APP_ENV") {
            Some(v) => v.parse().map_err(|()| ConfigError::Invalid {
                key: "APP_ENV",
                value: v.to_string(),
            })?,
            None => Environment::default(),
        };

        let config = Self {
            bind_addr,
            smtp,
            recipient: get("PERSONAL_EMAIL").unwrap_or_default().to_string(),
            rate_limit,
            http,
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    /// Refuse configurations that cannot deliver mail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("SMTP_HOST", &self.smtp.host),
            ("SMTP_USER", &self.smtp.user),
            ("SMTP_PASS", &self.smtp.pass),
            ("PERSONAL_EMAIL", &self.recipient),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_MAX_REQUESTS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// A set, non-blank variable, trimmed.
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
