//! Session configuration selected per deployment environment.
//!
//! SYSTEM CONTEXT
//! ==============
//! The WASM bundle has no process environment at runtime, so values are baked
//! in at build time via `option_env!`. Parsing goes through a key lookup
//! closure so tests can feed arbitrary maps.
//!
//! TRADE-OFFS
//! ==========
//! Numeric knobs parse leniently (a bad value falls back to the default) so a
//! typo never bricks the console. Settings that change security posture (the
//! environment name, the development bypass) are strict.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use crate::net::gateway::GatewayEndpoints;

pub const DEFAULT_AUTH_BASE: &str = "/auth";
pub const DEFAULT_SESSION_CHECK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 300;
pub const DEFAULT_VISIBILITY_CHECK_SECS: u64 = 60;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;
pub const DEFAULT_MAX_REFRESH_FAILURES: u32 = 5;
pub const DEFAULT_MAX_TRANSIENT_FAILURES: u32 = 15;
pub const DEFAULT_MIN_REFRESH_SPACING_SECS: u64 = 5;

/// Errors produced while building a [`SessionConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `CONSOLE_ENV` named an environment we do not know.
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    /// The static mock session was requested for a production build.
    #[error("development session bypass is not allowed in production")]
    DevBypassInProduction,
}

/// Deployment environment the bundle was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            None | Some("" | "development" | "dev") => Ok(Self::Development),
            Some("staging") => Ok(Self::Staging),
            Some("production" | "prod") => Ok(Self::Production),
            Some(other) => Err(ConfigError::UnknownEnvironment(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub environment: Environment,
    /// Path prefix of the identity gateway (e.g. `/auth`).
    pub auth_base: String,
    /// Base check interval; also the longest a single timer is armed for.
    pub session_check_interval: Duration,
    /// Refresh this long before the credential expires.
    pub refresh_threshold: Duration,
    /// Minimum gap between visibility-triggered session re-fetches.
    pub visibility_check_interval: Duration,
    /// Upper bound of the failure backoff floor.
    pub max_backoff: Duration,
    /// Consecutive gateway failures that force a local logout.
    pub max_consecutive_failures: u32,
    /// Rate-limited or network-failed attempts that give up on the session.
    pub max_transient_failures: u32,
    /// Minimum gap between two successful refreshes.
    pub min_refresh_spacing: Duration,
    /// Substitute a static mock session for the gateway.
    pub dev_bypass: bool,
    pub log_level: log::Level,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            auth_base: DEFAULT_AUTH_BASE.to_owned(),
            session_check_interval: Duration::from_secs(DEFAULT_SESSION_CHECK_INTERVAL_SECS),
            refresh_threshold: Duration::from_secs(DEFAULT_REFRESH_THRESHOLD_SECS),
            visibility_check_interval: Duration::from_secs(DEFAULT_VISIBILITY_CHECK_SECS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            max_consecutive_failures: DEFAULT_MAX_REFRESH_FAILURES,
            max_transient_failures: DEFAULT_MAX_TRANSIENT_FAILURES,
            min_refresh_spacing: Duration::from_secs(DEFAULT_MIN_REFRESH_SPACING_SECS),
            dev_bypass: false,
            log_level: log::Level::Info,
        }
    }
}

impl SessionConfig {
    /// Build config from the variables baked in at compile time.
    ///
    /// Keys:
    /// - `CONSOLE_ENV`: `development` (default), `staging`, `production`
    /// - `CONSOLE_AUTH_BASE`: default `/auth`
    /// - `CONSOLE_SESSION_CHECK_INTERVAL_SECS`: default 300
    /// - `CONSOLE_REFRESH_THRESHOLD_SECS`: default 300
    /// - `CONSOLE_VISIBILITY_CHECK_SECS`: default 60
    /// - `CONSOLE_MAX_BACKOFF_MS`: default 60000
    /// - `CONSOLE_MAX_REFRESH_FAILURES`: default 5
    /// - `CONSOLE_MAX_TRANSIENT_FAILURES`: default 15
    /// - `CONSOLE_MIN_REFRESH_SPACING_SECS`: default 5
    /// - `CONSOLE_AUTH_DEV_BYPASS`: default `false`
    /// - `CONSOLE_LOG_LEVEL`: default `info`
    ///
    /// # Errors
    ///
    /// See [`SessionConfig::from_lookup`].
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            let value = match key {
                "CONSOLE_ENV" => option_env!("CONSOLE_ENV"),
                "CONSOLE_AUTH_BASE" => option_env!("CONSOLE_AUTH_BASE"),
                "CONSOLE_SESSION_CHECK_INTERVAL_SECS" => option_env!("CONSOLE_SESSION_CHECK_INTERVAL_SECS"),
                "CONSOLE_REFRESH_THRESHOLD_SECS" => option_env!("CONSOLE_REFRESH_THRESHOLD_SECS"),
                "CONSOLE_VISIBILITY_CHECK_SECS" => option_env!("CONSOLE_VISIBILITY_CHECK_SECS"),
                "CONSOLE_MAX_BACKOFF_MS" => option_env!("CONSOLE_MAX_BACKOFF_MS"),
                "CONSOLE_MAX_REFRESH_FAILURES" => option_env!("CONSOLE_MAX_REFRESH_FAILURES"),
                "CONSOLE_MAX_TRANSIENT_FAILURES" => option_env!("CONSOLE_MAX_TRANSIENT_FAILURES"),
                "CONSOLE_MIN_REFRESH_SPACING_SECS" => option_env!("CONSOLE_MIN_REFRESH_SPACING_SECS"),
                "CONSOLE_AUTH_DEV_BYPASS" => option_env!("CONSOLE_AUTH_DEV_BYPASS"),
                "CONSOLE_LOG_LEVEL" => option_env!("CONSOLE_LOG_LEVEL"),
                _ => None,
            };
            value.map(str::to_owned)
        })
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownEnvironment`] for an unrecognised
    /// `CONSOLE_ENV`, and [`ConfigError::DevBypassInProduction`] when the
    /// bypass is requested for a production build.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::parse(lookup("CONSOLE_ENV").as_deref())?;
        let dev_bypass = lookup("CONSOLE_AUTH_DEV_BYPASS").is_some_and(|v| parse_flag(&v));
        if dev_bypass && environment == Environment::Production {
            return Err(ConfigError::DevBypassInProduction);
        }

        let auth_base = lookup("CONSOLE_AUTH_BASE")
            .map(|v| v.trim().trim_end_matches('/').to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTH_BASE.to_owned());

        let secs = |key: &str, default: u64| Duration::from_secs(parse_or(lookup(key), default).max(1));

        Ok(Self {
            environment,
            auth_base,
            session_check_interval: secs("CONSOLE_SESSION_CHECK_INTERVAL_SECS", DEFAULT_SESSION_CHECK_INTERVAL_SECS),
            refresh_threshold: Duration::from_secs(parse_or(
                lookup("CONSOLE_REFRESH_THRESHOLD_SECS"),
                DEFAULT_REFRESH_THRESHOLD_SECS,
            )),
            visibility_check_interval: secs("CONSOLE_VISIBILITY_CHECK_SECS", DEFAULT_VISIBILITY_CHECK_SECS),
            max_backoff: Duration::from_millis(parse_or(lookup("CONSOLE_MAX_BACKOFF_MS"), DEFAULT_MAX_BACKOFF_MS)),
            max_consecutive_failures: parse_or(lookup("CONSOLE_MAX_REFRESH_FAILURES"), DEFAULT_MAX_REFRESH_FAILURES)
                .max(1),
            max_transient_failures: parse_or(lookup("CONSOLE_MAX_TRANSIENT_FAILURES"), DEFAULT_MAX_TRANSIENT_FAILURES)
                .max(1),
            min_refresh_spacing: Duration::from_secs(parse_or(
                lookup("CONSOLE_MIN_REFRESH_SPACING_SECS"),
                DEFAULT_MIN_REFRESH_SPACING_SECS,
            )),
            dev_bypass,
            log_level: lookup("CONSOLE_LOG_LEVEL")
                .and_then(|v| v.trim().parse::<log::Level>().ok())
                .unwrap_or(log::Level::Info),
        })
    }

    /// Gateway endpoints rooted at [`SessionConfig::auth_base`].
    pub fn endpoints(&self) -> GatewayEndpoints {
        GatewayEndpoints::new(&self.auth_base)
    }
}

fn parse_or<T>(raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
{
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
