use std::str::FromStr;
use std::time::Duration;

use crate::BoxError;
use crate::recovery::RecoveryConfig;

/// Store URL selecting the in-process [`MemoryStore`](crate::store::MemoryStore)
pub const MEMORY_STORE_URL: &str = "memory";

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | ENVIRONMENT | development | development / staging / production |
/// | HTTP_PORT | 8080 | API port |
/// | STORE_URL | mem:// | SurrealDB endpoint, or `memory` |
/// | STORE_NAMESPACE | core | SurrealDB namespace |
/// | STORE_DATABASE | coredb | SurrealDB database |
/// | IDENTITY_SERVICE_URL | http://localhost:3001 | required outside development |
/// | IDENTITY_TIMEOUT_MS | 10000 | per-call timeout |
/// | RECOVERY_ENABLED | true | run the recovery scanner |
/// | RECOVERY_INTERVAL_SECS | 60 | scanner period |
/// | RECOVERY_IN_PROGRESS_MAX_AGE_SECS | 180 | stuck `approval_in_progress` age |
/// | RECOVERY_USER_CREATED_MAX_AGE_SECS | 180 | stuck `user_created` age |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | background task drain timeout |
/// | LOG_LEVEL | info | default filter level (`RUST_LOG` wins) |
/// | LOG_DIR | unset | daily log files when set |
/// | LOG_JSON | false | JSON log lines |
#[derive(Debug, Clone)]
pub struct Config {
    /// development | staging | production
    pub environment: String,
    pub http_port: u16,

    pub store_url: String,
    pub store_namespace: String,
    pub store_database: String,

    pub identity_service_url: String,
    pub identity_timeout_ms: u64,

    pub recovery_enabled: bool,
    pub recovery_interval_secs: u64,
    pub recovery_in_progress_max_age_secs: u64,
    pub recovery_user_created_max_age_secs: u64,

    pub shutdown_timeout_ms: u64,

    pub log_level: String,
    pub log_dir: Option<String>,
    pub log_json: bool,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.into())
}

impl Config {
    /// Require a variable to be set and non-empty outside development
    fn require_outside_development(
        name: &str,
        environment: &str,
        default: &str,
    ) -> Result<String, BoxError> {
        match std::env::var(name) {
            Ok(v) if !v.is_empty() => Ok(v),
            _ if environment == "development" => Ok(default.into()),
            _ => Err(format!("{name} must be set in {environment} environment").into()),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = env_string("ENVIRONMENT", "development");

        let config = Self {
            http_port: env_or("HTTP_PORT", 8080),
            store_url: env_string("STORE_URL", "mem://"),
            store_namespace: env_string("STORE_NAMESPACE", "core"),
            store_database: env_string("STORE_DATABASE", "coredb"),
            identity_service_url: Self::require_outside_development(
                "IDENTITY_SERVICE_URL",
                &environment,
                "http://localhost:3001",
            )?,
            identity_timeout_ms: env_or("IDENTITY_TIMEOUT_MS", 10_000),
            recovery_enabled: env_or("RECOVERY_ENABLED", true),
            recovery_interval_secs: env_or("RECOVERY_INTERVAL_SECS", 60),
            recovery_in_progress_max_age_secs: env_or("RECOVERY_IN_PROGRESS_MAX_AGE_SECS", 180),
            recovery_user_created_max_age_secs: env_or("RECOVERY_USER_CREATED_MAX_AGE_SECS", 180),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10_000),
            log_level: env_string("LOG_LEVEL", "info"),
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            log_json: env_or("LOG_JSON", false),
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BoxError> {
        if self.recovery_interval_secs == 0 {
            return Err("RECOVERY_INTERVAL_SECS must be greater than 0".into());
        }
        if self.identity_timeout_ms == 0 {
            return Err("IDENTITY_TIMEOUT_MS must be greater than 0".into());
        }
        Ok(())
    }

    pub fn uses_memory_store(&self) -> bool {
        self.store_url == MEMORY_STORE_URL
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn recovery(&self) -> RecoveryConfig {
        RecoveryConfig {
            interval: Duration::from_secs(self.recovery_interval_secs),
            in_progress_max_age: Duration::from_secs(self.recovery_in_progress_max_age_secs),
            user_created_max_age: Duration::from_secs(self.recovery_user_created_max_age_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            environment: "development".into(),
            http_port: 8080,
            store_url: MEMORY_STORE_URL.into(),
            store_namespace: "core".into(),
            store_database: "coredb".into(),
            identity_service_url: "http://localhost:3001".into(),
            identity_timeout_ms: 10_000,
            recovery_enabled: true,
            recovery_interval_secs: 60,
            recovery_in_progress_max_age_secs: 180,
            recovery_user_created_max_age_secs: 300,
            shutdown_timeout_ms: 10_000,
            log_level: "info".into(),
            log_dir: None,
            log_json: false,
        }
    }

    #[test]
    fn test_recovery_durations() {
        let recovery = sample().recovery();
        assert_eq!(recovery.interval, Duration::from_secs(60));
        assert_eq!(recovery.in_progress_max_age, Duration::from_secs(180));
        assert_eq!(recovery.user_created_max_age, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = sample();
        assert!(config.validate().is_ok());
        config.recovery_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_memory_store_selection() {
        let mut config = sample();
        assert!(config.uses_memory_store());
        config.store_url = "mem://".into();
        assert!(!config.uses_memory_store());
    }
}
