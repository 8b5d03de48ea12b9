//! Global application configuration.
//!
//! `AppConfig` is loaded once from environment variables (and an optional `.env`
//! file) and then frozen. Nothing mutates it at runtime: components that need a
//! value receive it at construction time.

use std::env;
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} must be a valid integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("ATTENDANCE_SECRET must differ from JWT_SECRET")]
    SharedSecret,
}

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log: LogConfig,
    /// SQLite file path or full `sqlite:` DSN.
    pub database_path: String,
    /// Signing secret for attendance credentials. Never shared with login tokens.
    pub attendance_secret: String,
    /// Secret of the external login layer, if known. Only used to reject reuse.
    pub jwt_secret: Option<String>,
    pub attendance_token_ttl_minutes: i64,
    /// Offset of the reference timezone that defines "today" for a session.
    pub attendance_utc_offset_minutes: i32,
    pub frontend_url: Option<String>,
}

/// Logging settings, loadable on their own for tools that never sign credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
}

impl LogConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "roll-call.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
        }
    }
}

static CONFIG_INSTANCE: OnceLock<AppConfig> = OnceLock::new();

impl AppConfig {
    /// Reads the configuration from `.env` and environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let attendance_secret = required("ATTENDANCE_SECRET")?;
        let jwt_secret = optional("JWT_SECRET");
        if jwt_secret.as_deref() == Some(attendance_secret.as_str()) {
            return Err(ConfigError::SharedSecret);
        }

        Ok(Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "roll-call".into()),
            log: LogConfig::from_env(),
            database_path: database_path_from_env()?,
            attendance_secret,
            jwt_secret,
            attendance_token_ttl_minutes: number("ATTENDANCE_TOKEN_TTL_MINUTES", 15)?,
            attendance_utc_offset_minutes: number("ATTENDANCE_UTC_OFFSET_MINUTES", 0)?,
            frontend_url: optional("FRONTEND_URL"),
        })
    }

    /// Loads the configuration on first call and returns the frozen instance.
    pub fn init() -> Result<&'static AppConfig, ConfigError> {
        if let Some(cfg) = CONFIG_INSTANCE.get() {
            return Ok(cfg);
        }
        let cfg = Self::from_env()?;
        Ok(CONFIG_INSTANCE.get_or_init(|| cfg))
    }
}

/// Reads only `DATABASE_PATH`.
pub fn database_path_from_env() -> Result<String, ConfigError> {
    dotenvy::dotenv().ok();
    required("DATABASE_PATH")
}

fn is_dsn(path_or_url: &str) -> bool {
    path_or_url.starts_with("sqlite:")
}

/// Connection URL for `DATABASE_PATH`. A DSN is used as given; a plain path is
/// opened in create mode.
pub fn database_url(path_or_url: &str) -> String {
    if is_dsn(path_or_url) {
        path_or_url.to_owned()
    } else {
        format!("sqlite://{path_or_url}?mode=rwc")
    }
}

/// The database file behind `DATABASE_PATH`, or `None` for a DSN.
pub fn database_file(path_or_url: &str) -> Option<&Path> {
    (!is_dsn(path_or_url)).then(|| Path::new(path_or_url))
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(name));
    }
    Ok(value)
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn number<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "DATABASE_PATH",
        "LOG_LEVEL",
        "ATTENDANCE_SECRET",
        "JWT_SECRET",
        "ATTENDANCE_TOKEN_TTL_MINUTES",
        "ATTENDANCE_UTC_OFFSET_MINUTES",
    ];

    fn clear() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    fn set(name: &str, value: &str) {
        unsafe { env::set_var(name, value) };
    }

    #[test]
    fn database_url_keeps_dsn_and_wraps_paths() {
        assert_eq!(database_url("data/a.db"), "sqlite://data/a.db?mode=rwc");
        assert_eq!(database_url("sqlite://data/a.db?mode=rwc"), "sqlite://data/a.db?mode=rwc");
        assert_eq!(database_url("sqlite::memory:"), "sqlite::memory:");

        assert_eq!(database_file("data/a.db"), Some(Path::new("data/a.db")));
        assert_eq!(database_file("sqlite://data/a.db"), None);
    }

    #[test]
    #[serial]
    fn database_path_alone_needs_no_secret() {
        clear();
        set("DATABASE_PATH", "data/test.db");

        assert_eq!(database_path_from_env().unwrap(), "data/test.db");
        assert!(AppConfig::from_env().is_err());
        clear();
    }

    #[test]
    #[serial]
    fn init_freezes_first_load() {
        clear();
        set("DATABASE_PATH", "data/first.db");
        set("ATTENDANCE_SECRET", "qr-secret");
        let first = AppConfig::init().unwrap();

        set("DATABASE_PATH", "data/second.db");
        let second = AppConfig::init().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(second.database_path, "data/first.db");
        clear();
    }

    #[test]
    #[serial]
    fn loads_defaults() {
        clear();
        set("DATABASE_PATH", "data/test.db");
        set("ATTENDANCE_SECRET", "qr-secret");

        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.database_path, "data/test.db");
        assert_eq!(cfg.attendance_token_ttl_minutes, 15);
        assert_eq!(cfg.attendance_utc_offset_minutes, 0);
        assert!(cfg.jwt_secret.is_none());
        assert_eq!(cfg.log.log_level, "info");
        clear();
    }

    #[test]
    #[serial]
    fn missing_secret_is_an_error() {
        clear();
        set("DATABASE_PATH", "data/test.db");

        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err, ConfigError::Missing("ATTENDANCE_SECRET"));
        clear();
    }

    #[test]
    #[serial]
    fn rejects_secret_shared_with_login() {
        clear();
        set("DATABASE_PATH", "data/test.db");
        set("ATTENDANCE_SECRET", "same");
        set("JWT_SECRET", "same");

        assert_eq!(AppConfig::from_env().unwrap_err(), ConfigError::SharedSecret);
        clear();
    }

    #[test]
    #[serial]
    fn rejects_bad_ttl() {
        clear();
        set("DATABASE_PATH", "data/test.db");
        set("ATTENDANCE_SECRET", "qr-secret");
        set("ATTENDANCE_TOKEN_TTL_MINUTES", "soon");

        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber { name: "ATTENDANCE_TOKEN_TTL_MINUTES", .. }
        ));
        clear();
    }
}
