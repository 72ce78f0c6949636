use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SERVICE_NAME: &str = "Smart SACCO Webhook Server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("APP_ENV must be 'development' or 'production', got '{}'", other),
        }
    }
}

/// What happens when the notification write fails during reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationFailurePolicy {
    /// Log the failure and still mark the callback processed.
    #[default]
    Swallow,
    /// Fail the pass; the callback stays unprocessed and resumable.
    Block,
}

impl FromStr for NotificationFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "swallow" => Ok(NotificationFailurePolicy::Swallow),
            "block" => Ok(NotificationFailurePolicy::Block),
            other => anyhow::bail!(
                "NOTIFICATION_FAILURE_POLICY must be 'swallow' or 'block', got '{}'",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// When absent the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub migrations_dir: PathBuf,
    pub environment: Environment,
    pub service_name: String,
    pub notification_failure_policy: NotificationFailurePolicy,
    pub log_format: LogFormat,
    pub log_request_body: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            database_url: None,
            database_max_connections: 5,
            migrations_dir: PathBuf::from("./migrations"),
            environment: Environment::Production,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            notification_failure_policy: NotificationFailurePolicy::default(),
            log_format: LogFormat::Pretty,
            log_request_body: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let defaults = Config::default();
        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| defaults.server_port.to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .map(|v| v.parse())
                .unwrap_or(Ok(defaults.database_max_connections))?,
            migrations_dir: env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.migrations_dir),
            environment: env::var("APP_ENV")
                .map(|v| v.parse())
                .unwrap_or(Ok(defaults.environment))?,
            service_name: env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            notification_failure_policy: env::var("NOTIFICATION_FAILURE_POLICY")
                .map(|v| v.parse())
                .unwrap_or(Ok(defaults.notification_failure_policy))?,
            log_format: env::var("LOG_FORMAT")
                .map(|v| v.parse())
                .unwrap_or(Ok(defaults.log_format))?,
            log_request_body: env::var("LOG_REQUEST_BODY")
                .map(|v| v.parse().unwrap_or(false))
                .unwrap_or(defaults.log_request_body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!(" PROD ".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_notification_policy_parsing() {
        assert_eq!(
            "block".parse::<NotificationFailurePolicy>().unwrap(),
            NotificationFailurePolicy::Block
        );
        assert_eq!(
            "Swallow".parse::<NotificationFailurePolicy>().unwrap(),
            NotificationFailurePolicy::Swallow
        );
        assert!("retry".parse::<NotificationFailurePolicy>().is_err());
    }

    #[test]
    fn test_defaults_match_legacy_server() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.service_name, "Smart SACCO Webhook Server");
        assert!(!config.environment.is_development());
        assert_eq!(config.notification_failure_policy, NotificationFailurePolicy::Swallow);
    }
}
