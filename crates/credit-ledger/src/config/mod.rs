use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::ledger::{Identity, OfferPolicy};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub ledger: LedgerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = LogFormat::parse(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        )?;

        let owner = env::var("LEDGER_OWNER").unwrap_or_else(|_| "owner".to_string());
        let min_score_floor = read_u16("LEDGER_MIN_SCORE_FLOOR", OfferPolicy::DEFAULT_SCORE_FLOOR)?;
        let min_score_ceiling =
            read_u16("LEDGER_MIN_SCORE_CEILING", OfferPolicy::DEFAULT_SCORE_CEILING)?;
        let max_interest_bps =
            read_u16("LEDGER_MAX_INTEREST_BPS", OfferPolicy::DEFAULT_MAX_INTEREST_BPS)?;

        let ledger = LedgerConfig {
            owner,
            min_score_floor,
            min_score_ceiling,
            max_interest_bps,
        };
        ledger.validate()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            ledger,
        })
    }
}

fn read_u16(key: &'static str, default: u16) -> Result<u16, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat {
                value: other.to_string(),
            }),
        }
    }
}

/// Ledger ownership and offer bounds.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub owner: String,
    pub min_score_floor: u16,
    pub min_score_ceiling: u16,
    pub max_interest_bps: u16,
}

impl LedgerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::EmptyOwner);
        }
        if self.min_score_floor > self.min_score_ceiling {
            return Err(ConfigError::InvalidScoreRange {
                floor: self.min_score_floor,
                ceiling: self.min_score_ceiling,
            });
        }
        Ok(())
    }

    pub fn owner_identity(&self) -> Result<Identity, ConfigError> {
        Identity::parse(&self.owner).map_err(|_| ConfigError::EmptyOwner)
    }

    pub fn offer_policy(&self) -> OfferPolicy {
        OfferPolicy::new(
            self.min_score_floor..=self.min_score_ceiling,
            self.max_interest_bps,
        )
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat { value: String },
    InvalidNumber { key: &'static str, value: String },
    InvalidScoreRange { floor: u16, ceiling: u16 },
    EmptyOwner,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat { value } => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json', found '{value}'")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a valid u16, found '{value}'")
            }
            ConfigError::InvalidScoreRange { floor, ceiling } => write!(
                f,
                "LEDGER_MIN_SCORE_FLOOR ({floor}) must not exceed LEDGER_MIN_SCORE_CEILING ({ceiling})"
            ),
            ConfigError::EmptyOwner => write!(f, "LEDGER_OWNER must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "LEDGER_OWNER",
            "LEDGER_MIN_SCORE_FLOOR",
            "LEDGER_MIN_SCORE_CEILING",
            "LEDGER_MAX_INTEREST_BPS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.ledger.owner, "owner");

        let policy = config.ledger.offer_policy();
        assert_eq!(policy.score_range(), &(300..=850));
        assert_eq!(policy.max_interest_bps(), 2000);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_inverted_score_range() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LEDGER_MIN_SCORE_FLOOR", "900");
        env::set_var("LEDGER_MIN_SCORE_CEILING", "850");
        match AppConfig::load() {
            Err(ConfigError::InvalidScoreRange { floor, ceiling }) => {
                assert_eq!((floor, ceiling), (900, 850));
            }
            other => panic!("expected invalid score range, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn reads_json_log_format_and_owner() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_LOG_FORMAT", "JSON");
        env::set_var("LEDGER_OWNER", "  0xA11CE  ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.telemetry.format, LogFormat::Json);
        let owner = config.ledger.owner_identity().expect("owner parses");
        assert_eq!(owner.as_str(), "0xA11CE");
        reset_env();
    }

    #[test]
    fn rejects_unknown_log_format() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_LOG_FORMAT", "xml");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidLogFormat { .. })
        ));
        reset_env();
    }
}
