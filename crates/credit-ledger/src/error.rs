use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Failures surfaced by the binary entry points (`serve`, `demo`).
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Ledger(LedgerError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Ledger(err) => write!(f, "ledger error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Ledger(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<LedgerError> for AppError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn ledger_failures_keep_their_source() {
        let err = AppError::from(LedgerError::NotQualified);
        assert!(matches!(err, AppError::Ledger(LedgerError::NotQualified)));
        assert!(err.to_string().starts_with("ledger error: "));
        let source = err.source().expect("source kept");
        assert_eq!(source.to_string(), LedgerError::NotQualified.to_string());
    }

    #[test]
    fn config_failures_are_labelled() {
        let err = AppError::from(ConfigError::EmptyOwner);
        assert_eq!(
            err.to_string(),
            "configuration error: LEDGER_OWNER must not be empty"
        );
    }
}
