use thiserror::Error;

use crate::backfill::error::{PassError, ProviderError};

/// Unified application error.
///
/// Covers what can stop the binary before or after a pass; failures inside
/// a pass are reported through `PassReport` instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Pass error: {0}")]
    Pass(#[from] PassError),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_layer() {
        assert_eq!(
            AppError::Config("START_YEAR must be a valid number".into()).to_string(),
            "Config error: START_YEAR must be a valid number"
        );
        let err: AppError = ProviderError::RateLimitExceeded.into();
        assert_eq!(err.to_string(), "Provider error: Rate limit exceeded");
    }
}
