use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::core::series::PriceSeries;

/// Anything that can produce a complete price series in a single attempt.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self) -> Result<PriceSeries, FetchError>;
}

#[async_trait]
impl<S: PriceSource + ?Sized> PriceSource for Arc<S> {
    async fn fetch(&self) -> Result<PriceSeries, FetchError> {
        S::fetch(self).await
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Connection failure, timeout, or interrupted body.
    #[error("failed to reach the price endpoint: {0}")]
    Network(String),

    #[error("the price endpoint responded with `{status}`")]
    HttpStatus { status: StatusCode },

    /// Malformed or incomplete response body.
    #[error("failed to parse the prices: {0}")]
    Parse(String),

    /// Well-formed response without a single price.
    #[error("the price endpoint returned no prices")]
    NoData,
}

impl FetchError {
    pub fn network(error: reqwest::Error) -> Self {
        // Drop the URL, it may carry query parameters:
        Self::Network(format!("{:#}", anyhow::Error::from(error.without_url())))
    }

    pub fn parse(error: impl std::fmt::Display) -> Self {
        Self::Parse(error.to_string())
    }

    /// Whether repeating the same request within the same cycle may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::HttpStatus { status } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Parse(_) | Self::NoData => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(FetchError::Network("timed out".into()).is_retryable());
        assert!(FetchError::HttpStatus { status: StatusCode::INTERNAL_SERVER_ERROR }.is_retryable());
        assert!(FetchError::HttpStatus { status: StatusCode::TOO_MANY_REQUESTS }.is_retryable());
        assert!(!FetchError::HttpStatus { status: StatusCode::UNAUTHORIZED }.is_retryable());
        assert!(!FetchError::Parse("missing field `data`".into()).is_retryable());
        assert!(!FetchError::NoData.is_retryable());
    }

    #[test]
    fn test_display() {
        let error = FetchError::HttpStatus { status: StatusCode::INTERNAL_SERVER_ERROR };
        assert_eq!(error.to_string(), "the price endpoint responded with `500 Internal Server Error`");
    }
}
