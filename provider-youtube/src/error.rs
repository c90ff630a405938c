//! Error types for the YouTube provider

use thiserror::Error;

/// YouTube provider errors
#[derive(Error, Debug)]
pub enum YouTubeError {
    /// Authentication failed or token is invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("YouTube API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// The daily quota allowance is exhausted on the provider side
    #[error("YouTube quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Requested resource does not exist (deleted/terminated channel, playlist)
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl YouTubeError {
    /// Whether a bounded retry with backoff is worth attempting.
    ///
    /// Quota exhaustion and missing resources are terminal; retrying them
    /// burns allowance for nothing.
    pub fn is_transient(&self) -> bool {
        match self {
            YouTubeError::NetworkError(_) | YouTubeError::RateLimited => true,
            YouTubeError::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Whether this failure means the provider-side daily quota is gone
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, YouTubeError::QuotaExhausted(_))
    }

    /// Whether the target resource no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, YouTubeError::NotFound { .. })
    }
}

impl From<reqwest::Error> for YouTubeError {
    fn from(error: reqwest::Error) -> Self {
        YouTubeError::NetworkError(error.to_string())
    }
}

/// Result type for YouTube operations
pub type Result<T> = std::result::Result<T, YouTubeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = YouTubeError::ApiError {
            status_code: 404,
            message: "Playlist not found".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "YouTube API error (status 404): Playlist not found"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(YouTubeError::NetworkError("reset".into()).is_transient());
        assert!(YouTubeError::RateLimited.is_transient());
        assert!(YouTubeError::ApiError {
            status_code: 503,
            message: "backend".into()
        }
        .is_transient());

        assert!(!YouTubeError::ApiError {
            status_code: 400,
            message: "bad request".into()
        }
        .is_transient());
        assert!(!YouTubeError::QuotaExhausted("daily limit".into()).is_transient());
        assert!(!YouTubeError::NotFound {
            resource: "UCgone".into()
        }
        .is_transient());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(YouTubeError::QuotaExhausted("daily limit".into()).is_quota_exhausted());
        assert!(YouTubeError::NotFound {
            resource: "UCgone".into()
        }
        .is_not_found());
    }
}
