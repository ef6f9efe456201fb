use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("there is no known server; cluster endpoint list is empty")]
    NoReachableServer,

    #[error("retry limit reached; giving up on completing the request")]
    RetryLimitExceeded,

    #[error("follow redirect limit crossed for {0}")]
    RedirectLimitExceeded(String),

    #[error("invalid redirect URL {0}")]
    InvalidRedirect(String),

    #[error("initial resolution of server endpoints failed")]
    InitialResolutionFailed,

    #[error("no availability zone mapping for region {0}")]
    MappingMissing(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("payload encoding failed: {0}")]
    Encoder(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    /// Transient failures that may succeed against another server. Decorators
    /// use this to decide between retrying and surfacing the error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DiscoveryError::Transport(_) | DiscoveryError::Io(_) | DiscoveryError::NoReachableServer
        )
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DiscoveryError::Transport("refused".to_string()).is_retryable());
        assert!(DiscoveryError::NoReachableServer.is_retryable());
        assert!(DiscoveryError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused"
        ))
        .is_retryable());

        assert!(!DiscoveryError::RetryLimitExceeded.is_retryable());
        assert!(!DiscoveryError::InvalidRedirect("x".to_string()).is_retryable());
        assert!(!DiscoveryError::MappingMissing("us-moon-1".to_string()).is_retryable());
    }
}
