//! Provider error types.

use thiserror::Error;

/// Failures reported by a provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Account or region quota exhausted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Target server instance does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure, timeout, rate limiting or 5xx.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Request rejected as invalid, locally or by the provider.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Response body could not be decoded.
    #[error("invalid provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::Decode(_))
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Transient("timeout".into()).is_transient());
        assert!(ProviderError::Decode("eof".into()).is_transient());
        assert!(!ProviderError::Authentication("bad key".into()).is_transient());
        assert!(!ProviderError::QuotaExceeded("servers".into()).is_transient());
        assert!(!ProviderError::NotFound("srv-1".into()).is_transient());
        assert!(!ProviderError::MalformedRequest("serverNo".into()).is_transient());
    }
}
