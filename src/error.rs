//! Error types for the lead bot.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Backend API errors, classified for retry and user messaging.
///
/// `Server`, `Timeout` and `Network` are retried inside the client up to
/// the attempt budget; `Client` and `Unknown` are surfaced after a single
/// attempt. Once an `ApiError` reaches a flow handler, retries are already
/// exhausted — the handler only maps the kind to a localized message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("client error ({status}): {body}")]
    Client { status: u16, body: String },

    #[error("server error ({status})")]
    Server { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Timeout | Self::Network(_))
    }
}

/// Result alias for API client operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Local input-validation errors. These never reach the network and never
/// clear the session; the offending state is simply re-prompted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name too short")]
    NameTooShort,

    #[error("malformed national id")]
    MalformedIin,

    #[error("unparseable phone number")]
    MalformedPhone,
}

/// Chat-channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ApiError::Server { status: 503 }.is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(ApiError::Network("refused".into()).is_retryable());
    }

    #[test]
    fn non_retryable_kinds() {
        let client = ApiError::Client {
            status: 422,
            body: "bad payload".into(),
        };
        assert!(!client.is_retryable());
        assert!(!ApiError::Unknown("?".into()).is_retryable());
    }
}
