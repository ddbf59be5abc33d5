use serde::{Deserialize, Serialize};

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E5xxx: Notification transport errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ConfigError,

    // Notification transport (E5xxx)
    TransportUnavailable,
    TransportTimeout,
    UpstreamRejected,
    MalformedResponse,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ConfigError => "E0002",

            // Notification transport
            Self::TransportUnavailable => "E5001",
            Self::TransportTimeout => "E5002",
            Self::UpstreamRejected => "E5003",
            Self::MalformedResponse => "E5004",
        }
    }

    /// Whether retrying the same request later can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransportUnavailable | Self::TransportTimeout)
    }
}

/// Failure talking to the poll source or push transport.
///
/// `Clone` because one refresh result is shared by every coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream returned HTTP {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Network(_) => ErrorCode::TransportUnavailable,
            Self::Timeout => ErrorCode::TransportTimeout,
            // 5xx is the upstream being down, not refusing us
            Self::Status { status, .. } if *status >= 500 => ErrorCode::TransportUnavailable,
            Self::Status { .. } => ErrorCode::UpstreamRejected,
            Self::Decode(_) => ErrorCode::MalformedResponse,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known { code: ErrorCode, message: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Known { code, .. } => *code,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
