use reqwest::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthzError {
    /// Network failure talking to the provider.
    #[error("Transport error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider did not answer within the probe timeout.
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: StatusCode },

    #[error("Invalid response body from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),

    #[error("Profile mapping error: {0}")]
    Mapping(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// A probe for one whitelist entry could not be resolved.
    #[error("Membership for '{entry}' is indeterminate: {source}")]
    MembershipIndeterminate {
        entry: String,
        #[source]
        source: Box<AuthzError>,
    },
}

impl AuthzError {
    pub fn indeterminate(entry: impl Into<String>, source: AuthzError) -> Self {
        AuthzError::MembershipIndeterminate {
            entry: entry.into(),
            source: Box::new(source),
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthzError::Transport { .. } => "transport",
            AuthzError::Timeout { .. } => "timeout",
            AuthzError::UnexpectedStatus { .. } => "unexpected_status",
            AuthzError::InvalidResponse { .. } => "invalid_response",
            AuthzError::InvalidUrl(_) => "invalid_url",
            AuthzError::Mapping(_) => "mapping",
            AuthzError::TokenExchange(_) => "token_exchange",
            AuthzError::MembershipIndeterminate { .. } => "indeterminate",
        }
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::TokenExchange(e) => AppError::Unauthorized(anyhow::anyhow!(e)),
            AuthzError::Timeout { .. } => AppError::ServiceUnavailable(None),
            AuthzError::UnexpectedStatus {
                status: StatusCode::TOO_MANY_REQUESTS,
                ..
            } => AppError::ServiceUnavailable(Some(60)),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}
