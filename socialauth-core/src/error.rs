use crate::state::ErrorInfo;

/// Errors that can occur while driving a provider through the OAuth2 flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The HTTP call itself failed (DNS, TLS, connection reset, timeout...).
    #[error("Network error: {0}")]
    Network(String),
    /// The provider answered with a non-success status and no recognisable error payload.
    #[error("HTTP error {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// A truncated copy of the response body.
        body: String,
    },
    /// The provider reported an application error in its JSON body.
    #[error("Provider error {code}: {message}")]
    Provider {
        /// Provider specific error code, `0` when the provider sent none.
        code: i64,
        /// Provider supplied message, possibly empty.
        message: String,
    },
    /// The response could not be understood (not JSON, missing `access_token`...).
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The state store failed or lacked a value the flow depends on.
    #[error("Session error: {0}")]
    Session(String),
    /// The `state` parameter returned on callback does not match the stored one.
    #[error("CSRF state mismatch")]
    CsrfMismatch,
    /// The user declined the consent screen.
    #[error("Authentication cancelled by user")]
    Cancelled,
    /// An operation required an authenticated service.
    #[error("Not authenticated")]
    NotAuthenticated,
    /// The provider profile did not yield a user id.
    #[error("Profile unavailable")]
    ProfileUnavailable,
    /// The provider could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ErrorInfo> for AuthError {
    fn from(info: ErrorInfo) -> Self {
        AuthError::Provider {
            code: info.code,
            message: info.message,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::Config(format!("invalid endpoint url: {err}"))
    }
}
