//! Error types and conversions

use thiserror::Error;

/// Fixed wire tag delivered to the host when state verification fails.
pub const STATE_VERIFICATION_FAILED: &str = "state_verification_failed";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing Zalo app id configuration")]
    MissingAppId,

    /// The provider redirected back with an `error` query parameter.
    /// Carries the provider's error code verbatim (e.g. `access_denied`).
    #[error("provider denied authorization: {0}")]
    ProviderDenied(String),

    #[error("state verification failed")]
    StateVerificationFailed,

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("cannot retrieve access token")]
    MissingAccessToken,

    #[error("failed to fetch user info: {0}")]
    ProfileFetchFailed(String),

    #[error("cannot retrieve user info")]
    MissingUserId,

    #[error("no token exchange strategy configured: set token_exchange_url or app_secret")]
    NoExchangeStrategy,

    #[error("result delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// The `error` string placed in the payload delivered to the host.
    ///
    /// The provider's own error code and the state-verification tag are
    /// forwarded verbatim so the host can match on them; everything else
    /// gets the human-readable message.
    pub fn delivery_message(&self) -> String {
        match self {
            AppError::ProviderDenied(code) => code.clone(),
            AppError::StateVerificationFailed => STATE_VERIFICATION_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
