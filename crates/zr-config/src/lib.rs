//! Relay configuration
//!
//! Deployment configuration for the relay: Zalo application credentials,
//! provider endpoint URLs, the optional delegated exchange backend, and the
//! host delivery options (custom scheme, postMessage flag). Loadable from a
//! TOML file, with a small set of keys overridable from the page URL's
//! query string.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};
use zr_types::{AppError, AppResult};

/// Zalo OAuth authorization endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://oauth.zaloapp.com/v4/permission";

/// Zalo OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.zaloapp.com/v4/oa/access_token";

/// Zalo Graph profile endpoint.
pub const DEFAULT_PROFILE_URL: &str = "https://graph.zalo.me/v2.0/me";

/// Relay configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Zalo application id. Authorization cannot start without it.
    #[serde(default)]
    pub app_id: String,

    /// Zalo application secret. Enables the direct (in-page) exchange
    /// strategy; exposing it to the browser is discouraged, prefer
    /// `token_exchange_url`.
    #[serde(default)]
    pub app_secret: Option<String>,

    /// Redirect URI registered with the Zalo developer console.
    #[serde(default)]
    pub redirect_uri: String,

    /// Authorization endpoint (overridable for testing).
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Token endpoint (overridable for testing).
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Profile endpoint (overridable for testing).
    #[serde(default = "default_profile_url")]
    pub profile_url: String,

    /// Delegated exchange backend URL. When set, code-for-token exchange
    /// is performed via this backend and the app secret is never used.
    #[serde(default)]
    pub token_exchange_url: Option<String>,

    /// Custom URL scheme for Transport B (web-view delivery).
    #[serde(default = "default_callback_scheme")]
    pub callback_scheme: String,

    /// Whether opener postMessage delivery (Transport A) is enabled.
    #[serde(default = "default_use_post_message")]
    pub use_post_message: bool,

    /// Timeout applied to token exchange and profile fetch requests.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_profile_url() -> String {
    DEFAULT_PROFILE_URL.to_string()
}

fn default_callback_scheme() -> String {
    "flutterapp".to_string()
}

fn default_use_post_message() -> bool {
    true
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: None,
            redirect_uri: String::new(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            profile_url: default_profile_url(),
            token_exchange_url: None,
            callback_scheme: default_callback_scheme(),
            use_post_message: default_use_post_message(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        debug!("Loaded relay config from {}", path.display());
        Ok(config)
    }

    /// Apply page-URL query overrides
    ///
    /// Recognized keys: `app_id`, `token_exchange_url`, `callback_scheme`,
    /// and `use_postmessage` (any value other than `"false"` keeps
    /// postMessage enabled). Unknown keys are left for the callback
    /// resolver and ignored here.
    pub fn apply_query_overrides<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "app_id" if !value.is_empty() => {
                    self.app_id = value.to_string();
                }
                "token_exchange_url" if !value.is_empty() => {
                    self.token_exchange_url = Some(value.to_string());
                }
                "callback_scheme" if !value.is_empty() => {
                    self.callback_scheme = value.to_string();
                }
                "use_postmessage" => {
                    self.use_post_message = value != "false";
                }
                _ => {}
            }
        }

        if self.app_secret.is_some() && self.token_exchange_url.is_none() {
            warn!("app_secret is configured for in-page exchange; prefer token_exchange_url");
        }
    }
}
