//! Result delivery to the embedding host
//!
//! Transport A posts a structured `auth_result` message to the opener
//! window. Transport B encodes the result into a custom-scheme URL and
//! navigates to it, for contexts without an opener (embedded web views
//! that intercept custom schemes). A failed post falls through to the
//! scheme URL so the host is never left waiting.

use crate::env::PageEnv;
use crate::types::DeliveryPayload;
use serde_json::json;
use tracing::{info, warn};
use zr_config::RelayConfig;
use zr_types::{AppError, AppResult};

/// Outbound message type carrying the final result.
pub const MSG_AUTH_RESULT: &str = "auth_result";

/// Path component of the custom-scheme callback URL.
pub const SCHEME_CALLBACK_HOST: &str = "auth_callback";

pub struct ResultDispatcher {
    env: PageEnv,
}

impl ResultDispatcher {
    pub fn new(env: PageEnv) -> Self {
        Self { env }
    }

    /// Deliver the terminal payload to the host.
    pub fn deliver(&self, config: &RelayConfig, payload: &DeliveryPayload) -> AppResult<()> {
        if config.use_post_message && self.env.messenger.has_opener() {
            let message = json!({
                "type": MSG_AUTH_RESULT,
                "success": payload.success,
                "data": payload.data,
                "timestamp": payload.timestamp,
            });

            match self.env.messenger.post_to_opener(&message) {
                Ok(()) => {
                    info!("Delivered auth result to opener via postMessage");
                    return Ok(());
                }
                Err(e) => {
                    warn!("postMessage delivery failed, falling back to scheme URL: {}", e);
                }
            }
        }

        let url = scheme_callback_url(&config.callback_scheme, payload);
        info!("Delivering auth result via custom scheme URL");
        self.env
            .navigator
            .navigate(&url)
            .map_err(|e| AppError::DeliveryFailed(e.to_string()))
    }
}

/// Build the Transport B callback URL.
///
/// `<scheme>://auth_callback?access_token=&user_id=&expires_in=` on
/// success (`expires_in` omitted when the provider sent none), or
/// `?error=` on failure.
pub fn scheme_callback_url(scheme: &str, payload: &DeliveryPayload) -> String {
    let mut query = Vec::new();

    if payload.success {
        if let Some(token) = payload.data.get("access_token").and_then(|v| v.as_str()) {
            query.push(format!("access_token={}", urlencoding::encode(token)));
        }
        if let Some(user_id) = payload.data.get("user_id").and_then(|v| v.as_str()) {
            query.push(format!("user_id={}", urlencoding::encode(user_id)));
        }
        if let Some(expires_in) = payload.data.get("expires_in").and_then(|v| v.as_i64()) {
            query.push(format!("expires_in={expires_in}"));
        }
    } else {
        let error = payload
            .data
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown_error");
        query.push(format!("error={}", urlencoding::encode(error)));
    }

    format!("{}://{}?{}", scheme, SCHEME_CALLBACK_HOST, query.join("&"))
}
