//! Delegated token-exchange backend
//!
//! The trusted collaborator behind the relay page's delegated exchange
//! strategy: it holds the Zalo app secret server-side and performs the
//! code-for-token exchange on the page's behalf, so the secret never
//! reaches the browser.
//!
//! Contract:
//! - `POST /exchange-token {code, redirect_uri} ->
//!   {access_token, expires_in, refresh_token}`
//! - `POST /refresh-token {refresh_token} -> same shape`
//!
//! Failures return non-2xx with `{error, error_description}`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

/// Backend configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub app_id: String,
    pub app_secret: String,
    /// Zalo token endpoint (overridable for testing).
    pub token_url: String,
}

impl BackendConfig {
    /// Read configuration from `ZALO_APP_ID` / `ZALO_APP_SECRET`
    /// environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let app_id = std::env::var("ZALO_APP_ID")
            .map_err(|_| anyhow::anyhow!("ZALO_APP_ID is not set"))?;
        let app_secret = std::env::var("ZALO_APP_SECRET")
            .map_err(|_| anyhow::anyhow!("ZALO_APP_SECRET is not set"))?;
        Ok(Self {
            app_id,
            app_secret,
            token_url: zr_config::DEFAULT_TOKEN_URL.to_string(),
        })
    }
}

#[derive(Clone)]
struct BackendState {
    config: BackendConfig,
    client: Client,
}

/// Build the backend router.
pub fn router(config: BackendConfig) -> Router {
    let state = BackendState {
        config,
        client: Client::new(),
    };
    Router::new()
        .route("/exchange-token", post(exchange_token))
        .route("/refresh-token", post(refresh_token))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ExchangeRequest {
    code: Option<String>,
    #[allow(dead_code)]
    redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: Option<String>,
}

fn error_body(error: &str, description: &str) -> Json<Value> {
    Json(json!({ "error": error, "error_description": description }))
}

/// The provider-reported error in a token response body, if any.
/// Zalo signals failure with a non-zero numeric or non-empty string code.
fn provider_error(body: &Value) -> Option<(String, String)> {
    let error = body.get("error")?;
    let code = match error {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) if n.as_i64() != Some(0) => n.to_string(),
        _ => return None,
    };
    let description = body
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or("token request failed")
        .to_string();
    Some((code, description))
}

async fn exchange_token(
    State(state): State<BackendState>,
    Json(request): Json<ExchangeRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(code) = request.code.filter(|c| !c.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            error_body("missing_code", "missing authorization code"),
        );
    };

    info!("Exchanging authorization code with provider");
    let params = [
        ("app_id", state.config.app_id.as_str()),
        ("app_secret", state.config.app_secret.as_str()),
        ("code", code.as_str()),
    ];
    forward_token_request(&state, &params).await
}

async fn refresh_token(
    State(state): State<BackendState>,
    Json(request): Json<RefreshRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(refresh_token) = request.refresh_token.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            error_body("missing_refresh_token", "missing refresh token"),
        );
    };

    info!("Refreshing tokens with provider");
    let params = [
        ("app_id", state.config.app_id.as_str()),
        ("app_secret", state.config.app_secret.as_str()),
        ("refresh_token", refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];
    forward_token_request(&state, &params).await
}

/// Call the provider token endpoint and map its response onto the
/// backend contract.
async fn forward_token_request(
    state: &BackendState,
    params: &[(&str, &str)],
) -> (StatusCode, Json<Value>) {
    let response = state
        .client
        .get(&state.config.token_url)
        .query(params)
        .send()
        .await;

    let body: Value = match response {
        Ok(response) => match response.json().await {
            Ok(body) => body,
            Err(e) => {
                error!("Provider returned an unreadable token response: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("internal_error", &e.to_string()),
                );
            }
        },
        Err(e) => {
            error!("Provider token request failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("internal_error", &e.to_string()),
            );
        }
    };

    if let Some((code, description)) = provider_error(&body) {
        error!("Provider rejected token request: {} - {}", code, description);
        return (StatusCode::BAD_REQUEST, error_body(&code, &description));
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": body.get("access_token").cloned().unwrap_or(Value::Null),
            "expires_in": body.get("expires_in").cloned().unwrap_or(Value::Null),
            "refresh_token": body.get("refresh_token").cloned().unwrap_or(Value::Null),
        })),
    )
}
