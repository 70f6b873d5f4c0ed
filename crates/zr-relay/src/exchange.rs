//! Token exchange: delegated backend or direct provider call
//!
//! Strategy precedence: a configured delegated exchange endpoint always
//! wins over an in-page app secret, so the secret is never sent from the
//! browser when a backend is available. Exactly one strategy runs per
//! call; with neither configured the exchange fails before any request.

use crate::types::{provider_error, TokenResult};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use zr_config::RelayConfig;
use zr_types::{AppError, AppResult};

pub struct TokenExchanger {
    client: Client,
}

impl TokenExchanger {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange(&self, config: &RelayConfig, code: &str) -> AppResult<TokenResult> {
        if let Some(exchange_url) = &config.token_exchange_url {
            self.exchange_delegated(exchange_url, config, code).await
        } else if let Some(app_secret) = &config.app_secret {
            self.exchange_direct(config, app_secret, code).await
        } else {
            Err(AppError::NoExchangeStrategy)
        }
    }

    /// Strategy 1: POST `{code, redirect_uri}` to the delegated backend.
    ///
    /// The backend holds the app secret and talks to the provider; its
    /// response shape is trusted apart from the access-token presence
    /// check at the boundary.
    async fn exchange_delegated(
        &self,
        exchange_url: &str,
        config: &RelayConfig,
        code: &str,
    ) -> AppResult<TokenResult> {
        info!("Exchanging authorization code via delegated backend");

        let response = self
            .client
            .post(exchange_url)
            .json(&json!({
                "code": code,
                "redirect_uri": config.redirect_uri,
            }))
            .send()
            .await
            .map_err(|e| AppError::TokenExchangeFailed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            error!("Delegated token exchange failed with status {}", status);
            return Err(AppError::TokenExchangeFailed(reason));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::TokenExchangeFailed(format!("invalid response body: {e}")))?;

        TokenResult::from_value(&body)
    }

    /// Strategy 2: urlencoded form POST straight to the provider.
    ///
    /// Requires the app secret in the page context, which Zalo documents
    /// against; only intended for testing deployments.
    async fn exchange_direct(
        &self,
        config: &RelayConfig,
        app_secret: &str,
        code: &str,
    ) -> AppResult<TokenResult> {
        warn!("Exchanging authorization code with in-page app secret; not recommended");

        let params = [
            ("app_id", config.app_id.as_str()),
            ("app_secret", app_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .client
            .post(&config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::TokenExchangeFailed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Direct token exchange failed with status {}: {}", status, body);
            return Err(AppError::TokenExchangeFailed(format!(
                "{} {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status"),
                body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::TokenExchangeFailed(format!("invalid response body: {e}")))?;

        // A 2xx status can still carry a provider-reported error
        if let Some(message) = provider_error(&body) {
            error!("Provider reported token exchange error: {}", message);
            return Err(AppError::TokenExchangeFailed(message));
        }

        TokenResult::from_value(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_strategy_fails_without_any_request() {
        let exchanger = TokenExchanger::new(Client::new());
        let config = RelayConfig::default();

        let err = exchanger.exchange(&config, "abc").await.unwrap_err();
        assert!(matches!(err, AppError::NoExchangeStrategy));
    }
}
