//! Profile fetch against the Zalo Graph endpoint

use crate::types::{provider_error, UserProfile, PROFILE_FIELDS};
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info};
use zr_config::RelayConfig;
use zr_types::{AppError, AppResult};

pub struct ProfileFetcher {
    client: Client,
}

impl ProfileFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch the authenticated user's profile with the fixed field list.
    pub async fn fetch(&self, config: &RelayConfig, access_token: &str) -> AppResult<UserProfile> {
        info!("Fetching user profile");

        let response = self
            .client
            .get(&config.profile_url)
            .query(&[("access_token", access_token), ("fields", PROFILE_FIELDS)])
            .send()
            .await
            .map_err(|e| AppError::ProfileFetchFailed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            error!("Profile fetch failed with status {}", status);
            return Err(AppError::ProfileFetchFailed(reason));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::ProfileFetchFailed(format!("invalid response body: {e}")))?;

        if let Some(message) = provider_error(&body) {
            error!("Provider reported profile fetch error: {}", message);
            return Err(AppError::ProfileFetchFailed(message));
        }

        // Missing id makes the profile unusable even on a 2xx response
        UserProfile::from_value(&body)
    }
}
