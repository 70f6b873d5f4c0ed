//! Boundary entities for the relay flow
//!
//! Untyped JSON from the provider, the delegated backend, and the host is
//! validated and converted into these types at the boundary; nothing
//! downstream handles raw `serde_json::Value` payloads.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use zr_types::{AppError, AppResult};

/// Fixed Zalo field list, used both as the authorization scope and as the
/// profile endpoint's `fields` parameter.
pub const PROFILE_FIELDS: &str = "id,name,birthday,gender,picture";

/// UI status indicator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// Normalized parameters extracted from a provider callback, fed to the
/// state machine by both adapters (page URL and relayed message).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// A callback with neither a code nor an error carries nothing to act on.
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.error.is_none()
    }
}

/// Provider-issued tokens. Ephemeral: scoped to the current page lifetime,
/// never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenResult {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

impl TokenResult {
    /// Validate an untyped token response.
    ///
    /// A missing or empty `access_token` fails the flow; `expires_in` is
    /// accepted as either a JSON number or a numeric string (Zalo has
    /// shipped both).
    pub fn from_value(value: &Value) -> AppResult<Self> {
        let access_token = value
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::MissingAccessToken)?
            .to_string();

        let expires_in = value.get("expires_in").and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });

        let refresh_token = value
            .get("refresh_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(Self {
            access_token,
            expires_in,
            refresh_token,
        })
    }
}

/// Authenticated user's profile, flattened from Zalo's response shape.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub birthday: Option<String>,
    pub gender: Option<String>,
    /// Zalo nests this as `picture.data.url`.
    #[serde(rename = "picture")]
    pub picture_url: Option<String>,
}

impl UserProfile {
    /// Validate an untyped profile response.
    ///
    /// `id` is required (string or number, stringified either way); its
    /// absence means the profile is unusable even on a 2xx response.
    pub fn from_value(value: &Value) -> AppResult<Self> {
        let id = match value.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(AppError::MissingUserId),
        };

        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let birthday = value
            .get("birthday")
            .and_then(Value::as_str)
            .map(str::to_string);

        let gender = value
            .get("gender")
            .and_then(Value::as_str)
            .map(str::to_string);

        let picture_url = value
            .pointer("/picture/data/url")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            id,
            name,
            birthday,
            gender,
            picture_url,
        })
    }
}

/// Terminal payload delivered to the host.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeliveryPayload {
    pub success: bool,
    pub data: Value,
    /// Epoch milliseconds at payload construction.
    pub timestamp: i64,
}

impl DeliveryPayload {
    pub fn success(tokens: &TokenResult, profile: &UserProfile) -> Self {
        Self {
            success: true,
            data: json!({
                "access_token": tokens.access_token,
                "user_id": profile.id,
                "expires_in": tokens.expires_in,
                "refresh_token": tokens.refresh_token,
                "user_info": profile,
            }),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn error(err: &AppError) -> Self {
        Self {
            success: false,
            data: json!({ "error": err.delivery_message() }),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// The provider-reported error inside an otherwise successful JSON body,
/// if any. Zalo uses both string codes and non-zero numeric codes; a `0`
/// or empty value means no error.
pub(crate) fn provider_error(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    let is_error = match error {
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_i64() != Some(0),
        Value::Bool(b) => *b,
        Value::Null => false,
        _ => true,
    };
    if !is_error {
        return None;
    }

    let message = body
        .get("error_description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    Some(message)
}
