//! Callback adapters
//!
//! Two invocation paths converge on one state machine: a direct browser
//! redirect back to the relay page, and a relayed structured message from
//! another context (e.g. a sibling redirect page). Both are normalized
//! into [`CallbackParams`] here so the exchange/error logic exists once.

use crate::types::CallbackParams;
use reqwest::Url;
use serde_json::Value;
use std::borrow::Cow;
use tracing::warn;

/// Inbound message type carrying callback parameters.
pub const MSG_AUTH_CALLBACK: &str = "auth_callback";

/// Inbound message type acknowledging receipt of a result. No state change.
pub const MSG_AUTH_CONFIRM: &str = "auth_confirm";

/// Outcome of inspecting an inbound cross-context message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// A recognized callback; may still be empty (neither code nor error).
    Callback(CallbackParams),
    /// Host acknowledgment.
    Confirm,
    /// Not a recognized relay message; dropped silently.
    Ignored,
}

/// Direct load path: extract callback parameters from the page URL.
///
/// Returns `None` when neither `code` nor `error` is present, meaning a
/// fresh visit that should trigger a new authorization redirect.
pub fn from_page_url(url: &Url) -> Option<CallbackParams> {
    let params = collect_params(url.query_pairs(), false);
    if params.is_empty() {
        None
    } else {
        Some(params)
    }
}

/// Relayed message path: classify an inbound structured message.
///
/// Recognizes `auth_callback` with inline `code`/`state`/`error` fields or,
/// as a fallback, an embedded callback `url` whose query string is parsed
/// instead (accepting `error_code` as an alias for `error` there). Also
/// recognizes `auth_confirm`. Anything else is ignored.
pub fn from_message(message: &Value) -> InboundMessage {
    let Some(msg_type) = message.get("type").and_then(Value::as_str) else {
        return InboundMessage::Ignored;
    };

    match msg_type {
        MSG_AUTH_CONFIRM => InboundMessage::Confirm,
        MSG_AUTH_CALLBACK => {
            let inline_code = message.get("code").and_then(Value::as_str);
            let inline_error = message.get("error").and_then(Value::as_str);

            // Inline parameters win over the embedded URL
            if inline_code.is_some() || inline_error.is_some() {
                return InboundMessage::Callback(CallbackParams {
                    code: inline_code.map(str::to_string),
                    state: message
                        .get("state")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    error: inline_error.map(str::to_string),
                });
            }

            if let Some(raw_url) = message.get("url").and_then(Value::as_str) {
                match Url::parse(raw_url) {
                    Ok(url) => {
                        return InboundMessage::Callback(collect_params(url.query_pairs(), true));
                    }
                    Err(e) => {
                        warn!("auth_callback message carried an unparseable url: {}", e);
                    }
                }
            }

            InboundMessage::Callback(CallbackParams::default())
        }
        _ => InboundMessage::Ignored,
    }
}

fn collect_params<'a>(
    pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>,
    accept_error_code_alias: bool,
) -> CallbackParams {
    let mut params = CallbackParams::default();
    for (key, value) in pairs {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_code" if accept_error_code_alias && params.error.is_none() => {
                params.error = Some(value.into_owned());
            }
            _ => {}
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_page_url_with_code_and_state() {
        let url = parse("https://relay.example.com/?code=abc&state=XYZ");
        let params = from_page_url(&url).unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("XYZ"));
        assert!(params.error.is_none());
    }

    #[test]
    fn test_page_url_with_error() {
        let url = parse("https://relay.example.com/?error=access_denied");
        let params = from_page_url(&url).unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
    }

    #[test]
    fn test_fresh_visit_yields_none() {
        let url = parse("https://relay.example.com/");
        assert!(from_page_url(&url).is_none());

        // Non-callback parameters (e.g. config overrides) are still fresh
        let url = parse("https://relay.example.com/?callback_scheme=myapp");
        assert!(from_page_url(&url).is_none());
    }

    #[test]
    fn test_page_url_decodes_percent_encoding() {
        let url = parse("https://relay.example.com/?error=access%5Fdenied");
        let params = from_page_url(&url).unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
    }

    #[test]
    fn test_message_with_inline_params() {
        let message = json!({ "type": "auth_callback", "code": "abc", "state": "XYZ" });
        let InboundMessage::Callback(params) = from_message(&message) else {
            panic!("expected callback");
        };
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("XYZ"));
    }

    #[test]
    fn test_message_inline_params_win_over_url() {
        let message = json!({
            "type": "auth_callback",
            "code": "inline_code",
            "url": "https://relay.example.com/?code=url_code&state=url_state"
        });
        let InboundMessage::Callback(params) = from_message(&message) else {
            panic!("expected callback");
        };
        assert_eq!(params.code.as_deref(), Some("inline_code"));
        assert!(params.state.is_none());
    }

    #[test]
    fn test_message_url_fallback() {
        let message = json!({
            "type": "auth_callback",
            "url": "https://relay.example.com/?code=abc&state=XYZ"
        });
        let InboundMessage::Callback(params) = from_message(&message) else {
            panic!("expected callback");
        };
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("XYZ"));
    }

    #[test]
    fn test_message_url_fallback_error_code_alias() {
        let message = json!({
            "type": "auth_callback",
            "url": "https://relay.example.com/?error_code=-1019"
        });
        let InboundMessage::Callback(params) = from_message(&message) else {
            panic!("expected callback");
        };
        assert_eq!(params.error.as_deref(), Some("-1019"));

        // A plain `error` still wins over the alias
        let message = json!({
            "type": "auth_callback",
            "url": "https://relay.example.com/?error_code=-1019&error=access_denied"
        });
        let InboundMessage::Callback(params) = from_message(&message) else {
            panic!("expected callback");
        };
        assert_eq!(params.error.as_deref(), Some("access_denied"));
    }

    #[test]
    fn test_message_confirm() {
        let message = json!({ "type": "auth_confirm" });
        assert_eq!(from_message(&message), InboundMessage::Confirm);
    }

    #[test]
    fn test_unrecognized_messages_are_ignored() {
        assert_eq!(from_message(&json!({})), InboundMessage::Ignored);
        assert_eq!(from_message(&json!("hello")), InboundMessage::Ignored);
        assert_eq!(
            from_message(&json!({ "type": "something_else", "code": "abc" })),
            InboundMessage::Ignored
        );
    }

    #[test]
    fn test_message_with_nothing_useful_is_empty_callback() {
        let message = json!({ "type": "auth_callback" });
        let InboundMessage::Callback(params) = from_message(&message) else {
            panic!("expected callback");
        };
        assert!(params.is_empty());
    }
}
