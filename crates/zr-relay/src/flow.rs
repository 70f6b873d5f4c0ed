//! Relay flow orchestrator
//!
//! The single state machine behind both invocation paths. A page load
//! inspects the page URL (fresh visit → authorization redirect, callback
//! parameters → resolution); an inbound host message is classified by the
//! resolver and fed into the same resolution. Every failure past the
//! entry points is surfaced to the status indicator and delivered to the
//! host as an error payload.

use crate::dispatch::ResultDispatcher;
use crate::env::PageEnv;
use crate::exchange::TokenExchanger;
use crate::profile::ProfileFetcher;
use crate::resolver::{self, InboundMessage};
use crate::state::StateStore;
use crate::types::{CallbackParams, DeliveryPayload, StatusKind, PROFILE_FIELDS};
use parking_lot::RwLock;
use reqwest::{Client, Url};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use zr_config::RelayConfig;
use zr_types::{AppError, AppResult};

/// Fixed delays between the terminal status update and dispatch, so the
/// message stays visible before the page context is left or closed.
#[derive(Debug, Clone, Copy)]
pub struct DispatchDelays {
    pub success: Duration,
    pub error: Duration,
}

impl Default for DispatchDelays {
    fn default() -> Self {
        Self {
            success: Duration::from_secs(1),
            error: Duration::from_secs(2),
        }
    }
}

impl DispatchDelays {
    /// Zero delays, for tests.
    pub fn none() -> Self {
        Self {
            success: Duration::ZERO,
            error: Duration::ZERO,
        }
    }
}

/// Relay flow: one authorization attempt per page instance.
pub struct RelayFlow {
    config: RwLock<RelayConfig>,
    env: PageEnv,
    state_store: StateStore,
    exchanger: TokenExchanger,
    profiles: ProfileFetcher,
    dispatcher: ResultDispatcher,
    /// First-resolution-wins guard: set when a resolution starts
    /// processing, cleared only by a page (re)load.
    busy: AtomicBool,
    /// Flow generation. Bumped on page (re)load; a pending delayed
    /// dispatch re-checks its captured epoch and drops itself when
    /// superseded.
    epoch: AtomicU64,
    delays: DispatchDelays,
}

impl RelayFlow {
    pub fn new(config: RelayConfig, env: PageEnv) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            config: RwLock::new(config),
            state_store: StateStore::new(),
            exchanger: TokenExchanger::new(client.clone()),
            profiles: ProfileFetcher::new(client),
            dispatcher: ResultDispatcher::new(env.clone()),
            env,
            busy: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            delays: DispatchDelays::default(),
        })
    }

    pub fn with_delays(mut self, delays: DispatchDelays) -> Self {
        self.delays = delays;
        self
    }

    /// The one-shot state token store for this flow.
    pub fn state_store(&self) -> &StateStore {
        &self.state_store
    }

    /// Snapshot of the effective configuration.
    pub fn config(&self) -> RelayConfig {
        self.config.read().clone()
    }

    /// Direct load path: page-ready entry.
    ///
    /// Applies query-string config overrides, then either resolves the
    /// callback parameters found in the URL or starts a fresh
    /// authorization. Errs only on an unparseable page URL; flow failures
    /// are handled internally (status + host delivery).
    pub async fn handle_page_ready(&self, page_url: &str) -> AppResult<()> {
        let url = Url::parse(page_url)
            .map_err(|e| AppError::Config(format!("invalid page URL: {e}")))?;

        // A (re)loaded page supersedes any previous flow in this instance
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);

        self.config.write().apply_query_overrides(url.query_pairs());

        match resolver::from_page_url(&url) {
            Some(params) => self.resolve(params).await,
            None => self.start_authorization().await,
        }
        Ok(())
    }

    /// Relayed message path: inbound cross-context message entry.
    pub async fn handle_message(&self, message: &Value) {
        match resolver::from_message(message) {
            InboundMessage::Ignored => {}
            InboundMessage::Confirm => {
                info!("Host confirmed receipt of auth result");
            }
            InboundMessage::Callback(params) => {
                self.resolve(params).await;
            }
        }
    }

    /// Authorization Initiator: issue a fresh state token and navigate to
    /// the provider's authorization endpoint.
    pub async fn start_authorization(&self) {
        let config = self.config.read().clone();

        if config.app_id.is_empty() {
            self.finish_error(AppError::MissingAppId).await;
            return;
        }

        let state = self.state_store.issue();
        let auth_url = build_authorization_url(&config, &state);

        info!("Redirecting to provider authorization endpoint");
        self.env
            .status
            .show(StatusKind::Info, "Redirecting to Zalo authorization...");

        // Point of no return: control resumes only on the provider's
        // redirect back to this page.
        if let Err(e) = self.env.navigator.navigate(&auth_url) {
            self.finish_error(AppError::Config(format!("authorization redirect failed: {e}")))
                .await;
        }
    }

    /// State machine entry shared by both adapters.
    async fn resolve(&self, params: CallbackParams) {
        if params.is_empty() {
            warn!("Callback carried neither code nor error; dropping");
            return;
        }

        // First resolution wins; a second callback source racing this one
        // (direct URL load vs. relayed message) is dropped.
        if self.busy.swap(true, Ordering::SeqCst) {
            warn!("A callback resolution is already in flight; dropping duplicate");
            return;
        }

        match self.process(params).await {
            Ok(payload) => self.finish_success(payload).await,
            Err(e) => self.finish_error(e).await,
        }
    }

    async fn process(&self, params: CallbackParams) -> AppResult<DeliveryPayload> {
        // An error from the provider wins over everything else, including
        // a code that may also be present.
        if let Some(provider_error) = params.error {
            error!("Provider denied authorization: {}", provider_error);
            return Err(AppError::ProviderDenied(provider_error));
        }

        // resolve() filtered empty callbacks, so a code must be here
        let code = params
            .code
            .ok_or_else(|| AppError::Config("callback carried no code".to_string()))?;

        // Mandatory before any exchange, on both paths. An absent state
        // fails without touching the store; a present one consumes the
        // stored token even on mismatch.
        let verified = params
            .state
            .as_deref()
            .map(|s| self.state_store.verify(s))
            .unwrap_or(false);
        if !verified {
            return Err(AppError::StateVerificationFailed);
        }

        let config = self.config.read().clone();

        self.env
            .status
            .show(StatusKind::Info, "Exchanging authorization code...");
        let tokens = self.exchanger.exchange(&config, &code).await?;

        self.env.status.show(StatusKind::Info, "Fetching user info...");
        let profile = self.profiles.fetch(&config, &tokens.access_token).await?;

        info!("Authorization flow completed for user {}", profile.id);
        Ok(DeliveryPayload::success(&tokens, &profile))
    }

    async fn finish_success(&self, payload: DeliveryPayload) {
        self.env
            .status
            .show(StatusKind::Success, "Authorization successful, returning...");
        self.dispatch_after(self.delays.success, payload).await;
    }

    async fn finish_error(&self, err: AppError) {
        error!("Relay flow failed: {}", err);
        self.env
            .status
            .show(StatusKind::Error, &format!("Authorization failed: {err}"));
        self.dispatch_after(self.delays.error, DeliveryPayload::error(&err))
            .await;
    }

    /// Scheduled dispatch, cancellable by a superseding page load.
    async fn dispatch_after(&self, delay: Duration, payload: DeliveryPayload) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.epoch.load(Ordering::SeqCst) != epoch {
            warn!("Pending dispatch superseded by a new page load; dropping");
            return;
        }

        let config = self.config.read().clone();
        if let Err(e) = self.dispatcher.deliver(&config, &payload) {
            // Both transports exhausted; nothing further to try
            error!("Result delivery failed: {}", e);
        }
    }
}

/// Build the provider authorization URL with the fixed Zalo scope list.
fn build_authorization_url(config: &RelayConfig, state: &str) -> String {
    format!(
        "{}?app_id={}&redirect_uri={}&state={}&scope={}",
        config.auth_url,
        urlencoding::encode(&config.app_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode(PROFILE_FIELDS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MSG_AUTH_RESULT;
    use crate::env::{HostMessenger, Navigator, StatusSink};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingNavigator {
        urls: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, url: &str) -> AppResult<()> {
            self.urls.lock().push(url.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<Value>>,
    }

    impl HostMessenger for RecordingMessenger {
        fn has_opener(&self) -> bool {
            true
        }

        fn post_to_opener(&self, message: &Value) -> AppResult<()> {
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingStatus {
        shown: Mutex<Vec<(StatusKind, String)>>,
    }

    impl StatusSink for RecordingStatus {
        fn show(&self, kind: StatusKind, message: &str) {
            self.shown.lock().push((kind, message.to_string()));
        }
    }

    struct Harness {
        flow: Arc<RelayFlow>,
        navigator: Arc<RecordingNavigator>,
        messenger: Arc<RecordingMessenger>,
        status: Arc<RecordingStatus>,
    }

    fn harness(config: RelayConfig) -> Harness {
        harness_with_delays(config, DispatchDelays::none())
    }

    fn harness_with_delays(config: RelayConfig, delays: DispatchDelays) -> Harness {
        let navigator = Arc::new(RecordingNavigator::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let status = Arc::new(RecordingStatus::default());
        let env = PageEnv {
            navigator: navigator.clone(),
            messenger: messenger.clone(),
            status: status.clone(),
        };
        let flow = Arc::new(RelayFlow::new(config, env).unwrap().with_delays(delays));
        Harness {
            flow,
            navigator,
            messenger,
            status,
        }
    }

    fn test_config() -> RelayConfig {
        RelayConfig {
            app_id: "test_app".to_string(),
            redirect_uri: "https://relay.example.com/".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_visit_redirects_with_issued_state() {
        let h = harness(test_config());

        h.flow
            .handle_page_ready("https://relay.example.com/")
            .await
            .unwrap();

        let urls = h.navigator.urls.lock();
        assert_eq!(urls.len(), 1);
        let auth_url = Url::parse(&urls[0]).unwrap();
        assert!(urls[0].starts_with(zr_config::DEFAULT_AUTH_URL));

        let state = auth_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("auth URL carries a state parameter");
        assert!(h.flow.state_store().verify(&state));

        let scope = auth_url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(scope, PROFILE_FIELDS);
        assert!(h.messenger.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_app_id_reports_without_navigating() {
        let h = harness(RelayConfig::default());

        h.flow
            .handle_page_ready("https://relay.example.com/")
            .await
            .unwrap();

        assert!(h.navigator.urls.lock().is_empty());
        assert!(h
            .status
            .shown
            .lock()
            .iter()
            .any(|(kind, _)| *kind == StatusKind::Error));

        // The host still receives an error payload
        let sent = h.messenger.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["success"], false);
    }

    #[tokio::test]
    async fn test_provider_error_short_circuits_exchange() {
        // No exchange strategy configured: any exchange attempt would fail
        // with a different error, so the access_denied payload proves the
        // error path never reached the exchange.
        let h = harness(test_config());

        h.flow
            .handle_page_ready("https://relay.example.com/?error=access_denied&code=abc&state=XYZ")
            .await
            .unwrap();

        let sent = h.messenger.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], MSG_AUTH_RESULT);
        assert_eq!(sent[0]["success"], false);
        assert_eq!(sent[0]["data"]["error"], "access_denied");
        assert!(h.navigator.urls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_state_mismatch_from_message() {
        let h = harness(test_config());
        h.flow.state_store().put("good".to_string());

        h.flow
            .handle_message(&json!({
                "type": "auth_callback",
                "code": "abc",
                "state": "bad",
            }))
            .await;

        let sent = h.messenger.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["data"]["error"], "state_verification_failed");
        // Verification consumed the stored token even on mismatch
        assert!(!h.flow.state_store().has_pending());
    }

    #[tokio::test]
    async fn test_absent_state_fails_verification() {
        let h = harness(test_config());
        h.flow.state_store().put("good".to_string());

        h.flow
            .handle_page_ready("https://relay.example.com/?code=abc")
            .await
            .unwrap();

        let sent = h.messenger.sent.lock();
        assert_eq!(sent[0]["data"]["error"], "state_verification_failed");
    }

    #[tokio::test]
    async fn test_second_resolution_is_dropped() {
        let h = harness(test_config());
        h.flow.state_store().put("XYZ".to_string());

        // First resolution: bad state, terminal error
        h.flow
            .handle_message(&json!({ "type": "auth_callback", "code": "abc", "state": "nope" }))
            .await;
        // Second callback for the same flow arrives late
        h.flow
            .handle_message(&json!({ "type": "auth_callback", "code": "abc", "state": "XYZ" }))
            .await;

        assert_eq!(h.messenger.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_callback_message_is_dropped() {
        let h = harness(test_config());

        h.flow.handle_message(&json!({ "type": "auth_callback" })).await;
        h.flow.handle_message(&json!({ "type": "auth_confirm" })).await;
        h.flow.handle_message(&json!({ "type": "unrelated" })).await;

        assert!(h.messenger.sent.lock().is_empty());
        assert!(h.navigator.urls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_query_overrides_apply_before_resolution() {
        let h = harness(test_config());

        h.flow
            .handle_page_ready(
                "https://relay.example.com/?callback_scheme=myapp&use_postmessage=false",
            )
            .await
            .unwrap();

        let config = h.flow.config();
        assert_eq!(config.callback_scheme, "myapp");
        assert!(!config.use_post_message);
        // Still a fresh visit: overrides are not callback parameters
        assert_eq!(h.navigator.urls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_page_reload_supersedes_pending_dispatch() {
        let h = harness_with_delays(
            test_config(),
            DispatchDelays {
                success: Duration::ZERO,
                error: Duration::from_millis(100),
            },
        );

        // Start a resolution whose error dispatch is delayed
        let resolving = {
            let flow = h.flow.clone();
            tokio::spawn(async move {
                flow.handle_message(&json!({
                    "type": "auth_callback",
                    "code": "abc",
                    "state": "stale",
                }))
                .await;
            })
        };

        // Reload the page while the dispatch is pending
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.flow
            .handle_page_ready("https://relay.example.com/")
            .await
            .unwrap();
        resolving.await.unwrap();

        // The stale error payload was dropped; only the fresh redirect ran
        assert!(h.messenger.sent.lock().is_empty());
        assert_eq!(h.navigator.urls.lock().len(), 1);
    }
}
