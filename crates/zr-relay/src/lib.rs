//! Zalo OAuth relay engine
//!
//! The callback state machine and cross-context result delivery protocol
//! behind a Zalo authorization relay page. The page environment
//! (navigation, opener messaging, status indicator) is injected through
//! the [`env`] traits; state anti-forgery, the callback adapters, token
//! exchange, profile fetch, and the delivery transports live here and
//! are headless.
//!
//! # Usage
//! ```no_run
//! # async fn run(env: zr_relay::PageEnv) -> zr_types::AppResult<()> {
//! use std::path::Path;
//! use zr_config::RelayConfig;
//! use zr_relay::RelayFlow;
//!
//! let config = RelayConfig::load_from_file(Path::new("relay.toml"))?;
//! let flow = RelayFlow::new(config, env)?;
//!
//! // On page ready:
//! flow.handle_page_ready("https://relay.example.com/?code=...&state=...").await?;
//! // On an inbound cross-context message:
//! // flow.handle_message(&message).await;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod env;
pub mod exchange;
pub mod flow;
pub mod profile;
pub mod resolver;
pub mod state;
pub mod types;

pub use dispatch::{ResultDispatcher, MSG_AUTH_RESULT};
pub use env::{HostMessenger, Navigator, PageEnv, StatusSink};
pub use exchange::TokenExchanger;
pub use flow::{DispatchDelays, RelayFlow};
pub use profile::ProfileFetcher;
pub use resolver::{InboundMessage, MSG_AUTH_CALLBACK, MSG_AUTH_CONFIRM};
pub use state::{generate_state, StateStore};
pub use types::{CallbackParams, DeliveryPayload, StatusKind, TokenResult, UserProfile};
