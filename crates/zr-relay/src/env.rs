//! Page-environment seams
//!
//! The three side effects of the relay page (top-level navigation, opener
//! messaging, visible status indicator) behind trait objects, so the state
//! machine stays headless. A browser page, a web-view shim, or a test
//! harness supplies the implementations.

use crate::types::StatusKind;
use serde_json::Value;
use std::sync::Arc;
use zr_types::AppResult;

/// Top-level navigation. Navigating to the provider's authorization URL is
/// a point of no return for the page context; navigating to a
/// custom-scheme URL is intercepted by an enclosing web view.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str) -> AppResult<()>;
}

/// Structured messaging to the opener window.
pub trait HostMessenger: Send + Sync {
    /// Whether an opener window exists to post to.
    fn has_opener(&self) -> bool;

    /// Post a structured message to the opener with an unrestricted
    /// target origin.
    fn post_to_opener(&self, message: &Value) -> AppResult<()>;
}

/// The relay page's visible status indicator.
pub trait StatusSink: Send + Sync {
    fn show(&self, kind: StatusKind, message: &str);
}

/// Bundle of environment handles injected into the flow.
#[derive(Clone)]
pub struct PageEnv {
    pub navigator: Arc<dyn Navigator>,
    pub messenger: Arc<dyn HostMessenger>,
    pub status: Arc<dyn StatusSink>,
}
