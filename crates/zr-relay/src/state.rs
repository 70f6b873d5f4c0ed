//! One-shot anti-forgery state token store
//!
//! Holds at most one state token at a time. Issuing a new token overwrites
//! the previous one, implicitly invalidating any outstanding authorization
//! attempt; verification consumes the token even on mismatch, so a state
//! value is valid for exactly one verification call.

use parking_lot::Mutex;
use rand::{thread_rng, Rng};

/// State token length in characters.
pub const STATE_LENGTH: usize = 32;

/// Generate a random state string for CSRF protection
///
/// Creates a 32-character random string using URL-safe characters
/// (A-Z, a-z, 0-9). The token guards a single short-lived authorization
/// attempt; unguessability over that window is what matters.
pub fn generate_state() -> String {
    let mut rng = thread_rng();
    (0..STATE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..62);
            match idx {
                0..=25 => (b'A' + idx) as char,
                26..=51 => (b'a' + (idx - 26)) as char,
                _ => (b'0' + (idx - 52)) as char,
            }
        })
        .collect()
}

/// Single-slot state token store
///
/// The explicit, passed-in replacement for the original ambient
/// session-storage flag.
#[derive(Debug, Default)]
pub struct StateStore {
    slot: Mutex<Option<String>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh state token, store it, and return it.
    pub fn issue(&self) -> String {
        let token = generate_state();
        self.put(token.clone());
        token
    }

    /// Store a specific token, overwriting any previous one.
    pub fn put(&self, token: String) {
        *self.slot.lock() = Some(token);
    }

    /// Consume the stored token and compare it against `candidate`.
    ///
    /// The slot is cleared unconditionally, even on mismatch. An empty
    /// slot always fails.
    pub fn verify(&self, candidate: &str) -> bool {
        match self.slot.lock().take() {
            Some(stored) => stored == candidate,
            None => false,
        }
    }

    /// Whether a token is currently stored.
    pub fn has_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state_length_and_charset() {
        let state = generate_state();
        assert_eq!(state.len(), STATE_LENGTH);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_state_uniqueness() {
        let mut states = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(states.insert(generate_state()), "generated duplicate state");
        }
    }

    #[test]
    fn test_verify_consumes_token() {
        let store = StateStore::new();
        let token = store.issue();

        assert!(store.verify(&token));
        // Second verification with the same value must fail
        assert!(!store.verify(&token));
    }

    #[test]
    fn test_verify_consumes_even_on_mismatch() {
        let store = StateStore::new();
        let token = store.issue();

        assert!(!store.verify("wrong"));
        // The mismatch already cleared the slot
        assert!(!store.verify(&token));
        assert!(!store.has_pending());
    }

    #[test]
    fn test_verify_without_issue_fails() {
        let store = StateStore::new();
        assert!(!store.verify("anything"));
    }

    #[test]
    fn test_issue_overwrites_previous_token() {
        let store = StateStore::new();
        let first = store.issue();
        let second = store.issue();

        assert!(!store.verify(&first));
        // First verify consumed the slot; second token is gone too
        assert!(!store.verify(&second));
    }
}
