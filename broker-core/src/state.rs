//! Transient server-side state: pending logins and fetch-token rendezvous slots.
use std::time::Duration;

use crate::cache::TtlCache;

/// TTL for a freshly created [`RequestState`].
pub const REQUEST_STATE_TTL: Duration = Duration::from_secs(10 * 60);
/// TTL for a [`FetchToken`] before it is claimed by `CompleteLogin`.
pub const FETCH_TOKEN_PENDING_TTL: Duration = Duration::from_secs(5 * 60);
/// TTL for a [`FetchToken`] once an AuthId (or error) has been attached.
pub const FETCH_TOKEN_COMPLETED_TTL: Duration = Duration::from_secs(30);
/// Minimum accepted length for a caller-supplied fetch-token key.
pub const MIN_FETCH_TOKEN_LEN: usize = 8;

/// Bound to a freshly-generated opaque state key handed to the provider.
#[derive(Debug, Clone)]
pub struct RequestState {
    /// Which service this login is for.
    pub service_id: String,
    /// Fetch-token key to hand the AuthId off to, if the caller pre-registered one.
    pub fetch_token_key: Option<String>,
    /// Whether this login was started in V2 (stateless) mode.
    pub use_v2: bool,
}

/// An optional rendezvous slot a CLI client pre-registers so that after the
/// browser flow completes on another device, the CLI can poll for the issued
/// AuthId.
#[derive(Debug, Clone, Default)]
pub struct FetchToken {
    /// The issued AuthId, once the flow completes. `None` while pending.
    pub auth_id: Option<String>,
    /// A human-readable error, if the flow failed instead of succeeding.
    pub error_message: Option<String>,
}

impl FetchToken {
    /// A freshly pre-registered, not-yet-completed slot.
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// A slot that has been claimed by a successful login.
    #[must_use]
    pub fn completed(auth_id: impl Into<String>) -> Self {
        Self {
            auth_id: Some(auth_id.into()),
            error_message: None,
        }
    }

    /// A slot that has been claimed by a failed login.
    #[must_use]
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            auth_id: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// The three independent TTL caches that make up the broker's transient state.
#[derive(Debug, Default)]
pub struct Caches {
    /// Keyed by the opaque `state` handed to the provider at login time.
    pub request_state: TtlCache<RequestState>,
    /// Keyed by the caller-chosen fetch-token key.
    pub fetch_token: TtlCache<FetchToken>,
    /// Keyed by the refresh-material cache key computed in `refresh`.
    pub access_token: TtlCache<crate::refresh::CachedAccessToken>,
}

/// A caller-supplied fetch-token key is only honored if longer than
/// [`MIN_FETCH_TOKEN_LEN`].
#[must_use]
pub fn accepts_fetch_token_key(key: &str) -> bool {
    key.len() > MIN_FETCH_TOKEN_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_token_length_rule() {
        assert!(!accepts_fetch_token_key("12345678"));
        assert!(accepts_fetch_token_key("123456789"));
    }
}
