//! Access-token minting and the in-memory cache that coalesces refreshes.
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::{
    catalog::ServiceConfig,
    error::{Error, Result},
    http_client,
};

/// Minimum remaining validity a cache hit must have to be served without
/// re-checking upstream.
pub const MIN_REMAINING_VALIDITY: Duration = Duration::from_secs(30);
/// Minimum accepted length for a refresh token (or V1 password) handed to refresh.
pub const MIN_REFRESH_TOKEN_LEN: usize = 6;
/// Safety margin subtracted from the provider's `expires_in` before caching.
pub const EXPIRY_SAFETY_MARGIN: i64 = 10;

/// An access token, as returned to the client and as stored in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAccessToken {
    /// The bearer token itself.
    pub access_token: String,
    /// When the server considers this token stale (provider `expires_in`
    /// minus [`EXPIRY_SAFETY_MARGIN`] seconds).
    pub expires: DateTime<Utc>,
    /// Which service this token authenticates against.
    pub service_id: String,
}

impl CachedAccessToken {
    /// Remaining validity, or zero if already expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let delta = self.expires - Utc::now();
        delta.to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether this entry still has more than [`MIN_REMAINING_VALIDITY`] left.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.remaining() > MIN_REMAINING_VALIDITY
    }

    /// Seconds until expiry, for the wire response; never negative.
    #[must_use]
    pub fn expires_in_seconds(&self) -> i64 {
        (self.expires - Utc::now()).num_seconds().max(0)
    }
}

fn sha256_base64(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    base64::encode(hasher.finalize())
}

/// Cache key for a V2 AuthId's refresh token.
#[must_use]
pub fn cache_key_v2(service_id: &str, refresh_token: &str) -> String {
    format!("/v2/token?id={}&service={service_id}", sha256_base64(refresh_token))
}

/// Cache key for a V1 AuthId's password.
#[must_use]
pub fn cache_key_v1(key_id: &str, password: &str) -> String {
    format!("/v1/token?password={}&id={key_id}", sha256_base64(password))
}

#[derive(Debug, Serialize)]
struct RefreshForm<'a> {
    client_id: &'a str,
    refresh_token: &'a str,
    grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    expires_in: i64,
}

/// Result of an upstream refresh-token-grant request.
#[derive(Debug, Clone)]
pub struct UpstreamRefresh {
    /// The access-token cache entry to store and hand back to the caller.
    pub cached: CachedAccessToken,
    /// A rotated refresh token, if the provider returned a non-empty one.
    /// `None` means "unchanged" -- the caller should keep the prior value.
    pub rotated_refresh_token: Option<String>,
}

/// Issue an upstream refresh-token-grant request and turn the result into a
/// cache entry, plus any rotated refresh token the provider returned.
#[instrument(skip(client, refresh_token), fields(service = %service.id))]
pub async fn upstream_refresh(
    client: &Client,
    service: &ServiceConfig,
    refresh_token: &str,
) -> Result<UpstreamRefresh> {
    let form = RefreshForm {
        client_id: &service.client_id,
        refresh_token,
        grant_type: "refresh_token",
        client_secret: (!service.client_secret.is_empty()).then_some(&*service.client_secret),
        redirect_uri: (!service.flags.no_redirect_uri_for_refresh_request)
            .then_some(&*service.redirect_uri),
    };

    let res: RefreshResponse = http_client::post_form(client, &service.auth_url, &form).await?;

    if res.access_token.is_empty() {
        return Err(Error::MissingField("access_token"));
    }

    Ok(UpstreamRefresh {
        cached: CachedAccessToken {
            access_token: res.access_token,
            expires: Utc::now() + chrono::Duration::seconds(res.expires_in - EXPIRY_SAFETY_MARGIN),
            service_id: service.id.clone(),
        },
        rotated_refresh_token: (!res.refresh_token.is_empty()).then_some(res.refresh_token),
    })
}

/// Reject refresh material (refresh token or V1 password) shorter than
/// [`MIN_REFRESH_TOKEN_LEN`].
pub fn require_min_length(material: &str) -> Result<()> {
    if material.len() < MIN_REFRESH_TOKEN_LEN {
        return Err(Error::RefreshTokenTooShort);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_are_stable_and_distinct() {
        let a = cache_key_v2("gd", "token-a");
        let b = cache_key_v2("gd", "token-b");
        let c = cache_key_v2("onedrive", "token-a");

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, cache_key_v2("gd", "token-a"));
    }

    #[test]
    fn v1_and_v2_keys_never_collide_by_shape() {
        assert!(cache_key_v1("id", "pw").starts_with("/v1/"));
        assert!(cache_key_v2("id", "tok").starts_with("/v2/"));
    }

    #[test]
    fn fresh_entry_reports_positive_remaining() {
        let entry = CachedAccessToken {
            access_token: "a".into(),
            expires: Utc::now() + chrono::Duration::seconds(3600),
            service_id: "gd".into(),
        };
        assert!(entry.is_fresh());
        assert!(entry.expires_in_seconds() > 3000);
    }

    #[test]
    fn near_expiry_entry_is_not_fresh() {
        let entry = CachedAccessToken {
            access_token: "a".into(),
            expires: Utc::now() + chrono::Duration::seconds(5),
            service_id: "gd".into(),
        };
        assert!(!entry.is_fresh());
    }

    #[test]
    fn expired_entry_reports_zero_remaining() {
        let entry = CachedAccessToken {
            access_token: "a".into(),
            expires: Utc::now() - chrono::Duration::seconds(5),
            service_id: "gd".into(),
        };
        assert_eq!(entry.remaining(), Duration::ZERO);
        assert_eq!(entry.expires_in_seconds(), 0);
    }

    #[test]
    fn short_refresh_material_is_rejected() {
        assert!(require_min_length("abc").is_err());
        assert!(require_min_length("abcdef").is_ok());
    }

    #[test]
    fn refresh_response_without_refresh_token_has_no_rotation() {
        let body = serde_json::json!({"access_token": "a", "expires_in": 3600});
        let res: RefreshResponse = serde_json::from_value(body).unwrap();
        assert_eq!(res.refresh_token, "");
    }
}
