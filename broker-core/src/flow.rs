//! Orchestration: ties the catalog, caches, store and HTTP client together
//! into the nine endpoint behaviors described for the OAuth state machine.
use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use tracing::instrument;
use url::Url;

use crate::{
    authid::AuthId,
    catalog::{ServiceCatalog, ServiceConfig},
    cli_token,
    error::{Error, Result},
    http_client::ClientPool,
    ids, password,
    refresh::{self, CachedAccessToken},
    state::{self, Caches, FetchToken, RequestState},
    store::{EncryptedStore, StoredEntry},
};

/// Everything a running instance of the broker needs to serve requests.
#[derive(Debug)]
pub struct Broker {
    catalog: ServiceCatalog,
    caches: Caches,
    store: Option<EncryptedStore>,
    client_pool: Arc<ClientPool>,
    /// Shown in user-facing error messages ("you must de-authorize `<app_name>`").
    app_name: String,
}

/// Where `StartLogin` should send the browser.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub location: String,
}

/// Everything a rendered `logged-in` (or cli-token result) page needs.
#[derive(Debug, Clone)]
pub struct CompleteLoginOutcome {
    pub service_name: String,
    pub auth_id: Option<String>,
    pub de_auth_link: Option<String>,
    pub error_message: Option<String>,
    pub additional_data: BTreeMap<String, String>,
}

/// Inputs to `CompleteLogin`, gathered from the provider's callback query string.
pub struct CompleteLoginParams<'a> {
    pub state: &'a str,
    pub code: &'a str,
    pub token: Option<&'a str>,
    pub query: &'a BTreeMap<String, String>,
}

/// Inputs to the cli-token resource-owner login.
pub struct CliTokenLoginParams<'a> {
    pub service_id: &'a str,
    pub raw_token: &'a str,
    pub fetch_token_key: Option<&'a str>,
}

/// Outcome of `GET /fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    MissingToken,
    NoSuchEntry,
    NotReady,
    Error(String),
    AuthId(String),
}

/// Outcome of `POST /revoked`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    V2Rejected,
    Malformed,
    NoStore,
    InvalidAuthId,
    InternalError,
    Revoked,
}

/// The `{access_token, expires, type}` body `/refresh` renders on success.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReply {
    pub access_token: String,
    pub expires: i64,
    #[serde(rename = "type")]
    pub service_id: String,
}

/// Outcome of `GET|POST /refresh`.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Success(RefreshReply),
    /// V1 decrypt failed; render 401 with `X-Reason: Invalid key or password`.
    InvalidKeyOrPassword,
}

fn to_reply(cached: &CachedAccessToken) -> RefreshReply {
    RefreshReply {
        access_token: cached.access_token.clone(),
        expires: cached.expires_in_seconds(),
        service_id: cached.service_id.clone(),
    }
}

impl Broker {
    /// Assemble a broker instance around an already-loaded catalog and
    /// (optional) credential store.
    #[must_use]
    pub fn new(
        catalog: ServiceCatalog,
        store: Option<EncryptedStore>,
        client_pool: Arc<ClientPool>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            caches: Caches::default(),
            store,
            client_pool,
            app_name: app_name.into(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// `GET /`: pre-register a fetch-token rendezvous slot, if the caller
    /// supplied one long enough to be honored.
    pub fn register_fetch_token(&self, token: &str) {
        if state::accepts_fetch_token_key(token) {
            self.caches
                .fetch_token
                .set(token, FetchToken::pending(), state::FETCH_TOKEN_PENDING_TTL);
        }
    }

    /// `GET /login`: mint a state key, stash the pending request, and build
    /// the provider's authorize URL.
    #[instrument(skip(self))]
    pub fn start_login(&self, service_id: &str, token: Option<&str>) -> Result<LoginRedirect> {
        let service = self.catalog.require(service_id)?;

        let fetch_token_key = token
            .filter(|t| self.caches.fetch_token.contains(t))
            .map(str::to_owned);

        let use_v2 = self.store.is_none() || service.flags.prefer_v2;

        let state_key = ids::random_state_key();
        if self.caches.request_state.contains(&state_key) {
            return Err(Error::StateKeyCollision);
        }

        self.caches.request_state.set(
            state_key.clone(),
            RequestState {
                service_id: service.id.clone(),
                fetch_token_key,
                use_v2,
            },
            state::REQUEST_STATE_TTL,
        );

        let mut url = Url::parse(&service.login_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &service.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", &service.scope)
            .append_pair("state", &state_key)
            .append_pair("redirect_uri", &service.redirect_uri);

        let mut location = url.to_string();
        location.push_str(&service.extra_url);

        Ok(LoginRedirect { location })
    }

    fn attach_fetch_token(&self, key: Option<&str>, outcome: &std::result::Result<String, String>) {
        let Some(key) = key else { return };
        if !self.caches.fetch_token.contains(key) {
            return;
        }

        let token = match outcome {
            Ok(auth_id) => FetchToken::completed(auth_id.clone()),
            Err(message) => FetchToken::failed(message.clone()),
        };
        self.caches
            .fetch_token
            .set(key, token, state::FETCH_TOKEN_COMPLETED_TTL);
    }

    fn user_facing_error(&self, _service: &ServiceConfig) -> String {
        format!("Server error, you must de-authorize {}", self.app_name)
    }

    /// `GET /logged-in`: exchange the authorization code, mint an AuthId (or
    /// a user-facing error), and hand off to any pending fetch token.
    #[instrument(skip(self, params), fields(state = %params.state))]
    pub async fn complete_login(&self, params: CompleteLoginParams<'_>) -> Result<CompleteLoginOutcome> {
        let request_state = self
            .caches
            .request_state
            .get(params.state)
            .ok_or(Error::StateNotFound)?;

        let service = self.catalog.require(&request_state.service_id)?;

        let additional_data: BTreeMap<String, String> = service
            .additional_element_names()
            .filter_map(|name| {
                params
                    .query
                    .get(name)
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.to_owned(), v.clone()))
            })
            .collect();

        let mut redirect_uri = service.redirect_uri.clone();
        if let Some(token) = params.token {
            let sep = if redirect_uri.contains('?') { '&' } else { '?' };
            redirect_uri = format!("{redirect_uri}{sep}token={token}");
        }

        let mut auth_url = service.auth_url.clone();
        if service.flags.use_hostname_from_callback {
            if let Some(hostname) = params.query.get("hostname").filter(|h| !h.is_empty()) {
                let mut parsed = Url::parse(&auth_url)?;
                parsed
                    .set_host(Some(hostname))
                    .map_err(|_| Error::MalformedAuthId)?;
                auth_url = parsed.to_string();
            }
        }

        #[derive(Serialize)]
        struct TokenExchangeForm<'a> {
            client_id: &'a str,
            redirect_uri: &'a str,
            client_secret: &'a str,
            code: &'a str,
            grant_type: &'static str,
        }

        let form = TokenExchangeForm {
            client_id: &service.client_id,
            redirect_uri: &redirect_uri,
            client_secret: &service.client_secret,
            code: params.code,
            grant_type: "authorization_code",
        };

        let client = self.client_pool.client();
        let res = client.post(&auth_url).form(&form).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus(status));
        }
        let body: serde_json::Value = res.json().await?;

        let access_token = body.get("access_token").and_then(|v| v.as_str());
        let refresh_token = body.get("refresh_token").and_then(|v| v.as_str());

        let mint_result: std::result::Result<String, String> = if service.flags.access_token_only {
            match access_token.filter(|t| !t.is_empty()) {
                Some(token) => Ok(token.to_owned()),
                None => Err(self.user_facing_error(service)),
            }
        } else {
            match refresh_token.filter(|t| !t.is_empty()) {
                Some(refresh_token) => self
                    .mint_auth_id(service, request_state.use_v2, access_token.unwrap_or(""), refresh_token, &body)
                    .await
                    .map_err(|_| self.user_facing_error(service)),
                None => Err(self.user_facing_error(service)),
            }
        };

        self.attach_fetch_token(request_state.fetch_token_key.as_deref(), &mint_result);

        match mint_result {
            Ok(auth_id) => Ok(CompleteLoginOutcome {
                service_name: service.name.clone(),
                auth_id: Some(auth_id),
                de_auth_link: None,
                error_message: None,
                additional_data,
            }),
            Err(error_message) => Ok(CompleteLoginOutcome {
                service_name: service.name.clone(),
                auth_id: None,
                de_auth_link: service.de_auth_link.clone(),
                error_message: Some(error_message),
                additional_data,
            }),
        }
    }

    /// Mint a V1 (blob-store-backed) or V2 (self-describing) AuthId for a
    /// freshly exchanged token. `refresh_token` is the credential that goes
    /// in the V2 slot or the StoredEntry's `RefreshToken` field.
    async fn mint_auth_id(
        &self,
        service: &ServiceConfig,
        use_v2: bool,
        access_token: &str,
        refresh_token: &str,
        raw: &serde_json::Value,
    ) -> Result<String> {
        let Some(store) = self.store.as_ref().filter(|_| !use_v2) else {
            return Ok(AuthId::v2(&service.id, refresh_token).to_string());
        };

        let key_id = ids::random_key_id();
        let generated_password = password::generate();

        let expires_secs = [
            raw.get("expires").and_then(serde_json::Value::as_i64),
            raw.get("expires_in").and_then(serde_json::Value::as_i64),
        ]
        .into_iter()
        .flatten()
        .chain(std::iter::once(1000))
        .max()
        .unwrap_or(1000);

        let entry = StoredEntry {
            service_id: service.id.clone(),
            expires: chrono::Utc::now() + chrono::Duration::seconds(expires_secs),
            access_token: access_token.to_owned(),
            refresh_token: refresh_token.to_owned(),
            json: raw.clone(),
        };

        store.put(&key_id, &generated_password, &entry).await?;

        Ok(AuthId::v1(key_id, generated_password).to_string())
    }

    /// `GET /cli-token` + `POST /cli-token-login`: resource-owner password
    /// grant, for services that carry the `CliToken` flag.
    #[instrument(skip(self, params), fields(service = %params.service_id))]
    pub async fn cli_token_login(&self, params: CliTokenLoginParams<'_>) -> Result<CompleteLoginOutcome> {
        let service = self.catalog.require(params.service_id)?;
        if !service.flags.cli_token {
            return Err(Error::UnknownService(params.service_id.to_owned()));
        }

        let client = self.client_pool.client();
        let result = cli_token::exchange(&client, service, params.raw_token).await;

        let auth_id_result: std::result::Result<String, String> = result
            .as_ref()
            .map(|token| AuthId::v2(&service.id, token.as_str()).to_string())
            .map_err(ToString::to_string);
        self.attach_fetch_token(params.fetch_token_key, &auth_id_result);

        let access_token = result?;
        Ok(CompleteLoginOutcome {
            service_name: service.name.clone(),
            auth_id: Some(AuthId::v2(&service.id, access_token).to_string()),
            de_auth_link: None,
            error_message: None,
            additional_data: BTreeMap::new(),
        })
    }

    /// `GET /fetch`: poll a previously pre-registered rendezvous slot.
    #[must_use]
    pub fn fetch(&self, token: Option<&str>) -> FetchOutcome {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return FetchOutcome::MissingToken;
        };

        match self.caches.fetch_token.get(token) {
            None => FetchOutcome::NoSuchEntry,
            Some(FetchToken {
                auth_id: Some(id), ..
            }) => FetchOutcome::AuthId(id),
            Some(FetchToken {
                error_message: Some(msg),
                ..
            }) => FetchOutcome::Error(msg),
            Some(_) => FetchOutcome::NotReady,
        }
    }

    /// `POST /revoked`: destroy a V1 credential after proving password knowledge.
    #[instrument(skip(self, auth_id_str))]
    pub async fn revoke(&self, auth_id_str: &str) -> RevokeOutcome {
        if auth_id_str.starts_with("v2:") {
            return RevokeOutcome::V2Rejected;
        }

        let mut parts = auth_id_str.splitn(2, ':');
        let key_id = parts.next().filter(|s| !s.is_empty());
        let password = parts.next().filter(|s| !s.is_empty());
        let (key_id, password) = match (key_id, password) {
            (Some(k), Some(p)) => (k, p),
            _ => return RevokeOutcome::Malformed,
        };

        let Some(store) = &self.store else {
            return RevokeOutcome::NoStore;
        };

        if store.get(key_id, password).await.is_err() {
            return RevokeOutcome::InvalidAuthId;
        }

        match store.delete(key_id).await {
            Ok(()) => RevokeOutcome::Revoked,
            Err(_) => RevokeOutcome::InternalError,
        }
    }

    /// `GET|POST /refresh`: exchange an AuthId for a short-lived access token.
    #[instrument(skip(self, auth_id_str))]
    pub async fn refresh(&self, auth_id_str: &str) -> Result<RefreshOutcome> {
        match AuthId::parse(auth_id_str)? {
            AuthId::V2 {
                service_id,
                refresh_token,
            } => {
                let service = self.catalog.require(&service_id)?;
                refresh::require_min_length(&refresh_token)?;

                let cache_key = refresh::cache_key_v2(&service_id, &refresh_token);
                if let Some(cached) = self.caches.access_token.get(&cache_key) {
                    if cached.is_fresh() {
                        return Ok(RefreshOutcome::Success(to_reply(&cached)));
                    }
                }

                let client = self.client_pool.client();
                let fresh = refresh::upstream_refresh(&client, service, &refresh_token).await?;
                self.caches
                    .access_token
                    .set(cache_key, fresh.cached.clone(), fresh.cached.remaining());
                Ok(RefreshOutcome::Success(to_reply(&fresh.cached)))
            }
            AuthId::V1 { key_id, password } => {
                let store = self.store.as_ref().ok_or(Error::NoStore)?;

                let cache_key = refresh::cache_key_v1(&key_id, &password);
                if let Some(cached) = self.caches.access_token.get(&cache_key) {
                    if cached.is_fresh() {
                        return Ok(RefreshOutcome::Success(to_reply(&cached)));
                    }
                }

                let entry = match store.get(&key_id, &password).await {
                    Ok(entry) => entry,
                    Err(_) => return Ok(RefreshOutcome::InvalidKeyOrPassword),
                };

                let service = self.catalog.require(&entry.service_id)?;
                refresh::require_min_length(&entry.refresh_token)?;

                let client = self.client_pool.client();
                let fresh = refresh::upstream_refresh(&client, service, &entry.refresh_token).await?;
                self.caches
                    .access_token
                    .set(cache_key, fresh.cached.clone(), fresh.cached.remaining());

                let updated = StoredEntry {
                    service_id: entry.service_id.clone(),
                    expires: fresh.cached.expires,
                    access_token: if fresh.cached.access_token.is_empty() {
                        entry.access_token.clone()
                    } else {
                        fresh.cached.access_token.clone()
                    },
                    refresh_token: fresh
                        .rotated_refresh_token
                        .clone()
                        .unwrap_or_else(|| entry.refresh_token.clone()),
                    json: entry.json.clone(),
                };
                store.put(&key_id, &password, &updated).await?;

                Ok(RefreshOutcome::Success(to_reply(&fresh.cached)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ServiceConfig, ServiceFlags};

    fn service(id: &str) -> ServiceConfig {
        ServiceConfig {
            id: id.into(),
            name: "Google Drive".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            auth_url: "https://oauth2.googleapis.com/token".into(),
            login_url: "https://accounts.google.com/o/oauth2/auth".into(),
            scope: "drive".into(),
            redirect_uri: "https://example.com/logged-in".into(),
            extra_url: "&access_type=offline".into(),
            service_link: None,
            de_auth_link: Some("https://myaccount.google.com/permissions".into()),
            brand_image: None,
            notes: None,
            additional_elements: String::new(),
            flags: ServiceFlags::default(),
        }
    }

    fn broker() -> Broker {
        Broker::new(
            ServiceCatalog::new(vec![service("gd")]),
            None,
            Arc::new(ClientPool::new()),
            "TestApp",
        )
    }

    #[test]
    fn start_login_rejects_unknown_service() {
        let broker = broker();
        assert!(matches!(
            broker.start_login("nope", None),
            Err(Error::UnknownService(_))
        ));
    }

    #[test]
    fn start_login_builds_a_redirect_with_state_and_extra_url() {
        let broker = broker();
        let redirect = broker.start_login("gd", None).unwrap();

        assert!(redirect.location.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(redirect.location.contains("client_id=client"));
        assert!(redirect.location.contains("state="));
        assert!(redirect.location.ends_with("&access_type=offline"));
    }

    #[test]
    fn start_login_without_a_store_uses_v2() {
        let broker = broker();
        let redirect = broker.start_login("gd", None).unwrap();
        let state_key = redirect
            .location
            .split("state=")
            .nth(1)
            .unwrap()
            .split('&')
            .next()
            .unwrap();

        let stashed = broker.caches.request_state.get(state_key).unwrap();
        assert!(stashed.use_v2);
    }

    #[test]
    fn fetch_with_no_token_is_missing() {
        let broker = broker();
        assert_eq!(broker.fetch(None), FetchOutcome::MissingToken);
        assert_eq!(broker.fetch(Some("")), FetchOutcome::MissingToken);
    }

    #[test]
    fn fetch_with_unregistered_token_has_no_entry() {
        let broker = broker();
        assert_eq!(broker.fetch(Some("some-token-key")), FetchOutcome::NoSuchEntry);
    }

    #[test]
    fn fetch_reports_pending_then_completion() {
        let broker = broker();
        broker.register_fetch_token("a-long-enough-token");
        assert_eq!(broker.fetch(Some("a-long-enough-token")), FetchOutcome::NotReady);

        broker.caches.fetch_token.set(
            "a-long-enough-token",
            FetchToken::completed("v2:gd:refresh"),
            state::FETCH_TOKEN_COMPLETED_TTL,
        );
        assert_eq!(
            broker.fetch(Some("a-long-enough-token")),
            FetchOutcome::AuthId("v2:gd:refresh".to_string())
        );
    }

    #[tokio::test]
    async fn revoke_v2_is_rejected_without_touching_storage() {
        let broker = broker();
        assert_eq!(broker.revoke("v2:gd:refresh").await, RevokeOutcome::V2Rejected);
    }

    #[tokio::test]
    async fn revoke_without_a_store_reports_no_store() {
        let broker = broker();
        assert_eq!(broker.revoke("keyid:password").await, RevokeOutcome::NoStore);
    }

    #[tokio::test]
    async fn revoke_malformed_auth_id_is_rejected() {
        let broker = broker();
        assert_eq!(broker.revoke("no-colon").await, RevokeOutcome::Malformed);
    }

    #[tokio::test]
    async fn refresh_rejects_short_v2_refresh_tokens() {
        let broker = broker();
        let err = broker.refresh("v2:gd:short").await.unwrap_err();
        assert!(matches!(err, Error::RefreshTokenTooShort));
    }

    #[tokio::test]
    async fn refresh_rejects_unknown_service() {
        let broker = broker();
        let err = broker.refresh("v2:unknown:refresh-token-value").await.unwrap_err();
        assert!(matches!(err, Error::UnknownService(_)));
    }
}
