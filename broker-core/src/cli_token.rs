//! Resource-owner password grant for Jottacloud-style CLI logins.
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    catalog::ServiceConfig,
    error::{Error, Result},
    http_client,
};

/// Minimum accepted length for the raw base64url credential blob.
pub const MIN_RAW_TOKEN_LEN: usize = 6;

#[derive(Debug, Deserialize)]
struct Credential {
    username: String,
    auth_token: String,
}

/// Decode the base64url-ish blob the CLI hands over: `-`/`_` stand in for the
/// standard alphabet's `+`/`/`, and padding is omitted.
pub fn decode_blob(raw: &str) -> Result<Vec<u8>> {
    if raw.len() < MIN_RAW_TOKEN_LEN {
        return Err(Error::MalformedCliToken);
    }

    let mut normalized = raw.replace('-', "+").replace('_', "/");
    while normalized.len() % 4 != 0 {
        normalized.push('=');
    }

    base64::decode(&normalized).map_err(|_| Error::MalformedCliToken)
}

fn parse_credential(raw: &str) -> Result<Credential> {
    let decoded = decode_blob(raw)?;
    serde_json::from_slice(&decoded).map_err(|_| Error::MalformedCliToken)
}

#[derive(Serialize)]
struct PasswordGrantForm<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    scope: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct PasswordGrantResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// Exchange a base64url-encoded `{username, auth_token}` blob for an access
/// token via the resource-owner password grant, returning it verbatim (the
/// caller mints the V2 AuthId; there is no refresh token in this flow).
#[instrument(skip(client, raw_token), fields(service = %service.id))]
pub async fn exchange(client: &Client, service: &ServiceConfig, raw_token: &str) -> Result<String> {
    let credential = parse_credential(raw_token)?;

    let form = PasswordGrantForm {
        grant_type: "password",
        client_id: &service.client_id,
        scope: &service.scope,
        username: &credential.username,
        password: &credential.auth_token,
    };

    let res: PasswordGrantResponse = http_client::post_form(client, &service.auth_url, &form).await?;

    if res.access_token.is_empty() {
        return Err(Error::MissingField("access_token"));
    }

    let _ = res.expires_in; // no refresh token to cache this against; access token is the AuthId itself
    Ok(res.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_short_blob() {
        assert!(matches!(decode_blob("abc"), Err(Error::MalformedCliToken)));
    }

    #[test]
    fn decodes_unpadded_base64url() {
        let json = br#"{"username":"u","auth_token":"t"}"#;
        let encoded = base64::encode(json)
            .replace('+', "-")
            .replace('/', "_")
            .trim_end_matches('=')
            .to_owned();

        let decoded = decode_blob(&encoded).unwrap();
        assert_eq!(decoded, json);
    }

    #[test]
    fn parses_credential_json() {
        let json = br#"{"username":"alice","auth_token":"s3cr3t"}"#;
        let encoded = base64::encode(json);
        let credential = parse_credential(&encoded).unwrap();
        assert_eq!(credential.username, "alice");
        assert_eq!(credential.auth_token, "s3cr3t");
    }

    #[test]
    fn rejects_malformed_json() {
        let encoded = base64::encode(b"not json");
        assert!(matches!(parse_credential(&encoded), Err(Error::MalformedCliToken)));
    }
}
