//! Loads the service catalog and the secrets document it may reference.
use std::collections::HashMap;

use broker_core::{catalog::expand_placeholders, store, ServiceCatalog};
use serde_json::Value;

use crate::settings::Settings;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {0:?}: {1}")]
    Io(String, std::io::Error),
    #[error("{0:?} is not valid base64: {1}")]
    Base64(String, base64::DecodeError),
    #[error("{0:?} could not be decrypted under SECRETS_PASSPHRASE")]
    Decrypt(String),
    #[error("{0:?} is not valid JSON: {1}")]
    Json(String, serde_json::Error),
    #[error("invalid service catalog: {0}")]
    Catalog(#[from] broker_core::Error),
}

/// Read a `path` or `base64:<...>` document spec into raw bytes.
fn read_document(spec: &str, label: &str) -> Result<Vec<u8>, LoadError> {
    if let Some(encoded) = spec.strip_prefix("base64:") {
        base64::decode(encoded).map_err(|e| LoadError::Base64(label.to_owned(), e))
    } else {
        std::fs::read(spec).map_err(|e| LoadError::Io(label.to_owned(), e))
    }
}

/// Load the secrets map (`%<NAME>%` -> value), optionally AES-decrypting it
/// with `SECRETS_PASSPHRASE` using the blob store's cipher.
fn load_secrets(settings: &Settings) -> Result<HashMap<String, String>, LoadError> {
    let Some(spec) = &settings.secrets else {
        return Ok(HashMap::new());
    };

    let mut bytes = read_document(spec, "SECRETS")?;
    if let Some(passphrase) = &settings.secrets_passphrase {
        bytes = store::decrypt_blob(passphrase, &bytes).map_err(|_| LoadError::Decrypt("SECRETS".to_owned()))?;
    }

    serde_json::from_slice(&bytes).map_err(|e| LoadError::Json("SECRETS".to_owned(), e))
}

/// Recursively apply `%...%` placeholder expansion to every string leaf of a
/// JSON value, leaving numbers/bools/structure untouched.
fn expand_value(value: Value, hostname: &str, secrets: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(expand_placeholders(&s, hostname, secrets)),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| expand_value(v, hostname, secrets)).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, expand_value(v, hostname, secrets)))
                .collect(),
        ),
        other => other,
    }
}

/// Load the service catalog named by `CONFIGFILE` (or the embedded default),
/// expanding placeholders against `HOSTNAME` and the secrets document.
pub fn load_catalog(settings: &Settings) -> Result<ServiceCatalog, LoadError> {
    let secrets = load_secrets(settings)?;

    let raw: Vec<u8> = match &settings.config_file {
        Some(spec) => read_document(spec, "CONFIGFILE")?,
        None => include_bytes!("../default_services.json").to_vec(),
    };

    let document: Value = serde_json::from_slice(&raw).map_err(|e| LoadError::Json("CONFIGFILE".to_owned(), e))?;
    let expanded = expand_value(document, &settings.hostname, &secrets);

    Ok(ServiceCatalog::from_json(&expanded.to_string())?)
}
