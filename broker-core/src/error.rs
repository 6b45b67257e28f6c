//! Error taxonomy for the broker core.
use thiserror::Error;

/// Error used by the entire broker-core crate.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP error talking to an upstream provider.
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Url error while building a login or refresh URL.
    #[error("invalid url")]
    Url(#[from] url::ParseError),

    /// Filesystem error in the encrypted blob store.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// The requested service id is not present in the catalog.
    #[error("unknown service {0:?}")]
    UnknownService(String),

    /// `state` is missing, unknown, or expired.
    #[error("request state not found or expired")]
    StateNotFound,

    /// A freshly generated state key already existed in the cache.
    #[error("state key collision")]
    StateKeyCollision,

    /// A malformed AuthId was presented (wrong number of `:`-separated parts).
    #[error("malformed auth id")]
    MalformedAuthId,

    /// Decryption of a stored entry failed. Deliberately opaque: this is raised
    /// whether the key was wrong, the file was corrupt, or the file never
    /// existed, so a caller can't distinguish "no such entry" from "bad password".
    #[error("decrypting failed")]
    DecryptingFailed,

    /// No blob store is configured but a V1 operation was attempted.
    #[error("no credential store configured")]
    NoStore,

    /// Upstream returned a non-2xx status code for a token exchange or refresh.
    #[error("upstream returned status {0}")]
    UpstreamStatus(reqwest::StatusCode),

    /// Upstream's JSON response was missing a required field.
    #[error("upstream response missing `{0}`")]
    MissingField(&'static str),

    /// A refresh token (or V1 password) was shorter than the minimum accepted length.
    #[error("refresh token too short")]
    RefreshTokenTooShort,

    /// A caller-supplied fetch token was shorter than the minimum accepted length.
    #[error("fetch token too short")]
    FetchTokenTooShort,

    /// A cli-token credential blob failed to decode or parse.
    #[error("malformed cli-token credential")]
    MalformedCliToken,
}

/// Convenience alias used throughout broker-core.
pub type Result<T> = std::result::Result<T, Error>;
