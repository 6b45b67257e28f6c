//! The user-visible credential, in its two wire formats.
use std::fmt;

/// Opaque credential returned to end users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthId {
    /// `<keyId>:<password>`. Indexes an encrypted [`crate::store::StoredEntry`].
    V1 {
        /// 32-hex-char random identifier; also the blob store's file name.
        key_id: String,
        /// Generator-issued password; decrypts the stored entry.
        password: String,
    },
    /// `v2:<serviceId>:<refreshToken>`. Self-describing, never persisted.
    V2 {
        /// Id of the service the refresh token belongs to.
        service_id: String,
        /// The raw refresh (or, for cli-token logins, access) token.
        refresh_token: String,
    },
}

impl AuthId {
    /// Build a V1 AuthId from its parts.
    #[must_use]
    pub fn v1(key_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self::V1 {
            key_id: key_id.into(),
            password: password.into(),
        }
    }

    /// Build a V2 AuthId from its parts.
    #[must_use]
    pub fn v2(service_id: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self::V2 {
            service_id: service_id.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Parse the wire format. A leading `v2:` selects the V2 variant
    /// (exactly 3 `:`-separated parts); anything else is parsed as V1
    /// (exactly 2 `:`-separated parts).
    pub fn parse(s: &str) -> Result<Self, crate::error::Error> {
        if let Some(rest) = s.strip_prefix("v2:") {
            let mut parts = rest.splitn(2, ':');
            let service_id = parts.next().filter(|s| !s.is_empty());
            let refresh_token = parts.next().filter(|s| !s.is_empty());

            return match (service_id, refresh_token) {
                (Some(service_id), Some(refresh_token)) => Ok(Self::v2(service_id, refresh_token)),
                _ => Err(crate::error::Error::MalformedAuthId),
            };
        }

        let mut parts = s.splitn(2, ':');
        let key_id = parts.next().filter(|s| !s.is_empty());
        let password = parts.next().filter(|s| !s.is_empty());

        match (key_id, password) {
            (Some(key_id), Some(password)) => Ok(Self::v1(key_id, password)),
            _ => Err(crate::error::Error::MalformedAuthId),
        }
    }
}

impl fmt::Display for AuthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 { key_id, password } => write!(f, "{key_id}:{password}"),
            Self::V2 {
                service_id,
                refresh_token,
            } => write!(f, "v2:{service_id}:{refresh_token}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v1() {
        let id = AuthId::parse("abc123:s3cr3t").unwrap();
        assert_eq!(id, AuthId::v1("abc123", "s3cr3t"));
    }

    #[test]
    fn parses_v2() {
        let id = AuthId::parse("v2:gd:refresh-token-value").unwrap();
        assert_eq!(id, AuthId::v2("gd", "refresh-token-value"));
    }

    #[test]
    fn v2_refresh_token_may_contain_colons() {
        let id = AuthId::parse("v2:gd:a:b:c").unwrap();
        assert_eq!(id, AuthId::v2("gd", "a:b:c"));
    }

    #[test]
    fn rejects_malformed_v1() {
        assert!(AuthId::parse("no-colon-here").is_err());
        assert!(AuthId::parse(":missing-keyid").is_err());
        assert!(AuthId::parse("missing-password:").is_err());
    }

    #[test]
    fn rejects_malformed_v2() {
        assert!(AuthId::parse("v2:only-service").is_err());
        assert!(AuthId::parse("v2::missing-service").is_err());
    }

    #[test]
    fn display_round_trips() {
        for s in ["abc:def", "v2:gd:xyz"] {
            assert_eq!(AuthId::parse(s).unwrap().to_string(), s);
        }
    }
}
