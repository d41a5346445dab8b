//! Short-lived signed access tokens.
//!
//! A token is `base64url(claims JSON) + "." + base64url(HMAC-SHA256)`,
//! stateless and self-expiring: validity is a function of the token's own
//! embedded expiry plus the current subscription status, never of server
//! state about previously issued tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

/// How long an issued access token stays redeemable.
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 120;

/// Pre-validated HMAC key for repeated signing operations.
#[derive(Clone)]
pub struct HmacKey {
    key_bytes: Arc<[u8]>,
}

impl HmacKey {
    /// Minimum allowed key length in bytes (256 bits).
    pub const MIN_KEY_LENGTH: usize = 32;

    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let key_bytes = key.as_ref();
        if key_bytes.len() < Self::MIN_KEY_LENGTH {
            return Err(TokenError::KeyTooShort {
                actual: key_bytes.len(),
                minimum: Self::MIN_KEY_LENGTH,
            });
        }
        Ok(Self {
            key_bytes: Arc::from(key_bytes),
        })
    }

    fn sign(&self, data: &[u8]) -> [u8; 32] {
        // Cannot fail: key length was validated in new()
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key_bytes)
            .expect("HMAC key length already validated");
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacKey")
            .field("key_length", &self.key_bytes.len())
            .finish_non_exhaustive()
    }
}

/// Constant-time byte slice comparison.
///
/// Comparison time depends only on the length of the slices, not their
/// contents; length itself is not secret.
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let result = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    result == 0
}

/// Wire form of the signed claims.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    /// Subscription id.
    sub: String,
    /// Unique token id; two refreshes in the same instant still produce
    /// distinct tokens.
    jti: String,
    /// Issue timestamp, milliseconds.
    iat: i64,
    /// Expiration timestamp, milliseconds.
    exp: i64,
}

/// Verified claims of a presented token.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessClaims {
    pub subscription: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly issued token together with its expiry, for the caller to
/// know when to refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("signing key too short: got {actual} bytes, need at least {minimum}")]
    KeyTooShort { actual: usize, minimum: usize },

    #[error("malformed token")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

/// Issues and verifies access tokens binding a subscription id.
#[derive(Clone, Debug)]
pub struct TokenSigner {
    key: HmacKey,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, TokenError> {
        Ok(Self {
            key: HmacKey::new(secret)?,
            ttl,
        })
    }

    /// Signer with the standard short validity window.
    pub fn with_default_ttl(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        Self::new(secret, Duration::seconds(ACCESS_TOKEN_TTL_SECONDS))
    }

    /// Issue a fresh token for the given subscription.
    ///
    /// Repeated calls are refreshes; nothing previously issued is
    /// invalidated server-side.
    pub fn issue(&self, subscription: Uuid) -> IssuedToken {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = WireClaims {
            sub: subscription.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp_millis(),
            exp: expires_at.timestamp_millis(),
        };
        // Serializing a struct of strings and integers cannot fail
        let payload = serde_json::to_vec(&claims).expect("claims serialize");
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let signature = URL_SAFE_NO_PAD.encode(self.key.sign(payload_b64.as_bytes()));
        IssuedToken {
            token: format!("{payload_b64}.{signature}"),
            expires_at,
        }
    }

    /// Verify signature and embedded expiry of a presented token.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let parts: Vec<&str> = token.rsplitn(2, '.').collect();
        if parts.len() != 2 {
            return Err(TokenError::Malformed);
        }
        let (signature, payload_b64) = (parts[0], parts[1]);

        let expected = URL_SAFE_NO_PAD.encode(self.key.sign(payload_b64.as_bytes()));
        if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
            return Err(TokenError::BadSignature);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: WireClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if Utc::now().timestamp_millis() > claims.exp {
            return Err(TokenError::Expired);
        }

        let subscription = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Malformed)?;
        let issued_at = Utc
            .timestamp_millis_opt(claims.iat)
            .single()
            .ok_or(TokenError::Malformed)?;
        let expires_at = Utc
            .timestamp_millis_opt(claims.exp)
            .single()
            .ok_or(TokenError::Malformed)?;

        Ok(AccessClaims {
            subscription,
            issued_at,
            expires_at,
        })
    }
}
