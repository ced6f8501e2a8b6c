//! HMAC-signed session tokens.
//!
//! A token is `base64url(json(payload)) "." base64url(hmac_sha256(secret, encoded_payload))`.
//! There is no header and no algorithm negotiation; the codec only ever speaks HS256.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use seedor_api::{Clock, Role, SystemClock, TenantId, UserId};
use seedor_core::SessionSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokenPayload {
    /// Subject.
    pub user_id: UserId,

    /// Tenant the session was opened for.
    pub tenant_id: TenantId,

    /// Role at issuance time. Informational only; authorization reads the live record.
    pub role: Role,

    /// Absolute expiry, epoch milliseconds.
    pub exp: i64,

    /// Issuance time, epoch milliseconds. Compared against a user's revocation cutoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Signs and verifies session tokens with a single process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from an explicit secret and clock.
    pub fn new(secret: &SessionSecret, clock: Arc<dyn Clock>) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Key("secret is empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| Error::Key(e.to_string()))?;
        Ok(Self { mac, clock })
    }

    /// Build a codec on the wall clock.
    pub fn with_system_clock(secret: &SessionSecret) -> Result<Self> {
        Self::new(secret, Arc::new(SystemClock))
    }

    /// Current time according to the codec's clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Serialize and sign `payload`.
    pub fn issue(&self, payload: &SessionTokenPayload) -> Result<String> {
        let json = serde_json::to_vec(payload)?;
        let encoded_payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.sign(&encoded_payload);
        Ok(format!("{encoded_payload}.{signature}"))
    }

    /// Return the payload of a genuine, unexpired token.
    ///
    /// Absent, malformed, tampered and expired tokens all yield `None`; callers get a
    /// single "not authenticated" branch. The signature is checked before the payload
    /// is decoded.
    pub fn verify(&self, token: Option<&str>) -> Option<SessionTokenPayload> {
        let token = token?;
        let (encoded_payload, signature) = token.split_once('.')?;
        if encoded_payload.is_empty() || signature.is_empty() {
            return None;
        }

        let expected = self.sign(encoded_payload);
        if expected.len() != signature.len() {
            return None;
        }
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return None;
        }

        let json = URL_SAFE_NO_PAD.decode(encoded_payload).ok()?;
        let payload: SessionTokenPayload = serde_json::from_slice(&json).ok()?;

        if payload.exp <= self.clock.now_ms() {
            return None;
        }
        Some(payload)
    }

    fn sign(&self, encoded_payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(encoded_payload.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}
