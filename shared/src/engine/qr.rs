//! QR token issuing and validation
//!
//! A QR string is `base64url(claims).base64url(hmac_sha256(claims))`, so a scan
//! can be checked without a database round trip. The persisted `QrCode` row
//! still decides whether a code is active.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{QrCode, Reference};

type HmacSha256 = Hmac<Sha256>;

/// Claims carried inside a QR string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QrClaims {
    reference: Reference,
    payload: serde_json::Value,
    exp: i64,
    nonce: Uuid,
}

/// Result of a successful scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QrScan {
    pub reference: Reference,
    pub payload: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates signed QR strings
#[derive(Clone)]
pub struct QrSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for QrSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrSigner").finish_non_exhaustive()
    }
}

impl QrSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Mint an active QR code for an order
    pub fn issue(
        &self,
        reference: Reference,
        payload: serde_json::Value,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> DomainResult<QrCode> {
        if ttl <= Duration::zero() {
            return Err(DomainError::validation("ttl", "QR lifetime must be positive"));
        }

        let expires_at = now + ttl;
        let claims = QrClaims {
            reference,
            payload: payload.clone(),
            exp: expires_at.timestamp(),
            nonce: Uuid::new_v4(),
        };
        let body = serde_json::to_vec(&claims)
            .map_err(|e| DomainError::validation("payload", e.to_string()))?;
        let encoded = BASE64.encode(body);
        let signature = BASE64.encode(self.sign(encoded.as_bytes())?);

        Ok(QrCode {
            id: Uuid::new_v4(),
            qr_string: format!("{}.{}", encoded, signature),
            reference,
            data: payload,
            expires_at,
            is_active: true,
            created_at: now,
        })
    }

    /// Check signature and expiry of a scanned QR string
    pub fn validate(&self, qr_string: &str, now: DateTime<Utc>) -> DomainResult<QrScan> {
        let invalid = |msg: &str| DomainError::validation("qr_string", msg);

        let (encoded, signature) = qr_string
            .split_once('.')
            .ok_or_else(|| invalid("Malformed QR code"))?;
        let signature = BASE64
            .decode(signature)
            .map_err(|_| invalid("Malformed QR signature"))?;

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| invalid("QR signature mismatch"))?;

        let body = BASE64
            .decode(encoded)
            .map_err(|_| invalid("Malformed QR payload"))?;
        let claims: QrClaims =
            serde_json::from_slice(&body).map_err(|_| invalid("Malformed QR payload"))?;

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| invalid("Malformed QR expiry"))?;
        if now >= expires_at {
            return Err(invalid("QR code has expired"));
        }

        Ok(QrScan {
            reference: claims.reference,
            payload: claims.payload,
            expires_at,
        })
    }

    /// Validate a scan and require that it points at `expected`
    pub fn validate_for(
        &self,
        qr_string: &str,
        expected: &Reference,
        now: DateTime<Utc>,
    ) -> DomainResult<QrScan> {
        let scan = self.validate(qr_string, now)?;
        if &scan.reference != expected {
            return Err(DomainError::validation(
                "qr_string",
                format!("QR code belongs to {}, not {}", scan.reference, expected),
            ));
        }
        Ok(scan)
    }

    fn mac(&self) -> DomainResult<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .map_err(|e| DomainError::validation("qr.secret", e.to_string()))
    }

    fn sign(&self, data: &[u8]) -> DomainResult<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
