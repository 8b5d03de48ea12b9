//! Signed, time-limited session credentials.
//!
//! A credential is an HS256 JWT carrying the course code, the issuer's network
//! origin and its issue/expiry instants. Expiry is checked against the caller's
//! `now` rather than the wall clock so redemption stays deterministic.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::origin::normalize_origin;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Session credential has expired")]
    Expired,

    #[error("Session credential is malformed")]
    Malformed,

    #[error("Session credential signature is invalid")]
    BadSignature,

    #[error("Failed to sign session credential: {0}")]
    Signing(String),
}

/// Claims embedded in a session credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Course code the session belongs to.
    pub code: String,
    /// Normalized network origin of the administrator who started the session.
    pub origin: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub course_code: String,
    pub issuer_origin: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CredentialCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is enforced in `verify` against the supplied clock.
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Signs a credential valid from `now` until `now + ttl`.
    pub fn issue(
        &self,
        course_code: &str,
        issuer_origin: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredential, CredentialError> {
        let issued_at = timestamp_to_utc(now.timestamp())?;
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| CredentialError::Signing("credential lifetime is out of range".into()))?;

        let claims = SessionClaims {
            code: course_code.to_owned(),
            origin: normalize_origin(issuer_origin),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CredentialError::Signing(e.to_string()))?;

        Ok(IssuedCredential {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Checks integrity first, then expiry. A credential is rejected once
    /// `now` reaches its expiry instant.
    pub fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedCredential, CredentialError> {
        let data = decode::<SessionClaims>(token.trim(), &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    CredentialError::BadSignature
                }
                ErrorKind::ExpiredSignature => CredentialError::Expired,
                _ => CredentialError::Malformed,
            })?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(CredentialError::Expired);
        }

        Ok(VerifiedCredential {
            issued_at: timestamp_to_utc(claims.iat)?,
            expires_at: timestamp_to_utc(claims.exp)?,
            course_code: claims.code,
            issuer_origin: claims.origin,
        })
    }
}

fn timestamp_to_utc(secs: i64) -> Result<DateTime<Utc>, CredentialError> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or(CredentialError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn codec() -> CredentialCodec {
        CredentialCodec::new(b"attendance-test-secret", Duration::minutes(15))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 8, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec();
        let issued = codec.issue("MATH101", "::ffff:10.0.0.7", t0()).unwrap();
        assert_eq!(issued.issued_at, t0());
        assert_eq!(issued.expires_at, t0() + Duration::minutes(15));

        let verified = codec.verify(&issued.token, t0() + Duration::minutes(5)).unwrap();
        assert_eq!(verified.course_code, "MATH101");
        assert_eq!(verified.issuer_origin, "10.0.0.7");
        assert_eq!(verified.issued_at, t0());
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = codec();
        let issued = codec.issue("MATH101", "10.0.0.7", t0()).unwrap();

        assert!(codec.verify(&issued.token, issued.expires_at - Duration::seconds(1)).is_ok());
        assert_eq!(
            codec.verify(&issued.token, issued.expires_at),
            Err(CredentialError::Expired)
        );
        assert_eq!(
            codec.verify(&issued.token, t0() + Duration::minutes(16)),
            Err(CredentialError::Expired)
        );
    }

    #[test]
    fn test_tampered_payload_is_bad_signature() {
        let codec = codec();
        let issued = codec.issue("MATH101", "10.0.0.7", t0()).unwrap();
        let other = codec.issue("PHYS101", "10.0.0.7", t0()).unwrap();

        // Graft the PHYS101 payload onto the MATH101 signature.
        let a: Vec<&str> = issued.token.split('.').collect();
        let b: Vec<&str> = other.token.split('.').collect();
        let forged = format!("{}.{}.{}", a[0], b[1], a[2]);

        assert_eq!(codec.verify(&forged, t0()), Err(CredentialError::BadSignature));
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let issued = codec().issue("MATH101", "10.0.0.7", t0()).unwrap();
        let other = CredentialCodec::new(b"some-other-secret", Duration::minutes(15));
        assert_eq!(other.verify(&issued.token, t0()), Err(CredentialError::BadSignature));
    }

    #[test]
    fn test_oversized_ttl_is_an_error() {
        let codec = CredentialCodec::new(b"s", Duration::try_minutes(1_000_000_000_000).unwrap());
        assert!(matches!(
            codec.issue("MATH101", "10.0.0.1", t0()),
            Err(CredentialError::Signing(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify("", t0()), Err(CredentialError::Malformed));
        assert_eq!(codec.verify("not-a-token", t0()), Err(CredentialError::Malformed));
        assert_eq!(codec.verify("a.b.c", t0()), Err(CredentialError::Malformed));
    }
}
