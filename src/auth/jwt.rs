//! JWT token handling
//!
//! Tokens are HS256-signed and carry only the subject, issue time and expiry.
//! Expiry is evaluated here against the injected [`Clock`] with zero leeway,
//! so a token is valid only while `exp` is strictly after "now".

use std::sync::Arc;

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::clock::{Clock, SystemClock};
use crate::error::Result;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Why a token was not accepted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature does not verify")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token subject does not match principal")]
    SubjectMismatch,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Issues and validates signed, expiring identity tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity_secs: i64,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a codec using the wall clock
    pub fn new(secret: &[u8], validity_secs: i64) -> Self {
        Self::with_clock(secret, validity_secs, Arc::new(SystemClock))
    }

    /// Create a codec with an explicit time source
    pub fn with_clock(secret: &[u8], validity_secs: i64, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `check` against the injected clock
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            validity_secs,
            clock,
        }
    }

    /// Token lifetime in seconds
    pub fn validity_secs(&self) -> i64 {
        self.validity_secs
    }

    /// Sign a new token for `subject`
    pub fn issue(&self, subject: &str) -> Result<String> {
        let now = self.clock.now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.validity_secs,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// True only if the token verifies, is unexpired and belongs to `expected_subject`
    pub fn verify(&self, token: &str, expected_subject: &str) -> bool {
        self.check(token, expected_subject).is_ok()
    }

    /// Validate a token and return its claims, or the reason it was rejected
    pub fn check(&self, token: &str, expected_subject: &str) -> std::result::Result<Claims, TokenError> {
        let claims = self.decode_signed(token)?;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.sub != expected_subject {
            return Err(TokenError::SubjectMismatch);
        }
        Ok(claims)
    }

    /// Read the subject of a correctly signed token without evaluating expiry
    pub fn subject_of(&self, token: &str) -> std::result::Result<String, TokenError> {
        self.decode_signed(token).map(|claims| claims.sub)
    }

    fn decode_signed(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("validity_secs", &self.validity_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use chrono::DateTime;

    const SECRET: &[u8] = b"test-secret-test-secret-test-secret";

    fn codec_at(start: i64) -> (TokenCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(start, 0).unwrap()));
        (TokenCodec::with_clock(SECRET, 3600, clock.clone()), clock)
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = TokenCodec::new(SECRET, 3600);
        let token = codec.issue("alice").expect("Failed to create token");

        assert_eq!(token.split('.').count(), 3);
        assert!(codec.verify(&token, "alice"));
        assert_eq!(codec.subject_of(&token).unwrap(), "alice");
    }

    #[test]
    fn test_claims_window() {
        let (codec, _clock) = codec_at(1_700_000_000);
        let token = codec.issue("alice").unwrap();
        let claims = codec.check(&token, "alice").unwrap();

        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_003_600);
    }

    #[test]
    fn test_expiry_is_strict() {
        let (codec, clock) = codec_at(1_700_000_000);
        let token = codec.issue("alice").unwrap();

        clock.advance(chrono::Duration::seconds(3599));
        assert!(codec.verify(&token, "alice"));

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(codec.check(&token, "alice"), Err(TokenError::Expired));

        clock.advance(chrono::Duration::seconds(1));
        assert!(!codec.verify(&token, "alice"));
    }

    #[test]
    fn test_subject_survives_expiry() {
        let (codec, clock) = codec_at(1_700_000_000);
        let token = codec.issue("alice").unwrap();
        clock.advance(chrono::Duration::hours(2));

        assert_eq!(codec.subject_of(&token).unwrap(), "alice");
        assert!(!codec.verify(&token, "alice"));
    }

    #[test]
    fn test_wrong_subject() {
        let codec = TokenCodec::new(SECRET, 3600);
        let token = codec.issue("alice").unwrap();
        assert_eq!(codec.check(&token, "bob"), Err(TokenError::SubjectMismatch));
    }

    #[test]
    fn test_different_secret_rejected() {
        let codec = TokenCodec::new(SECRET, 3600);
        let other = TokenCodec::new(b"another-secret-another-secret-xx", 3600);
        let token = other.issue("alice").unwrap();

        assert!(!codec.verify(&token, "alice"));
        assert_eq!(codec.subject_of(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_token() {
        let codec = TokenCodec::new(SECRET, 3600);
        assert!(!codec.verify("not-a-jwt-token", "alice"));
        assert!(!codec.verify("invalid.token.here", "alice"));
        assert!(!codec.verify("", "alice"));
        assert_eq!(codec.subject_of("garbage"), Err(TokenError::Malformed));
    }
}
