//! Token authority: issue and verify signed claims.
//!
//! Tokens are compact three-part values,
//! `base64url(header) . base64url(claims) . base64url(signature)`, signed
//! with Ed25519. The header names the signing key (`kid`), which is what
//! makes rotation safe: a token stays verifiable for as long as its kid is
//! present in the [`KeyStore`], even after the active kid moves on.
//!
//! Verification is strict about the algorithm. The header's `alg` must be
//! exactly `EdDSA` — a token declaring anything else is rejected before
//! any key lookup happens, closing the algorithm-confusion class of
//! attacks.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use ed25519_dalek::{Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};

use crate::keystore::KeyStore;

/// The only signature algorithm this authority issues or accepts.
const ALGORITHM: &str = "EdDSA";

/// Tolerated clock skew when checking `iat` against the local clock.
const ISSUED_AT_LEEWAY_SECS: i64 = 60;

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_USER: &str = "USER";

/// The decoded payload of a signed token.
///
/// By issuer-side contract every issued claim set carries at least one
/// role; verification does not re-check that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the authenticated principal.
    pub sub: String,
    /// Granted roles.
    pub roles: BTreeSet<String>,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Issuing authority.
    pub iss: String,
}

impl Claims {
    /// Claims issued now, expiring after `ttl`.
    pub fn new(
        subject: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
        issuer: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            iat: now,
            exp: now + ttl.num_seconds(),
            iss: issuer.into(),
        }
    }

    /// Whether the claim's role set intersects `required` — OR semantics,
    /// one shared role suffices.
    pub fn authorized(&self, required: &[&str]) -> bool {
        required.iter().any(|role| self.roles.contains(*role))
    }
}

/// Token header: algorithm, type, and the signing key id.
#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
    kid: String,
}

/// Token issue/verify failure.
///
/// Every variant maps to an Unauthorized answer at the HTTP boundary;
/// the distinctions exist for server-side logs.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("unexpected signing algorithm `{0}`")]
    AlgorithmMismatch(String),
    #[error("unknown signing key `{0}`")]
    UnknownKey(String),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token issued in the future")]
    IssuedInFuture,
}

/// Issues and verifies signed claims against a rotating [`KeyStore`].
pub struct Auth {
    active_kid: RwLock<String>,
    keystore: Arc<KeyStore>,
    issuer: String,
}

impl Auth {
    /// Constructs an authority signing with `active_kid`.
    ///
    /// The kid must already be present in the keystore — failing here
    /// beats failing on the first issued token.
    pub fn new(
        active_kid: impl Into<String>,
        keystore: Arc<KeyStore>,
        issuer: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let active_kid = active_kid.into();
        if !keystore.contains(&active_kid) {
            return Err(AuthError::UnknownKey(active_kid));
        }
        Ok(Self { active_kid: RwLock::new(active_kid), keystore, issuer: issuer.into() })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The kid currently signing new tokens.
    pub fn active_kid(&self) -> String {
        self.active_kid.read().expect("active kid lock poisoned").clone()
    }

    /// Points new tokens at a different signing key.
    ///
    /// Tokens already issued under the previous kid keep verifying as
    /// long as that record stays in the keystore.
    pub fn rotate_active_key(&self, kid: impl Into<String>) -> Result<(), AuthError> {
        let kid = kid.into();
        if !self.keystore.contains(&kid) {
            return Err(AuthError::UnknownKey(kid));
        }
        *self.active_kid.write().expect("active kid lock poisoned") = kid;
        Ok(())
    }

    /// Claims stamped with this authority's issuer name.
    pub fn claims(
        &self,
        subject: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
        ttl: Duration,
    ) -> Claims {
        Claims::new(subject, roles, self.issuer.clone(), ttl)
    }

    /// Signs `claims` with the active key, embedding its kid in the token
    /// header for the verifier to find.
    pub fn generate_token(&self, claims: &Claims) -> Result<String, AuthError> {
        let kid = self.active_kid();
        let key = self
            .keystore
            .private_key(&kid)
            .map_err(|_| AuthError::UnknownKey(kid.clone()))?;

        let header = TokenHeader { alg: ALGORITHM.to_owned(), typ: "JWT".to_owned(), kid };
        let header_b64 = URL_SAFE_NO_PAD.encode(encode_json(&header)?);
        let claims_b64 = URL_SAFE_NO_PAD.encode(encode_json(claims)?);

        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature = key.sign(signing_input.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verifies a presented token and returns its decoded claims.
    ///
    /// Order matters: algorithm check first, then key lookup by the
    /// token's declared kid, then signature, then time claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed("expected three dot-separated segments".into()));
        };

        let header: TokenHeader = decode_json(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::AlgorithmMismatch(header.alg));
        }

        let public_key = self
            .keystore
            .public_key(&header.kid)
            .map_err(|_| AuthError::UnknownKey(header.kid.clone()))?;

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| AuthError::Malformed(format!("signature segment: {e}")))?;
        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|_| AuthError::InvalidSignature)?;

        let signing_input = format!("{header_b64}.{claims_b64}");
        public_key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let claims: Claims = decode_json(claims_b64)?;

        let now = Utc::now().timestamp();
        if claims.exp <= now {
            return Err(AuthError::Expired);
        }
        if claims.iat > now + ISSUED_AT_LEEWAY_SECS {
            return Err(AuthError::IssuedInFuture);
        }

        Ok(claims)
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("active_kid", &self.active_kid())
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, AuthError> {
    serde_json::to_vec(value).map_err(|e| AuthError::Malformed(format!("encoding: {e}")))
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::Malformed(format!("base64 segment: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::Malformed(format!("json segment: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> (Auth, Arc<KeyStore>) {
        let keystore = Arc::new(KeyStore::new());
        keystore.generate("kid-1");
        let auth = Auth::new("kid-1", Arc::clone(&keystore), "plinth-test").unwrap();
        (auth, keystore)
    }

    #[test]
    fn issue_then_verify_round_trips_claims() {
        let (auth, _) = authority();
        let claims = auth.claims("user-7", [ROLE_ADMIN, ROLE_USER], Duration::hours(1));

        let token = auth.generate_token(&claims).unwrap();
        let verified = auth.validate_token(&token).unwrap();

        assert_eq!(verified.sub, "user-7");
        assert_eq!(verified.roles, claims.roles);
        assert_eq!(verified.iss, "plinth-test");
    }

    #[test]
    fn rotation_keeps_old_tokens_valid() {
        let (auth, keystore) = authority();
        let claims = auth.claims("user-7", [ROLE_USER], Duration::hours(1));
        let old_token = auth.generate_token(&claims).unwrap();

        keystore.generate("kid-2");
        auth.rotate_active_key("kid-2").unwrap();

        // New tokens carry the new kid; the old token still verifies
        // because kid-1's record remains in the store.
        let new_token = auth.generate_token(&claims).unwrap();
        assert!(auth.validate_token(&old_token).is_ok());
        assert!(auth.validate_token(&new_token).is_ok());
        assert_ne!(old_token.split('.').next(), new_token.split('.').next());
    }

    #[test]
    fn removed_key_fails_verification() {
        let (auth, keystore) = authority();
        let claims = auth.claims("user-7", [ROLE_USER], Duration::hours(1));
        let token = auth.generate_token(&claims).unwrap();

        keystore.generate("kid-2");
        auth.rotate_active_key("kid-2").unwrap();
        keystore.remove("kid-1");

        match auth.validate_token(&token) {
            Err(AuthError::UnknownKey(kid)) => assert_eq!(kid, "kid-1"),
            other => panic!("expected unknown key, got {other:?}"),
        }
    }

    #[test]
    fn foreign_algorithm_is_rejected_before_key_lookup() {
        let (auth, _) = authority();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT","kid":"kid-1"}"#);
        let claims = URL_SAFE_NO_PAD.encode(b"{}");
        let token = format!("{header}.{claims}.AAAA");

        match auth.validate_token(&token) {
            Err(AuthError::AlgorithmMismatch(alg)) => assert_eq!(alg, "HS256"),
            other => panic!("expected algorithm mismatch, got {other:?}"),
        }
    }

    #[test]
    fn tampered_claims_fail_signature_check() {
        let (auth, _) = authority();
        let claims = auth.claims("user-7", [ROLE_USER], Duration::hours(1));
        let token = auth.generate_token(&claims).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            br#"{"sub":"intruder","roles":["ADMIN"],"iat":0,"exp":9999999999,"iss":"x"}"#,
        );
        parts[1] = &forged;
        let tampered = parts.join(".");

        assert!(matches!(
            auth.validate_token(&tampered),
            Err(AuthError::InvalidSignature),
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let (auth, _) = authority();
        let mut claims = auth.claims("user-7", [ROLE_USER], Duration::hours(1));
        claims.iat -= 7200;
        claims.exp = claims.iat + 3600;

        let token = auth.generate_token(&claims).unwrap();
        assert!(matches!(auth.validate_token(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn future_issued_at_is_rejected() {
        let (auth, _) = authority();
        let mut claims = auth.claims("user-7", [ROLE_USER], Duration::hours(1));
        claims.iat += 3600;
        claims.exp += 7200;

        let token = auth.generate_token(&claims).unwrap();
        assert!(matches!(auth.validate_token(&token), Err(AuthError::IssuedInFuture)));
    }

    #[test]
    fn garbage_tokens_are_malformed() {
        let (auth, _) = authority();
        assert!(matches!(auth.validate_token("not-a-token"), Err(AuthError::Malformed(_))));
        assert!(matches!(auth.validate_token("a.b"), Err(AuthError::Malformed(_))));
        assert!(matches!(auth.validate_token("a.b.c.d"), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn unknown_active_kid_is_rejected_at_construction() {
        let keystore = Arc::new(KeyStore::new());
        assert!(matches!(
            Auth::new("missing", keystore, "x"),
            Err(AuthError::UnknownKey(_)),
        ));
    }

    #[test]
    fn authorization_is_role_intersection() {
        let claims = Claims::new("u", [ROLE_ADMIN, ROLE_USER], "iss", Duration::hours(1));
        assert!(claims.authorized(&[ROLE_ADMIN]));
        assert!(claims.authorized(&[ROLE_ADMIN, "AUDITOR"]));
        assert!(!claims.authorized(&["AUDITOR"]));

        let user_only = Claims::new("u", [ROLE_USER], "iss", Duration::hours(1));
        assert!(!user_only.authorized(&[ROLE_ADMIN]));
    }
}
