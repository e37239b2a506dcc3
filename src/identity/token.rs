use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Cookie consulted when no `Authorization: Bearer` header is present.
pub const TOKEN_COOKIE: &str = "token";

/// Opaque bearer string. Debug output is redacted so it never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new<S: Into<String>>(raw: S) -> Self { Self(raw.into()) }

    pub fn as_str(&self) -> &str { &self.0 }

    /// Header first, then the `token` cookie.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            if let Some(rest) = auth.strip_prefix("Bearer ") {
                let token = rest.trim();
                if !token.is_empty() {
                    return Some(Self(token.to_string()));
                }
            }
        }
        parse_cookie(headers, TOKEN_COOKIE).filter(|v| !v.is_empty()).map(Self)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name { return Some(v.to_string()); }
            }
        }
    }
    None
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signer/verifier over a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn issue(&self, user_id: &str) -> Result<String, GateError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Sign a token as if issued at `issued_at`; expiry is `issued_at + ttl`.
    pub fn issue_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> Result<String, GateError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| GateError::internal(anyhow::anyhow!("token expiry out of range")))?;
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(GateError::internal)
    }

    /// Signature is checked before expiry, so a tampered token is always `InvalidCredential`.
    pub fn verify(&self, token: &str) -> Result<Claims, GateError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => GateError::ExpiredCredential,
                _ => GateError::InvalidCredential,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> TokenService {
        TokenService::new("unit-test-secret-at-least-32-bytes!!", Duration::days(7))
    }

    #[test]
    fn issue_then_verify_yields_subject() {
        let svc = service();
        let token = svc.issue("u-1").unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.user_id, "u-1");
        assert_eq!(claims.exp - claims.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn unrepresentable_expiry_is_an_error() {
        let svc = TokenService::new("unit-test-secret-at-least-32-bytes!!", Duration::MAX);
        assert!(matches!(svc.issue("u-1"), Err(GateError::Internal(_))));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let svc = service();
        let token = svc.issue_at("u-1", Utc::now() - Duration::days(8)).unwrap();
        assert!(matches!(svc.verify(&token), Err(GateError::ExpiredCredential)));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = TokenService::new("another-secret-entirely-0123456789", Duration::days(7))
            .issue("u-1")
            .unwrap();
        assert!(matches!(service().verify(&token), Err(GateError::InvalidCredential)));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(service().verify("not.a.jwt"), Err(GateError::InvalidCredential)));
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        assert_eq!(Credential::from_headers(&h).unwrap().as_str(), "from-header");
    }

    #[test]
    fn cookie_used_when_header_absent() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        assert_eq!(Credential::from_headers(&h).unwrap().as_str(), "from-cookie");
    }

    #[test]
    fn non_bearer_scheme_is_ignored() {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(Credential::from_headers(&h).is_none());
    }

    #[test]
    fn debug_output_is_redacted() {
        let c = Credential::new("super-secret-token");
        assert!(!format!("{:?}", c).contains("super-secret"));
    }
}
