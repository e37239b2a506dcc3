//! Token verification middleware.
//!
//! `require_auth` rejects any request that cannot be resolved to an active principal.
//! `optional_auth` attaches a principal when it can and otherwise lets the request through
//! anonymously; failures are logged at debug level and never surfaced.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::error::GateError;
use crate::identity::{Credential, Principal, TokenService, UserStore};

/// Resolves bearer credentials to principals via the token service and the user store.
#[derive(Clone)]
pub struct Verifier {
    tokens: TokenService,
    users: Arc<dyn UserStore>,
    lookup_timeout: Duration,
}

impl Verifier {
    pub fn new(tokens: TokenService, users: Arc<dyn UserStore>, lookup_timeout: Duration) -> Self {
        Self { tokens, users, lookup_timeout }
    }

    pub fn tokens(&self) -> &TokenService { &self.tokens }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, GateError> {
        let credential = Credential::from_headers(headers).ok_or(GateError::NoCredential)?;
        self.resolve(&credential).await
    }

    pub async fn resolve(&self, credential: &Credential) -> Result<Principal, GateError> {
        let claims = self.tokens.verify(credential.as_str())?;
        let user = tokio::time::timeout(self.lookup_timeout, self.users.find_by_id(&claims.user_id))
            .await
            .map_err(|_| {
                GateError::internal(anyhow::anyhow!(
                    "user lookup exceeded {}ms",
                    self.lookup_timeout.as_millis()
                ))
            })?
            .map_err(GateError::internal)?
            .ok_or(GateError::UnknownPrincipal)?;
        if !user.is_active {
            return Err(GateError::InactivePrincipal);
        }
        Ok(Principal::from(&user))
    }
}

pub async fn require_auth(
    State(verifier): State<Verifier>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let principal = verifier.authenticate(request.headers()).await?;
    debug!(user_id = %principal.id, role = %principal.role, "authenticated");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

pub async fn optional_auth(State(verifier): State<Verifier>, mut request: Request, next: Next) -> Response {
    if let Some(credential) = Credential::from_headers(request.headers()) {
        match verifier.resolve(&credential).await {
            Ok(principal) => {
                request.extensions_mut().insert(principal);
            }
            Err(err) => {
                debug!(code = err.code_str(), error = %err, "optional auth failed; continuing anonymously");
            }
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{header, HeaderValue};
    use chrono::Utc;

    use crate::identity::{InMemoryUserStore, Role, UserRecord};

    const SECRET: &str = "verify-test-secret-0123456789abcdef";

    fn setup() -> (Verifier, Arc<InMemoryUserStore>, UserRecord) {
        let users = Arc::new(InMemoryUserStore::new());
        let user = UserRecord::new("Sara", "sara@example.com", Role::Instructor);
        users.insert(user.clone());
        let tokens = TokenService::new(SECRET, chrono::Duration::days(7));
        (Verifier::new(tokens, users.clone(), Duration::from_secs(1)), users, user)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        h
    }

    #[tokio::test]
    async fn no_credential_is_rejected() {
        let (v, _, _) = setup();
        assert!(matches!(v.authenticate(&HeaderMap::new()).await, Err(GateError::NoCredential)));
    }

    #[tokio::test]
    async fn valid_token_resolves_matching_principal() {
        let (v, _, user) = setup();
        let token = v.tokens().issue(&user.id).unwrap();
        let p = v.authenticate(&bearer(&token)).await.unwrap();
        assert_eq!(p.id, user.id);
        assert_eq!(p.role, Role::Instructor);
        assert!(p.active);
    }

    #[tokio::test]
    async fn unknown_subject_is_rejected() {
        let (v, _, _) = setup();
        let token = v.tokens().issue("ghost").unwrap();
        assert!(matches!(v.authenticate(&bearer(&token)).await, Err(GateError::UnknownPrincipal)));
    }

    #[tokio::test]
    async fn inactive_account_is_rejected() {
        let (v, users, user) = setup();
        users.set_active(&user.id, false);
        let token = v.tokens().issue(&user.id).unwrap();
        assert!(matches!(v.authenticate(&bearer(&token)).await, Err(GateError::InactivePrincipal)));
    }

    #[tokio::test]
    async fn tampered_signature_is_invalid_even_when_expired() {
        let (v, _, user) = setup();
        for issued in [Utc::now(), Utc::now() - chrono::Duration::days(30)] {
            let token = v.tokens().issue_at(&user.id, issued).unwrap();
            let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
            let sig = parts[2].clone();
            let flipped = if sig.starts_with('A') { "B" } else { "A" };
            parts[2] = format!("{}{}", flipped, &sig[1..]);
            let tampered = parts.join(".");
            assert!(matches!(v.authenticate(&bearer(&tampered)).await, Err(GateError::InvalidCredential)));
        }
    }

    struct SlowStore;

    #[async_trait]
    impl UserStore for SlowStore {
        async fn find_by_id(&self, _id: &str) -> anyhow::Result<Option<UserRecord>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_hits_deadline() {
        let tokens = TokenService::new(SECRET, chrono::Duration::days(7));
        let token = tokens.issue("u").unwrap();
        let v = Verifier::new(tokens, Arc::new(SlowStore), Duration::from_millis(50));
        assert!(matches!(v.authenticate(&bearer(&token)).await, Err(GateError::Internal(_))));
    }

    struct FailingStore;

    #[async_trait]
    impl UserStore for FailingStore {
        async fn find_by_id(&self, _id: &str) -> anyhow::Result<Option<UserRecord>> {
            Err(anyhow::anyhow!("connection reset"))
        }
    }

    #[tokio::test]
    async fn store_failure_is_internal() {
        let tokens = TokenService::new(SECRET, chrono::Duration::days(7));
        let token = tokens.issue("u").unwrap();
        let v = Verifier::new(tokens, Arc::new(FailingStore), Duration::from_secs(1));
        assert!(matches!(v.authenticate(&bearer(&token)).await, Err(GateError::Internal(_))));
    }
}
