//! Request pipeline middleware: rate limit → verify → guard / ownership → handler (→ cache).
//!
//! Every stage is an axum `from_fn_with_state` middleware over an explicitly constructed state
//! object, so limits and caches are owned by the router that uses them rather than by globals.

mod cache;
mod guard;
mod ownership;
mod rate_limit;
mod validate;
mod verify;

pub use cache::{cache_json, cache_key, ResponseCache, DEFAULT_MAX_ENTRIES, DEFAULT_TTL, MAX_CACHEABLE_BODY};
pub use guard::{require_roles, AuthUser, MaybeUser, RoleGuard};
pub use ownership::{check_ownership, EntityLoader, Loaded, OwnedEntity, OwnershipCheck, ID_PARAMS};
pub use rate_limit::{
    client_key, rate_limit, RateDecision, RateLimitConfig, RateLimiter, DEFAULT_MAX_CLIENTS,
    DEFAULT_MAX_REQUESTS, DEFAULT_MESSAGE, DEFAULT_WINDOW,
};
pub use validate::{require_text, ValidJson, Validate};
pub use verify::{optional_auth, require_auth, Verifier};
