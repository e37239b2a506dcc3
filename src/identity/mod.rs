//! Identity: who is calling, and what they may touch.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod provider;
mod token;
mod authorizer;

pub use principal::{Principal, Role};
pub use provider::{UserRecord, UserStore, InMemoryUserStore};
pub use token::{Claims, Credential, TokenService, TOKEN_COOKIE};
pub use authorizer::{check_owner, check_roles};
