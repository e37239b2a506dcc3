use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::principal::Role;

/// Account as returned by the user store. The password hash is never part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool { true }

impl UserRecord {
    pub fn new<S: Into<String>>(name: S, email: S, role: Role) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.into(),
            email: email.into().to_lowercase(),
            role,
            is_active: true,
        }
    }
}

/// External persistence collaborator: user lookup by identifier.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<UserRecord>>;
}

/// Process-local user store used by the demo server and tests.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&self, user: UserRecord) {
        self.users.write().insert(user.id.clone(), user);
    }

    pub fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let email = email.trim().to_lowercase();
        self.users.read().values().find(|u| u.email == email).cloned()
    }

    /// Returns false when the id is unknown.
    pub fn set_active(&self, id: &str, active: bool) -> bool {
        match self.users.write().get_mut(id) {
            Some(u) => { u.is_active = active; true }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<UserRecord> {
        let mut out: Vec<UserRecord> = self.users.read().values().cloned().collect();
        out.sort_by(|a, b| a.email.cmp(&b.email));
        out
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.users.read().get(id).cloned())
    }
}
