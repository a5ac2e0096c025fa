//! Principal lookup and user persistence

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::models::{Principal, Role};
use crate::error::{Error, Result};

/// Resolves a username into its persisted principal
#[async_trait]
pub trait PrincipalLoader: Send + Sync {
    /// `Ok(None)` means the user does not exist
    async fn load_principal(&self, username: &str) -> Result<Option<Principal>>;
}

/// Full user persistence used by the account endpoints
#[async_trait]
pub trait UserStore: PrincipalLoader {
    /// Fails with [`Error::UserAlreadyExists`] on a duplicate username
    async fn create_user(&self, principal: Principal) -> Result<()>;

    async fn list_users(&self) -> Result<Vec<Principal>>;

    async fn update_password(&self, username: &str, password_hash: &str) -> Result<()>;

    async fn set_roles(&self, username: &str, roles: BTreeSet<Role>) -> Result<()>;

    async fn delete_user(&self, username: &str) -> Result<()>;
}

/// User store kept in process memory
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, Principal>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get user count
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

impl Clone for InMemoryUserStore {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
        }
    }
}

#[async_trait]
impl PrincipalLoader for InMemoryUserStore {
    async fn load_principal(&self, username: &str) -> Result<Option<Principal>> {
        Ok(self.users.read().await.get(username).cloned())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create_user(&self, principal: Principal) -> Result<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&principal.username) {
            return Err(Error::UserAlreadyExists(principal.username));
        }
        users.insert(principal.username.clone(), principal);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<Principal>> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_password(&self, username: &str, password_hash: &str) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| Error::not_found("user", username))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn set_roles(&self, username: &str, roles: BTreeSet<Role>) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| Error::not_found("user", username))?;
        user.roles = roles;
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        self.users
            .write()
            .await
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("user", username))
    }
}
