//! PostgreSQL-backed user store

use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio_postgres::{Client, NoTls, Row};

use super::loader::{PrincipalLoader, UserStore};
use super::models::{Principal, Role};
use crate::error::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    username      TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    email         TEXT,
    roles         TEXT[] NOT NULL DEFAULT '{}',
    active        BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const SELECT_COLUMNS: &str = "username, password_hash, email, roles, active, created_at";

/// Users table accessed through tokio-postgres
pub struct PostgresUserStore {
    client: Client,
}

impl PostgresUserStore {
    /// Connect and make sure the `users` table exists
    pub async fn connect(conn_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(conn_string, NoTls).await?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        let store = Self { client };
        store.migrate().await?;
        tracing::info!("Connected to PostgreSQL user store");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        self.client.batch_execute(SCHEMA).await?;
        Ok(())
    }
}

fn principal_from_row(row: &Row) -> Principal {
    let role_names: Vec<String> = row.get("roles");
    let roles = role_names
        .iter()
        .filter_map(|name| match name.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::warn!("Ignoring unknown role '{}' in users table", name);
                None
            }
        })
        .collect();

    Principal {
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        email: row.get("email"),
        roles,
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}

fn role_names(roles: &BTreeSet<Role>) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

#[async_trait]
impl PrincipalLoader for PostgresUserStore {
    async fn load_principal(&self, username: &str) -> Result<Option<Principal>> {
        let query = format!("SELECT {} FROM users WHERE username = $1", SELECT_COLUMNS);
        let row = self.client.query_opt(query.as_str(), &[&username]).await?;
        Ok(row.as_ref().map(principal_from_row))
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create_user(&self, principal: Principal) -> Result<()> {
        let inserted = self
            .client
            .execute(
                "INSERT INTO users (username, password_hash, email, roles, active, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (username) DO NOTHING",
                &[
                    &principal.username,
                    &principal.password_hash,
                    &principal.email,
                    &role_names(&principal.roles),
                    &principal.active,
                    &principal.created_at,
                ],
            )
            .await?;

        if inserted == 0 {
            return Err(Error::UserAlreadyExists(principal.username));
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<Principal>> {
        let query = format!("SELECT {} FROM users ORDER BY username", SELECT_COLUMNS);
        let rows = self.client.query(query.as_str(), &[]).await?;
        Ok(rows.iter().map(principal_from_row).collect())
    }

    async fn update_password(&self, username: &str, password_hash: &str) -> Result<()> {
        let updated = self
            .client
            .execute(
                "UPDATE users SET password_hash = $2 WHERE username = $1",
                &[&username, &password_hash],
            )
            .await?;
        if updated == 0 {
            return Err(Error::not_found("user", username));
        }
        Ok(())
    }

    async fn set_roles(&self, username: &str, roles: BTreeSet<Role>) -> Result<()> {
        let updated = self
            .client
            .execute(
                "UPDATE users SET roles = $2 WHERE username = $1",
                &[&username, &role_names(&roles)],
            )
            .await?;
        if updated == 0 {
            return Err(Error::not_found("user", username));
        }
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let deleted = self
            .client
            .execute("DELETE FROM users WHERE username = $1", &[&username])
            .await?;
        if deleted == 0 {
            return Err(Error::not_found("user", username));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_string() -> String {
        std::env::var("CINEMA_TEST_DATABASE")
            .unwrap_or_else(|_| "host=localhost user=postgres password=postgres dbname=postgres".into())
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL: cargo test -- --ignored
    async fn test_postgres_user_lifecycle() {
        let store = PostgresUserStore::connect(&conn_string()).await.unwrap();
        let username = format!("pg_{}", uuid::Uuid::new_v4().simple());

        store
            .create_user(Principal::new(&username, "hash", [Role::User]))
            .await
            .unwrap();
        assert!(matches!(
            store.create_user(Principal::new(&username, "hash", [])).await,
            Err(Error::UserAlreadyExists(_))
        ));

        store
            .set_roles(&username, [Role::Admin, Role::Vendor].into_iter().collect())
            .await
            .unwrap();
        let loaded = store.load_principal(&username).await.unwrap().unwrap();
        assert!(loaded.is_admin());
        assert!(loaded.has_role(Role::Vendor));

        store.delete_user(&username).await.unwrap();
        assert!(store.load_principal(&username).await.unwrap().is_none());
    }

    #[test]
    fn test_role_names_sorted() {
        let roles: BTreeSet<Role> = [Role::User, Role::Admin].into_iter().collect();
        assert_eq!(role_names(&roles), vec!["ADMIN", "USER"]);
    }
}
