//! Authentication models

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Error;

/// User roles for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Administrator - manages the catalog, users and orders
    Admin,
    /// Vendor - sells tickets and manages discounts
    Vendor,
    /// User - buys tickets and writes reviews
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Vendor, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Vendor => "VENDOR",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "VENDOR" => Ok(Role::Vendor),
            "USER" => Ok(Role::User),
            other => Err(Error::validation(format!("Unknown role: {}", other))),
        }
    }
}

/// A persisted identity with its role set
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub roles: BTreeSet<Role>,
    /// Inactive principals cannot log in and their tokens are not honoured
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Principal {
    /// Create an active principal
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            email: None,
            roles: roles.into_iter().collect(),
            active: true,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &BTreeSet<Role>) -> bool {
        !self.roles.is_disjoint(roles)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Request-scoped security context
///
/// The request filter inserts exactly one of these into the request
/// extensions; handlers and the authorization layer read it back.
#[derive(Debug, Clone, Default)]
pub enum Authentication {
    #[default]
    Anonymous,
    Authenticated(Arc<Principal>),
}

impl Authentication {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Authentication::Anonymous => None,
            Authentication::Authenticated(principal) => Some(principal),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Authentication::Authenticated(_))
    }
}

/// Login credentials
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response; the token itself travels only in the cookie
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserInfo,
    pub expires_in: i64,
}

/// Self-service account creation
#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl RegistrationRequest {
    pub fn validate(&self) -> crate::error::Result<()> {
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        if let Some(email) = &self.email {
            if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
                return Err(Error::validation("email is not a valid address"));
            }
        }
        Ok(())
    }
}

/// Step one of password recovery
#[derive(Debug, Deserialize)]
pub struct RecoveryRequest {
    pub username: String,
}

/// Step two of password recovery
#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub username: String,
    pub code: String,
    pub new_password: String,
}

/// Replacement role set for a user
#[derive(Debug, Deserialize)]
pub struct RolesUpdate {
    pub roles: BTreeSet<Role>,
}

/// User information in responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub username: String,
    pub email: Option<String>,
    pub roles: Vec<Role>,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Principal> for UserInfo {
    fn from(principal: &Principal) -> Self {
        Self {
            username: principal.username.clone(),
            email: principal.email.clone(),
            roles: principal.roles.iter().copied().collect(),
            active: principal.active,
            created_at: principal.created_at,
        }
    }
}

pub(crate) fn validate_username(username: &str) -> crate::error::Result<()> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(Error::validation("username must be 3 to 32 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::validation(
            "username may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> crate::error::Result<()> {
    if password.chars().count() < 8 {
        return Err(Error::validation("password must be at least 8 characters"));
    }
    Ok(())
}
