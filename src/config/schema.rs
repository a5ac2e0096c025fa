//! Configuration schema definitions

use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
}

/// Server configuration for the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Token, cookie, password and access-rule settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Symmetric secret used to sign tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Token lifetime, also used as the cookie max-age
    #[serde(default = "default_token_validity")]
    pub token_validity_secs: i64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    #[serde(default = "default_recovery_ttl")]
    pub recovery_code_ttl_secs: i64,

    #[serde(default)]
    pub cookie: CookieConfig,

    /// Replaces the built-in rule table when non-empty
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_token_validity() -> i64 {
    3600
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_recovery_ttl() -> i64 {
    900
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_validity_secs: default_token_validity(),
            bcrypt_cost: default_bcrypt_cost(),
            recovery_code_ttl_secs: default_recovery_ttl(),
            cookie: CookieConfig::default(),
            rules: Vec::new(),
        }
    }
}

/// Attributes of the token cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,

    #[serde(default = "default_cookie_secure")]
    pub secure: bool,

    #[serde(default)]
    pub same_site: SameSite,
}

fn default_cookie_name() -> String {
    "JwtCookie".to_string()
}

fn default_cookie_secure() -> bool {
    true
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            secure: default_cookie_secure(),
            same_site: SameSite::default(),
        }
    }
}

/// `SameSite` cookie policy; `Omit` leaves the attribute off
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
    Omit,
}

/// One `[[security.rules]]` entry
///
/// Exactly one of `permit_all`, `authenticated` or a non-empty `roles` list
/// must be given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    pub pattern: String,

    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub permit_all: bool,

    #[serde(default)]
    pub authenticated: bool,

    #[serde(default)]
    pub roles: Vec<Role>,
}

/// PostgreSQL user store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// tokio-postgres connection string, e.g. `host=localhost user=postgres dbname=cinema`
    pub url: String,
}

/// Administrator account created at startup when missing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_password: String,

    #[serde(default)]
    pub admin_email: Option<String>,
}

impl Config {
    /// Check the settings the server cannot start without
    pub fn validate(&self) -> Result<()> {
        if self.security.jwt_secret.is_empty() {
            return Err(Error::Config("security.jwt_secret is not set".to_string()));
        }
        if self.security.jwt_secret.len() < 32 {
            tracing::warn!("JWT secret is shorter than recommended (32 bytes)");
        }
        if self.security.token_validity_secs <= 0 {
            return Err(Error::Config(
                "security.token_validity_secs must be positive".to_string(),
            ));
        }
        if self.security.recovery_code_ttl_secs <= 0 {
            return Err(Error::Config(
                "security.recovery_code_ttl_secs must be positive".to_string(),
            ));
        }
        if self.security.cookie.name.is_empty()
            || self
                .security
                .cookie
                .name
                .contains(|c: char| c.is_whitespace() || ";=,".contains(c))
        {
            return Err(Error::Config(format!(
                "Invalid cookie name: {:?}",
                self.security.cookie.name
            )));
        }
        if self.security.cookie.same_site == SameSite::None && !self.security.cookie.secure {
            return Err(Error::Config(
                "SameSite=None requires security.cookie.secure = true".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.security.jwt_secret = "0123456789abcdef0123456789abcdef".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.token_validity_secs, 3600);
        assert_eq!(config.security.cookie.name, "JwtCookie");
        assert!(config.security.cookie.secure);
        assert_eq!(config.security.cookie.same_site, SameSite::Lax);
        assert!(config.security.rules.is_empty());
    }

    #[test]
    fn test_validate_requires_secret() {
        assert!(matches!(Config::default().validate(), Err(Error::Config(_))));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_cookie_name() {
        let mut config = valid();
        config.security.cookie.name = "Jwt Cookie".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_site_none_needs_secure() {
        let mut config = valid();
        config.security.cookie.same_site = SameSite::None;
        config.security.cookie.secure = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_rules_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [security]
            jwt_secret = "s"

            [[security.rules]]
            pattern = "/movies/**"
            method = "GET"
            permit_all = true

            [[security.rules]]
            pattern = "/movies/**"
            roles = ["ADMIN"]
            "#,
        )
        .unwrap();

        assert_eq!(config.security.rules.len(), 2);
        assert!(config.security.rules[0].permit_all);
        assert_eq!(config.security.rules[1].roles, vec![Role::Admin]);
    }
}
