//! Configuration loading and environment variable interpolation

use crate::auth::password::generate_secret;
use crate::error::{Error, Result};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::Config;

pub const CONFIG_FILENAME: &str = "cinema.toml";

/// Load configuration from cinema.toml, searching upward from the current directory
pub fn load_config() -> Result<Config> {
    let config_path = find_config_file()?;
    load_config_from_path(&config_path)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|_| Error::ConfigNotFound)?;
    let content = interpolate_env_vars(&content);
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Find the configuration file, searching upward from current directory
fn find_config_file() -> Result<PathBuf> {
    let mut current = env::current_dir().map_err(|e| Error::Config(e.to_string()))?;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(Error::ConfigNotFound);
        }
    }
}

/// Interpolate environment variables in the format ${VAR_NAME} or ${VAR_NAME:-default}
fn interpolate_env_vars(content: &str) -> String {
    // This regex is a compile-time constant, panicking is acceptable here
    // as it indicates a programming error in the codebase, not a runtime issue
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("Invalid regex pattern - this is a bug in the codebase");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Generate a default configuration file with a fresh signing secret
pub fn default_config_content() -> String {
    format!(
        r#"# Cinema backend configuration

[server]
host = "0.0.0.0"
port = 8080

[security]
# Override with CINEMA_JWT_SECRET in production
jwt_secret = "${{CINEMA_JWT_SECRET:-{secret}}}"
token_validity_secs = 3600
bcrypt_cost = 12
recovery_code_ttl_secs = 900

[security.cookie]
name = "JwtCookie"
secure = true
same_site = "lax"  # strict | lax | none | omit

# Custom access rules replace the built-in table when present
# [[security.rules]]
# pattern = "/movies/**"
# method = "GET"
# permit_all = true
#
# [[security.rules]]
# pattern = "/movies/**"
# roles = ["ADMIN"]

# Persist users in PostgreSQL instead of memory
# [database]
# url = "host=localhost port=5432 user=postgres password=postgres dbname=cinema"

# Administrator created at startup if missing
[bootstrap]
admin_username = "admin"
admin_password = "${{CINEMA_ADMIN_PASSWORD:-change-me-now}}"
"#,
        secret = generate_secret()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_interpolation() {
        env::set_var("CINEMA_TEST_VAR", "hello");
        let content = "value = \"${CINEMA_TEST_VAR}\"";
        let result = interpolate_env_vars(content);
        assert_eq!(result, "value = \"hello\"");
        env::remove_var("CINEMA_TEST_VAR");
    }

    #[test]
    fn test_env_interpolation_with_default() {
        let content = "value = \"${NONEXISTENT_VAR:-default_value}\"";
        let result = interpolate_env_vars(content);
        assert_eq!(result, "value = \"default_value\"");
    }

    #[test]
    fn test_default_config_parses_and_validates() {
        let content = interpolate_env_vars(&default_config_content());
        let config: Config = toml::from_str(&content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.security.jwt_secret.len(), 64);
        assert_eq!(config.bootstrap.unwrap().admin_username, "admin");
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            "[server]\nport = 9999\n\n[security]\njwt_secret = \"secret\"\n",
        )
        .unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.server.port, 9999);
        assert_eq!(loaded.security.jwt_secret, "secret");
    }

    #[test]
    fn test_missing_file() {
        let result = load_config_from_path(Path::new("/nonexistent/cinema.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound)));
    }
}
