//! CLI command implementations

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Password};
use std::fs;
use std::io::{self, BufRead, IsTerminal};
use std::path::{Path, PathBuf};

use crate::auth::{PasswordHasher, RuleTable};
use crate::cli::{info, print_rule_table, success, warn, OutputFormat};
use crate::config::{self, loader::CONFIG_FILENAME, Config};

/// Initialize a new cinema.toml configuration file
pub async fn init(force: bool) -> Result<()> {
    let config_path = Path::new(CONFIG_FILENAME);

    if config_path.exists() && !force {
        warn(&format!("{} already exists (use --force to overwrite)", CONFIG_FILENAME));
        return Ok(());
    }

    fs::write(config_path, config::loader::default_config_content())?;

    success(&format!("Created {}", CONFIG_FILENAME));
    info("A signing secret was generated; set CINEMA_JWT_SECRET to override it");
    info("Change the bootstrap admin password, then run 'cinema serve'");

    Ok(())
}

/// Start the HTTP API server
pub async fn serve(path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config(path.as_deref())?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info(&format!("Starting server at http://{}:{}", host, port));

    crate::api::run_server(config, &host, port).await?;
    Ok(())
}

/// Validate the configuration and its rule table
pub async fn check(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path.as_deref())?;
    config.validate()?;
    let rules = RuleTable::from_config(&config.security)?;

    success("Configuration is valid");
    info(&format!(
        "{} access rules, tokens valid for {}s, cookie '{}'",
        rules.rules().len(),
        config.security.token_validity_secs,
        config.security.cookie.name
    ));
    match &config.database {
        Some(_) => info("Users are stored in PostgreSQL"),
        None => warn("No [database] section: users are kept in memory"),
    }
    Ok(())
}

/// Show the effective access rules
pub async fn rules(path: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let config = load_config(path.as_deref())?;
    let rules = RuleTable::from_config(&config.security)?;

    match format {
        OutputFormat::Table => print_rule_table(&rules),
        OutputFormat::Json => {
            let rows: Vec<_> = rules
                .rules()
                .iter()
                .map(|rule| {
                    serde_json::json!({
                        "method": rule.method.as_ref().map(|m| m.as_str()),
                        "pattern": rule.pattern.as_str(),
                        "access": rule.access.to_string(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

/// Print the bcrypt hash of a password
pub async fn hash_password(cost: u32) -> Result<()> {
    let password = read_password()?;
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    let hash = PasswordHasher::new(cost).hash(&password)?;
    println!("{}", hash);
    Ok(())
}

fn read_password() -> Result<String> {
    if io::stdin().is_terminal() {
        let password = Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()?;
        return Ok(password);
    }

    first_line(io::stdin().lock())
}

fn first_line(mut input: impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config_from_path(path),
        None => config::load_config(),
    }
    .map_err(|e| anyhow::anyhow!("{}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_from_first_line() {
        let input = io::Cursor::new("s3cret pass\r\nignored\n");
        assert_eq!(first_line(input).unwrap(), "s3cret pass");
        assert_eq!(first_line(io::Cursor::new("")).unwrap(), "");
    }
}
