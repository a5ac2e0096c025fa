//! Authorization rule table
//!
//! An ordered list of `(path pattern, method, access)` rules. Every rule that
//! matches a request is consulted and the request is let through if *any* of
//! them is satisfied, so overlapping rules layer access (public `GET`,
//! privileged writes) without precedence. A request no rule matches needs an
//! authenticated principal with any role.

use axum::http::Method;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

use super::models::{Authentication, Role};
use crate::config::{RuleConfig, SecurityConfig};
use crate::error::{Error, Result};

const CATALOG_PATTERNS: [&str; 6] = [
    "/cinemas/**",
    "/halls/**",
    "/movies/**",
    "/programs/**",
    "/projections/**",
    "/reviews/**",
];

const PUBLIC_PATHS: [&str; 4] = ["/login", "/registration", "/logout", "/password-recovery"];

/// Outcome of evaluating the table for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    /// No principal and nothing public matched (401)
    Unauthenticated,
    /// Principal present but no matching rule is satisfied (403)
    Forbidden,
}

/// What a rule requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    PermitAll,
    Authenticated,
    /// Disjunctive: holding any one of the roles is enough
    AnyRole(BTreeSet<Role>),
}

impl Access {
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Access::AnyRole(roles.into_iter().collect())
    }

    fn permits(&self, authentication: &Authentication) -> bool {
        match self {
            Access::PermitAll => true,
            Access::Authenticated => authentication.is_authenticated(),
            Access::AnyRole(roles) => authentication
                .principal()
                .is_some_and(|principal| principal.has_any_role(roles)),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::PermitAll => f.write_str("permit all"),
            Access::Authenticated => f.write_str("authenticated"),
            Access::AnyRole(roles) => {
                let names: Vec<_> = roles.iter().map(Role::as_str).collect();
                f.write_str(&names.join(" | "))
            }
        }
    }
}

/// Compiled path pattern: Ant-style glob or `regex:`-prefixed expression
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let expression = match pattern.strip_prefix("regex:") {
            Some(raw) => raw.to_string(),
            None => glob_to_regex(pattern),
        };
        let regex = Regex::new(&expression)
            .map_err(|e| Error::Config(format!("Invalid path pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// `**` spans segments (and `/x/**` also matches `/x`), `*` and `?` stay within one
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut regex = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        let rest = &chars[i..];
        if rest.starts_with(&['/', '*', '*']) && matches!(rest.get(3), None | Some('/')) {
            regex.push_str("(?:/.*)?");
            i += 3;
        } else if rest.starts_with(&['*', '*']) {
            regex.push_str(".*");
            i += 2;
        } else if rest[0] == '*' {
            regex.push_str("[^/]*");
            i += 1;
        } else if rest[0] == '?' {
            regex.push_str("[^/]");
            i += 1;
        } else {
            regex.push_str(&regex::escape(&rest[0].to_string()));
            i += 1;
        }
    }

    regex.push('$');
    regex
}

/// One entry of the table
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: PathPattern,
    /// `None` applies to every method
    pub method: Option<Method>,
    pub access: Access,
}

impl Rule {
    pub fn new(pattern: &str, method: Option<Method>, access: Access) -> Result<Self> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            method,
            access,
        })
    }

    pub fn applies_to(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && self.pattern.matches(path)
    }
}

impl TryFrom<&RuleConfig> for Rule {
    type Error = Error;

    fn try_from(config: &RuleConfig) -> Result<Self> {
        let access = match (config.permit_all, config.authenticated, config.roles.is_empty()) {
            (true, false, true) => Access::PermitAll,
            (false, true, true) => Access::Authenticated,
            (false, false, false) => Access::roles(config.roles.iter().copied()),
            _ => {
                return Err(Error::Config(format!(
                    "Rule '{}' must set exactly one of permit_all, authenticated or roles",
                    config.pattern
                )))
            }
        };

        let method = config
            .method
            .as_deref()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| Error::Config(format!("Invalid HTTP method '{}'", m)))
            })
            .transpose()?;

        Rule::new(&config.pattern, method, access)
    }
}

/// Immutable, ordered rule set built once at startup
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules from configuration, or the built-in cinema table when none are given
    pub fn from_config(security: &SecurityConfig) -> Result<Self> {
        if security.rules.is_empty() {
            return Self::cinema_defaults();
        }
        let rules = security
            .rules
            .iter()
            .map(Rule::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    /// Built-in access rules of the cinema API
    pub fn cinema_defaults() -> Result<Self> {
        let mut rules = Vec::new();

        for path in PUBLIC_PATHS {
            rules.push(Rule::new(path, None, Access::PermitAll)?);
        }
        rules.push(Rule::new("/health", Some(Method::GET), Access::PermitAll)?);

        for pattern in CATALOG_PATTERNS {
            rules.push(Rule::new(pattern, Some(Method::GET), Access::PermitAll)?);
        }
        for pattern in CATALOG_PATTERNS {
            rules.push(Rule::new(pattern, None, Access::roles([Role::Admin]))?);
        }
        rules.push(Rule::new(
            "/reviews",
            Some(Method::POST),
            Access::roles([Role::User, Role::Admin]),
        )?);

        for pattern in ["/tickets/**", "/discounts/**"] {
            rules.push(Rule::new(pattern, None, Access::roles([Role::Admin, Role::Vendor]))?);
        }

        rules.push(Rule::new(
            "/orders",
            Some(Method::POST),
            Access::roles([Role::User, Role::Vendor, Role::Admin]),
        )?);
        // ownership of a single order is checked by the handler
        rules.push(Rule::new("/orders/*", Some(Method::GET), Access::Authenticated)?);
        rules.push(Rule::new("/orders/**", None, Access::roles([Role::Admin]))?);

        rules.push(Rule::new("/users/me", Some(Method::GET), Access::Authenticated)?);
        for pattern in ["/users/**", "/roles/**"] {
            rules.push(Rule::new(pattern, None, Access::roles([Role::Admin]))?);
        }

        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate every matching rule; any satisfied rule grants access
    pub fn decide(&self, method: &Method, path: &str, authentication: &Authentication) -> Decision {
        let path = normalize(path);
        let mut matched = false;

        for rule in self.rules.iter().filter(|rule| rule.applies_to(method, path)) {
            matched = true;
            if rule.access.permits(authentication) {
                return Decision::Granted;
            }
        }

        if !matched && authentication.is_authenticated() {
            return Decision::Granted;
        }

        if authentication.is_authenticated() {
            Decision::Forbidden
        } else {
            Decision::Unauthenticated
        }
    }
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}
