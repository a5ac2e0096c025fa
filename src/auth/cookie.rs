//! Token cookie: wraps an issued token in a `Set-Cookie` header and reads it back

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::{CookieConfig, SameSite};
use crate::error::{Error, Result};

/// Fixed-attribute cookie carrying the token
#[derive(Debug, Clone)]
pub struct TokenCookie {
    name: String,
    max_age_secs: i64,
    secure: bool,
    same_site: SameSite,
}

impl TokenCookie {
    pub fn new(config: &CookieConfig, max_age_secs: i64) -> Self {
        Self {
            name: config.name.clone(),
            max_age_secs,
            secure: config.secure,
            same_site: config.same_site,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Set-Cookie` value carrying `token`
    pub fn issue(&self, token: &str) -> Result<HeaderValue> {
        self.render(token, self.max_age_secs)
    }

    /// `Set-Cookie` value that removes the cookie from the browser
    pub fn clear(&self) -> Result<HeaderValue> {
        self.render("", 0)
    }

    /// Find the token among the request's `Cookie` headers
    pub fn extract<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim_matches('"'))
            .filter(|value| !value.is_empty())
    }

    fn render(&self, value: &str, max_age: i64) -> Result<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly",
            self.name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        match self.same_site {
            SameSite::Strict => cookie.push_str("; SameSite=Strict"),
            SameSite::Lax => cookie.push_str("; SameSite=Lax"),
            SameSite::None => cookie.push_str("; SameSite=None"),
            SameSite::Omit => {}
        }

        HeaderValue::from_str(&cookie)
            .map_err(|e| Error::Config(format!("Invalid cookie value: {}", e)))
    }
}
