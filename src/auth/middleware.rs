//! Authentication middleware and extractors
//!
//! Two layers run in order on every request:
//!
//! 1. [`authenticate`] turns the token cookie into an [`Authentication`] in the
//!    request extensions. It never rejects; a missing, malformed, expired or
//!    foreign token simply leaves the request anonymous.
//! 2. [`authorize`] evaluates the [`RuleTable`] against that context and
//!    answers 401 or 403.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use super::cookie::TokenCookie;
use super::jwt::TokenCodec;
use super::loader::PrincipalLoader;
use super::models::{Authentication, Principal};
use super::rules::{Decision, RuleTable};
use crate::error::{Error, Result};

/// Read-only authentication collaborators shared by both layers
#[derive(Clone)]
pub struct AuthService {
    pub codec: Arc<TokenCodec>,
    pub cookie: Arc<TokenCookie>,
    pub loader: Arc<dyn PrincipalLoader>,
    pub rules: Arc<RuleTable>,
}

impl AuthService {
    pub fn new(
        codec: TokenCodec,
        cookie: TokenCookie,
        loader: Arc<dyn PrincipalLoader>,
        rules: RuleTable,
    ) -> Self {
        Self {
            codec: Arc::new(codec),
            cookie: Arc::new(cookie),
            loader,
            rules: Arc::new(rules),
        }
    }

    /// Resolve the security context carried by the request headers
    pub async fn resolve(&self, headers: &HeaderMap) -> Authentication {
        let Some(token) = self.cookie.extract(headers) else {
            return Authentication::Anonymous;
        };

        let subject = match self.codec.subject_of(token) {
            Ok(subject) => subject,
            Err(e) => {
                tracing::debug!("Ignoring {} cookie: {}", self.cookie.name(), e);
                return Authentication::Anonymous;
            }
        };

        let principal = match self.loader.load_principal(&subject).await {
            Ok(Some(principal)) if principal.active => principal,
            Ok(_) => {
                tracing::debug!("Token subject '{}' is not an active user", subject);
                return Authentication::Anonymous;
            }
            Err(e) => {
                tracing::warn!("Principal lookup failed for '{}': {}", subject, e);
                return Authentication::Anonymous;
            }
        };

        match self.codec.check(token, &principal.username) {
            Ok(_) => Authentication::Authenticated(Arc::new(principal)),
            Err(e) => {
                tracing::debug!("Rejected token for '{}': {}", subject, e);
                Authentication::Anonymous
            }
        }
    }

    /// `Set-Cookie` value for a freshly issued token
    pub fn login_cookie(&self, username: &str) -> Result<HeaderValue> {
        let token = self.codec.issue(username)?;
        self.cookie.issue(&token)
    }

    pub fn logout_cookie(&self) -> Result<HeaderValue> {
        self.cookie.clear()
    }
}

/// Request filter: populate the security context from the token cookie
pub async fn authenticate(State(auth): State<AuthService>, mut req: Request, next: Next) -> Response {
    let already_authenticated = req
        .extensions()
        .get::<Authentication>()
        .is_some_and(Authentication::is_authenticated);

    if !already_authenticated {
        let authentication = auth.resolve(req.headers()).await;
        req.extensions_mut().insert(authentication);
    }

    next.run(req).await
}

/// Enforce the rule table against the populated security context
pub async fn authorize(
    State(auth): State<AuthService>,
    req: Request,
    next: Next,
) -> std::result::Result<Response, Error> {
    let authentication = req
        .extensions()
        .get::<Authentication>()
        .cloned()
        .unwrap_or_default();

    match auth
        .rules
        .decide(req.method(), req.uri().path(), &authentication)
    {
        Decision::Granted => Ok(next.run(req).await),
        Decision::Unauthenticated => {
            tracing::debug!("Unauthenticated {} {}", req.method(), req.uri().path());
            Err(Error::Unauthenticated)
        }
        Decision::Forbidden => {
            tracing::debug!(
                "Forbidden {} {} for '{}'",
                req.method(),
                req.uri().path(),
                authentication.principal().map(|p| p.username.as_str()).unwrap_or("")
            );
            Err(Error::Forbidden)
        }
    }
}

/// The authenticated principal of the current request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<Principal>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        match parts.extensions.get::<Authentication>() {
            Some(Authentication::Authenticated(principal)) => Ok(CurrentUser(principal.clone())),
            _ => Err(Error::Unauthenticated),
        }
    }
}

impl std::ops::Deref for CurrentUser {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
