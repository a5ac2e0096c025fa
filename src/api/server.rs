//! HTTP API server

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{
    authenticate, authorize, AuthService, Clock, InMemoryUserStore, PasswordHasher,
    PostgresUserStore, PrincipalLoader, RecoveryManager, Role, RuleTable, SystemClock,
    TokenCodec, TokenCookie, UserStore,
};
use crate::auth::password::generate_secret;
use crate::auth::Principal;
use crate::catalog::{Catalog, Cinema, Discount, Hall, Movie, Program, Projection, Review, Ticket};
use crate::config::{BootstrapConfig, Config};
use crate::error::Result;

use super::{auth_routes, routes};

const RECOVERY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<Catalog>,
    pub hasher: PasswordHasher,
    pub recovery: RecoveryManager,
    /// Checked instead of a stored hash when the login name is unknown
    pub decoy_hash: Arc<str>,
}

impl AppState {
    /// Wire the state from configuration, connecting to Postgres when configured
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let state = match &config.database {
            Some(database) => {
                let store = PostgresUserStore::connect(&database.url).await?;
                tracing::info!("Using PostgreSQL user store");
                Self::build(config, Arc::new(store), clock)?
            }
            None => {
                tracing::warn!("No [database] configured, users are kept in memory");
                Self::build(config, Arc::new(InMemoryUserStore::new()), clock)?
            }
        };

        if let Some(bootstrap) = &config.bootstrap {
            state.bootstrap_admin(bootstrap).await?;
        }
        Ok(state)
    }

    /// Wire the state around an explicit user store and time source
    pub fn build<S>(config: &Config, store: Arc<S>, clock: Arc<dyn Clock>) -> Result<Self>
    where
        S: UserStore + 'static,
    {
        let security = &config.security;
        let codec = TokenCodec::with_clock(
            security.jwt_secret.as_bytes(),
            security.token_validity_secs,
            clock.clone(),
        );
        let cookie = TokenCookie::new(&security.cookie, security.token_validity_secs);
        let rules = RuleTable::from_config(security)?;
        tracing::debug!("Loaded {} access rules", rules.rules().len());

        let hasher = PasswordHasher::new(security.bcrypt_cost);
        let decoy_hash = hasher.hash(&generate_secret())?;

        let loader: Arc<dyn PrincipalLoader> = store.clone();
        let users: Arc<dyn UserStore> = store;

        Ok(Self {
            auth: AuthService::new(codec, cookie, loader, rules),
            users,
            catalog: Arc::new(Catalog::new()),
            hasher,
            recovery: RecoveryManager::new(security.recovery_code_ttl_secs, clock),
            decoy_hash: decoy_hash.into(),
        })
    }

    /// Create the configured administrator unless the account already exists
    pub async fn bootstrap_admin(&self, bootstrap: &BootstrapConfig) -> Result<()> {
        if self
            .users
            .load_principal(&bootstrap.admin_username)
            .await?
            .is_some()
        {
            tracing::debug!("Admin '{}' already exists", bootstrap.admin_username);
            return Ok(());
        }

        let hash = self
            .hasher
            .hash_blocking(bootstrap.admin_password.clone())
            .await?;
        let admin = Principal::new(&bootstrap.admin_username, hash, [Role::Admin])
            .with_email(bootstrap.admin_email.clone());
        self.users.create_user(admin).await?;
        tracing::info!("Created admin account '{}'", bootstrap.admin_username);
        Ok(())
    }
}

/// Run the HTTP API server
pub async fn run_server(config: Config, host: &str, port: u16) -> Result<()> {
    let state = AppState::from_config(&config).await?;

    let recovery = state.recovery.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RECOVERY_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            recovery.cleanup_expired().await;
        }
    });

    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Create the router with all routes
///
/// Every request passes `authenticate` and then `authorize` before it reaches
/// a handler; unmatched paths go through the same pipeline.
pub fn create_router(state: AppState) -> Router {
    let auth = state.auth.clone();

    Router::new()
        .route("/health", get(routes::health))
        // Session and account routes
        .route("/login", post(auth_routes::login))
        .route("/registration", post(auth_routes::register))
        .route("/logout", post(auth_routes::logout))
        .route(
            "/password-recovery",
            post(auth_routes::request_recovery).put(auth_routes::reset_password),
        )
        .route("/users", get(auth_routes::list_users))
        .route("/users/me", get(auth_routes::me))
        .route(
            "/users/{username}",
            get(auth_routes::get_user).delete(auth_routes::delete_user),
        )
        .route("/users/{username}/roles", put(auth_routes::set_roles))
        .route("/roles", get(auth_routes::list_roles))
        // Catalog routes
        .merge(routes::crud::<Cinema>("/cinemas"))
        .merge(routes::crud::<Hall>("/halls"))
        .merge(routes::crud::<Movie>("/movies"))
        .merge(routes::crud::<Program>("/programs"))
        .merge(routes::crud::<Projection>("/projections"))
        .merge(routes::crud::<Ticket>("/tickets"))
        .merge(routes::crud::<Discount>("/discounts"))
        .route("/cinemas/{id}/halls", get(routes::cinema_halls))
        .route("/cinemas/{id}/programs", get(routes::cinema_programs))
        .route("/movies/{id}/projections", get(routes::movie_projections))
        .route("/movies/{id}/reviews", get(routes::movie_reviews))
        .route(
            "/reviews",
            get(routes::list::<Review>).post(routes::create_review),
        )
        .route(
            "/reviews/{id}",
            get(routes::find::<Review>).delete(routes::remove::<Review>),
        )
        // Orders
        .route(
            "/orders",
            get(routes::list_orders).post(routes::place_order),
        )
        .route("/orders/mine", get(routes::my_orders))
        .route(
            "/orders/{id}",
            get(routes::get_order).delete(routes::cancel_order),
        )
        // Middleware: the last layer added runs first
        .layer(from_fn_with_state(auth.clone(), authorize))
        .layer(from_fn_with_state(auth, authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
