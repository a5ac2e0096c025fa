//! HTTP API server

pub mod auth_routes;
pub mod extract;
pub mod routes;
pub mod server;

pub use routes::ApiResponse;
pub use server::*;
