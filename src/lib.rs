//! Cinema - ticketing API with cookie-based JWT sessions
//!
//! This is the library interface for the cinema backend: the authentication
//! pipeline, the catalog store and the HTTP router that ties them together.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;

pub use config::Config;
pub use error::Error;
