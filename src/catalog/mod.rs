//! Cinema catalog: entities, validation and storage

mod models;
mod orders;
mod repository;

pub use models::*;
pub use repository::{Catalog, Repository};
