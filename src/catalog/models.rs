//! Catalog entities and their validation rules

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::repository::{Catalog, Repository};
use crate::error::{Error, Result};

/// Entity kinds, used in error messages and reference checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Cinema,
    Hall,
    Movie,
    Program,
    Projection,
    Ticket,
    Order,
    Discount,
    Review,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Cinema => "cinema",
            EntityKind::Hall => "hall",
            EntityKind::Movie => "movie",
            EntityKind::Program => "program",
            EntityKind::Projection => "projection",
            EntityKind::Ticket => "ticket",
            EntityKind::Order => "order",
            EntityKind::Discount => "discount",
            EntityKind::Review => "review",
        };
        f.write_str(name)
    }
}

/// A reference from one entity to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl Reference {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

/// Common behaviour of everything stored in the [`Catalog`]
///
/// Request bodies deserialize straight into the entity; the `id` field is
/// optional on input and always assigned by the repository.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);

    fn validate(&self) -> Result<()>;

    /// Entities that must exist for this one to be stored
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Entity that alone may change or remove this one
    fn owner(&self) -> Option<Reference> {
        None
    }

    fn repository(catalog: &Catalog) -> &Repository<Self>;
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_positive(field: &str, value: u16) -> Result<()> {
    if value == 0 {
        return Err(Error::validation(format!("{} must be positive", field)));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(Error::validation(format!("{} must not be negative", field)));
    }
    Ok(())
}

/// Upper bound for a single ticket price
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

fn require_price(field: &str, value: i64) -> Result<()> {
    require_non_negative(field, value)?;
    if value > MAX_PRICE_CENTS {
        return Err(Error::validation(format!(
            "{} must not exceed {}",
            field, MAX_PRICE_CENTS
        )));
    }
    Ok(())
}

macro_rules! entity_id {
    () => {
        fn id(&self) -> Uuid {
            self.id
        }

        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cinema {
    #[serde(default)]
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub address: String,
}

impl Entity for Cinema {
    const KIND: EntityKind = EntityKind::Cinema;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("city", &self.city)?;
        require_text("address", &self.address)
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.cinemas
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hall {
    #[serde(default)]
    pub id: Uuid,
    pub cinema_id: Uuid,
    pub name: String,
    pub rows: u16,
    pub seats_per_row: u16,
}

impl Hall {
    pub fn capacity(&self) -> u32 {
        u32::from(self.rows) * u32::from(self.seats_per_row)
    }
}

impl Entity for Hall {
    const KIND: EntityKind = EntityKind::Hall;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_positive("rows", self.rows)?;
        require_positive("seats_per_row", self.seats_per_row)
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new(EntityKind::Cinema, self.cinema_id)]
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.halls
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(default)]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    pub duration_minutes: u16,
    #[serde(default)]
    pub release_year: Option<i32>,
}

impl Entity for Movie {
    const KIND: EntityKind = EntityKind::Movie;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        require_positive("duration_minutes", self.duration_minutes)?;
        if let Some(year) = self.release_year {
            if !(1888..=2200).contains(&year) {
                return Err(Error::validation("release_year is out of range"));
            }
        }
        Ok(())
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.movies
    }
}

/// A cinema's schedule period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub id: Uuid,
    pub cinema_id: Uuid,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

impl Entity for Program {
    const KIND: EntityKind = EntityKind::Program;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        if self.ends_on < self.starts_on {
            return Err(Error::validation("ends_on must not be before starts_on"));
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new(EntityKind::Cinema, self.cinema_id)]
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.programs
    }
}

/// One screening of a movie in a hall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    #[serde(default)]
    pub id: Uuid,
    pub movie_id: Uuid,
    pub hall_id: Uuid,
    #[serde(default)]
    pub program_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub price_cents: i64,
}

impl Entity for Projection {
    const KIND: EntityKind = EntityKind::Projection;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_price("price_cents", self.price_cents)
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![
            Reference::new(EntityKind::Movie, self.movie_id),
            Reference::new(EntityKind::Hall, self.hall_id),
        ];
        if let Some(program_id) = self.program_id {
            refs.push(Reference::new(EntityKind::Program, program_id));
        }
        refs
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.projections
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub id: Uuid,
    pub projection_id: Uuid,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    pub row: u16,
    pub seat: u16,
    pub price_cents: i64,
}

impl Entity for Ticket {
    const KIND: EntityKind = EntityKind::Ticket;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_positive("row", self.row)?;
        require_positive("seat", self.seat)?;
        require_price("price_cents", self.price_cents)
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new(EntityKind::Projection, self.projection_id)];
        refs.extend(self.owner());
        refs
    }

    fn owner(&self) -> Option<Reference> {
        self.order_id
            .map(|order_id| Reference::new(EntityKind::Order, order_id))
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.tickets
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub id: Uuid,
    pub username: String,
    pub projection_id: Uuid,
    pub ticket_ids: Vec<Uuid>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Entity for Order {
    const KIND: EntityKind = EntityKind::Order;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_text("username", &self.username)?;
        require_non_negative("total_cents", self.total_cents)
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new(EntityKind::Projection, self.projection_id)]
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.orders
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    #[serde(default)]
    pub id: Uuid,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub percent: u8,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

impl Entity for Discount {
    const KIND: EntityKind = EntityKind::Discount;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_text("code", &self.code)?;
        if !(1..=100).contains(&self.percent) {
            return Err(Error::validation("percent must be between 1 and 100"));
        }
        Ok(())
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.discounts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub id: Uuid,
    pub movie_id: Uuid,
    pub username: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Review {
    const KIND: EntityKind = EntityKind::Review;
    entity_id!();

    fn validate(&self) -> Result<()> {
        require_text("username", &self.username)?;
        if !(1..=5).contains(&self.rating) {
            return Err(Error::validation("rating must be between 1 and 5"));
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new(EntityKind::Movie, self.movie_id)]
    }

    fn repository(catalog: &Catalog) -> &Repository<Self> {
        &catalog.reviews
    }
}

/// Body of `POST /reviews`; the author comes from the session
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub movie_id: Uuid,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Seat position requested in an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRequest {
    pub row: u16,
    pub seat: u16,
}

/// Body of `POST /orders`
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub projection_id: Uuid,
    pub seats: Vec<SeatRequest>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<()> {
        if self.seats.is_empty() {
            return Err(Error::validation("an order needs at least one seat"));
        }
        for seat in &self.seats {
            require_positive("row", seat.row)?;
            require_positive("seat", seat.seat)?;
        }
        Ok(())
    }
}

/// Order together with its tickets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub tickets: Vec<Ticket>,
}
