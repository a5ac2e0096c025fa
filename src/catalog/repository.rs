//! In-memory repositories for catalog entities

use std::collections::BTreeMap;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use super::models::{
    Cinema, Discount, Entity, EntityKind, Hall, Movie, Order, Program, Projection, Reference,
    Review, Ticket,
};
use crate::error::{Error, Result};

/// Keyed collection of one entity type
pub struct Repository<T> {
    items: RwLock<BTreeMap<Uuid, T>>,
}

impl<T: Entity> Repository<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn find_all(&self) -> Vec<T> {
        self.items.read().await.values().cloned().collect()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<T> {
        self.items.read().await.get(&id).cloned()
    }

    /// All entities matching `predicate`
    pub async fn find_by<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.items
            .read()
            .await
            .values()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.items.read().await.contains_key(&id)
    }

    pub async fn count(&self) -> usize {
        self.items.read().await.len()
    }

    /// Store a new entity; a nil id is replaced by a fresh one
    pub async fn insert(&self, mut entity: T) -> Result<T> {
        if entity.id().is_nil() {
            entity.set_id(Uuid::new_v4());
        }

        let mut items = self.items.write().await;
        if items.contains_key(&entity.id()) {
            return Err(Error::Conflict(format!(
                "{} '{}' already exists",
                T::KIND,
                entity.id()
            )));
        }
        items.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    /// Overwrite an existing entity
    pub async fn replace(&self, id: Uuid, mut entity: T) -> Result<T> {
        entity.set_id(id);
        let mut items = self.items.write().await;
        match items.get_mut(&id) {
            Some(slot) => {
                *slot = entity.clone();
                Ok(entity)
            }
            None => Err(Error::not_found(T::KIND, id)),
        }
    }

    pub async fn remove(&self, id: Uuid) -> Result<T> {
        self.items
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| Error::not_found(T::KIND, id))
    }

    async fn references_to(&self, target: Reference) -> bool {
        self.items
            .read()
            .await
            .values()
            .any(|item| item.references().contains(&target))
    }
}

impl<T: Entity> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// All catalog repositories
///
/// Mutations are serialized through one write lock so that reference
/// checks and the write they guard see the same state. Reads never take it.
#[derive(Default)]
pub struct Catalog {
    pub cinemas: Repository<Cinema>,
    pub halls: Repository<Hall>,
    pub movies: Repository<Movie>,
    pub programs: Repository<Program>,
    pub projections: Repository<Projection>,
    pub tickets: Repository<Ticket>,
    pub orders: Repository<Order>,
    pub discounts: Repository<Discount>,
    pub reviews: Repository<Review>,
    writes: Mutex<()>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Held for the whole of every catalog mutation
    pub(super) async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    /// Whether the referenced entity exists
    pub async fn exists(&self, reference: Reference) -> bool {
        let id = reference.id;
        match reference.kind {
            EntityKind::Cinema => self.cinemas.contains(id).await,
            EntityKind::Hall => self.halls.contains(id).await,
            EntityKind::Movie => self.movies.contains(id).await,
            EntityKind::Program => self.programs.contains(id).await,
            EntityKind::Projection => self.projections.contains(id).await,
            EntityKind::Ticket => self.tickets.contains(id).await,
            EntityKind::Order => self.orders.contains(id).await,
            EntityKind::Discount => self.discounts.contains(id).await,
            EntityKind::Review => self.reviews.contains(id).await,
        }
    }

    /// Whether any stored entity points at `target`
    pub async fn is_referenced(&self, target: Reference) -> bool {
        self.halls.references_to(target).await
            || self.programs.references_to(target).await
            || self.projections.references_to(target).await
            || self.tickets.references_to(target).await
            || self.orders.references_to(target).await
            || self.reviews.references_to(target).await
    }

    async fn check_references<T: Entity>(&self, entity: &T) -> Result<()> {
        for reference in entity.references() {
            if !self.exists(reference).await {
                return Err(Error::not_found(reference.kind, reference.id));
            }
        }
        Ok(())
    }

    /// Validate, check references and store a new entity
    pub async fn create<T: Entity>(&self, mut entity: T) -> Result<T> {
        entity.validate()?;
        reject_owner(&entity)?;
        let _writes = self.write_lock().await;
        self.check_references(&entity).await?;
        entity.set_id(Uuid::nil());
        T::repository(self).insert(entity).await
    }

    /// Validate, check references and overwrite an existing entity
    pub async fn update<T: Entity>(&self, id: Uuid, entity: T) -> Result<T> {
        entity.validate()?;
        let _writes = self.write_lock().await;
        let current: T = self.get(id).await?;
        check_unowned(&current)?;
        reject_owner(&entity)?;
        self.check_references(&entity).await?;
        T::repository(self).replace(id, entity).await
    }

    /// Remove an entity nothing else refers to
    pub async fn delete<T: Entity>(&self, id: Uuid) -> Result<T> {
        let _writes = self.write_lock().await;
        let current: T = self.get(id).await?;
        check_unowned(&current)?;
        if self.is_referenced(Reference::new(T::KIND, id)).await {
            return Err(Error::Conflict(format!(
                "{} '{}' is still referenced",
                T::KIND,
                id
            )));
        }
        T::repository(self).remove(id).await
    }

    pub async fn get<T: Entity>(&self, id: Uuid) -> Result<T> {
        T::repository(self)
            .find_by_id(id)
            .await
            .ok_or_else(|| Error::not_found(T::KIND, id))
    }
}

/// Owned entities are only ever attached by their owner
fn reject_owner<T: Entity>(entity: &T) -> Result<()> {
    match entity.owner() {
        Some(owner) => Err(Error::validation(format!(
            "a {} cannot be attached to {} '{}' directly",
            T::KIND,
            owner.kind,
            owner.id
        ))),
        None => Ok(()),
    }
}

fn check_unowned<T: Entity>(entity: &T) -> Result<()> {
    match entity.owner() {
        Some(owner) => Err(Error::Conflict(format!(
            "{} '{}' belongs to {} '{}'",
            T::KIND,
            entity.id(),
            owner.kind,
            owner.id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cinema() -> Cinema {
        Cinema {
            id: Uuid::nil(),
            name: "Arena".into(),
            city: "Novi Sad".into(),
            address: "Main 1".into(),
        }
    }

    fn hall(cinema_id: Uuid) -> Hall {
        Hall {
            id: Uuid::nil(),
            cinema_id,
            name: "Hall 1".into(),
            rows: 5,
            seats_per_row: 8,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let catalog = Catalog::new();
        let created = catalog.create(cinema()).await.unwrap();
        assert!(!created.id.is_nil());
        assert_eq!(catalog.cinemas.count().await, 1);
        assert_eq!(catalog.get::<Cinema>(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_create_ignores_client_id() {
        let catalog = Catalog::new();
        let fixed = Uuid::new_v4();
        let created = catalog.create(Cinema { id: fixed, ..cinema() }).await.unwrap();
        assert_ne!(created.id, fixed);
    }

    #[tokio::test]
    async fn test_missing_reference() {
        let catalog = Catalog::new();
        let err = catalog.create(hall(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { ref kind, .. } if kind == "cinema"));
    }

    #[tokio::test]
    async fn test_delete_referenced_conflicts() {
        let catalog = Catalog::new();
        let c = catalog.create(cinema()).await.unwrap();
        let h = catalog.create(hall(c.id)).await.unwrap();

        assert!(matches!(
            catalog.delete::<Cinema>(c.id).await,
            Err(Error::Conflict(_))
        ));
        catalog.delete::<Hall>(h.id).await.unwrap();
        catalog.delete::<Cinema>(c.id).await.unwrap();
        assert_eq!(catalog.cinemas.count().await, 0);
    }

    #[tokio::test]
    async fn test_update() {
        let catalog = Catalog::new();
        let c = catalog.create(cinema()).await.unwrap();
        let updated = catalog
            .update(c.id, Cinema { name: "Arena 2".into(), ..cinema() })
            .await
            .unwrap();
        assert_eq!(updated.id, c.id);
        assert_eq!(catalog.get::<Cinema>(c.id).await.unwrap().name, "Arena 2");

        assert!(matches!(
            catalog.update(Uuid::new_v4(), cinema()).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_by() {
        let catalog = Catalog::new();
        let a = catalog.create(cinema()).await.unwrap();
        let b = catalog.create(cinema()).await.unwrap();
        catalog.create(hall(a.id)).await.unwrap();
        catalog.create(hall(a.id)).await.unwrap();
        catalog.create(hall(b.id)).await.unwrap();

        let halls = catalog.halls.find_by(|h| h.cinema_id == a.id).await;
        assert_eq!(halls.len(), 2);
    }

    #[tokio::test]
    async fn test_validation_runs_before_store() {
        let catalog = Catalog::new();
        let err = catalog
            .create(Cinema { name: " ".into(), ..cinema() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(catalog.cinemas.count().await, 0);
    }
}
