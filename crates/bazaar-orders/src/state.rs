//! # Application State
//!
//! Shared state passed to every handler via the `State` extractor.
//!
//! The in-memory [`OrderStore`] serves every read. Without a database it is
//! also where the version compare-and-set happens. With one, the row's
//! version check decides each write and memory follows what the database
//! accepted; the stores are hydrated from the database once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use bazaar_auth::{RoleResolver, TokenVerifier};
use bazaar_core::OrderId;
use bazaar_state::{Order, StatusRegistry};

use crate::pricing::PriceList;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot`, never held across an `.await`.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Atomically read-validate-update a record under a single write lock.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Orders -------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// Another writer committed first. The caller may re-read and retry.
    #[error("order {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        id: OrderId,
        expected: u64,
        actual: u64,
    },
}

/// Orders keyed by id, with compare-and-set commits on the order version.
#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    orders: Store<Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.orders.insert(*order.id().as_uuid(), order);
    }

    pub fn get(&self, id: OrderId) -> Option<Order> {
        self.orders.get(id.as_uuid())
    }

    pub fn list(&self) -> Vec<Order> {
        self.orders.list()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Replace the stored order with `next` iff the stored version is still
    /// `expected_version`. The check and the write happen under one lock.
    pub fn commit(&self, expected_version: u64, next: Order) -> Result<Order, StoreError> {
        let id = next.id();
        self.orders
            .try_update(id.as_uuid(), |current| {
                if current.version() != expected_version {
                    return Err(StoreError::Conflict {
                        id,
                        expected: expected_version,
                        actual: current.version(),
                    });
                }
                *current = next;
                Ok(current.clone())
            })
            .unwrap_or(Err(StoreError::NotFound(id)))
    }

    /// Install a version the database has already accepted. An older
    /// version never replaces a newer one. Returns whether it was installed.
    pub fn install(&self, next: Order) -> bool {
        let id = next.id();
        self.orders
            .try_update(id.as_uuid(), |current| {
                if current.version() >= next.version() {
                    return Err(());
                }
                *current = next;
                Ok(())
            })
            .is_some_and(|r| r.is_ok())
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderStore,
    registry: Arc<RwLock<StatusRegistry>>,
    /// Serializes registry edits across the database write.
    registry_writes: Arc<tokio::sync::Mutex<()>>,
    pub verifier: Arc<TokenVerifier>,
    pub resolver: Arc<dyn RoleResolver>,
    /// When `Some`, accepted mutations are written through to Postgres.
    pub db_pool: Option<PgPool>,
    /// When `Some`, submitted unit prices must match it.
    pub prices: Option<Arc<PriceList>>,
}

impl AppState {
    pub fn new(
        registry: StatusRegistry,
        verifier: TokenVerifier,
        resolver: Arc<dyn RoleResolver>,
    ) -> Self {
        Self {
            orders: OrderStore::new(),
            registry: Arc::new(RwLock::new(registry)),
            registry_writes: Arc::new(tokio::sync::Mutex::new(())),
            verifier: Arc::new(verifier),
            resolver,
            db_pool: None,
            prices: None,
        }
    }

    pub fn with_price_list(mut self, prices: PriceList) -> Self {
        self.prices = Some(Arc::new(prices));
        self
    }

    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// A consistent snapshot of the status registry.
    pub fn registry(&self) -> StatusRegistry {
        self.registry.read().clone()
    }

    /// Run `edit` on a copy of the registry and, if it succeeds, install the
    /// copy. Edits are serialized; readers see either the old or the new
    /// registry, never a partial edit.
    pub(crate) async fn edit_registry<R, E, F, Fut>(&self, edit: F) -> Result<R, E>
    where
        F: FnOnce(StatusRegistry) -> Fut,
        Fut: std::future::Future<Output = Result<(StatusRegistry, R), E>>,
    {
        let _guard = self.registry_writes.lock().await;
        let (next, result) = edit(self.registry()).await?;
        *self.registry.write() = next;
        Ok(result)
    }

    /// Hydrate the in-memory state from the database.
    ///
    /// Called once on startup when a database pool is available. Any record
    /// that fails its integrity check aborts startup.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };

        let descriptors = crate::db::statuses::load_all(pool).await?;
        let descriptor_count = descriptors.len();
        if !descriptors.is_empty() {
            let registry = self
                .registry()
                .with_descriptors(descriptors)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            *self.registry.write() = registry;
        }

        let orders = crate::db::orders::load_all(pool).await?;
        let order_count = orders.len();
        for order in orders {
            self.orders.insert(order);
        }

        tracing::info!(
            orders = order_count,
            status_descriptors = descriptor_count,
            "hydrated in-memory state from database"
        );
        Ok(())
    }
}
