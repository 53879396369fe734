use crate::entity::Entity;
use crate::entity_manager::EntityManager;
use crate::error::{PersistenceError, Result};
use crate::repository::Repository;
use crate::store::{Executor, Store, assign_id};
use async_trait::async_trait;
use dashmap::DashMap;
use meshestra_transactional::Instance;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::RwLock;

/// Builds the repository of one entity on top of an executor.
pub(crate) type RepositoryFactory = fn(Arc<dyn Executor>) -> Instance;

fn repository_factory<E: Entity>(executor: Arc<dyn Executor>) -> Instance {
    Arc::new(Repository::<E>::new(executor))
}

/// In-memory database shared by every repository.
///
/// Clones share the same tables. Writes made through [`DataSource::repository`]
/// are applied immediately; writes made through an [`EntityManager`] are applied
/// when its transaction commits.
#[derive(Clone, Default)]
pub struct DataSource {
    inner: Arc<DataSourceInner>,
}

#[derive(Default)]
struct DataSourceInner {
    store: RwLock<Store>,
    sequence: AtomicI64,
    entities: DashMap<String, RepositoryFactory>,
    closed: AtomicBool,
}

impl DataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `E` available to repositories and transactions.
    pub async fn register_entity<E: Entity>(&self) {
        tracing::debug!("Registering entity {} (table '{}')", E::NAME, E::TABLE);
        self.inner
            .entities
            .insert(E::NAME.to_string(), repository_factory::<E>);
        self.inner.store.write().await.create_table(E::TABLE);
    }

    pub fn has_entity(&self, entity: &str) -> bool {
        self.inner.entities.contains_key(entity)
    }

    /// Ambient repository of `E`, outside any transaction.
    pub fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(Arc::new(self.clone()))
    }

    /// Start a transaction.
    pub fn begin(&self) -> Result<EntityManager> {
        self.ensure_open()?;
        let manager = EntityManager::new(self.clone());
        tracing::debug!("Transaction {} started", manager.id());
        Ok(manager)
    }

    /// Run `work` in a transaction: commit when it returns `Ok`, roll back otherwise.
    pub async fn transaction<F, Fut, T, E>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(EntityManager) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<PersistenceError>,
    {
        let manager = self.begin()?;
        match work(manager.clone()).await {
            Ok(value) => {
                manager.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = manager.rollback().await {
                    tracing::error!(
                        "Rollback of transaction {} failed: {}",
                        manager.id(),
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Delete every row of every table.
    pub async fn clear(&self) {
        self.inner.store.write().await.clear_all();
    }

    /// Drop all tables and refuse further work.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.store.write().await.drop_all();
        tracing::info!("Data source closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PersistenceError::Closed);
        }
        Ok(())
    }

    pub(crate) fn next_id(&self) -> i64 {
        self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn repository_factory(&self, entity: &str) -> Result<RepositoryFactory> {
        self.inner
            .entities
            .get(entity)
            .map(|factory| *factory)
            .ok_or_else(|| PersistenceError::EntityNotRegistered {
                entity: entity.to_string(),
            })
    }

    pub(crate) async fn committed_rows(&self, table: &str) -> Result<Vec<(i64, Value)>> {
        self.ensure_open()?;
        Ok(self.inner.store.read().await.rows(table).into_iter().collect())
    }

    /// Apply writes staged by a transaction in one step.
    pub(crate) async fn apply(&self, writes: Vec<crate::entity_manager::Write>) -> Result<()> {
        use crate::entity_manager::Write;

        self.ensure_open()?;
        let mut store = self.inner.store.write().await;
        for write in writes {
            match write {
                Write::Insert { table, id, row } => store.insert(&table, id, row),
                Write::Clear { table } => store.clear(&table),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Executor for DataSource {
    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.ensure_open()?;
        let (id, row) = assign_id(table, row, || self.next_id())?;
        self.inner.store.write().await.insert(table, id, row.clone());
        Ok(row)
    }

    async fn select(&self, table: &str) -> Result<Vec<Value>> {
        Ok(self
            .committed_rows(table)
            .await?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    async fn clear(&self, table: &str) -> Result<()> {
        self.ensure_open()?;
        self.inner.store.write().await.clear(table);
        Ok(())
    }
}
