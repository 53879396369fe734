use crate::data_source::DataSource;
use crate::entity::Entity;
use crate::error::{PersistenceError, Result};
use crate::repository::Repository;
use crate::store::{Executor, assign_id};
use async_trait::async_trait;
use meshestra_transactional::{Instance, TransactionHandle};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A write staged until commit.
#[derive(Debug)]
pub(crate) enum Write {
    Insert { table: String, id: i64, row: Value },
    Clear { table: String },
}

/// Transaction-scoped unit of work.
///
/// Repositories obtained from it stage their writes here. Reads see committed
/// rows plus the writes staged so far. Once committed or rolled back, the
/// manager refuses any further work.
#[derive(Clone)]
pub struct EntityManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    id: Uuid,
    data_source: DataSource,
    staged: Mutex<Vec<Write>>,
    finalized: AtomicBool,
}

impl EntityManager {
    pub(crate) fn new(data_source: DataSource) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                id: Uuid::new_v4(),
                data_source,
                staged: Mutex::new(Vec::new()),
                finalized: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn is_finalized(&self) -> bool {
        self.inner.finalized.load(Ordering::SeqCst)
    }

    /// Repository of `E` bound to this transaction.
    pub fn repository<E: Entity>(&self) -> Result<Repository<E>> {
        self.ensure_active()?;
        if !self.inner.data_source.has_entity(E::NAME) {
            return Err(PersistenceError::EntityNotRegistered {
                entity: E::NAME.to_string(),
            });
        }
        Ok(Repository::new(Arc::new(self.clone())))
    }

    pub async fn commit(&self) -> Result<()> {
        self.finalize()?;
        let writes = std::mem::take(&mut *self.inner.staged.lock().await);
        let count = writes.len();
        self.inner.data_source.apply(writes).await?;
        tracing::info!("Transaction {} committed ({} writes)", self.inner.id, count);
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.finalize()?;
        let discarded = std::mem::take(&mut *self.inner.staged.lock().await).len();
        tracing::info!(
            "Transaction {} rolled back ({} writes discarded)",
            self.inner.id,
            discarded
        );
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        if self.inner.finalized.swap(true, Ordering::SeqCst) {
            return Err(PersistenceError::TransactionFinalized { id: self.inner.id });
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_finalized() {
            return Err(PersistenceError::TransactionFinalized { id: self.inner.id });
        }
        self.inner.data_source.ensure_open()
    }

    async fn stage(&self, write: Write) -> Result<()> {
        self.ensure_active()?;
        self.inner.staged.lock().await.push(write);
        Ok(())
    }
}

impl fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("id", &self.inner.id)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

#[async_trait]
impl Executor for EntityManager {
    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.ensure_active()?;
        let (id, row) = assign_id(table, row, || self.inner.data_source.next_id())?;
        self.stage(Write::Insert {
            table: table.to_string(),
            id,
            row: row.clone(),
        })
        .await?;
        Ok(row)
    }

    async fn select(&self, table: &str) -> Result<Vec<Value>> {
        self.ensure_active()?;
        let mut rows: BTreeMap<i64, Value> = self
            .inner
            .data_source
            .committed_rows(table)
            .await?
            .into_iter()
            .collect();

        for write in self.inner.staged.lock().await.iter() {
            match write {
                Write::Insert { table: t, id, row } if t == table => {
                    rows.insert(*id, row.clone());
                }
                Write::Clear { table: t } if t == table => rows.clear(),
                _ => {}
            }
        }
        Ok(rows.into_values().collect())
    }

    async fn clear(&self, table: &str) -> Result<()> {
        self.stage(Write::Clear {
            table: table.to_string(),
        })
        .await
    }
}

impl TransactionHandle for EntityManager {
    fn get_repository(&self, entity: &str) -> meshestra_transactional::Result<Instance> {
        self.ensure_active()?;
        let factory = self.inner.data_source.repository_factory(entity)?;
        tracing::debug!("Transaction {} hands out repository of {}", self.inner.id, entity);
        Ok(factory(Arc::new(self.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing_entities::Person;
    use meshestra_transactional::MeshestraError;

    async fn data_source() -> DataSource {
        let data_source = DataSource::new();
        data_source.register_entity::<Person>().await;
        data_source
    }

    #[tokio::test]
    async fn test_writes_are_visible_inside_only_until_commit() {
        let data_source = data_source().await;
        let manager = data_source.begin().unwrap();
        let people = manager.repository::<Person>().unwrap();

        people.save(Person::named("Aki")).await.unwrap();
        assert_eq!(people.count().await.unwrap(), 1);
        assert_eq!(data_source.repository::<Person>().count().await.unwrap(), 0);

        manager.commit().await.unwrap();
        assert_eq!(data_source.repository::<Person>().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let data_source = data_source().await;
        let ambient = data_source.repository::<Person>();
        ambient.save(Person::named("Committed")).await.unwrap();

        let manager = data_source.begin().unwrap();
        let people = manager.repository::<Person>().unwrap();
        people.clear().await.unwrap();
        people.save(Person::named("Staged")).await.unwrap();
        assert_eq!(people.find().await.unwrap()[0].name, "Staged");

        manager.rollback().await.unwrap();
        let names: Vec<String> = ambient.find().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Committed".to_string()]);
    }

    #[tokio::test]
    async fn test_finalized_manager_refuses_work() {
        let data_source = data_source().await;
        let manager = data_source.begin().unwrap();
        let people = manager.repository::<Person>().unwrap();
        manager.commit().await.unwrap();

        assert!(matches!(
            manager.commit().await,
            Err(PersistenceError::TransactionFinalized { .. })
        ));
        assert!(people.save(Person::named("Late")).await.is_err());
        assert!(matches!(
            manager.get_repository("Person"),
            Err(MeshestraError::Transaction { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_repository_by_entity_name() {
        let data_source = data_source().await;
        let manager = data_source.begin().unwrap();

        let instance = manager.get_repository("Person").unwrap();
        assert!(instance.downcast::<Repository<Person>>().is_ok());

        assert!(matches!(
            manager.get_repository("Unknown"),
            Err(MeshestraError::RepositoryNotFound { entity }) if entity == "Unknown"
        ));
    }

    #[tokio::test]
    async fn test_ids_are_shared_with_the_data_source() {
        let data_source = data_source().await;
        let manager = data_source.begin().unwrap();

        let staged = manager
            .repository::<Person>()
            .unwrap()
            .save(Person::named("Staged"))
            .await
            .unwrap();
        let ambient = data_source
            .repository::<Person>()
            .save(Person::named("Ambient"))
            .await
            .unwrap();

        assert_ne!(staged.id, ambient.id);
        manager.commit().await.unwrap();
        assert_eq!(data_source.repository::<Person>().count().await.unwrap(), 2);
    }
}
