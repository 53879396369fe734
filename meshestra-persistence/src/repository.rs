use crate::entity::Entity;
use crate::error::{PersistenceError, Result};
use crate::store::Executor;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed access to the rows of one entity.
///
/// Whether the repository works on committed data or inside a transaction
/// depends only on the executor it was created with.
pub struct Repository<E: Entity> {
    executor: Arc<dyn Executor>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            _entity: PhantomData,
        }
    }

    /// Insert `entity`, returning it with its generated id.
    pub async fn save(&self, entity: E) -> Result<E> {
        let row = serde_json::to_value(&entity)?;
        let stored = self.executor.insert(E::TABLE, row).await?;
        Ok(serde_json::from_value(stored)?)
    }

    pub async fn find(&self) -> Result<Vec<E>> {
        self.executor
            .select(E::TABLE)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(PersistenceError::from))
            .collect()
    }

    /// Entities whose `field` equals `value`.
    pub async fn find_by(&self, field: &str, value: impl Into<Value>) -> Result<Vec<E>> {
        let value = value.into();
        self.executor
            .select(E::TABLE)
            .await?
            .into_iter()
            .filter(|row| row.get(field) == Some(&value))
            .map(|row| serde_json::from_value(row).map_err(PersistenceError::from))
            .collect()
    }

    pub async fn exists_by(&self, field: &str, value: impl Into<Value>) -> Result<bool> {
        Ok(!self.find_by(field, value).await?.is_empty())
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.executor.select(E::TABLE).await?.len())
    }

    /// Delete every row of the entity's table.
    pub async fn clear(&self) -> Result<()> {
        self.executor.clear(E::TABLE).await
    }
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self::new(self.executor.clone())
    }
}

impl<E: Entity> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::NAME)
            .field("table", &E::TABLE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::DataSource;
    use crate::testing_entities::Person;

    #[tokio::test]
    async fn test_find_by_and_exists_by() {
        let data_source = DataSource::new();
        data_source.register_entity::<Person>().await;
        let people = data_source.repository::<Person>();

        people.save(Person::named("Aki")).await.unwrap();
        people.save(Person::named("Ren")).await.unwrap();
        people.save(Person::named("Aki")).await.unwrap();

        let akis = people.find_by("name", "Aki").await.unwrap();
        assert_eq!(akis.len(), 2);
        assert!(akis.iter().all(|p| p.id.is_some()));
        assert!(people.exists_by("name", "Ren").await.unwrap());
        assert!(!people.exists_by("name", "Mio").await.unwrap());
        assert_eq!(people.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_save_keeps_explicit_id() {
        let data_source = DataSource::new();
        data_source.register_entity::<Person>().await;
        let people = data_source.repository::<Person>();

        let mut person = Person::named("Aki");
        person.id = Some(42);
        let saved = people.save(person).await.unwrap();
        assert_eq!(saved.id, Some(42));
        assert!(people.exists_by("id", 42).await.unwrap());
    }
}
