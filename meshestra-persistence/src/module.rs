use crate::data_source::DataSource;
use crate::entity::{Entity, repository_token_name};
use crate::repository::Repository;
use meshestra_transactional::{Container, Result, Token};

/// Registers the data source and entity repositories in a container.
pub struct PersistenceModule;

impl PersistenceModule {
    /// Register `data_source` so repositories and `TestingModule`s can find it.
    pub fn for_root(container: &Container, data_source: DataSource) {
        container.register(data_source);
    }

    /// Register the ambient `Repository<E>`, under the `"{Entity}Repository"`
    /// token and its type.
    pub async fn for_feature<E: Entity>(container: &Container) -> Result<()> {
        let data_source = container.resolve::<DataSource>()?;
        data_source.register_entity::<E>().await;

        let repository: Repository<E> = data_source.repository::<E>();
        container.register_value(Token::named(repository_token_name::<E>()), repository.clone());
        container.register(repository);
        tracing::debug!("Registered repository of {} in '{}'", E::NAME, container.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing_entities::Person;

    #[tokio::test]
    async fn test_for_feature_registers_named_and_typed_repository() {
        let container = Container::new();
        let data_source = DataSource::new();
        PersistenceModule::for_root(&container, data_source.clone());
        PersistenceModule::for_feature::<Person>(&container).await.unwrap();

        assert!(container.contains_token(&Token::named("PersonRepository")));
        assert!(container.contains::<Repository<Person>>());
        assert!(data_source.has_entity("Person"));
    }

    #[tokio::test]
    async fn test_for_feature_requires_a_data_source() {
        let container = Container::new();
        let err = PersistenceModule::for_feature::<Person>(&container)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
