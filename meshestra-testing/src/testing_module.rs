use meshestra_persistence::{DataSource, Entity, PersistenceModule};
use meshestra_transactional::{Container, Injectable, Module, Token};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type EntityRegistration =
    for<'a> fn(&'a Container) -> Pin<Box<dyn Future<Output = meshestra_transactional::Result<()>> + 'a>>;
type Registration = Box<dyn FnOnce(&Container) -> meshestra_transactional::Result<()>>;

fn register_entity<E: Entity>(
    container: &Container,
) -> Pin<Box<dyn Future<Output = meshestra_transactional::Result<()>> + '_>> {
    Box::pin(PersistenceModule::for_feature::<E>(container))
}

/// A compiled container backed by a fresh in-memory [`DataSource`].
pub struct TestingModule {
    container: Container,
    data_source: DataSource,
}

impl TestingModule {
    pub fn builder() -> TestingModuleBuilder {
        TestingModuleBuilder::default()
    }

    /// Resolve `T` from the root module or any imported module.
    pub fn get<T: 'static + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        Ok(self.container.resolve::<T>()?)
    }

    pub fn get_trait<T: ?Sized + 'static + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        Ok(self.container.resolve_trait::<T>()?)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    /// Delete every row, keeping the tables.
    pub async fn clear_db(&self) {
        self.data_source.clear().await;
    }

    pub async fn close(self) {
        self.data_source.close().await;
    }
}

/// Collects providers and entities for [`TestingModule::compile`].
#[derive(Default)]
pub struct TestingModuleBuilder {
    entities: Vec<EntityRegistration>,
    registrations: Vec<Registration>,
}

impl TestingModuleBuilder {
    /// Register `E` and its ambient `Repository<E>`.
    pub fn entity<E: Entity>(mut self) -> Self {
        self.entities.push(register_entity::<E>);
        self
    }

    /// Register `T` as a lazily built singleton.
    pub fn provider<T: Injectable>(self) -> Self {
        self.register(|container| {
            container.register_provider::<T>();
            Ok(())
        })
    }

    pub fn value<V: 'static + Send + Sync>(self, token: impl Into<Token>, value: V) -> Self {
        let token = token.into();
        self.register(move |container| {
            container.register_value(token, value);
            Ok(())
        })
    }

    /// Register a transient factory under `token`.
    pub fn factory<V, F>(self, token: impl Into<Token>, factory: F) -> Self
    where
        V: 'static + Send + Sync,
        F: Fn(&Container) -> meshestra_transactional::Result<V> + 'static + Send + Sync,
    {
        let token = token.into();
        self.register(move |container| {
            container.register_factory(token, factory);
            Ok(())
        })
    }

    /// Bind `dyn Trait` to the provider `Impl`.
    pub fn bind<Trait, Impl, F>(self, caster: F) -> Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        self.register(move |container| {
            container.register_trait::<Trait, Impl, F>(caster);
            Ok(())
        })
    }

    /// Register `M` as a child module.
    pub fn import<M: Module + 'static>(self) -> Self {
        self.register(|container| {
            let child = container.module(std::any::type_name::<M>());
            M::register(&child)
        })
    }

    fn register(
        mut self,
        registration: impl FnOnce(&Container) -> meshestra_transactional::Result<()> + 'static,
    ) -> Self {
        self.registrations.push(Box::new(registration));
        self
    }

    pub async fn compile(self) -> anyhow::Result<TestingModule> {
        let container = Container::new();
        let data_source = DataSource::new();
        PersistenceModule::for_root(&container, data_source.clone());

        for entity in self.entities {
            entity(&container).await?;
        }
        for registration in self.registrations {
            registration(&container)?;
        }
        tracing::debug!("Testing module compiled ({} providers)", container.len());

        Ok(TestingModule {
            container,
            data_source,
        })
    }
}
