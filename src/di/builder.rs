use crate::di::{Container, Injectable, Token};
use crate::error::Result;
use std::sync::Arc;

/// Builder for constructing a dependency injection container
///
/// Use this to configure and register services before handing the container out.
///
/// # Example
/// ```ignore
/// let container = ContainerBuilder::new()
///     .register(Mailer::new())
///     .value("MyString", "myString".to_string())
///     .provider::<UserService>()
///     .bind::<dyn Notifier, Mailer, _>(|m| m as Arc<dyn Notifier>)
///     .build();
/// ```
pub struct ContainerBuilder {
    container: Container,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            container: Container::new(),
        }
    }

    /// Register a service instance
    pub fn register<T: 'static + Send + Sync>(self, instance: T) -> Self {
        self.container.register(instance);
        self
    }

    /// Register a value under a custom token
    pub fn value<V: 'static + Send + Sync>(self, token: impl Into<Token>, value: V) -> Self {
        self.container.register_value(token, value);
        self
    }

    /// Register a transient factory under a custom token
    pub fn factory<V, F>(self, token: impl Into<Token>, factory: F) -> Self
    where
        V: 'static + Send + Sync,
        F: Fn(&Container) -> Result<V> + 'static + Send + Sync,
    {
        self.container.register_factory(token, factory);
        self
    }

    /// Register a class provider, built on first resolution
    pub fn provider<T: Injectable>(self) -> Self {
        self.container.register_provider::<T>();
        self
    }

    /// Bind a trait to a concrete implementation
    ///
    /// This enables resolving `Arc<dyn Trait>` to the registered implementation.
    /// The implementation must have been registered first (or will be).
    pub fn bind<Trait, Impl, F>(self, caster: F) -> Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        self.container.register_trait::<Trait, Impl, F>(caster);
        self
    }

    /// Build the container
    pub fn build(self) -> Container {
        self.container
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_builder_registers_everything() {
        let container = ContainerBuilder::new()
            .bind::<dyn Greeter, English, _>(|g| g as Arc<dyn Greeter>)
            .register(English)
            .value("MyObject", 3u8)
            .factory("MyString", |_| Ok("myString".to_string()))
            .build();

        assert_eq!(container.resolve_trait::<dyn Greeter>().unwrap().greet(), "hello");
        assert!(container.contains_token(&Token::named("MyObject")));
        assert!(container.contains_token(&Token::named("MyString")));
        assert!(container.contains::<English>());
    }
}
