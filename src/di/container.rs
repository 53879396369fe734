use crate::di::{Injectable, ModuleRef, Token};
use crate::error::{MeshestraError, Result};
use dashmap::DashMap;
use std::any::Any;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::thread::{self, ThreadId};

/// A resolved, type-erased service instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

type FactoryFn = Arc<dyn Fn(&Container) -> Result<Instance> + Send + Sync>;

/// Casts an implementation instance to an `Arc<dyn Any>` holding an `Arc<dyn Trait>`.
type CasterFn = Arc<dyn Fn(Instance) -> Result<Instance> + Send + Sync>;

/// Options for a single container lookup.
///
/// A strict lookup only sees providers registered in the module it is run
/// against. A loose lookup (the default) also searches the rest of the module
/// tree, so cross-module and forward-referenced dependencies still resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub strict: bool,
}

impl ResolveOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn loose() -> Self {
        Self { strict: false }
    }
}

/// Lazily constructed singleton with re-entrancy detection.
struct ClassProvider {
    factory: FactoryFn,
    instance: OnceLock<Instance>,
    /// Thread currently running the factory.
    constructing: Mutex<Option<ThreadId>>,
    /// Held while the factory runs; other threads wait for the instance.
    build: Mutex<()>,
}

#[derive(Clone)]
enum Provider {
    Value(Instance),
    Class(Arc<ClassProvider>),
    Factory(FactoryFn),
    Binding { target: Token, caster: CasterFn },
}

pub(crate) struct ContainerInner {
    name: String,
    providers: DashMap<Token, Provider>,
    modules: DashMap<String, Container>,
    parent: Option<Weak<ContainerInner>>,
}

/// Thread-safe dependency injection container.
///
/// A `Container` is a cheap handle to one module of a module tree. Clones
/// share the same registry.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    pub fn new() -> Self {
        Self::with_parent("root", None)
    }

    fn with_parent(name: &str, parent: Option<Weak<ContainerInner>>) -> Self {
        let container = Self {
            inner: Arc::new(ContainerInner {
                name: name.to_string(),
                providers: DashMap::new(),
                modules: DashMap::new(),
                parent,
            }),
        };
        let module_ref = ModuleRef::new(Arc::downgrade(&container.inner));
        container.register(module_ref);
        container
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    /// Name of the module this handle points at.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the child module called `name`, creating it on first use.
    pub fn module(&self, name: &str) -> Container {
        self.inner
            .modules
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!("Creating module '{}' under '{}'", name, self.inner.name);
                Container::with_parent(name, Some(Arc::downgrade(&self.inner)))
            })
            .clone()
    }

    /// Handle to this module that does not keep it alive.
    pub fn module_ref(&self) -> ModuleRef {
        ModuleRef::new(Arc::downgrade(&self.inner))
    }

    /// Register a singleton instance under its own type token.
    pub fn register<T: 'static + Send + Sync>(&self, instance: T) -> &Self {
        self.insert(Token::of::<T>(), Provider::Value(Arc::new(instance)));
        self
    }

    /// Register a singleton value under a custom token.
    pub fn register_value<V: 'static + Send + Sync>(
        &self,
        token: impl Into<Token>,
        value: V,
    ) -> &Self {
        self.insert(token.into(), Provider::Value(Arc::new(value)));
        self
    }

    /// Register an already type-erased instance under `token`.
    pub fn register_instance(&self, token: impl Into<Token>, instance: Instance) -> &Self {
        self.insert(token.into(), Provider::Value(instance));
        self
    }

    /// Register a transient factory: it runs on every resolution.
    pub fn register_factory<V, F>(&self, token: impl Into<Token>, factory: F) -> &Self
    where
        V: 'static + Send + Sync,
        F: Fn(&Container) -> Result<V> + 'static + Send + Sync,
    {
        let factory: FactoryFn =
            Arc::new(move |container| factory(container).map(|v| Arc::new(v) as Instance));
        self.insert(token.into(), Provider::Factory(factory));
        self
    }

    /// Register `T` as a class provider. The instance is built through
    /// [`Injectable::inject`] the first time it is resolved and reused afterwards,
    /// so providers can be registered in any order.
    pub fn register_provider<T: Injectable>(&self) -> &Self {
        let factory: FactoryFn =
            Arc::new(|container| T::inject(container).map(|v| Arc::new(v) as Instance));
        let provider = ClassProvider {
            factory,
            instance: OnceLock::new(),
            constructing: Mutex::new(None),
            build: Mutex::new(()),
        };
        self.insert(Token::of::<T>(), Provider::Class(Arc::new(provider)));
        self
    }

    /// Bind a trait to a registered implementation.
    ///
    /// This enables resolving `Arc<dyn Trait>` to the implementation instance.
    /// The implementation may be registered before or after the binding.
    pub fn register_trait<Trait, Impl, F>(&self, caster_fn: F) -> &Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        let caster: CasterFn = Arc::new(move |instance: Instance| {
            let concrete =
                instance
                    .downcast::<Impl>()
                    .map_err(|_| MeshestraError::DowncastFailed {
                        type_name: std::any::type_name::<Impl>().to_string(),
                    })?;
            let trait_obj: Arc<Trait> = caster_fn(concrete);
            Ok(Arc::new(trait_obj) as Instance)
        });

        self.insert(
            Token::of::<Trait>(),
            Provider::Binding {
                target: Token::of::<Impl>(),
                caster,
            },
        );
        self
    }

    fn insert(&self, token: Token, provider: Provider) {
        tracing::debug!("Registering '{}' in module '{}'", token, self.inner.name);
        self.inner.providers.insert(token, provider);
    }

    /// Resolve a token to its instance.
    ///
    /// # Errors
    /// Returns [`MeshestraError::DependencyNotFound`] when no visible module
    /// registers `token`.
    pub fn resolve_token(&self, token: &Token, options: ResolveOptions) -> Result<Instance> {
        let found = if options.strict {
            self.inner
                .providers
                .get(token)
                .map(|p| (self.clone(), p.value().clone()))
        } else {
            self.find_loose(token)
        };

        let (owner, provider) = found.ok_or_else(|| MeshestraError::DependencyNotFound {
            token: token.to_string(),
        })?;
        owner.instantiate(token, provider)
    }

    /// Resolve a token and downcast it to `T`.
    pub fn resolve_as<T: 'static + Send + Sync>(
        &self,
        token: &Token,
        options: ResolveOptions,
    ) -> Result<Arc<T>> {
        self.resolve_token(token, options)?
            .downcast::<T>()
            .map_err(|_| MeshestraError::DowncastFailed {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn resolve<T: 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        self.resolve_as::<T>(&Token::of::<T>(), ResolveOptions::loose())
    }

    pub fn resolve_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        // A binding yields an Arc<dyn Any> holding an Arc<T>.
        let wrapper = self.resolve_as::<Arc<T>>(&Token::of::<T>(), ResolveOptions::loose())?;
        Ok(wrapper.as_ref().clone())
    }

    /// Own module first, then the whole tree from the root.
    fn find_loose(&self, token: &Token) -> Option<(Container, Provider)> {
        if let Some(provider) = self.inner.providers.get(token) {
            return Some((self.clone(), provider.value().clone()));
        }
        self.root().find_in_tree(token)
    }

    fn find_in_tree(&self, token: &Token) -> Option<(Container, Provider)> {
        if let Some(provider) = self.inner.providers.get(token) {
            return Some((self.clone(), provider.value().clone()));
        }
        let modules: Vec<Container> = self.inner.modules.iter().map(|m| m.clone()).collect();
        modules.iter().find_map(|module| module.find_in_tree(token))
    }

    fn root(&self) -> Container {
        let mut current = self.inner.clone();
        while let Some(parent) = current.parent.as_ref().and_then(Weak::upgrade) {
            current = parent;
        }
        Container::from_inner(current)
    }

    fn instantiate(&self, token: &Token, provider: Provider) -> Result<Instance> {
        match provider {
            Provider::Value(instance) => Ok(instance),
            Provider::Factory(factory) => factory(self),
            Provider::Class(class) => self.instantiate_class(token, &class),
            Provider::Binding { target, caster } => {
                let instance = self.resolve_token(&target, ResolveOptions::loose())?;
                caster(instance)
            }
        }
    }

    fn instantiate_class(&self, token: &Token, class: &ClassProvider) -> Result<Instance> {
        if let Some(instance) = class.instance.get() {
            return Ok(instance.clone());
        }

        let current = thread::current().id();
        let owner = *class
            .constructing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if owner == Some(current) {
            return Err(MeshestraError::CircularDependency {
                cycle: format!("{} -> {}", token, token),
            });
        }

        let _build = class.build.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(instance) = class.instance.get() {
            return Ok(instance.clone());
        }
        *class
            .constructing
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(current);

        let built = (class.factory)(self);
        *class
            .constructing
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        let instance = built.map_err(|e| match e {
            MeshestraError::CircularDependency { cycle } => MeshestraError::CircularDependency {
                cycle: format!("{} -> {}", token, cycle),
            },
            other => other,
        })?;
        Ok(class.instance.get_or_init(|| instance).clone())
    }

    /// Whether `T` is registered in this module.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.contains_token(&Token::of::<T>())
    }

    pub fn contains_token(&self, token: &Token) -> bool {
        self.inner.providers.contains_key(token)
    }

    /// Number of providers registered in this module, its own `ModuleRef` included.
    pub fn len(&self) -> usize {
        self.inner.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.providers.is_empty()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct TestService {
        value: i32,
    }

    trait MyTrait: Send + Sync {
        fn get_value(&self) -> i32;
    }

    struct MyTraitImpl {
        value: i32,
    }

    impl MyTrait for MyTraitImpl {
        fn get_value(&self) -> i32 {
            self.value
        }
    }

    struct Counter {
        base: Arc<TestService>,
    }

    impl Injectable for Counter {
        fn inject(container: &Container) -> Result<Self> {
            Ok(Self {
                base: container.resolve::<TestService>()?,
            })
        }
    }

    static SLOW_BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct SlowService;

    impl Injectable for SlowService {
        fn inject(_container: &Container) -> Result<Self> {
            SLOW_BUILDS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(SlowService)
        }
    }

    struct SelfReferencing;

    impl Injectable for SelfReferencing {
        fn inject(container: &Container) -> Result<Self> {
            container.resolve::<SelfReferencing>()?;
            Ok(SelfReferencing)
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let container = Container::new();
        container.register(TestService { value: 42 });
        let service = container.resolve::<TestService>().unwrap();
        assert_eq!(service.value, 42);
    }

    #[test]
    fn test_register_and_resolve_trait() {
        let container = Container::new();
        container.register(MyTraitImpl { value: 99 });
        container.register_trait::<dyn MyTrait, MyTraitImpl, _>(|i| i as Arc<dyn MyTrait>);
        let trait_instance = container.resolve_trait::<dyn MyTrait>().unwrap();
        assert_eq!(trait_instance.get_value(), 99);
    }

    #[test]
    fn test_unregistered_token_is_not_found() {
        let container = Container::new();
        let err = container.resolve::<TestService>().err().unwrap();
        assert!(err.is_not_found());

        let err = container
            .resolve_token(&Token::named("Missing"), ResolveOptions::loose())
            .err()
            .unwrap();
        assert!(matches!(err, MeshestraError::DependencyNotFound { token } if token == "Missing"));
    }

    #[test]
    fn test_named_value_and_factory() {
        let container = Container::new();
        container.register_value("MyObject", "value".to_string());
        container.register_factory("MyString", |_| Ok("myString".to_string()));

        let value = container
            .resolve_as::<String>(&Token::named("MyObject"), ResolveOptions::loose())
            .unwrap();
        assert_eq!(value.as_str(), "value");

        let first = container
            .resolve_as::<String>(&Token::named("MyString"), ResolveOptions::loose())
            .unwrap();
        let second = container
            .resolve_as::<String>(&Token::named("MyString"), ResolveOptions::loose())
            .unwrap();
        assert_eq!(first.as_str(), "myString");
        // factories are transient
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_downcast_failure() {
        let container = Container::new();
        container.register_value("Number", 7u32);
        let err = container
            .resolve_as::<String>(&Token::named("Number"), ResolveOptions::loose())
            .err()
            .unwrap();
        assert!(matches!(err, MeshestraError::DowncastFailed { .. }));
    }

    #[test]
    fn test_class_provider_is_singleton_and_order_independent() {
        let container = Container::new();
        container.register_provider::<Counter>();
        container.register(TestService { value: 1 });

        let first = container.resolve::<Counter>().unwrap();
        let second = container.resolve::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.base.value, 1);
    }

    #[test]
    fn test_class_provider_cycle_is_detected() {
        let container = Container::new();
        container.register_provider::<SelfReferencing>();
        let err = container.resolve::<SelfReferencing>().err().unwrap();
        assert!(matches!(err, MeshestraError::CircularDependency { .. }));
    }

    #[test]
    fn test_concurrent_resolution_builds_once() {
        let container = Container::new();
        container.register_provider::<SlowService>();

        let instances: Vec<Arc<SlowService>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| container.resolve::<SlowService>().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(SLOW_BUILDS.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_register_instance_keeps_erased_value() {
        let container = Container::new();
        let instance: Instance = Arc::new(TestService { value: 8 });
        container.register_instance("Erased", instance.clone());

        let resolved = container
            .resolve_token(&Token::named("Erased"), ResolveOptions::loose())
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &instance));
        let service = container
            .resolve_as::<TestService>(&Token::named("Erased"), ResolveOptions::loose())
            .unwrap();
        assert_eq!(service.value, 8);
    }

    #[test]
    fn test_strict_lookup_stays_in_module() {
        let root = Container::new();
        let users = root.module("UsersModule");
        let billing = root.module("BillingModule");
        billing.register(TestService { value: 5 });

        let token = Token::of::<TestService>();
        let strict = users.resolve_token(&token, ResolveOptions::strict());
        assert!(strict.err().unwrap().is_not_found());

        let loose = users
            .resolve_as::<TestService>(&token, ResolveOptions::loose())
            .unwrap();
        assert_eq!(loose.value, 5);
    }

    #[test]
    fn test_module_is_created_once() {
        let root = Container::new();
        let a = root.module("UsersModule");
        a.register(TestService { value: 3 });
        let b = root.module("UsersModule");
        assert!(b.contains::<TestService>());
        assert_eq!(b.name(), "UsersModule");
    }

    #[test]
    fn test_each_module_resolves_its_own_module_ref() {
        let root = Container::new();
        let child = root.module("ChildModule");
        let module_ref = child.resolve::<ModuleRef>().unwrap();
        assert_eq!(module_ref.container().unwrap().name(), "ChildModule");
        assert_eq!(root.len(), 1);
    }
}
