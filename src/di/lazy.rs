use crate::di::{ModuleRef, ResolveOptions, Token};
use crate::error::{MeshestraError, Result};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// A wrapper for lazily resolved services, used to break circular dependencies.
///
/// When the container builds a service, a `Lazy<T>` parameter only records the
/// module and token of `T`; the instance is looked up on first access. A
/// rebound service receives an already resolved `Lazy<T>` instead.
pub struct Lazy<T: 'static + Send + Sync> {
    source: Option<(ModuleRef, Token)>,
    instance: OnceLock<Arc<T>>,
}

impl<T: 'static + Send + Sync> Lazy<T> {
    /// Creates a `Lazy<T>` that resolves `token` from `module` on first access.
    pub fn deferred(module: ModuleRef, token: Token) -> Self {
        Self {
            source: Some((module, token)),
            instance: OnceLock::new(),
        }
    }

    /// Creates a `Lazy<T>` around an instance that is already available.
    pub fn resolved(instance: Arc<T>) -> Self {
        Self {
            source: None,
            instance: OnceLock::from(instance),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.instance.get().is_some()
    }

    /// Resolve (once) and return the service.
    ///
    /// # Errors
    /// Fails when the token is not registered or the container was dropped.
    pub fn get(&self) -> Result<Arc<T>> {
        self.force().cloned()
    }

    fn force(&self) -> Result<&Arc<T>> {
        if let Some(instance) = self.instance.get() {
            return Ok(instance);
        }
        let (module, token) = self.source.as_ref().ok_or_else(|| {
            MeshestraError::Internal("Lazy has neither an instance nor a source".to_string())
        })?;
        let resolved = module.get_as::<T>(token, ResolveOptions::loose())?;
        Ok(self.instance.get_or_init(|| resolved))
    }
}

impl<T: 'static + Send + Sync> Deref for Lazy<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the service cannot be resolved on first access. Use
    /// [`Lazy::get`] to handle that case.
    fn deref(&self) -> &Self::Target {
        match self.force() {
            Ok(instance) => instance.as_ref(),
            Err(e) => panic!(
                "Failed to lazily resolve dependency '{}': {}",
                std::any::type_name::<T>(),
                e
            ),
        }
    }
}

impl<T: 'static + Send + Sync> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        let instance = OnceLock::new();
        if let Some(resolved) = self.instance.get() {
            let _ = instance.set(resolved.clone());
        }
        Self {
            source: self.source.clone(),
            instance,
        }
    }
}

impl<T: 'static + Send + Sync> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("type", &std::any::type_name::<T>())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::Container;

    struct ServiceB {
        name: &'static str,
    }

    #[test]
    fn test_deferred_resolves_on_first_access() {
        let container = Container::new();
        let lazy: Lazy<ServiceB> = Lazy::deferred(container.module_ref(), Token::of::<ServiceB>());
        assert!(!lazy.is_resolved());

        container.register(ServiceB { name: "b" });
        assert_eq!(lazy.name, "b");
        assert!(lazy.is_resolved());

        let again = lazy.get().unwrap();
        assert!(Arc::ptr_eq(&again, &lazy.get().unwrap()));
    }

    #[test]
    fn test_resolved_needs_no_container() {
        let lazy = Lazy::resolved(Arc::new(ServiceB { name: "direct" }));
        assert!(lazy.is_resolved());
        assert_eq!(lazy.get().unwrap().name, "direct");
    }

    #[test]
    fn test_missing_service_is_an_error() {
        let container = Container::new();
        let lazy: Lazy<ServiceB> = Lazy::deferred(container.module_ref(), Token::of::<ServiceB>());
        assert!(lazy.get().err().unwrap().is_not_found());
    }

    #[test]
    fn test_dropped_container() {
        let lazy: Lazy<ServiceB> = {
            let container = Container::new();
            Lazy::deferred(container.module_ref(), Token::of::<ServiceB>())
        };
        assert!(matches!(lazy.get(), Err(MeshestraError::ContainerDropped)));
    }
}
