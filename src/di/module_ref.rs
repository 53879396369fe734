use crate::di::container::ContainerInner;
use crate::di::{Container, Instance, ResolveOptions, Token};
use crate::error::{MeshestraError, Result};
use std::fmt;
use std::sync::{Arc, Weak};

/// Reference to the module a service was constructed in.
///
/// Every module registers its own `ModuleRef`, so a service can take one as a
/// constructor parameter and resolve further dependencies later. The handle
/// is weak: a service stored in the container does not keep it alive.
#[derive(Clone)]
pub struct ModuleRef {
    inner: Weak<ContainerInner>,
}

impl ModuleRef {
    pub(crate) fn new(inner: Weak<ContainerInner>) -> Self {
        Self { inner }
    }

    /// Upgrade to a container handle.
    ///
    /// # Errors
    /// Returns [`MeshestraError::ContainerDropped`] once the container is gone.
    pub fn container(&self) -> Result<Container> {
        self.inner
            .upgrade()
            .map(Container::from_inner)
            .ok_or(MeshestraError::ContainerDropped)
    }

    pub fn get(&self, token: &Token, options: ResolveOptions) -> Result<Instance> {
        self.container()?.resolve_token(token, options)
    }

    pub fn get_as<T: 'static + Send + Sync>(
        &self,
        token: &Token,
        options: ResolveOptions,
    ) -> Result<Arc<T>> {
        self.container()?.resolve_as::<T>(token, options)
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.upgrade() {
            Some(inner) => write!(f, "ModuleRef({})", Container::from_inner(inner).name()),
            None => f.write_str("ModuleRef(<dropped>)"),
        }
    }
}
