use crate::di::Container;
use crate::error::Result;

/// Trait for types that can be injected from the DI container
///
/// This trait is typically implemented automatically via the `#[derive(Injectable)]`
/// macro, which builds the instance from the type's constructor metadata.
///
/// # Example
/// ```ignore
/// use meshestra_transactional::{DeriveInjectable as Injectable, ModuleRef};
/// use std::sync::Arc;
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     module_ref: ModuleRef,
///     // Resolved from the container by type
///     mailer: Arc<Mailer>,
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies from the container
    ///
    /// # Errors
    /// Returns an error if any required dependency is not found in the container.
    fn inject(container: &Container) -> Result<Self>;
}
