use crate::di::Container;
use crate::error::Result;

/// Trait for application modules
///
/// Modules are typically defined using the `#[module]` macro, which implements
/// this trait and generates the registration logic. Imported modules are
/// registered as child modules of the importing one.
///
/// # Example
/// ```ignore
/// use meshestra_transactional::module;
///
/// #[module(
///     imports = [UsersModule],
///     providers = [BillingService, InvoiceService],
/// )]
/// pub struct BillingModule;
/// ```
pub trait Module {
    /// Register all providers of this module
    fn register(container: &Container) -> Result<()>;

    /// Create a new root container and register this module into it
    fn create_container() -> Result<Container> {
        let container = Container::new();
        Self::register(&container)?;
        Ok(container)
    }
}
