//! Transaction-scoped rebinding of injected services.
//!
//! A service built by the container holds ambient repositories. Calling
//! [`Transactional::with_transaction`] builds a fresh instance of the same type
//! whose repository parameters come from a [`TransactionHandle`] instead, while
//! every other parameter is resolved from the container as before.
//!
//! ```ignore
//! data_source
//!     .transaction(|manager| async move {
//!         service.with_transaction(&manager)?.create_user("René").await?;
//!         Ok::<_, anyhow::Error>(())
//!     })
//!     .await?;
//! ```

mod arguments;
mod metadata;
mod rebinder;

pub use arguments::{Argument, ConstructorArgs};
pub use metadata::{
    ConstructorMetadata, ConstructorMetadataBuilder, DeclaredDependency, DeclaredToken,
    DesignType, REPOSITORY_SUFFIX,
};
pub use rebinder::{
    REPOSITORY_SUFFIX_KEY, RebindOptions, Rebinder, STRICT_LOOKUP_KEY, inject_rebindable,
};

use crate::di::{Instance, ModuleRef};
use crate::error::Result;

/// A unit of work from which transaction-bound repositories are obtained.
///
/// Repositories returned here participate in the transaction; the handle is
/// only valid while the transaction is open.
pub trait TransactionHandle: Send + Sync {
    /// Repository for the entity called `entity`.
    fn get_repository(&self, entity: &str) -> Result<Instance>;
}

/// A type that can be rebuilt from resolved constructor arguments.
///
/// Usually derived with `#[derive(Injectable)]`.
pub trait Rebindable: Sized + Send + Sync + 'static {
    /// Constructor descriptor: one parameter per argument of [`Rebindable::rebuild`].
    fn constructor_metadata() -> ConstructorMetadata;

    /// Build a new instance from arguments in constructor order.
    fn rebuild(args: ConstructorArgs) -> Result<Self>;
}

/// Services that can re-run their repository operations inside a transaction.
pub trait Transactional: Rebindable {
    /// Module the service was built in.
    fn module_ref(&self) -> &ModuleRef;

    /// A new instance of `Self` whose repositories are bound to `tx`.
    ///
    /// The returned instance is not cached; call this right before the
    /// operation that should run in the transaction.
    fn with_transaction(&self, tx: &dyn TransactionHandle) -> Result<Self> {
        Rebinder::new(self.module_ref().clone()).bind_to_transaction(self, tx)
    }
}
