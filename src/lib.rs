//! # Meshestra Transactional
//!
//! Run the repository operations of a dependency-injected service inside a
//! specific database transaction.
//!
//! A service is built once by the container with its ambient (non-transactional)
//! repositories. `with_transaction` rebuilds the same type from its constructor
//! metadata: repository parameters are taken from the transaction handle, every
//! other parameter is resolved from the container exactly as before.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use meshestra_transactional::prelude::*;
//! use meshestra_persistence::{DataSource, Repository};
//!
//! #[derive(Injectable)]
//! pub struct UserService {
//!     module_ref: ModuleRef,
//!     mailer: Arc<Mailer>,
//!     #[inject(repository = "User")]
//!     users: Repository<User>,
//! }
//!
//! async fn sign_up(service: Arc<UserService>, data_source: DataSource) -> anyhow::Result<()> {
//!     data_source
//!         .transaction(|manager| async move {
//!             service.with_transaction(&manager)?.create("René").await?;
//!             Ok::<_, anyhow::Error>(())
//!         })
//!         .await
//! }
//! ```

// Lets the derive macros refer to `::meshestra_transactional` inside this crate.
extern crate self as meshestra_transactional;

pub mod config;
pub mod di;
pub mod error;
pub mod module;
pub mod transactional;

// Re-export core types
pub use config::ConfigService;
pub use di::{
    Container, ContainerBuilder, Injectable, Instance, Lazy, ModuleRef, ResolveOptions, Token,
};
pub use error::{MeshestraError, Result};
pub use module::Module;
pub use transactional::{
    Argument, ConstructorArgs, ConstructorMetadata, DeclaredToken, DesignType, RebindOptions,
    Rebindable, Rebinder, TransactionHandle, Transactional,
};

// Re-export macros
pub use meshestra_transactional_macro::{Injectable as DeriveInjectable, module};

#[doc(hidden)]
pub use tracing;

/// Prelude module for convenient imports
///
/// ```
/// use meshestra_transactional::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ConfigService;
    pub use crate::di::{Container, ContainerBuilder, Injectable, Lazy, ModuleRef, Token};
    pub use crate::error::{MeshestraError, Result};
    pub use crate::module::Module;
    pub use crate::transactional::{RebindOptions, TransactionHandle, Transactional};
    pub use crate::{DeriveInjectable as Injectable, module};
    pub use std::sync::Arc;
}
