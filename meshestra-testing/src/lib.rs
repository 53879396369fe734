//! Test harness for services that use `meshestra-transactional`.
//!
//! ```ignore
//! let module = TestingModule::builder()
//!     .entity::<User>()
//!     .provider::<UserService>()
//!     .compile()
//!     .await?;
//! let service = module.get::<UserService>()?;
//! ```

pub mod fixtures;
mod testing_module;

pub use testing_module::{TestingModule, TestingModuleBuilder};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test-friendly `tracing` subscriber once per process.
///
/// The filter comes from `RUST_LOG`, defaulting to `warn`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
