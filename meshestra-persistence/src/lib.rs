//! In-memory data source for `meshestra-transactional`.
//!
//! [`DataSource`] owns the tables. Ambient [`Repository`] values write straight
//! to them; an [`EntityManager`] stages writes until its transaction commits and
//! implements [`TransactionHandle`](meshestra_transactional::TransactionHandle),
//! so services can be rebound to it with `with_transaction`.

mod data_source;
mod entity;
mod entity_manager;
mod error;
mod module;
mod repository;
mod store;

pub use data_source::DataSource;
pub use entity::{Entity, repository_token_name};
pub use entity_manager::EntityManager;
pub use error::{PersistenceError, Result};
pub use module::PersistenceModule;
pub use repository::Repository;
pub use store::{Executor, ID_FIELD};

#[cfg(test)]
mod testing_entities {
    use crate::Entity;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Person {
        pub id: Option<i64>,
        pub name: String,
    }

    impl Person {
        pub fn named(name: &str) -> Self {
            Self {
                id: None,
                name: name.to_string(),
            }
        }
    }

    impl Entity for Person {
        const NAME: &'static str = "Person";
        const TABLE: &'static str = "people";
    }
}
