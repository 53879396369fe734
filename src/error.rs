use thiserror::Error;

pub type Result<T> = std::result::Result<T, MeshestraError>;

#[derive(Debug, Error)]
pub enum MeshestraError {
    #[error("Dependency not found: {token}")]
    DependencyNotFound { token: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Unexpected constructor parameter type {found} at index {index} of {owner}")]
    UnexpectedParameter {
        owner: String,
        index: usize,
        found: String,
    },

    #[error("Missing constructor argument {index} while rebuilding {owner}")]
    MissingArgument { owner: String, index: usize },

    #[error("Repository not found for entity: {entity}")]
    RepositoryNotFound { entity: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("Container has been dropped")]
    ContainerDropped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeshestraError {
    /// Returns `true` when the error is the container's "not registered" miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MeshestraError::DependencyNotFound { .. })
    }
}

#[cfg(feature = "sea-orm-db")]
impl From<sea_orm::DbErr> for MeshestraError {
    fn from(err: sea_orm::DbErr) -> Self {
        MeshestraError::Transaction {
            message: format!("Database error: {}", err),
        }
    }
}
