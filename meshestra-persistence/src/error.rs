use meshestra_transactional::MeshestraError;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Entity is not registered in the data source: {entity}")]
    EntityNotRegistered { entity: String },

    #[error("Transaction {id} has already been committed or rolled back")]
    TransactionFinalized { id: Uuid },

    #[error("Row of table {table} is not a JSON object")]
    InvalidRow { table: String },

    #[error("Data source is closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PersistenceError> for MeshestraError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::EntityNotRegistered { entity } => {
                MeshestraError::RepositoryNotFound { entity }
            }
            other => MeshestraError::Transaction {
                message: other.to_string(),
            },
        }
    }
}
