use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateStoreError>;

impl From<StateStoreError> for aeo_core::Error {
    fn from(err: StateStoreError) -> Self {
        aeo_core::Error::BlobStore(err.to_string())
    }
}
