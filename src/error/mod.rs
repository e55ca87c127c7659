use crate::capture::CaptureError;
use crate::frame::CatalogError;
use crate::session::ActionError;
use crate::state::StateError;
use crate::storage::StorageError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Action(#[from] ActionError),
}
