use thiserror::Error;

use crate::platform::PlatformError;
use crate::store::StoreError;

/// Errors surfaced by cog operations.
///
/// Event hooks never propagate these past the dispatch boundary; the
/// [`CogSet`](crate::cog::CogSet) logs and moves on. Management operations
/// return them to the host, which decides how to render the failure.
#[derive(Debug, Error)]
pub enum CogError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CogError>;
