use thiserror::Error;

use cogkit_core::PlatformError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("attachment download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}
