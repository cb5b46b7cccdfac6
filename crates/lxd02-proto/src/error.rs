use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timeout after {timeout:?} waiting for response {prefix:02x?}")]
    Timeout { prefix: [u8; 2], timeout: Duration },

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("device fault: {0}")]
    Device(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("request already in progress")]
    RequestInProgress,

    #[error("print job cancelled")]
    Cancelled,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
