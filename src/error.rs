//! Error definitions.

use std::io::Error as IOError;
use std::result;

use serde_json::error::Error as SerdeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Trace `{0}` contains no requests")]
    EmptyTrace(String),

    #[error("IO error: {0}")]
    IO(#[from] IOError),
    #[error("Serialization error: {0}")]
    Serde(#[from] SerdeError),
}

pub type Result<T> = result::Result<T, Error>;
