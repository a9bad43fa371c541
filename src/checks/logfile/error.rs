// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::filter::FilterError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

pub type Result<T> = std::result::Result<T, Error>;
