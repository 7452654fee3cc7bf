//! Error types shared by both pipelines.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Input not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Malformed input in {path}: {reason}")]
    MalformedInput { path: PathBuf, reason: String },

    #[error("Failed to fetch {url}: {reason}")]
    RemoteFetch { url: String, reason: String },

    #[error("Failed to decode GRIB2 message: {0}")]
    Grib(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Spreadsheet(#[from] calamine::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}

impl PrepError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PrepError::MalformedInput {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
