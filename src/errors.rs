//src/errors.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxTreeError {
    #[error("taxid {taxid} is not present in the taxonomy table")]
    MissingTaxon { taxid: String },

    #[error("ancestry of taxid {taxid} does not reach the root")]
    Cycle { taxid: String },

    #[error("genome {genome}: statistic `{field}` has non-numeric value {value:?}")]
    MalformedStatistic {
        genome: String,
        field: String,
        value: String,
    },

    #[error("{}:{line}: {reason}", path.display())]
    InvalidRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaxTreeError>;
