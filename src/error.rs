use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid BioMart dataset name: {0}")]
    InvalidDatasetName(String),

    #[error("invalid BioMart attribute name: {0}")]
    InvalidAttributeName(String),

    #[error("invalid species prefix: {0}")]
    InvalidSpeciesPrefix(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("BioMart request failed: {0}")]
    BiomartHttp(String),

    #[error("BioMart returned status {status}: {message}")]
    BiomartStatus { status: u16, message: String },

    #[error("BioMart rejected query on {dataset}: {message}")]
    BiomartQuery { dataset: String, message: String },

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("expected {expected} columns, found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("row {row} out of range for table with {rows} rows")]
    MissingRow { row: usize, rows: usize },

    #[error("failed to read input table {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("malformed TSV: {0}")]
    Tsv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
