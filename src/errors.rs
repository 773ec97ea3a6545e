use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("input file {} not found", .0.display())]
    InputNotFound(PathBuf),
    #[error(
        "no Google Maps API key found; set the {env_var} environment variable \
         or place the key in {}",
        .key_file.display()
    )]
    MissingApiKey { env_var: String, key_file: PathBuf },
    #[error("input is missing required column `{0}`")]
    MissingColumn(String),
    #[error("malformed query `{0}`; expected `<id>--<address>`")]
    InvalidQuery(String),
    #[error("duplicate work item `{0}`; every item must be unique")]
    DuplicateItem(String),
    #[error("geocoding service returned {status}: {message}")]
    Geocoding { status: String, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("failed to read workbook: {0}")]
    WorkbookRead(#[from] calamine::Error),
    #[error("failed to write workbook: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),
    #[error("{0}")]
    Config(String),
}
