#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Database error")]
    DatabaseError(#[from] sqlx::error::Error),
    #[error("Request error")]
    RequestError(#[from] reqwest::Error),
    #[error("I/O error")]
    IoError(#[from] std::io::Error),
    #[error("JSON error")]
    JsonError(#[from] serde_json::Error),
    #[error("CSV error")]
    CsvError(#[from] csv::Error),
    #[error("Spreadsheet error")]
    SpreadsheetError(#[from] rust_xlsxwriter::XlsxError),
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    #[error("Element not found: {0}")]
    MissingElement(String),
    #[error("Page unavailable: {0}")]
    PageUnavailable(String),
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    #[error("No page loaded")]
    NoPage,
}
