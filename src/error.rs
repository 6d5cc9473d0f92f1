//! Error types for the scan pipeline and the storage binding.

use thiserror::Error;

/// Errors raised while scanning a document.
///
/// Page-level failures are handled inside the scan loop (the page is skipped
/// and logged); only document-level conditions reach the caller.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The PDFium shared library could not be loaded.
    #[error("failed to load the PDFium library: {0}. Place libpdfium in the working directory or install it system-wide")]
    PdfiumUnavailable(String),

    /// Password-protected input gets its own message so the user knows what to fix.
    #[error("the document is password protected; remove the password and scan again")]
    PasswordProtected,

    #[error("could not read the document: {0}")]
    DocumentUnreadable(String),

    /// One page failed to rasterize or tokenize. Skips that page only.
    #[error("page {page} could not be processed: {detail}")]
    PageRender { page: u32, detail: String },

    /// Every page was dropped; the caller is told instead of shown an empty table.
    #[error("no valid guides found in the document")]
    EmptyBatch,

    #[error("scan cancelled")]
    Cancelled,
}

/// Errors from the SQLite client/ledger binding.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    /// `mark_paid` found nothing to update; local state is left untouched.
    #[error("no open ledger entry for client {client_id} and period {period}")]
    NoMatchingEntry { client_id: i64, period: String },

    #[error("invalid payment status: {0}")]
    InvalidStatus(String),
}
