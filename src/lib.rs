pub mod cli;
pub mod commands;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod pdf;
pub mod qr;
pub mod reconcile;
pub mod services;
pub mod types;

pub use db::Db;
pub use error::{ScanError, StoreError};
pub use models::{
    ClientMatch, ExtractedGuide, GuideStatus, LedgerEntry, PaymentStatus, ReconciledGuide,
};
pub use reconcile::{compute_stats, resolve_batch, ClientDirectory, PaymentLedger};
pub use services::scanner::{GuideScanner, ScanOutcome};
pub use types::{ScanReport, ScanStats};
