use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "guide-scanner",
    about = "Scan payment guide PDFs and reconcile them against the client ledger",
    version
)]
pub struct Cli {
    /// Database path. Falls back to GUIDE_SCANNER_DB, then the user data dir.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a guide PDF and print the reconciled batch.
    Scan(ScanArgs),
    /// Mark one client's ledger entry for a period as paid.
    MarkPaid(MarkPaidArgs),
    /// Seed clients and expected payments from a JSON file.
    Import(ImportArgs),
    /// List past scan runs.
    History(HistoryArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Path of the guide PDF.
    pub pdf: PathBuf,

    /// Target competence as YYYY-MM; guides outside it are flagged.
    /// When omitted, the period of the first extracted guide is suggested.
    #[arg(long)]
    pub period: Option<String>,

    /// Print the report as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Write each payment-code crop as a PNG into this directory.
    /// Without it, JSON output embeds the crops as base64.
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MarkPaidArgs {
    #[arg(long)]
    pub client_id: i64,

    /// Period in any accepted spelling, e.g. "11/2024" or "Novembro/2024".
    #[arg(long)]
    pub period: String,

    #[arg(long)]
    pub amount: f64,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// JSON file with clients and their expected payments.
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Print history as JSON.
    #[arg(long)]
    pub json: bool,
}
