use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use guide_scanner_lib::cli::{Cli, Commands};
use guide_scanner_lib::commands;

fn main() {
    init_tracing();
    // Credentials-free, but users can still pin GUIDE_SCANNER_DB in a .env.
    let _ = dotenvy::dotenv();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => commands::scan(cli.db.as_ref(), args),
        Commands::MarkPaid(args) => commands::mark_paid(cli.db.as_ref(), args),
        Commands::Import(args) => commands::import(cli.db.as_ref(), args),
        Commands::History(args) => commands::history(cli.db.as_ref(), args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
