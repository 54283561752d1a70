use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kobosync::config::Config;
use kobosync::io::excel_write::XlsxExport;
use kobosync::io::kobo::KoboFeed;
use kobosync::io::sheets::SheetsStore;
use kobosync::{Result, SyncError, sync};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Sync(args) => execute_sync(args),
    }
}

fn execute_sync(args: SyncArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(url) = args.source_url {
        config.source_url = url;
    }
    if let Some(id) = args.spreadsheet_id {
        config.spreadsheet_id = id;
    }
    if let Some(output) = args.output {
        config.output_file = output;
    }
    config.validate()?;

    if !config.token_file.exists() {
        return Err(SyncError::MissingInput(config.token_file.clone()));
    }
    let token = fs::read_to_string(&config.token_file)?.trim().to_string();

    let feed = KoboFeed::new(config.source_url.clone(), config.source_token.clone());
    let store = SheetsStore::new(
        config.sheets_base_url.clone(),
        config.spreadsheet_id.clone(),
        token,
    );
    let export = XlsxExport::new(config.output_file.clone());

    let report = sync::run(&feed, &store, &export, &config.multi_value_fields)?;
    for (table, outcome) in &report.outcomes {
        println!("{table}: {outcome}");
    }
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| SyncError::Logging(error.to_string()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Flatten survey submissions and sync them incrementally to a spreadsheet."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch all submissions, rebuild the table set, and push new rows.
    Sync(SyncArgs),
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Configuration file path.
    #[arg(long, default_value = "kobosync.json")]
    config: PathBuf,

    /// Override the configured submissions endpoint.
    #[arg(long)]
    source_url: Option<String>,

    /// Override the configured destination spreadsheet id.
    #[arg(long)]
    spreadsheet_id: Option<String>,

    /// Override the configured local xlsx export path.
    #[arg(long)]
    output: Option<PathBuf>,
}
