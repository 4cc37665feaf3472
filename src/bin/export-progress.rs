use apec_job_crawler::apec::{save_offers, JobOffer};
use apec_job_crawler::{CrawlerError, ProgressStore};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

/// Writes the offers of an interrupted paged crawl to the usual outputs.
#[derive(Parser, Debug)]
#[command(name = "export-progress")]
struct Args {
    #[arg(long, env = "APEC_PROGRESS_FILE", default_value = "scraping_progress.json")]
    progress_file: PathBuf,

    #[arg(long, default_value = "offres_emploi_partial.csv")]
    csv: PathBuf,

    #[arg(long, default_value = "offres_emploi_partial.xlsx")]
    xlsx: PathBuf,

    /// Also store the offers in this SQLite database
    #[arg(long, env = "APEC_DATABASE")]
    database: Option<PathBuf>,
}

async fn export_progress(args: &Args) -> Result<(), CrawlerError> {
    let store = ProgressStore::new(&args.progress_file);
    let state = store.load::<JobOffer>().await?;
    info!(
        "{} offers saved in {} before page {}",
        state.data.len(),
        store.path().display(),
        state.current_page
    );

    save_offers(&state.data, &args.csv, &args.xlsx, args.database.as_deref()).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(ErrorLayer::default())
        .init();

    if let Err(e) = export_progress(&Args::parse()).await {
        error!("Export failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}
