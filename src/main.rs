use apec_job_crawler::apec::{save_offers, ApecCrawler, JobOffer};
use apec_job_crawler::config::{Cli, Command};
use apec_job_crawler::fetcher::{HttpFetcher, HttpFetcherFactory};
use apec_job_crawler::{
    collect_all_links, run_paged, scrape_parallel, CrawlerError, FetcherFactory, PageTemplate,
    ProgressStore,
};
use clap::Parser;
use std::{path::Path, sync::Arc};
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

async fn crawl(
    cli: &Cli,
    start_url: &str,
    max_pages: Option<u32>,
) -> Result<Vec<JobOffer>, CrawlerError> {
    let settings = cli.crawl_settings();
    let factory = HttpFetcherFactory::new(&cli.fetcher_options())?;
    let crawler = Arc::new(ApecCrawler::default());

    let links = {
        let mut fetcher = factory.create()?;
        collect_all_links(crawler.as_ref(), &mut fetcher, start_url, max_pages, &settings).await?
    };
    info!("Scraping {} offers with {} workers", links.len(), settings.workers);

    scrape_parallel(crawler, &factory, links, &settings).await
}

async fn paged(
    cli: &Cli,
    template: PageTemplate,
    max_pages: u32,
    progress_file: &Path,
    count_positions: bool,
) -> Result<Vec<JobOffer>, CrawlerError> {
    let store = ProgressStore::new(progress_file);
    let crawler = ApecCrawler {
        count_positions,
    };
    let mut fetcher = HttpFetcher::new(&cli.fetcher_options())?;

    run_paged(
        &crawler,
        &mut fetcher,
        &template,
        max_pages,
        &store,
        &cli.crawl_settings(),
    )
    .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let cli = Cli::parse();

    let offers = match &cli.command {
        Command::Crawl {
            start_url,
            max_pages,
            ..
        } => crawl(&cli, start_url, *max_pages).await,
        Command::Paged {
            first_page_url,
            next_pages_url,
            max_pages,
            progress_file,
            count_positions,
        } => {
            let template = PageTemplate {
                first_page: first_page_url.clone(),
                next_pages: next_pages_url.clone(),
            };
            paged(&cli, template, *max_pages, progress_file, *count_positions).await
        }
    };
    let offers = match offers {
        Ok(offers) => offers,
        Err(e) => {
            error!("Crawl aborted: {}", e);
            return Err(e.into());
        }
    };

    info!("{} offers extracted", offers.len());
    let (csv, xlsx) = (cli.csv_path(), cli.xlsx_path());
    save_offers(&offers, &csv, &xlsx, Some(cli.database.as_path())).await?;
    info!(
        "Offers saved to {}, {} and {}",
        csv.display(),
        xlsx.display(),
        cli.database.display()
    );
    Ok(())
}
