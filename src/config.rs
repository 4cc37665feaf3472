use crate::{fetcher::FetcherOptions, CrawlSettings};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};

pub const SEARCH_URL: &str = "https://www.apec.fr/candidat/recherche-emploi.html/emploi?typesConvention=143684&typesConvention=143685&typesConvention=143686&typesConvention=143687&typesConvention=143706";
pub const SEARCH_PAGE_URL: &str = "https://www.apec.fr/candidat/recherche-emploi.html/emploi?page={page_number}&typesConvention=143684&typesConvention=143685&typesConvention=143686&typesConvention=143687&typesConvention=143706";

#[derive(Parser, Debug, Clone)]
#[command(name = "apec-job-crawler", about = "Crawl apec.fr job offers into CSV, XLSX and SQLite")]
pub struct Cli {
    /// SQLite database receiving the offers
    #[arg(long, env = "APEC_DATABASE", default_value = "job_offers.db")]
    pub database: PathBuf,

    /// CSV output, defaults to offres_emploi_<YYYYMMDD>.csv
    #[arg(long, env = "APEC_CSV")]
    pub csv: Option<PathBuf>,

    /// Spreadsheet output, defaults to offres_emploi_<YYYYMMDD>.xlsx
    #[arg(long, env = "APEC_XLSX")]
    pub xlsx: Option<PathBuf>,

    /// Upper bound of every wait for a page element
    #[arg(long, default_value_t = 10)]
    pub wait_timeout_secs: u64,

    #[arg(long, default_value_t = 100)]
    pub page_load_timeout_secs: u64,

    #[arg(long, env = "APEC_USER_AGENT")]
    pub user_agent: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Follow the next-page control, then scrape every offer concurrently
    Crawl {
        #[arg(long, default_value = SEARCH_URL)]
        start_url: String,

        #[arg(long, default_value_t = 10)]
        workers: usize,

        /// Stop after this many search pages
        #[arg(long)]
        max_pages: Option<u32>,

        /// Pause after each click on the next-page control
        #[arg(long, default_value_t = 5)]
        settle_secs: u64,
    },
    /// Walk numbered search pages one by one, checkpointing after each page
    Paged {
        #[arg(long, default_value = SEARCH_URL)]
        first_page_url: String,

        /// Must contain {page_number}
        #[arg(long, default_value = SEARCH_PAGE_URL)]
        next_pages_url: String,

        #[arg(long, default_value_t = 50)]
        max_pages: u32,

        #[arg(long, env = "APEC_PROGRESS_FILE", default_value = "scraping_progress.json")]
        progress_file: PathBuf,

        /// Read the number of open positions of each offer
        #[arg(long)]
        count_positions: bool,
    },
}

impl Cli {
    pub fn fetcher_options(&self) -> FetcherOptions {
        let mut options = FetcherOptions {
            page_load_timeout: Duration::from_secs(self.page_load_timeout_secs),
            ..FetcherOptions::default()
        };
        if let Some(user_agent) = &self.user_agent {
            options.user_agent = user_agent.clone();
        }
        options
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        let mut settings = CrawlSettings {
            wait_timeout: Duration::from_secs(self.wait_timeout_secs),
            ..CrawlSettings::default()
        };
        if let Command::Crawl {
            workers,
            settle_secs,
            ..
        } = &self.command
        {
            settings.workers = *workers;
            settings.settle_delay = Duration::from_secs(*settle_secs);
        }
        settings
    }

    pub fn csv_path(&self) -> PathBuf {
        self.csv.clone().unwrap_or_else(|| dated_output("csv"))
    }

    pub fn xlsx_path(&self) -> PathBuf {
        self.xlsx.clone().unwrap_or_else(|| dated_output("xlsx"))
    }
}

fn dated_output(extension: &str) -> PathBuf {
    PathBuf::from(format!(
        "offres_emploi_{}.{}",
        chrono::Local::now().format("%Y%m%d"),
        extension
    ))
}
