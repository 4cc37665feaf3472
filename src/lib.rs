use scraper::Html;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};
use tokio::{
    sync::{mpsc, Mutex},
    time::Duration,
};
use tracing::{debug, error, info, warn};

pub mod apec;
pub mod config;
pub mod export;
pub mod fetcher;
pub mod progress;
pub mod sentinel;

mod data;
mod error;
mod utils;

#[cfg(test)]
mod testing;

pub use data::Table;
pub use error::CrawlerError;
pub use fetcher::{Fetcher, FetcherFactory, Lookup};
pub use progress::{ProgressStore, ResumeState};

/// Site-specific knowledge: where things are on a page and how to turn a
/// detail page into a record.
pub trait Crawler {
    type Document: Send + 'static;

    /// Element whose presence means a detail page is ready for extraction.
    fn details_selector(&self) -> &str;
    fn result_link_selector(&self) -> &str;
    fn next_page_selector(&self) -> &str;

    fn extract(&self, doc: &Html, url: &str) -> Result<Self::Document, CrawlerError>;
    fn extract_links(&self, doc: &Html, base_url: &str) -> HashSet<String>;
    fn has_next_page(&self, doc: &Html) -> bool;
}

/// Detail links found on one search-results page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LinkPage {
    pub links: HashSet<String>,
    pub has_next_page: bool,
}

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Upper bound of every wait for an element.
    pub wait_timeout: Duration,
    /// Pause after the next-page control was clicked.
    pub settle_delay: Duration,
    /// Pause between scrolling the next-page control into view and clicking it.
    pub scroll_delay: Duration,
    pub workers: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        CrawlSettings {
            wait_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(5),
            scroll_delay: Duration::from_secs(1),
            workers: 10,
        }
    }
}

/// Search-results URLs: page 1 has its own address, later pages substitute
/// `{page_number}` in `next_pages`.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    pub first_page: String,
    pub next_pages: String,
}

impl PageTemplate {
    pub const PLACEHOLDER: &'static str = "{page_number}";

    pub fn url_for(&self, page: u32) -> String {
        if page <= 1 {
            self.first_page.clone()
        } else {
            self.next_pages
                .replace(Self::PLACEHOLDER, &page.to_string())
        }
    }
}

/// Reads the links of the search-results page currently loaded in `fetcher`.
/// A page whose results never show up counts as the last one.
pub async fn collect_links<C, F>(
    crawler: &C,
    fetcher: &mut F,
    settings: &CrawlSettings,
) -> Result<LinkPage, CrawlerError>
where
    C: Crawler + Sync,
    F: Fetcher + ?Sized,
{
    match fetcher
        .wait_for(crawler.result_link_selector(), settings.wait_timeout)
        .await?
    {
        Lookup::TimedOut => {
            warn!(
                "No results on {}",
                fetcher.current_url().unwrap_or_default()
            );
            return Ok(LinkPage::default());
        }
        Lookup::Found => {}
    }

    let base_url = fetcher.current_url().ok_or(CrawlerError::NoPage)?;
    let doc = Html::parse_document(fetcher.page_source()?);
    let page = LinkPage {
        links: crawler.extract_links(&doc, base_url),
        has_next_page: crawler.has_next_page(&doc),
    };
    debug!("Found {} links on {}", page.links.len(), base_url);
    Ok(page)
}

/// Moves `fetcher` to the next search-results page. Returns `false` when there is none.
pub async fn advance_page<C, F>(
    crawler: &C,
    fetcher: &mut F,
    settings: &CrawlSettings,
) -> Result<bool, CrawlerError>
where
    C: Crawler + Sync,
    F: Fetcher + ?Sized,
{
    let next = crawler.next_page_selector();
    if fetcher.wait_for(next, settings.wait_timeout).await? == Lookup::TimedOut {
        info!("Next page control not found");
        return Ok(false);
    }

    fetcher.scroll_into_view(next).await?;
    tokio::time::sleep(settings.scroll_delay).await;
    fetcher.click(next).await?;
    tokio::time::sleep(settings.settle_delay).await;
    Ok(true)
}

/// Follows the next-page control from `start_url` until it disappears, a click
/// fails or `max_pages` pages were read, gathering every detail link on the way.
pub async fn collect_all_links<C, F>(
    crawler: &C,
    fetcher: &mut F,
    start_url: &str,
    max_pages: Option<u32>,
    settings: &CrawlSettings,
) -> Result<HashSet<String>, CrawlerError>
where
    C: Crawler + Sync,
    F: Fetcher + ?Sized,
{
    fetcher.goto(start_url).await?;

    let mut all_links = HashSet::new();
    let mut page = 1;
    loop {
        let LinkPage {
            links,
            has_next_page,
        } = collect_links(crawler, fetcher, settings).await?;
        info!("[page {}] {} links", page, links.len());
        all_links.extend(links);

        if !has_next_page || max_pages.map_or(false, |max| page >= max) {
            break;
        }
        match advance_page(crawler, fetcher, settings).await {
            Ok(true) => page += 1,
            Ok(false) => break,
            Err(e) => {
                warn!("Could not open page {}: {}", page + 1, e);
                break;
            }
        }
    }

    info!("Collected {} distinct links over {} pages", all_links.len(), page);
    Ok(all_links)
}

/// Visits one detail page and extracts its record.
pub async fn scrape_document<C, F>(
    crawler: &C,
    fetcher: &mut F,
    url: &str,
    settings: &CrawlSettings,
) -> Result<C::Document, CrawlerError>
where
    C: Crawler + Sync,
    F: Fetcher + ?Sized,
{
    fetcher.goto(url).await?;
    let details = crawler.details_selector();
    if fetcher.wait_for(details, settings.wait_timeout).await? == Lookup::TimedOut {
        return Err(CrawlerError::MissingElement(details.to_string()));
    }

    let doc = Html::parse_document(fetcher.page_source()?);
    crawler.extract(&doc, url)
}

/// Scrapes every link with `settings.workers` concurrent workers, each owning
/// its own fetcher. Failed links are logged and left out; output order is
/// unspecified.
pub async fn scrape_parallel<C, P>(
    crawler: Arc<C>,
    factory: &P,
    links: HashSet<String>,
    settings: &CrawlSettings,
) -> Result<Vec<C::Document>, CrawlerError>
where
    C: Crawler + Send + Sync + 'static,
    P: FetcherFactory,
{
    let total = links.len();
    let workers = settings.workers.clamp(1, total.max(1));
    let queue = Arc::new(Mutex::new(links.into_iter().collect::<VecDeque<_>>()));
    let (tx, mut rx) = mpsc::channel::<C::Document>(workers);

    let fetchers = (0..workers)
        .map(|_| factory.create())
        .collect::<Result<Vec<_>, _>>()?;

    for (worker, mut fetcher) in fetchers.into_iter().enumerate() {
        let queue = Arc::clone(&queue);
        let crawler = Arc::clone(&crawler);
        let tx = tx.clone();
        let settings = settings.clone();

        tokio::spawn(async move {
            loop {
                let next = queue.lock().await.pop_front();
                let Some(url) = next else {
                    break;
                };
                match scrape_document(crawler.as_ref(), &mut fetcher, &url, &settings).await {
                    Ok(document) => {
                        if tx.send(document).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("[worker {}] Drop {}: {}", worker, url, e),
                }
            }
        });
    }
    drop(tx);

    let mut documents = Vec::with_capacity(total);
    while let Some(document) = rx.recv().await {
        documents.push(document);
        debug!("[{}/{}] Extracted", documents.len(), total);
    }

    info!("Extracted {} of {} links", documents.len(), total);
    Ok(documents)
}

/// Walks numbered search pages from the stored checkpoint up to `max_pages`,
/// scraping each page's links one by one and saving the checkpoint after
/// every page.
pub async fn run_paged<C, F>(
    crawler: &C,
    fetcher: &mut F,
    template: &PageTemplate,
    max_pages: u32,
    store: &ProgressStore,
    settings: &CrawlSettings,
) -> Result<Vec<C::Document>, CrawlerError>
where
    C: Crawler + Sync,
    C::Document: Serialize + DeserializeOwned,
    F: Fetcher + ?Sized,
{
    let ResumeState {
        current_page,
        mut data,
    } = store.load().await?;

    for page in current_page..=max_pages {
        let url = template.url_for(page);
        if let Err(e) = fetcher.goto(&url).await {
            if page == current_page && data.is_empty() {
                return Err(e);
            }
            error!("Stop at page {}, fetching {} failed: {}", page, url, e);
            return Ok(data);
        }

        let LinkPage { links, .. } = collect_links(crawler, fetcher, settings).await?;
        info!("[page {}/{}] {} links", page, max_pages, links.len());

        for link in links {
            match scrape_document(crawler, fetcher, &link, settings).await {
                Ok(document) => data.push(document),
                Err(e) => warn!("Drop {}: {}", link, e),
            }
        }

        let state = ResumeState {
            current_page: page + 1,
            data,
        };
        store.save(&state).await?;
        data = state.data;
        info!("[page {}/{}] {} records so far", page, max_pages, data.len());
    }

    Ok(data)
}
