use crate::{utils, CrawlerError};
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Outcome of a bounded wait for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    TimedOut,
}

/// A single navigation session. Methods take `&mut self`, so one visit owns
/// the session until it is done with the page.
#[async_trait::async_trait]
pub trait Fetcher: Send {
    async fn goto(&mut self, url: &str) -> Result<(), CrawlerError>;
    async fn wait_for(&mut self, selector: &str, timeout: Duration)
        -> Result<Lookup, CrawlerError>;
    async fn click(&mut self, selector: &str) -> Result<(), CrawlerError>;
    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), CrawlerError>;

    fn page_source(&self) -> Result<&str, CrawlerError>;
    fn current_url(&self) -> Option<&str>;
}

/// Hands out one independent [`Fetcher`] per worker.
pub trait FetcherFactory: Send + Sync {
    type Fetcher: Fetcher + 'static;

    fn create(&self) -> Result<Self::Fetcher, CrawlerError>;
}

#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub page_load_timeout: Duration,
    pub poll_interval: Duration,
    pub user_agent: String,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        FetcherOptions {
            page_load_timeout: Duration::from_secs(100),
            poll_interval: Duration::from_millis(500),
            user_agent: concat!("apec-job-crawler/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

struct Page {
    url: String,
    source: String,
}

/// Loads pages over plain HTTP. Waiting for an element re-fetches the current
/// page until the element shows up or the timeout expires.
pub struct HttpFetcher {
    client: Client,
    poll_interval: Duration,
    page: Option<Page>,
}

impl HttpFetcher {
    pub fn new(options: &FetcherOptions) -> Result<HttpFetcher, CrawlerError> {
        let client = build_client(options)?;
        Ok(HttpFetcher::with_client(client, options.poll_interval))
    }

    pub fn with_client(client: Client, poll_interval: Duration) -> HttpFetcher {
        HttpFetcher {
            client,
            poll_interval,
            page: None,
        }
    }
}

fn build_client(options: &FetcherOptions) -> Result<Client, CrawlerError> {
    Ok(Client::builder()
        .timeout(options.page_load_timeout)
        .user_agent(options.user_agent.as_str())
        .build()?)
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn goto(&mut self, url: &str) -> Result<(), CrawlerError> {
        debug!("Visit {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::PageUnavailable(format!("{} ({})", url, status)));
        }
        let final_url = response.url().to_string();
        let source = response.text().await?;
        self.page = Some(Page {
            url: final_url,
            source,
        });
        Ok(())
    }

    async fn wait_for(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Lookup, CrawlerError> {
        let deadline = Instant::now() + timeout;
        loop {
            if utils::contains_selector(self.page_source()?, selector)? {
                return Ok(Lookup::Found);
            }
            if Instant::now() + self.poll_interval >= deadline {
                return Ok(Lookup::TimedOut);
            }
            tokio::time::sleep(self.poll_interval).await;

            let url = self.current_url().ok_or(CrawlerError::NoPage)?.to_string();
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.goto(&url)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Reload of {} failed while waiting for {}: {}", url, selector, e),
                Err(_) => return Ok(Lookup::TimedOut),
            }
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), CrawlerError> {
        let base_url = self.current_url().ok_or(CrawlerError::NoPage)?;
        let target = utils::first_href(self.page_source()?, selector, base_url)?
            .ok_or_else(|| CrawlerError::MissingElement(selector.to_string()))?;
        self.goto(&target).await
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), CrawlerError> {
        if !utils::contains_selector(self.page_source()?, selector)? {
            return Err(CrawlerError::MissingElement(selector.to_string()));
        }
        debug!("Scrolled {} into view", selector);
        Ok(())
    }

    fn page_source(&self) -> Result<&str, CrawlerError> {
        self.page
            .as_ref()
            .map(|page| page.source.as_str())
            .ok_or(CrawlerError::NoPage)
    }

    fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(|page| page.url.as_str())
    }
}

/// Shares one connection pool between workers while giving each its own page state.
pub struct HttpFetcherFactory {
    client: Client,
    poll_interval: Duration,
}

impl HttpFetcherFactory {
    pub fn new(options: &FetcherOptions) -> Result<HttpFetcherFactory, CrawlerError> {
        Ok(HttpFetcherFactory {
            client: build_client(options)?,
            poll_interval: options.poll_interval,
        })
    }
}

impl FetcherFactory for HttpFetcherFactory {
    type Fetcher = HttpFetcher;

    fn create(&self) -> Result<HttpFetcher, CrawlerError> {
        Ok(HttpFetcher::with_client(
            self.client.clone(),
            self.poll_interval,
        ))
    }
}
