use crate::{
    fetcher::{Fetcher, FetcherFactory, Lookup},
    utils, CrawlerError,
};
use itertools::Itertools;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// Serves pages from memory and records every navigation. Clones share the
/// pages and the visit log but keep their own current page.
#[derive(Clone)]
pub(crate) struct StaticFetcher {
    pages: Arc<HashMap<String, String>>,
    visits: Arc<Mutex<Vec<String>>>,
    current: Option<String>,
}

impl StaticFetcher {
    pub(crate) fn new(pages: HashMap<String, String>) -> StaticFetcher {
        StaticFetcher {
            pages: Arc::new(pages),
            visits: Arc::new(Mutex::new(Vec::new())),
            current: None,
        }
    }

    pub(crate) fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    async fn goto(&mut self, url: &str) -> Result<(), CrawlerError> {
        self.visits.lock().unwrap().push(url.to_string());
        if self.pages.contains_key(url) {
            self.current = Some(url.to_string());
            Ok(())
        } else {
            Err(CrawlerError::PageUnavailable(format!("{} (404 Not Found)", url)))
        }
    }

    async fn wait_for(&mut self, selector: &str, _: Duration) -> Result<Lookup, CrawlerError> {
        if utils::contains_selector(self.page_source()?, selector)? {
            Ok(Lookup::Found)
        } else {
            Ok(Lookup::TimedOut)
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), CrawlerError> {
        let base_url = self.current_url().ok_or(CrawlerError::NoPage)?;
        let target = utils::first_href(self.page_source()?, selector, base_url)?
            .ok_or_else(|| CrawlerError::MissingElement(selector.to_string()))?;
        self.goto(&target).await
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), CrawlerError> {
        if utils::contains_selector(self.page_source()?, selector)? {
            Ok(())
        } else {
            Err(CrawlerError::MissingElement(selector.to_string()))
        }
    }

    fn page_source(&self) -> Result<&str, CrawlerError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .map(String::as_str)
            .ok_or(CrawlerError::NoPage)
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

impl FetcherFactory for StaticFetcher {
    type Fetcher = StaticFetcher;

    fn create(&self) -> Result<StaticFetcher, CrawlerError> {
        Ok(StaticFetcher {
            current: None,
            ..self.clone()
        })
    }
}

/// Hands out [`StaticFetcher`] sessions while counting them and tracking how
/// many visits overlap. Creation fails once `limit` sessions exist.
#[derive(Clone, Default)]
pub(crate) struct VisitCounter {
    created: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl VisitCounter {
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub(crate) struct CountingFactory {
    pub(crate) inner: StaticFetcher,
    pub(crate) counter: VisitCounter,
    pub(crate) limit: Option<usize>,
    pub(crate) visit_delay: Duration,
}

pub(crate) struct CountingFetcher {
    inner: StaticFetcher,
    counter: VisitCounter,
    visit_delay: Duration,
}

#[async_trait::async_trait]
impl Fetcher for CountingFetcher {
    async fn goto(&mut self, url: &str) -> Result<(), CrawlerError> {
        let now = self.counter.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counter.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.visit_delay).await;
        let result = self.inner.goto(url).await;
        self.counter.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<Lookup, CrawlerError> {
        self.inner.wait_for(selector, timeout).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), CrawlerError> {
        self.inner.click(selector).await
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), CrawlerError> {
        self.inner.scroll_into_view(selector).await
    }

    fn page_source(&self) -> Result<&str, CrawlerError> {
        self.inner.page_source()
    }

    fn current_url(&self) -> Option<&str> {
        self.inner.current_url()
    }
}

impl FetcherFactory for CountingFactory {
    type Fetcher = CountingFetcher;

    fn create(&self) -> Result<CountingFetcher, CrawlerError> {
        if self.limit.map_or(false, |limit| self.counter.created() >= limit) {
            return Err(CrawlerError::NoPage);
        }
        self.counter.created.fetch_add(1, Ordering::SeqCst);
        Ok(CountingFetcher {
            inner: self.inner.create()?,
            counter: self.counter.clone(),
            visit_delay: self.visit_delay,
        })
    }
}

pub(crate) fn search_page(links: &[&str], next: Option<&str>) -> String {
    let results = links
        .iter()
        .map(|link| format!(r#"<div><a queryparamshandling="merge" href="{}">Offre</a></div>"#, link))
        .join("\n");
    let next = next
        .map(|href| format!(r#"<li class="page-item next"><a class="page-link" href="{}">Suivant</a></li>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><body><div class="container-result">{}</div><ul class="pagination">{}</ul></body></html>"#,
        results, next
    )
}

pub(crate) fn detail_page(reference: &str) -> String {
    format!(
        r#"<html><body>
            <ul class="details-offer-list mb-20"><li>Company {reference}</li><li><span>CDI</span></li><li>Paris - 75</li></ul>
            <div class="ref-offre">Ref. Apec : {reference}</div>
            <div class="date-offre mb-10">Publiée le 01/03/2024</div>
        </body></html>"#
    )
}
