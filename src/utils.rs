use crate::CrawlerError;
use lazy_regex::regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use sqlx::SqlitePool;

pub(crate) async fn is_table_exists(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<bool, sqlx::Error> {
    Ok(
        sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?
            .is_some(),
    )
}

/// Text content of an element with whitespace runs collapsed and the ends trimmed.
pub(crate) fn normalized_text(el: &ElementRef) -> String {
    let text = el.text().collect::<String>();
    regex!(r"\s+").replace_all(&text, " ").trim().to_string()
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, CrawlerError> {
    Selector::parse(selector).map_err(|e| CrawlerError::InvalidSelector(format!("{selector}: {e:?}")))
}

pub(crate) fn contains_selector(source: &str, selector: &str) -> Result<bool, CrawlerError> {
    let selector = parse_selector(selector)?;
    let doc = Html::parse_document(source);
    let found = doc.select(&selector).next().is_some();
    Ok(found)
}

/// Absolute target of the first element matching `selector`, taken from its own `href`
/// or from the first descendant anchor.
pub(crate) fn first_href(
    source: &str,
    selector: &str,
    base_url: &str,
) -> Result<Option<String>, CrawlerError> {
    let selector = parse_selector(selector)?;
    let anchor = parse_selector("a[href]")?;
    let doc = Html::parse_document(source);

    let href = doc.select(&selector).next().and_then(|el| {
        el.value()
            .attr("href")
            .or_else(|| {
                el.select(&anchor)
                    .next()
                    .and_then(|a| a.value().attr("href"))
            })
            .map(ToString::to_string)
    });

    match href {
        Some(href) => resolve_url(base_url, &href).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn resolve_url(base_url: &str, href: &str) -> Result<String, CrawlerError> {
    let base = Url::parse(base_url).map_err(|e| CrawlerError::InvalidUrl(format!("{base_url}: {e}")))?;
    base.join(href.trim())
        .map(|url| url.to_string())
        .map_err(|e| CrawlerError::InvalidUrl(format!("{href}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_text_collapses_whitespace() {
        let doc = Html::parse_fragment("<div>  Publiée le\n\t<b>01/03/2024</b> </div>");
        let div = doc.select(&parse_selector("div").unwrap()).next().unwrap();
        assert_eq!(normalized_text(&div), "Publiée le 01/03/2024");
    }

    #[test]
    fn resolves_relative_links() {
        assert_eq!(
            resolve_url("https://www.apec.fr/candidat/recherche-emploi.html/emploi?page=2", "/detail/1").unwrap(),
            "https://www.apec.fr/detail/1"
        );
        assert_eq!(
            resolve_url("https://www.apec.fr/a", "https://other.example/b").unwrap(),
            "https://other.example/b"
        );
        assert!(resolve_url("not a url", "/x").is_err());
    }

    #[test]
    fn first_href_reads_descendant_anchor() {
        let html = r#"<ul><li class="page-item next"><a class="page-link" href="?page=3">Suivant</a></li></ul>"#;
        assert_eq!(
            first_href(html, "li.page-item.next", "https://www.apec.fr/emploi?page=2").unwrap(),
            Some("https://www.apec.fr/emploi?page=3".to_string())
        );
        assert_eq!(first_href(html, "li.previous", "https://www.apec.fr/").unwrap(), None);
    }

    #[test]
    fn invalid_selector_is_reported() {
        assert!(matches!(
            contains_selector("<p></p>", "p[["),
            Err(CrawlerError::InvalidSelector(_))
        ));
    }
}
