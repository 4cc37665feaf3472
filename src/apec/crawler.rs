use super::JobOffer;
use crate::{
    utils::{normalized_text, resolve_url},
    Crawler, CrawlerError,
};
use itertools::Itertools;
use lazy_regex::{regex, regex_captures};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::{collections::HashSet, str::FromStr};
use tracing::warn;

pub const DETAILS_LIST: &str = "ul.details-offer-list";
pub const RESULT_LINK: &str = r#"div.container-result a[queryparamshandling="merge"]"#;
pub const NEXT_PAGE: &str = "li.page-item.next a.page-link";

const SALARY: &str = "Salaire";
const EXPERIENCE: &str = "Expérience";
const TRAVEL_ZONE: &str = "Zone de déplacement";
const POSITION_STATUS: &str = "Statut du poste";
const JOB_FAMILY: &str = "Métier";
const INDUSTRY_SECTOR: &str = "Secteur d’activité du poste";
const REMOTE_POLICY: &str = "Télétravail";
const JOB_DESCRIPTION: &str = "Descriptif du poste";
const CANDIDATE_PROFILE: &str = "Profil recherché";
const LANGUAGES: &str = "Langues";
const LANGUAGE_SECTION_CLASS: &str = "flex-collapse";
const LEVEL_TOOLTIP: &str = "apec-competence-tooltip-niveau";

const RANGE_SEPARATOR: &str = " - ";
const STARTING_FROM: &[&str] = &["A partir de", "À partir de"];
const NEGOTIABLE: &str = "À négocier";
const ANNUAL_GROSS_THOUSANDS: &str = " k€ brut annuel";
const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£'];
const THOUSANDS: &[char] = &['k', 'K'];

const E: &str = "Invalid selector";
lazy_static! {
    static ref DETAILS: Selector = Selector::parse(DETAILS_LIST).expect(E);
    static ref LI: Selector = Selector::parse("li").expect(E);
    static ref SPAN: Selector = Selector::parse("span").expect(E);
    static ref DETAILS_POST: Selector = Selector::parse("div.details-post").expect(E);
    static ref H4: Selector = Selector::parse("h4").expect(E);
    static ref H5: Selector = Selector::parse("h5").expect(E);
    static ref REFERENCE: Selector = Selector::parse("div.ref-offre").expect(E);
    static ref DATE: Selector = Selector::parse("div.date-offre").expect(E);
    static ref SKILL: Selector = Selector::parse("div.infos_skills").expect(E);
    static ref P: Selector = Selector::parse("p").expect(E);
    static ref RESULT_LINKS: Selector = Selector::parse(RESULT_LINK).expect(E);
    static ref NEXT: Selector = Selector::parse(NEXT_PAGE).expect(E);
}

/// Extracts job offers from apec.fr detail pages and walks its search results.
#[derive(Debug, Clone, Default)]
pub struct ApecCrawler {
    /// Read the number of open positions from the contract entry of the header.
    pub count_positions: bool,
}

impl Crawler for ApecCrawler {
    type Document = JobOffer;

    fn details_selector(&self) -> &str {
        DETAILS_LIST
    }

    fn result_link_selector(&self) -> &str {
        RESULT_LINK
    }

    fn next_page_selector(&self) -> &str {
        NEXT_PAGE
    }

    fn extract_links(&self, doc: &Html, base_url: &str) -> HashSet<String> {
        doc.select(&RESULT_LINKS)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty() && !href.starts_with('#'))
            .filter_map(|href| match resolve_url(base_url, href) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Skip result link: {}", e);
                    None
                }
            })
            .collect()
    }

    fn has_next_page(&self, doc: &Html) -> bool {
        doc.select(&NEXT).next().is_some()
    }

    fn extract(&self, doc: &Html, url: &str) -> Result<JobOffer, CrawlerError> {
        let details = doc
            .select(&DETAILS)
            .next()
            .ok_or_else(|| CrawlerError::MissingElement(DETAILS_LIST.to_string()))?;

        let mut offer = JobOffer {
            url: Some(url.to_string()),
            ..JobOffer::default()
        };

        let items = details.select(&LI).collect::<Vec<_>>();
        if let [company, contract, location, ..] = items.as_slice() {
            offer.company_name = non_empty(normalized_text(company));
            offer.employment_status = contract
                .select(&SPAN)
                .next()
                .and_then(|span| non_empty(normalized_text(&span)));
            if self.count_positions {
                offer.position_count = first_number(&normalized_text(contract));
            }
            offer.location_raw = non_empty(normalized_text(location));
            if let Some((city, department)) = offer.location_raw.as_deref().and_then(parse_location) {
                offer.city = Some(city);
                offer.department = Some(department);
            }
        }

        if let Some(raw) = doc
            .select(&DETAILS_POST)
            .find_map(|post| labeled_value(post.select(&H4), SALARY))
        {
            let salary = parse_salary(&raw);
            offer.salary_raw = salary.raw;
            offer.salary_average = salary.average;
            offer.salary_minimum = salary.minimum;
        }

        offer.reference_id = doc.select(&REFERENCE).next().and_then(|el| {
            let text = normalized_text(&el);
            regex_captures!(r"Ref\. Apec\s*:\s*(\S+)", &text).map(|(_, id)| id.to_string())
        });

        offer.publication_date = doc.select(&DATE).next().and_then(|el| {
            let text = normalized_text(&el);
            let (_, date) = regex_captures!(r"Publiée le\s*(\d{1,2}/\d{1,2}/\d{4})", &text)?;
            date.parse().ok()
        });
        offer.publication_month = offer.publication_date.map(|date| date.month());

        if let Some(text) = labeled_value(doc.select(&H4), EXPERIENCE) {
            offer.experience_years = first_number(&text);
            offer.experience_text = Some(text);
        }

        if let Some(status) = labeled_value(doc.select(&H4), POSITION_STATUS) {
            offer.employment_status = Some(status);
        }

        offer.travel_zone = labeled_value(doc.select(&H4), TRAVEL_ZONE);
        offer.languages = languages(doc);
        offer.job_family = labeled_value(doc.select(&H4), JOB_FAMILY);
        offer.industry_sector = labeled_value(doc.select(&H4), INDUSTRY_SECTOR);
        offer.remote_policy = labeled_value(doc.select(&H4), REMOTE_POLICY);
        offer.description = description(doc);

        Ok(offer)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Salary {
    pub raw: Option<String>,
    pub average: Option<f64>,
    pub minimum: Option<u64>,
}

/// Classifies a salary text. A range fills `average`, a lower bound fills
/// `minimum`, "to be negotiated" clears `raw`. Anything else keeps only `raw`.
pub fn parse_salary(raw: &str) -> Salary {
    let raw = raw.trim();
    let mut salary = Salary {
        raw: non_empty(raw.to_string()),
        ..Salary::default()
    };

    if raw.contains(RANGE_SEPARATOR) {
        salary.average = range_average(raw);
    } else if STARTING_FROM.iter().any(|marker| raw.contains(marker)) {
        salary.minimum = first_number(raw);
    } else if raw.contains(NEGOTIABLE) {
        salary.raw = None;
    } else if raw.contains(ANNUAL_GROSS_THOUSANDS) {
        let figures = raw.replace(ANNUAL_GROSS_THOUSANDS, "");
        match figures.split(RANGE_SEPARATOR).collect::<Vec<_>>().as_slice() {
            [single] => salary.minimum = amount(single),
            [_, _] => salary.average = range_average(&figures),
            _ => {}
        }
    }

    salary
}

fn range_average(text: &str) -> Option<f64> {
    let (low, high) = text.split(RANGE_SEPARATOR).collect_tuple()?;
    let (low, high) = (amount(low)?, amount(high)?);
    Some((low as f64 + high as f64) / 2.0)
}

/// Digits of one salary figure. Whitespace, currency symbols, the annual
/// marker and a trailing thousands `k` are dropped; any other character makes
/// the figure unreadable.
fn amount(text: &str) -> Option<u64> {
    let figure = text
        .replace(ANNUAL_GROSS_THOUSANDS.trim_start(), "")
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect::<String>();
    let digits = figure
        .strip_suffix(THOUSANDS)
        .unwrap_or(&figure);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Splits `"<city> - <dd>"` into the city and its two-digit department.
pub fn parse_location(location: &str) -> Option<(String, u8)> {
    let (_, city, department) = regex_captures!(r"^(.+) - (\d{2})$", location)?;
    Some((city.trim().to_string(), department.parse().ok()?))
}

fn first_number<T: FromStr>(text: &str) -> Option<T> {
    regex!(r"\d+")
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn find_heading<'a>(
    mut headings: impl Iterator<Item = ElementRef<'a>>,
    label: &str,
) -> Option<ElementRef<'a>> {
    headings.find(|heading| normalized_text(heading) == label)
}

fn next_sibling_named<'a>(el: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == name)
}

/// Text of the `span` that follows the heading carrying `label`.
fn labeled_value<'a>(headings: impl Iterator<Item = ElementRef<'a>>, label: &str) -> Option<String> {
    let heading = find_heading(headings, label)?;
    next_sibling_named(heading, "span").and_then(|span| non_empty(normalized_text(&span)))
}

fn has_class(el: &ElementRef, class: &str) -> bool {
    el.value()
        .attr("class")
        .map_or(false, |classes| classes.split_whitespace().any(|c| c == class))
}

fn is_heading(el: &ElementRef) -> bool {
    matches!(el.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn languages(doc: &Html) -> Option<String> {
    let heading = find_heading(doc.select(&H5), LANGUAGES)?;
    let section = heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| has_class(el, LANGUAGE_SECTION_CLASS))?;

    let entries = section
        .select(&SKILL)
        .filter_map(|skill| {
            let tooltip = next_sibling_named(skill, LEVEL_TOOLTIP)?;
            let language = skill
                .select(&P)
                .next()
                .and_then(|p| non_empty(normalized_text(&p)));
            let level = tooltip
                .select(&H4)
                .next()
                .and_then(|h4| non_empty(normalized_text(&h4)));
            Some(format!(
                "{} ({})",
                crate::sentinel::text(&language),
                crate::sentinel::text(&level)
            ))
        })
        .join(", ");
    non_empty(entries)
}

fn description(doc: &Html) -> Option<String> {
    let heading = find_heading(doc.select(&H4), JOB_DESCRIPTION)?;
    let text = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .map(|el| (normalized_text(&el), el))
        .take_while(|(text, el)| !is_heading(el) && text.as_str() != CANDIDATE_PROFILE)
        .map(|(text, _)| text)
        .filter(|text| !text.is_empty())
        .join(" ");
    non_empty(text)
}
