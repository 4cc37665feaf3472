mod crawler;
mod data;

pub use crawler::{parse_location, parse_salary, ApecCrawler, Salary};
pub use data::{ApecData, InsertReport, JobOfferTable};

use crate::{
    export::{write_csv, write_xlsx, Tabular},
    sentinel, CrawlerError,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};
use tracing::error;

/// `DD/MM/YYYY` date as printed on job postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicationDate(pub NaiveDate);

const DATE_FORMAT: &str = "%d/%m/%Y";

impl PublicationDate {
    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

impl fmt::Display for PublicationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for PublicationDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, DATE_FORMAT).map(PublicationDate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOffer {
    #[serde(with = "sentinel")]
    pub company_name: Option<String>,
    #[serde(with = "sentinel")]
    pub position_count: Option<u32>,
    #[serde(with = "sentinel")]
    pub employment_status: Option<String>,
    #[serde(with = "sentinel")]
    pub location_raw: Option<String>,
    #[serde(with = "sentinel")]
    pub city: Option<String>,
    #[serde(with = "sentinel")]
    pub department: Option<u8>,
    #[serde(with = "sentinel")]
    pub salary_raw: Option<String>,
    #[serde(with = "sentinel")]
    pub salary_average: Option<f64>,
    #[serde(with = "sentinel")]
    pub salary_minimum: Option<u64>,
    #[serde(with = "sentinel")]
    pub reference_id: Option<String>,
    #[serde(with = "sentinel")]
    pub publication_date: Option<PublicationDate>,
    #[serde(with = "sentinel")]
    pub publication_month: Option<u32>,
    #[serde(with = "sentinel")]
    pub experience_text: Option<String>,
    #[serde(with = "sentinel")]
    pub experience_years: Option<u32>,
    #[serde(with = "sentinel")]
    pub travel_zone: Option<String>,
    #[serde(with = "sentinel")]
    pub languages: Option<String>,
    #[serde(with = "sentinel")]
    pub job_family: Option<String>,
    #[serde(with = "sentinel")]
    pub industry_sector: Option<String>,
    #[serde(with = "sentinel")]
    pub remote_policy: Option<String>,
    #[serde(with = "sentinel")]
    pub description: Option<String>,
    #[serde(with = "sentinel")]
    pub url: Option<String>,
}

impl Tabular for JobOffer {
    const COLUMNS: &'static [&'static str] = &[
        "company_name",
        "position_count",
        "employment_status",
        "location_raw",
        "city",
        "department",
        "salary_raw",
        "salary_average",
        "salary_minimum",
        "reference_id",
        "publication_date",
        "publication_month",
        "experience_text",
        "experience_years",
        "travel_zone",
        "languages",
        "job_family",
        "industry_sector",
        "remote_policy",
        "description",
        "url",
    ];

    const NUMERIC_COLUMNS: &'static [&'static str] = &[
        "position_count",
        "department",
        "salary_average",
        "salary_minimum",
        "publication_month",
        "experience_years",
    ];

    fn row(&self) -> Vec<String> {
        use sentinel::text;
        vec![
            text(&self.company_name),
            text(&self.position_count),
            text(&self.employment_status),
            text(&self.location_raw),
            text(&self.city),
            text(&self.department),
            text(&self.salary_raw),
            text(&self.salary_average),
            text(&self.salary_minimum),
            text(&self.reference_id),
            text(&self.publication_date),
            text(&self.publication_month),
            text(&self.experience_text),
            text(&self.experience_years),
            text(&self.travel_zone),
            text(&self.languages),
            text(&self.job_family),
            text(&self.industry_sector),
            text(&self.remote_policy),
            text(&self.description),
            text(&self.url),
        ]
    }
}

impl fmt::Display for JobOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in Self::COLUMNS.iter().zip(self.row()) {
            writeln!(f, "{:<18}: {}", name, value)?;
        }
        Ok(())
    }
}

/// Writes `offers` to every sink. A failing sink is logged and the others
/// still run; the first failure is returned once all of them were tried.
pub async fn save_offers(
    offers: &[JobOffer],
    csv: &Path,
    xlsx: &Path,
    database: Option<&Path>,
) -> Result<(), CrawlerError> {
    let mut failure = None;

    if let Err(e) = write_csv(csv, offers) {
        error!("Could not write {}: {}", csv.display(), e);
        failure.get_or_insert(e);
    }
    if let Err(e) = write_xlsx(xlsx, offers) {
        error!("Could not write {}: {}", xlsx.display(), e);
        failure.get_or_insert(e);
    }
    if let Some(database) = database {
        match ApecData::new(database).await {
            Ok(db) => {
                db.insert_offers(offers).await;
                db.close().await;
            }
            Err(e) => {
                error!("Could not open {}: {}", database.display(), e);
                failure.get_or_insert(e);
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
