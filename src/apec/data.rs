use super::JobOffer;
use crate::{sentinel, utils, CrawlerError, Table};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::path::Path;
use tracing::{debug, info, warn};

/// Table columns in insert order; `ref_apec` is the primary key.
const COLUMNS: [&str; 20] = [
    "ref_apec",
    "url",
    "company_name",
    "statut_poste",
    "location",
    "ville",
    "departement",
    "salary_raw",
    "salary_average",
    "salary_minimum",
    "date_publication",
    "mois_publication",
    "experience",
    "experience_value",
    "travel_zone",
    "langues",
    "metier",
    "secteur_activite",
    "teletravail",
    "description",
];

pub struct JobOfferTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for JobOfferTable {
    type Record<'a> = &'a JobOffer;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        if !utils::is_table_exists(self.get_pool(), &self.name).await? {
            let columns = COLUMNS[1..]
                .iter()
                .map(|column| format!("{} TEXT", column))
                .collect::<Vec<_>>()
                .join(",\n");
            let query = format!(
                "CREATE TABLE {} (
                    {} TEXT PRIMARY KEY,
                    {}
                 )",
                &self.name, COLUMNS[0], columns
            );
            sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        }
        Ok(())
    }

    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<bool, sqlx::Error> {
        let mut tx = self.get_pool().begin().await?;
        let query = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            self.name,
            COLUMNS.join(", "),
            vec!["?"; COLUMNS.len()].join(", ")
        );
        let mut insert = sqlx::query(&query);
        for value in values(record) {
            insert = insert.bind(value);
        }
        let inserted = insert.execute(&mut tx).await?.rows_affected() > 0;
        tx.commit().await?;
        Ok(inserted)
    }
}

/// Cell values in [`COLUMNS`] order, absent fields as the sentinel.
fn values(offer: &JobOffer) -> [String; 20] {
    use sentinel::text;
    [
        text(&offer.reference_id),
        text(&offer.url),
        text(&offer.company_name),
        text(&offer.employment_status),
        text(&offer.location_raw),
        text(&offer.city),
        text(&offer.department),
        text(&offer.salary_raw),
        text(&offer.salary_average),
        text(&offer.salary_minimum),
        text(&offer.publication_date),
        text(&offer.publication_month),
        text(&offer.experience_text),
        text(&offer.experience_years),
        text(&offer.travel_zone),
        text(&offer.languages),
        text(&offer.job_family),
        text(&offer.industry_sector),
        text(&offer.remote_policy),
        text(&offer.description),
    ]
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InsertReport {
    pub inserted: usize,
    pub ignored: usize,
    pub failed: usize,
}

pub struct ApecData {
    pub offers: JobOfferTable,
    pool: SqlitePool,
}

impl ApecData {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<ApecData, CrawlerError> {
        let opt = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opt).await?;
        let p = ApecData {
            offers: JobOfferTable {
                name: "job_offers".to_string(),
                pool: pool.clone(),
            },
            pool,
        };

        if !utils::is_table_exists(&p.pool, p.offers.get_name()).await? {
            debug!("Create table {}", p.offers.get_name());
            p.offers.create().await?;
        } else {
            debug!("Use table {}", p.offers.get_name());
        }

        Ok(p)
    }

    /// Inserts each offer on its own; duplicates keep the first stored row and
    /// failing rows are logged and skipped.
    pub async fn insert_offers(&self, offers: &[JobOffer]) -> InsertReport {
        let mut report = InsertReport::default();
        for offer in offers {
            match self.offers.insert(offer).await {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.ignored += 1,
                Err(e) => {
                    warn!(
                        "Skip offer {} ({}): {}",
                        sentinel::text(&offer.reference_id),
                        sentinel::text(&offer.url),
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        info!(
            "Stored {} offers in {} ({} duplicates, {} failed)",
            report.inserted,
            self.offers.get_name(),
            report.ignored,
            report.failed
        );
        match self.offers.count().await {
            Ok(total) => info!("{} now holds {} offers", self.offers.get_name(), total),
            Err(e) => warn!("Could not count {}: {}", self.offers.get_name(), e),
        }
        report
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
