use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::fmt;

const REVIEW_FORM_SEED: &str = include_str!("../data/seed/review_form.json");

#[derive(Debug)]
pub enum DbError {
    Connect(sqlx::Error),
    Migrate(sqlx::migrate::MigrateError),
    Seed(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Connect(e) => write!(f, "Database connection failed: {e}"),
            DbError::Migrate(e) => write!(f, "Migration failed: {e}"),
            DbError::Seed(e) => write!(f, "Seeding failed: {e}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        DbError::Connect(e)
    }
}

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(DbError::Migrate)?;
    log::info!("Database migrations complete");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TemplateSeed {
    code_no: String,
    title: String,
    description: String,
    revision_no: i32,
    effective_date: NaiveDate,
    items: Vec<ItemSeed>,
}

#[derive(Debug, Deserialize)]
struct ItemSeed {
    #[serde(rename = "type")]
    item_type: String,
    order: i32,
    syllabus_section: Option<String>,
    text: String,
}

/// Install the default Syllabus Review Form when no template is active.
/// Returns whether anything was created.
pub async fn seed_review_form(pool: &PgPool) -> Result<bool, DbError> {
    let (active,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM review_form_templates WHERE is_active")
            .fetch_one(pool)
            .await?;
    if active > 0 {
        log::info!("Active review form template present ({active}), skipping seed");
        return Ok(false);
    }

    let seed: TemplateSeed = serde_json::from_str(REVIEW_FORM_SEED)
        .map_err(|e| DbError::Seed(format!("Bad review form seed JSON: {e}")))?;

    let mut tx = pool.begin().await?;
    let (template_id,): (i64,) = sqlx::query_as(
        "INSERT INTO review_form_templates \
             (code_no, title, description, revision_no, effective_date, is_active) \
         VALUES ($1, $2, $3, $4, $5, TRUE) \
         ON CONFLICT (code_no, revision_no) DO UPDATE SET is_active = TRUE \
         RETURNING id",
    )
    .bind(&seed.code_no)
    .bind(&seed.title)
    .bind(&seed.description)
    .bind(seed.revision_no)
    .bind(seed.effective_date)
    .fetch_one(&mut *tx)
    .await?;

    let (existing_items,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM review_form_items WHERE form_template_id = $1")
            .bind(template_id)
            .fetch_one(&mut *tx)
            .await?;
    if existing_items == 0 {
        for item in &seed.items {
            sqlx::query(
                "INSERT INTO review_form_items \
                     (form_template_id, item_type, text, item_order, syllabus_section) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(template_id)
            .bind(&item.item_type)
            .bind(&item.text)
            .bind(item.order)
            .bind(&item.syllabus_section)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    log::info!(
        "Seeded review form template {} ({} items)",
        seed.code_no,
        seed.items.len()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_review_form_seed_parses() {
        let seed: TemplateSeed = serde_json::from_str(REVIEW_FORM_SEED).unwrap();
        assert_eq!(seed.code_no, "FM-USTP-ACAD-12");
        let indicators = seed.items.iter().filter(|i| i.item_type == "indicator").count();
        let parts = seed.items.iter().filter(|i| i.item_type == "part").count();
        assert_eq!(parts, 4);
        assert_eq!(indicators, seed.items.len() - parts);
        assert!(seed.items.windows(2).all(|w| w[0].order < w[1].order));
    }
}
