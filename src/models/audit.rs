use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub action: String,
    pub target_type: String,
    pub target_id: i64,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub struct AuditEntryPage {
    pub entries: Vec<AuditEntry>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
}

/// Audit entries for one document, newest first.
pub async fn find_for_target(
    pool: &PgPool,
    target_type: &str,
    target_id: i64,
    page: i64,
    per_page: i64,
) -> Result<AuditEntryPage, AppError> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let (total_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_entries WHERE target_type = $1 AND target_id = $2",
    )
    .bind(target_type)
    .bind(target_id)
    .fetch_one(pool)
    .await?;

    let entries = sqlx::query_as::<_, AuditEntry>(
        "SELECT a.id, a.user_id, COALESCE(u.username, 'unknown') AS username, \
                a.action, a.target_type, a.target_id, a.details, a.created_at \
         FROM audit_entries a \
         LEFT JOIN users u ON u.id = a.user_id \
         WHERE a.target_type = $1 AND a.target_id = $2 \
         ORDER BY a.created_at DESC, a.id DESC \
         LIMIT $3 OFFSET $4",
    )
    .bind(target_type)
    .bind(target_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(AuditEntryPage {
        entries,
        page,
        per_page,
        total_count,
    })
}
