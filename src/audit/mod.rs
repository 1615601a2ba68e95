use serde_json::Value;
use sqlx::PgPool;

use crate::errors::AppError;

/// Record one audit entry. Works against the pool or an open transaction, so
/// workflow transitions can audit atomically with the change they describe.
pub async fn log<'e, E>(
    executor: E,
    user_id: i64,
    action: &str,
    target_type: &str,
    target_id: i64,
    details: Value,
) -> Result<(), AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO audit_entries (user_id, action, target_type, target_id, details) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(details)
    .execute(executor)
    .await?;
    Ok(())
}

/// Purge entries older than the retention window. `retention_days == 0`
/// keeps everything.
pub async fn cleanup_old_entries(pool: &PgPool, retention_days: i64) -> Result<u64, AppError> {
    if retention_days == 0 {
        log::info!("Audit retention disabled, skipping cleanup");
        return Ok(0);
    }
    let result = sqlx::query(
        "DELETE FROM audit_entries WHERE created_at < now() - make_interval(days => $1)",
    )
    .bind(retention_days as i32)
    .execute(pool)
    .await?;
    let removed = result.rows_affected();
    if removed > 0 {
        log::info!("Removed {removed} audit entries older than {retention_days} days");
    }
    Ok(removed)
}
