use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use super::status::{DocumentKind, Status};
use super::transition::{Transition, WorkflowError};
use crate::errors::AppError;

pub const READ_ONLY: &str = "Document is read-only in its current status.";

fn table(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Syllabus => "syllabi",
        DocumentKind::Tos => "tos",
    }
}

/// Lock a document row for a content edit and confirm its status still
/// allows editing. Must run inside a transaction.
pub async fn lock_editable(
    conn: &mut PgConnection,
    kind: DocumentKind,
    id: i64,
) -> Result<(), AppError> {
    let sql = format!("SELECT status FROM {} WHERE id = $1 FOR UPDATE", table(kind));
    let (raw,): (String,) = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let status = raw.parse::<Status>().map_err(WorkflowError::from)?;
    if !status.is_editable() {
        log::warn!("{} {} is '{}', refusing edit", kind.target_type(), id, status);
        return Err(AppError::BadRequest(READ_ONLY.to_string()));
    }
    Ok(())
}

/// Persist a planned transition on an existing row, and audit it in the same
/// transaction.
///
/// The update is a compare-and-set: it only matches while the row still has
/// the status the plan was made from and the stamped column is still null.
/// Zero matched rows means another request got there first.
///
/// A transition without a stamp (replication) leaves the source row as is;
/// the row is locked and its status re-checked instead.
pub async fn apply_transition(
    conn: &mut PgConnection,
    kind: DocumentKind,
    id: i64,
    user_id: i64,
    transition: &Transition,
    at: DateTime<Utc>,
    details: serde_json::Value,
) -> Result<(), AppError> {
    let matched = match transition.stamp {
        Some(field) => {
            let sql = format!(
                "UPDATE {table} SET status = $1, {col} = $2, updated_at = now() \
                 WHERE id = $3 AND status = $4 AND {col} IS NULL",
                table = table(kind),
                col = field.column(),
            );
            sqlx::query(&sql)
                .bind(transition.to.as_str())
                .bind(at)
                .bind(id)
                .bind(transition.from.as_str())
                .execute(&mut *conn)
                .await?
                .rows_affected()
        }
        None => {
            let sql = format!(
                "SELECT id FROM {} WHERE id = $1 AND status = $2 FOR UPDATE",
                table(kind)
            );
            sqlx::query(&sql)
                .bind(id)
                .bind(transition.from.as_str())
                .fetch_optional(&mut *conn)
                .await?
                .map_or(0, |_| 1)
        }
    };

    if matched != 1 {
        log::warn!(
            "{} {} changed before {:?} could apply (expected '{}')",
            kind.target_type(),
            id,
            transition.action,
            transition.from
        );
        return Err(WorkflowError::Conflict.into());
    }

    crate::audit::log(
        &mut *conn,
        user_id,
        &transition.action.audit_action(kind),
        kind.target_type(),
        id,
        details,
    )
    .await?;

    log::info!(
        "{} {} moved '{}' -> '{}' by user {}",
        kind.target_type(),
        id,
        transition.from,
        transition.to,
        user_id
    );
    notify_reviewers(kind, id, transition.to);
    Ok(())
}

/// Delivery happens outside this service; the line marks who is now expected
/// to act.
fn notify_reviewers(kind: DocumentKind, id: i64, status: Status) {
    let reviewer = match (kind, status) {
        (_, Status::PendingChairReview | Status::RevisionsApplied) => "chairperson",
        (DocumentKind::Syllabus, Status::ApprovedByChair) => "dean",
        _ => return,
    };
    log::info!(
        "reviewer notification: {} {} awaits {} review",
        kind.target_type(),
        id,
        reviewer
    );
}
