use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use super::types::*;
use crate::errors::AppError;

pub const NO_ACTIVE_TEMPLATE: &str =
    "No active review form template found. Please tell Admin to create a template.";

/// The active template with the highest revision, with its items in order.
pub async fn find_active_template(pool: &PgPool) -> Result<Option<ReviewFormTemplate>, AppError> {
    #[derive(sqlx::FromRow)]
    struct TemplateRow {
        id: i64,
        code_no: String,
        title: String,
        description: String,
        revision_no: i32,
        effective_date: Option<NaiveDate>,
    }

    #[derive(sqlx::FromRow)]
    struct ItemRow {
        id: i64,
        item_type: String,
        text: String,
        item_order: i32,
        syllabus_section: Option<String>,
    }

    let Some(t) = sqlx::query_as::<_, TemplateRow>(
        "SELECT id, code_no, title, description, revision_no, effective_date \
         FROM review_form_templates WHERE is_active \
         ORDER BY revision_no DESC, id DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, ItemRow>(
        "SELECT id, item_type, text, item_order, syllabus_section \
         FROM review_form_items WHERE form_template_id = $1 \
         ORDER BY item_order, id",
    )
    .bind(t.id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| ReviewFormItem {
        id: row.id,
        item_type: if row.item_type == "part" {
            ItemType::Part
        } else {
            ItemType::Indicator
        },
        text: row.text,
        order: row.item_order,
        syllabus_section: row.syllabus_section,
    })
    .collect();

    Ok(Some(ReviewFormTemplate {
        id: t.id,
        code_no: t.code_no,
        title: t.title,
        description: t.description,
        revision_no: t.revision_no,
        effective_date: t.effective_date,
        items,
    }))
}

/// The submitted review form of a syllabus version, if the chair reviewed it.
pub async fn find_for_syllabus(
    pool: &PgPool,
    syllabus_id: i64,
) -> Result<Option<SrfForm>, AppError> {
    #[derive(sqlx::FromRow)]
    struct FormRow {
        id: i64,
        syllabus_id: i64,
        form_template_id: i64,
        code_no: String,
        title: String,
        user_id: i64,
        reviewed_by_snapshot: String,
        action: i16,
        review_date: DateTime<Utc>,
    }

    #[derive(sqlx::FromRow)]
    struct IndicatorRow {
        id: i64,
        item_id: i64,
        item_text: String,
        item_order: i32,
        response: Option<String>,
        remarks: String,
    }

    let Some(form) = sqlx::query_as::<_, FormRow>(
        "SELECT f.id, f.syllabus_id, f.form_template_id, t.code_no, t.title, f.user_id, \
                f.reviewed_by_snapshot, f.action, f.review_date \
         FROM srf_forms f \
         JOIN review_form_templates t ON t.id = f.form_template_id \
         WHERE f.syllabus_id = $1",
    )
    .bind(syllabus_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let indicators = sqlx::query_as::<_, IndicatorRow>(
        "SELECT i.id, i.item_id, it.text AS item_text, it.item_order, i.response, i.remarks \
         FROM srf_indicators i \
         JOIN review_form_items it ON it.id = i.item_id \
         WHERE i.review_form_id = $1 \
         ORDER BY it.item_order, i.id",
    )
    .bind(form.id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| SrfIndicator {
        id: row.id,
        item_id: row.item_id,
        item_text: row.item_text,
        item_order: row.item_order,
        response: row.response.as_deref().and_then(|r| r.parse().ok()),
        remarks: row.remarks,
    })
    .collect();

    Ok(Some(SrfForm {
        id: form.id,
        syllabus_id: form.syllabus_id,
        form_template_id: form.form_template_id,
        code_no: form.code_no,
        title: form.title,
        user_id: form.user_id,
        reviewed_by_snapshot: form.reviewed_by_snapshot,
        action: Decision::from_action_code(form.action),
        review_date: form.review_date,
        indicators,
    }))
}

/// Persist a chair review and its indicator lines. Replaces any previous
/// form for the same syllabus version.
pub async fn insert_srf_form(
    conn: &mut PgConnection,
    new: &NewSrfForm<'_>,
) -> Result<i64, AppError> {
    sqlx::query("DELETE FROM srf_forms WHERE syllabus_id = $1")
        .bind(new.syllabus_id)
        .execute(&mut *conn)
        .await?;

    let (form_id,): (i64,) = sqlx::query_as(
        "INSERT INTO srf_forms \
             (syllabus_id, form_template_id, user_id, reviewed_by_snapshot, action) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(new.syllabus_id)
    .bind(new.form_template_id)
    .bind(new.user_id)
    .bind(new.reviewed_by_snapshot)
    .bind(new.decision.action_code())
    .fetch_one(&mut *conn)
    .await?;

    for entry in new.entries {
        sqlx::query(
            "INSERT INTO srf_indicators (review_form_id, item_id, response, remarks) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(form_id)
        .bind(entry.id)
        .bind(entry.response.map(Response::as_str))
        .bind(entry.remarks.trim())
        .execute(&mut *conn)
        .await?;
    }

    Ok(form_id)
}
