use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use super::load_detail;
use crate::auth::scope;
use crate::auth::{Actor, Capability};
use crate::errors::{AppError, ValidationErrors};
use crate::models::bayanihan;
use crate::models::syllabus;
use crate::models::tos::{
    self, validation, NewTos, RowPatch, RowsUpdated, TosOwner, TosTerm, TosUpdate,
};

const INVALID_PAYLOAD: &str = "Invalid payload format.";

/// POST /tos/
/// Validates the settings, allocates items over the selected outline topics
/// and stores a Draft version 1.
pub async fn create(
    pool: web::Data<PgPool>,
    actor: Actor,
    body: web::Json<NewTos>,
) -> Result<HttpResponse, AppError> {
    let new = body.into_inner();
    let term = new
        .term
        .parse::<TosTerm>()
        .map_err(|msg| ValidationErrors::field("term", msg))?;
    let source = syllabus::find_record(&pool, new.syllabus_id).await?.ok_or_else(|| {
        ValidationErrors::field(
            "syllabus_id",
            format!("Invalid pk \"{}\" - object does not exist.", new.syllabus_id),
        )
    })?;
    let scope = syllabus::get_scope(&pool, source.id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    validation::validate_settings(&new.settings, &new.selected_topics)?;
    let topics = tos::outline_topics(&pool, source.id, term, &new.selected_topics).await?;
    let (expected, rows) = tos::allocate(&new.settings, &topics)?;

    let ctx = bayanihan::find_context(&pool, source.bayanihan_group_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner = TosOwner {
        syllabus_id: source.id,
        user_id: actor.user_id,
        bayanihan_group_id: source.bayanihan_group_id,
        course_id: source.course_id,
        program_id: source.program_id,
    };

    let mut tx = pool.begin().await?;
    if tos::exists_for(&mut tx, source.id, term).await? {
        let message = validation::duplicate_message(&ctx.course_code, &ctx.school_year, term);
        return Err(ValidationErrors::general(message).into());
    }
    let id = tos::create(&mut tx, &owner, term, &new.settings, expected, &rows).await?;
    let details = serde_json::json!({
        "syllabus_id": source.id,
        "term": term,
        "total_items": new.settings.total_items,
        "rows": rows.len(),
        "summary": format!("Created {term} TOS #{id} for {}", ctx.course_code)
    });
    crate::audit::log(&mut *tx, actor.user_id, "tos.created", "tos", id, details).await?;
    tx.commit().await?;
    log::info!("tos {id} ({term}) created by user {}", actor.user_id);

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Created().json(detail))
}

/// PUT /tos/{id}/
/// Replaces the settings and rebuilds every row. The term stays fixed.
pub async fn update_settings(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<TosUpdate>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    let update = body.into_inner();
    validation::validate_settings(&update.settings, &update.selected_topics)?;
    let record = tos::get_record(&pool, id).await?;
    let term = record.term.parse::<TosTerm>().map_err(AppError::BadRequest)?;
    let topics = tos::outline_topics(&pool, record.syllabus_id, term, &update.selected_topics)
        .await?;
    let (expected, rows) = tos::allocate(&update.settings, &topics)?;

    let mut tx = pool.begin().await?;
    tos::lock_editable(&mut tx, id).await?;
    tos::replace_settings(&mut tx, id, &update.settings, expected, &rows).await?;
    let details = serde_json::json!({
        "settings": &update.settings,
        "selected_topics": &update.selected_topics,
        "rows": rows.len()
    });
    crate::audit::log(&mut *tx, actor.user_id, "tos.updated", "tos", id, details).await?;
    tx.commit().await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// PUT /tos/{id}/update-rows/
/// Body: `{"rows": [{"id": 3, "no_items": 4, ...}]}`. Ids that are not rows
/// of this TOS are skipped.
pub async fn update_rows(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    let rows = body
        .get("rows")
        .filter(|rows| rows.is_array())
        .cloned()
        .ok_or_else(|| AppError::BadRequest(INVALID_PAYLOAD.to_string()))?;
    let patches: Vec<RowPatch> = serde_json::from_value(rows)
        .map_err(|_| AppError::BadRequest(INVALID_PAYLOAD.to_string()))?;

    let mut tx = pool.begin().await?;
    tos::lock_editable(&mut tx, id).await?;
    let updated_rows = tos::update_rows(&mut tx, id, &patches).await?;
    let details = serde_json::json!({
        "requested": patches.len(),
        "updated": updated_rows.iter().map(|r| r.id).collect::<Vec<_>>()
    });
    crate::audit::log(&mut *tx, actor.user_id, "tos.rows_updated", "tos", id, details).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(RowsUpdated { updated_rows }))
}
