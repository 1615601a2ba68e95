use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use super::load_detail;
use crate::auth::scope::{self, DocumentScope};
use crate::auth::{Actor, Capability};
use crate::errors::AppError;
use crate::models::bayanihan;
use crate::dto::DetailResponse;
use crate::models::syllabus::{
    self, CoPoUpdate, CourseOutcomeUpdate, CourseOutlineUpdate, InstructorsUpdate, NewCoPo,
    NewCourseOutcome, NewCourseOutline, NewSyllabus, OutlineOrder, SyllabusFieldsUpdate,
};

/// POST /syllabi/
/// Creates version 1 of a group's syllabus in Draft.
pub async fn create(
    pool: web::Data<PgPool>,
    actor: Actor,
    body: web::Json<NewSyllabus>,
) -> Result<HttpResponse, AppError> {
    let new = body.into_inner();
    let ctx = bayanihan::find_context(&pool, new.bayanihan_group_id)
        .await?
        .ok_or_else(|| AppError::Missing("Bayanihan group not found.".to_string()))?;
    let scope = DocumentScope {
        group_id: ctx.group_id,
        department_id: ctx.department_id,
        college_id: ctx.college_id,
    };
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    let id = syllabus::create(&pool, &ctx, &new).await?;

    let details = serde_json::json!({
        "bayanihan_group_id": ctx.group_id,
        "course_code": ctx.course_code,
        "school_year": ctx.school_year,
        "summary": format!("Created syllabus #{id} for {}", ctx.course_code)
    });
    crate::audit::log(
        pool.get_ref(),
        actor.user_id,
        "syllabus.created",
        "syllabus",
        id,
        details,
    )
    .await?;
    log::info!("syllabus {id} created by user {}", actor.user_id);

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Created().json(detail))
}

/// PATCH /syllabi/{id}/
/// Partial update of the descriptive fields.
pub async fn update(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<SyllabusFieldsUpdate>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    let update = body.into_inner();
    if update.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let mut tx = pool.begin().await?;
    syllabus::lock_editable(&mut tx, id).await?;
    syllabus::update_fields(&mut tx, id, &update).await?;
    let details = serde_json::json!({ "changes": &update });
    crate::audit::log(&mut *tx, actor.user_id, "syllabus.updated", "syllabus", id, details).await?;
    tx.commit().await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// PUT /syllabi/{id}/instructors/
pub async fn replace_instructors(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<InstructorsUpdate>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    let mut tx = pool.begin().await?;
    syllabus::lock_editable(&mut tx, id).await?;
    syllabus::replace_instructors(&mut tx, id, &body.instructor_ids).await?;
    let details = serde_json::json!({ "instructor_ids": &body.instructor_ids });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.instructors_updated",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// POST /syllabi/{id}/course-outcomes/
pub async fn add_course_outcome(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<NewCourseOutcome>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    let mut tx = pool.begin().await?;
    syllabus::lock_editable(&mut tx, id).await?;
    let outcome = syllabus::add_course_outcome(&mut tx, id, &body).await?;
    let details = serde_json::json!({
        "course_outcome_id": outcome.id,
        "co_code": &outcome.co_code,
    });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.course_outcome_added",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(outcome))
}

/// POST /syllabi/{id}/course-outlines/
pub async fn add_course_outline(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<NewCourseOutline>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    let mut tx = pool.begin().await?;
    syllabus::lock_editable(&mut tx, id).await?;
    let outline = syllabus::add_course_outline(&mut tx, id, &body).await?;
    let details = serde_json::json!({
        "course_outline_id": outline.id,
        "syllabus_term": &outline.syllabus_term,
        "allotted_hour": outline.allotted_hour
    });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.course_outline_added",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(outline))
}

/// POST /syllabi/{id}/copos/
pub async fn add_copo(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<NewCoPo>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Edit).await?;

    let mut tx = pool.begin().await?;
    syllabus::lock_editable(&mut tx, id).await?;
    let copo = syllabus::add_copo(&mut tx, id, &body).await?;
    let details = serde_json::json!({
        "copo_id": copo.id,
        "course_outcome_id": copo.course_outcome_id,
        "program_outcome_id": copo.program_outcome_id
    });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.copo_added",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(copo))
}

/// Permission check, then a transaction holding the editable row lock.
async fn begin_edit(
    pool: &PgPool,
    actor: &Actor,
    id: i64,
) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, AppError> {
    let scope = syllabus::get_scope(pool, id).await?;
    scope::require_document_capability(pool, actor, &scope, Capability::Edit).await?;
    let mut tx = pool.begin().await?;
    syllabus::lock_editable(&mut tx, id).await?;
    Ok(tx)
}

/// PATCH /syllabi/{id}/course-outcomes/{outcome_id}/
pub async fn update_course_outcome(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<(i64, i64)>,
    body: web::Json<CourseOutcomeUpdate>,
) -> Result<HttpResponse, AppError> {
    let (id, outcome_id) = path.into_inner();
    let mut tx = begin_edit(&pool, &actor, id).await?;
    let outcome = syllabus::update_course_outcome(&mut tx, id, outcome_id, &body).await?;
    let details = serde_json::json!({ "course_outcome_id": outcome_id, "changes": &*body });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.course_outcome_updated",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// DELETE /syllabi/{id}/course-outcomes/{outcome_id}/
pub async fn delete_course_outcome(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let (id, outcome_id) = path.into_inner();
    let mut tx = begin_edit(&pool, &actor, id).await?;
    syllabus::delete_course_outcome(&mut tx, id, outcome_id).await?;
    let details = serde_json::json!({ "course_outcome_id": outcome_id });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.course_outcome_deleted",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

/// PATCH /syllabi/{id}/course-outlines/{outline_id}/
pub async fn update_course_outline(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<(i64, i64)>,
    body: web::Json<CourseOutlineUpdate>,
) -> Result<HttpResponse, AppError> {
    let (id, outline_id) = path.into_inner();
    let mut tx = begin_edit(&pool, &actor, id).await?;
    let outline = syllabus::update_course_outline(&mut tx, id, outline_id, &body).await?;
    let details = serde_json::json!({ "course_outline_id": outline_id, "changes": &*body });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.course_outline_updated",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(outline))
}

/// DELETE /syllabi/{id}/course-outlines/{outline_id}/
pub async fn delete_course_outline(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let (id, outline_id) = path.into_inner();
    let mut tx = begin_edit(&pool, &actor, id).await?;
    syllabus::delete_course_outline(&mut tx, id, outline_id).await?;
    let details = serde_json::json!({ "course_outline_id": outline_id });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.course_outline_deleted",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /syllabi/{id}/course-outlines/reorder/
pub async fn reorder_course_outlines(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<OutlineOrder>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let mut tx = begin_edit(&pool, &actor, id).await?;
    syllabus::reorder_course_outlines(&mut tx, id, &body).await?;
    let details = serde_json::json!({ "order": &body.order });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.course_outlines_reordered",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(DetailResponse::new("Order updated successfully.")))
}

/// PATCH /syllabi/{id}/copos/{copo_id}/
pub async fn update_copo(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<(i64, i64)>,
    body: web::Json<CoPoUpdate>,
) -> Result<HttpResponse, AppError> {
    let (id, copo_id) = path.into_inner();
    let mut tx = begin_edit(&pool, &actor, id).await?;
    let copo = syllabus::update_copo(&mut tx, id, copo_id, &body).await?;
    let details = serde_json::json!({
        "copo_id": copo_id,
        "syllabus_co_po_code": &copo.syllabus_co_po_code,
    });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.copo_updated",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(copo))
}

/// DELETE /syllabi/{id}/copos/{copo_id}/
pub async fn delete_copo(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let (id, copo_id) = path.into_inner();
    let mut tx = begin_edit(&pool, &actor, id).await?;
    syllabus::delete_copo(&mut tx, id, copo_id).await?;
    let details = serde_json::json!({ "copo_id": copo_id });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.copo_deleted",
        "syllabus",
        id,
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}
