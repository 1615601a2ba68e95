use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use super::load_detail;
use crate::auth::scope;
use crate::auth::{Actor, Capability};
use crate::errors::AppError;
use crate::dto::PaginatedResponse;
use crate::handlers::{audit_page, AuditQuery};
use crate::models::listing::ListQuery;
use crate::models::review_form;
use crate::models::syllabus;
use crate::models::workflow::DocumentKind;

/// GET /syllabi/
///
/// Query: `page`, `per_page`, `search`, `status`, `school_year`, `semester`,
/// `year_level`, `program`, `department`.
/// Latest version per group, scoped to the acting role.
pub async fn list(
    pool: web::Data<PgPool>,
    actor: Actor,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let page = syllabus::find_page(&pool, &actor, &query).await?;
    Ok(HttpResponse::Ok().json(PaginatedResponse {
        items: page.items,
        page: page.page,
        per_page: page.per_page,
        total: page.total_count,
    }))
}

/// GET /syllabi/{id}/
pub async fn detail(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::View).await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// GET /syllabi/{id}/actions/
pub async fn actions(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::View).await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Ok().json(detail.available_actions))
}

/// GET /syllabi/{id}/syllabus-versions/
pub async fn versions(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::View).await?;

    let versions = syllabus::find_versions(&pool, scope.group_id).await?;
    if versions.is_empty() {
        return Err(AppError::Missing("No versions found for this syllabus.".to_string()));
    }
    Ok(HttpResponse::Ok().json(versions))
}

/// GET /syllabi/{id}/review-form/
pub async fn review_form(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::View).await?;

    let form = review_form::find_for_syllabus(&pool, id)
        .await?
        .ok_or_else(|| AppError::Missing("No review form found for this syllabus.".to_string()))?;
    Ok(HttpResponse::Ok().json(form))
}

/// GET /syllabi/{id}/audit-logs/?page=&per_page=
pub async fn audit_logs(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    query: web::Query<AuditQuery>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Audit).await?;

    audit_page(&pool, DocumentKind::Syllabus, id, &query).await
}
