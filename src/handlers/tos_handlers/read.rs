use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use super::load_detail;
use crate::auth::scope;
use crate::auth::{Actor, Capability};
use crate::errors::AppError;
use crate::dto::PaginatedResponse;
use crate::handlers::{audit_page, AuditQuery};
use crate::models::listing::ListQuery;
use crate::models::tos;
use crate::models::workflow::DocumentKind;

/// GET /tos/
///
/// Query: `page`, `per_page`, `search`, `status`, `term`, `school_year`,
/// `semester`, `year_level`, `program`, `department`.
/// Latest version per group and term, scoped to the acting role.
pub async fn list(
    pool: web::Data<PgPool>,
    actor: Actor,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let page = tos::find_page(&pool, &actor, &query).await?;
    Ok(HttpResponse::Ok().json(PaginatedResponse {
        items: page.items,
        page: page.page,
        per_page: page.per_page,
        total: page.total_count,
    }))
}

/// GET /tos/{id}/
pub async fn detail(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::View).await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// GET /tos/{id}/actions/
pub async fn actions(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::View).await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Ok().json(detail.available_actions))
}

/// GET /tos/{id}/tos-versions/
/// Versions share the group and the term.
pub async fn versions(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::View).await?;

    let record = tos::get_record(&pool, id).await?;
    let versions = tos::find_versions(&pool, &record).await?;
    if versions.is_empty() {
        return Err(AppError::Missing("No versions found for this TOS.".to_string()));
    }
    Ok(HttpResponse::Ok().json(versions))
}

/// GET /tos/{id}/audit-logs/?page=&per_page=
pub async fn audit_logs(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    query: web::Query<AuditQuery>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::require_document_capability(&pool, &actor, &scope, Capability::Audit).await?;

    audit_page(&pool, DocumentKind::Tos, id, &query).await
}
