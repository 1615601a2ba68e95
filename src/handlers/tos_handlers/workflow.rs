use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;

use super::load_detail;
use crate::auth::scope;
use crate::auth::{Actor, Capability};
use crate::errors::AppError;
use crate::handlers::parse_decision;
use crate::models::review_form::{Decision, DecisionRequest};
use crate::models::tos;
use crate::models::workflow::{self, Action, DocumentKind};

const SUBMIT_DENIED: &str = "You do not have permission to submit this TOS.";
const REVIEW_DENIED: &str = "You do not have permission to review this TOS as Chairperson.";
const REPLICATE_DENIED: &str = "You do not have permission to replicate this TOS.";

/// PATCH /tos/{id}/submit-tos/
pub async fn submit(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::ensure_document_capability(&pool, &actor, &scope, Capability::Edit, SUBMIT_DENIED)
        .await?;

    let record = tos::get_record(&pool, id).await?;
    let state = record.state(tos::is_latest(&pool, &record).await?)?;
    let transition = workflow::plan(&state, Action::Submit)?;

    let mut tx = pool.begin().await?;
    let details = serde_json::json!({
        "term": &record.term,
        "version": record.version,
        "new_status": transition.to
    });
    workflow::queries::apply_transition(
        &mut tx,
        DocumentKind::Tos,
        id,
        actor.user_id,
        &transition,
        Utc::now(),
        details,
    )
    .await?;
    tx.commit().await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// PATCH /tos/{id}/review-tos/
/// Body: `{"decision": "approve" | "reject"}`.
pub async fn review(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<DecisionRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::ensure_document_capability(
        &pool,
        &actor,
        &scope,
        Capability::ReviewChair,
        REVIEW_DENIED,
    )
    .await?;

    let decision = parse_decision(&body.decision)?;
    let record = tos::get_record(&pool, id).await?;
    let state = record.state(tos::is_latest(&pool, &record).await?)?;
    let action = match decision {
        Decision::Approve => Action::ChairApprove,
        Decision::Reject => Action::ChairReturn,
    };
    let transition = workflow::plan(&state, action)?;

    let mut tx = pool.begin().await?;
    let details = serde_json::json!({ "decision": decision, "new_status": transition.to });
    workflow::queries::apply_transition(
        &mut tx,
        DocumentKind::Tos,
        id,
        actor.user_id,
        &transition,
        Utc::now(),
        details,
    )
    .await?;
    tx.commit().await?;

    let detail = load_detail(&pool, &actor, &scope, id).await?;
    Ok(HttpResponse::Created().json(detail))
}

/// POST /tos/{id}/replicate-tos/
pub async fn replicate(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = tos::get_scope(&pool, id).await?;
    scope::ensure_document_capability(&pool, &actor, &scope, Capability::Edit, REPLICATE_DENIED)
        .await?;

    let record = tos::get_record(&pool, id).await?;
    let state = record.state(tos::is_latest(&pool, &record).await?)?;
    let transition = workflow::plan(&state, Action::Replicate)?;

    let mut tx = pool.begin().await?;
    let details = serde_json::json!({
        "term": &record.term,
        "source_version": record.version,
        "new_version": record.version + 1
    });
    workflow::queries::apply_transition(
        &mut tx,
        DocumentKind::Tos,
        id,
        actor.user_id,
        &transition,
        Utc::now(),
        details,
    )
    .await?;
    let new_id = tos::replicate(&mut tx, &record).await?;
    let details = serde_json::json!({ "replicated_from": id, "version": record.version + 1 });
    crate::audit::log(&mut *tx, actor.user_id, "tos.created", "tos", new_id, details).await?;
    tx.commit().await?;

    let detail = load_detail(&pool, &actor, &scope, new_id).await?;
    Ok(HttpResponse::Created().json(detail))
}
