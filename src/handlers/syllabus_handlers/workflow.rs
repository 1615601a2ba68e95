use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;

use super::load_detail;
use crate::auth::scope;
use crate::auth::{Actor, Capability};
use crate::errors::AppError;
use crate::handlers::parse_decision;
use crate::models::review_form::checklist::{self, ChecklistEntry};
use crate::models::review_form::{
    self, ChairReviewOutcome, ChairReviewRequest, Decision, DeanReviewRequest, NewSrfForm,
    ReviewRequest,
};
use crate::models::syllabus::{self, readiness};
use crate::models::user;
use crate::models::workflow::{self, Action, DocumentKind};

const SUBMIT_DENIED: &str = "You do not have permission to submit this syllabus.";
const CHAIR_DENIED: &str = "You do not have permission to review this syllabus.";
const DEAN_DENIED: &str = "You do not have permission to review this syllabus as Dean.";
const REPLICATE_DENIED: &str = "You do not have permission to replicate this syllabus.";
const NO_CHAIR: &str = "No Chairperson is assigned to this Department.";
const INVALID_ACTION: &str = "Invalid action. Must be 0 (reject) or 1 (approve).";

/// PATCH /syllabi/{id}/submit-syllabus/
/// Runs the readiness checks, then hands the syllabus to the chair.
pub async fn submit(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::ensure_document_capability(&pool, &actor, &scope, Capability::Edit, SUBMIT_DENIED)
        .await?;

    let detail = syllabus::find_detail(&pool, id).await?.ok_or(AppError::NotFound)?;
    let state = detail.state()?;
    let transition = workflow::plan(&state, Action::Submit)?;
    readiness::check_submission(&detail)?;

    let mut tx = pool.begin().await?;
    let details = serde_json::json!({
        "version": state.version,
        "new_status": transition.to,
        "summary": format!("Submitted syllabus #{id} for chair review")
    });
    workflow::queries::apply_transition(
        &mut tx,
        DocumentKind::Syllabus,
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

/// Shared by both chair review payload shapes: check the checklist against
/// the active template, then store the review form and the transition
/// together.
async fn chair_review(
    pool: &PgPool,
    actor: &Actor,
    id: i64,
    decision: Decision,
    submitted: &[ChecklistEntry],
) -> Result<HttpResponse, AppError> {
    let scope = syllabus::get_scope(pool, id).await?;
    scope::ensure_document_capability(pool, actor, &scope, Capability::ReviewChair, CHAIR_DENIED)
        .await?;

    // The form is signed by the department's chair, even when an admin files it.
    let chair = user::find_department_chair(pool, scope.department_id)
        .await?
        .ok_or_else(|| AppError::PermissionDenied(NO_CHAIR.to_string()))?;
    let template = review_form::find_active_template(pool)
        .await?
        .ok_or_else(|| AppError::BadRequest(review_form::NO_ACTIVE_TEMPLATE.to_string()))?;

    let record = syllabus::get_record(pool, id).await?;
    let state = record.state(syllabus::is_latest(pool, &record).await?)?;
    let action = match decision {
        Decision::Approve => Action::ChairApprove,
        Decision::Reject => Action::ChairReturn,
    };
    let transition = workflow::plan(&state, action)?;

    let entries = checklist::against_template(submitted, &template.indicator_ids())?;
    checklist::validate_checklist(&entries, decision)?;

    let reviewed_by = chair.display_name();
    let mut tx = pool.begin().await?;
    let srf_form_id = review_form::insert_srf_form(
        &mut tx,
        &NewSrfForm {
            syllabus_id: id,
            form_template_id: template.id,
            user_id: chair.id,
            reviewed_by_snapshot: &reviewed_by,
            decision,
            entries: &entries,
        },
    )
    .await?;
    let details = serde_json::json!({
        "decision": decision,
        "srf_form_id": srf_form_id,
        "reviewed_by": &reviewed_by,
        "new_status": transition.to
    });
    workflow::queries::apply_transition(
        &mut tx,
        DocumentKind::Syllabus,
        id,
        actor.user_id,
        &transition,
        Utc::now(),
        details,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(ChairReviewOutcome {
        detail: format!("Syllabus {} successfully.", decision.past_tense()),
        srf_form_id,
        syllabus_id: id,
    }))
}

/// POST /syllabi/{id}/review-syllabus-chair/
pub async fn review_chair(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<ChairReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let decision = parse_decision(&body.decision)?;
    let entries = checklist::from_wire(
        &body.srf_no,
        body.srf_yes_no.as_deref(),
        body.srf_remarks.as_deref(),
    )?;
    chair_review(&pool, &actor, id, decision, &entries).await
}

/// POST /syllabi/{id}/review/
/// Same review, with the checklist as `{item, response, remarks}` objects.
pub async fn review(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<ReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let decision = Decision::from_action_code(body.action)
        .ok_or_else(|| AppError::BadRequest(INVALID_ACTION.to_string()))?;
    let entries: Vec<ChecklistEntry> = body
        .checklist
        .iter()
        .map(|item| ChecklistEntry::new(item.item, item.response, item.remarks.clone()))
        .collect();
    chair_review(&pool, &actor, id, decision, &entries).await
}

/// PATCH /syllabi/{id}/review-syllabus-dean/
pub async fn review_dean(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
    body: web::Json<DeanReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::ensure_document_capability(&pool, &actor, &scope, Capability::ReviewDean, DEAN_DENIED)
        .await?;

    let decision = parse_decision(&body.decision)?;
    checklist::validate_dean_feedback(decision, body.feedback_text.as_deref())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let record = syllabus::get_record(&pool, id).await?;
    let state = record.state(syllabus::is_latest(&pool, &record).await?)?;
    let action = match decision {
        Decision::Approve => Action::DeanApprove,
        Decision::Reject => Action::DeanReturn,
    };
    let transition = workflow::plan(&state, action)?;

    let mut tx = pool.begin().await?;
    if decision == Decision::Reject {
        let text = body.feedback_text.as_deref().unwrap_or_default().trim();
        syllabus::upsert_dean_feedback(&mut tx, id, actor.user_id, text).await?;
    }
    let details = serde_json::json!({
        "decision": decision,
        "new_status": transition.to,
        "feedback_text": &body.feedback_text
    });
    workflow::queries::apply_transition(
        &mut tx,
        DocumentKind::Syllabus,
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

/// POST /syllabi/{id}/replicate-syllabus/
/// Starts the next version of a returned syllabus.
pub async fn replicate(
    pool: web::Data<PgPool>,
    actor: Actor,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let scope = syllabus::get_scope(&pool, id).await?;
    scope::ensure_document_capability(&pool, &actor, &scope, Capability::Edit, REPLICATE_DENIED)
        .await?;

    let record = syllabus::get_record(&pool, id).await?;
    let state = record.state(syllabus::is_latest(&pool, &record).await?)?;
    let transition = workflow::plan(&state, Action::Replicate)?;

    let mut tx = pool.begin().await?;
    let details = serde_json::json!({
        "source_version": record.version,
        "new_version": record.version + 1
    });
    workflow::queries::apply_transition(
        &mut tx,
        DocumentKind::Syllabus,
        id,
        actor.user_id,
        &transition,
        Utc::now(),
        details,
    )
    .await?;
    let new_id = syllabus::replicate(&mut tx, &record).await?;
    let details = serde_json::json!({ "replicated_from": id, "version": record.version + 1 });
    crate::audit::log(
        &mut *tx,
        actor.user_id,
        "syllabus.created",
        "syllabus",
        new_id,
        details,
    )
    .await?;
    tx.commit().await?;

    let detail = load_detail(&pool, &actor, &scope, new_id).await?;
    Ok(HttpResponse::Created().json(detail))
}
