pub mod syllabus_handlers;
pub mod tos_handlers;

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::Method,
    middleware::{from_fn, Next},
    web, Error, HttpResponse,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::dto::{DetailResponse, PaginatedResponse};
use crate::errors::AppError;
use crate::models::review_form::{Decision, INVALID_DECISION};
use crate::models::{audit, workflow::DocumentKind};

/// CSRF guard for mutation endpoints.
///
/// Rejects POST/PUT/PATCH/DELETE requests that don't carry
/// `Content-Type: application/json`. GET requests are exempt.
async fn require_json_content_type(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let method = req.method().clone();

    if method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH
        || method == Method::DELETE
    {
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !content_type.starts_with("application/json") {
            log::warn!("{} {} refused: Content-Type {content_type:?}", method, req.path());
            let body = DetailResponse::new(
                "Content-Type must be application/json for mutation requests.",
            );
            let response = HttpResponse::BadRequest().json(body);
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// Malformed JSON bodies answer in the same `{"detail": ...}` shape as every
/// other refusal.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("JSON parse error - {err}")).into()
    })
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(DetailResponse::new("Not found."))
}

/// Configure the syllabus and TOS routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    use syllabus_handlers::{content, read as syllabus_read, workflow as syllabus_workflow};
    use tos_handlers::{crud as tos_crud, read as tos_read, workflow as tos_workflow};

    cfg.app_data(json_config());
    cfg.service(
        web::scope("/syllabi")
            .wrap(from_fn(require_json_content_type))
            .route("/", web::get().to(syllabus_read::list))
            .route("/", web::post().to(content::create))
            .route("/{id}/", web::get().to(syllabus_read::detail))
            .route("/{id}/", web::patch().to(content::update))
            .route("/{id}/actions/", web::get().to(syllabus_read::actions))
            .route("/{id}/syllabus-versions/", web::get().to(syllabus_read::versions))
            .route("/{id}/review-form/", web::get().to(syllabus_read::review_form))
            .route("/{id}/audit-logs/", web::get().to(syllabus_read::audit_logs))
            .route("/{id}/instructors/", web::put().to(content::replace_instructors))
            .route("/{id}/course-outcomes/", web::post().to(content::add_course_outcome))
            .route(
                "/{id}/course-outcomes/{child}/",
                web::patch().to(content::update_course_outcome),
            )
            .route(
                "/{id}/course-outcomes/{child}/",
                web::delete().to(content::delete_course_outcome),
            )
            .route("/{id}/course-outlines/", web::post().to(content::add_course_outline))
            .route(
                "/{id}/course-outlines/reorder/",
                web::post().to(content::reorder_course_outlines),
            )
            .route(
                "/{id}/course-outlines/{child}/",
                web::patch().to(content::update_course_outline),
            )
            .route(
                "/{id}/course-outlines/{child}/",
                web::delete().to(content::delete_course_outline),
            )
            .route("/{id}/copos/", web::post().to(content::add_copo))
            .route("/{id}/copos/{child}/", web::patch().to(content::update_copo))
            .route("/{id}/copos/{child}/", web::delete().to(content::delete_copo))
            .route("/{id}/submit-syllabus/", web::patch().to(syllabus_workflow::submit))
            .route("/{id}/review/", web::post().to(syllabus_workflow::review))
            .route("/{id}/review-syllabus-chair/", web::post().to(syllabus_workflow::review_chair))
            .route("/{id}/review-syllabus-dean/", web::patch().to(syllabus_workflow::review_dean))
            .route("/{id}/replicate-syllabus/", web::post().to(syllabus_workflow::replicate)),
    );
    cfg.service(
        web::scope("/tos")
            .wrap(from_fn(require_json_content_type))
            .route("/", web::get().to(tos_read::list))
            .route("/", web::post().to(tos_crud::create))
            .route("/{id}/", web::get().to(tos_read::detail))
            .route("/{id}/", web::put().to(tos_crud::update_settings))
            .route("/{id}/actions/", web::get().to(tos_read::actions))
            .route("/{id}/tos-versions/", web::get().to(tos_read::versions))
            .route("/{id}/audit-logs/", web::get().to(tos_read::audit_logs))
            .route("/{id}/update-rows/", web::put().to(tos_crud::update_rows))
            .route("/{id}/submit-tos/", web::patch().to(tos_workflow::submit))
            .route("/{id}/review-tos/", web::patch().to(tos_workflow::review))
            .route("/{id}/replicate-tos/", web::post().to(tos_workflow::replicate)),
    );
}

pub(crate) fn parse_decision(raw: &str) -> Result<Decision, AppError> {
    Decision::parse(raw).ok_or_else(|| AppError::BadRequest(INVALID_DECISION.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// One page of a document's audit trail.
pub(crate) async fn audit_page(
    pool: &PgPool,
    kind: DocumentKind,
    id: i64,
    query: &AuditQuery,
) -> Result<HttpResponse, AppError> {
    let page = audit::find_for_target(
        pool,
        kind.target_type(),
        id,
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(25),
    )
    .await?;
    Ok(HttpResponse::Ok().json(PaginatedResponse {
        items: page.entries,
        page: page.page,
        per_page: page.per_page,
        total: page.total_count,
    }))
}
