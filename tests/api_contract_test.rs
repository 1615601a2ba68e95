/// HTTP contract tests for requests refused before any database access:
/// identity parsing, the JSON Content-Type guard and the JSON 404.
use actix_web::{App, http::StatusCode, test, web};
use serde_json::Value;

use syllaflow::handlers;

mod common;

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(common::lazy_pool()))
                .configure(handlers::configure)
                .default_service(web::to(handlers::not_found)),
        )
        .await
    };
}

#[tokio::test]
async fn test_missing_user_header_is_401() {
    let app = app!();
    let req = test::TestRequest::get().uri("/syllabi/1/?role=DEAN").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_role_is_403_with_detail() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/tos/3/actions/")
        .insert_header(("X-User-Id", "5"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Role parameter is required.");
}

#[tokio::test]
async fn test_unknown_role_is_403() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/syllabi/1/?role=registrar")
        .insert_header(("X-User-Id", "5"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Invalid role parameter.");
}

#[tokio::test]
async fn test_mutation_without_json_content_type_is_400() {
    let app = app!();
    for (method, uri) in [
        (actix_web::http::Method::PATCH, "/syllabi/1/submit-syllabus/?role=BAYANIHAN_LEADER"),
        (actix_web::http::Method::POST, "/tos/?role=BAYANIHAN_LEADER"),
        (actix_web::http::Method::PUT, "/tos/2/update-rows/?role=BAYANIHAN_LEADER"),
    ] {
        let req = test::TestRequest::default()
            .method(method.clone())
            .uri(uri)
            .insert_header(("X-User-Id", "5"))
            .insert_header(("Content-Type", "text/plain"))
            .set_payload("decision=approve")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{method} {uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["detail"],
            "Content-Type must be application/json for mutation requests."
        );
    }
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = app!();
    let req = test::TestRequest::get().uri("/courses/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "detail": "Not found." }));
}
