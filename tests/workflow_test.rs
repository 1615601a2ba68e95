/// End-to-end review workflow over HTTP against a real database.
///
/// Runs under `#[sqlx::test]`; see `tests/common` for the database setup.
use actix_web::ResponseError;
use actix_web::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::PgPool;

use syllaflow::errors::AppError;
use syllaflow::models::workflow::{self, Action, DocumentKind, WorkflowError};
use syllaflow::models::{review_form, syllabus};

#[macro_use]
mod common;
use common::{CHAIR, DEAN, LEADER, TEACHER, create_fixture, create_user, grant_role, outline};

// ---------------------------------------------------------------------------
// Syllabus
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_syllabus_review_cycle(pool: PgPool) {
    common::seed(&pool).await;
    let fx = create_fixture(&pool).await;
    let app = db_app!(pool);

    let id = ready_syllabus!(app, &fx);

    // A term cannot go above 40 hours.
    let (status, body) = call!(
        app,
        Method::POST,
        format!("/syllabi/{id}/course-outlines/"),
        fx.leader_id,
        LEADER,
        outline("FINALS", 1, "Graphs")
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["allotted_hour"][0],
        "Total allotted hours for FINALS cannot exceed 40. Currently at 40."
    );

    // Teachers see the syllabus but cannot submit it.
    let (status, _) = call!(app, Method::GET, format!("/syllabi/{id}/"), fx.teacher_id, TEACHER);
    assert_eq!(status, StatusCode::OK);
    let submit = format!("/syllabi/{id}/submit-syllabus/");
    let (status, _) = call!(app, Method::PATCH, &submit, fx.teacher_id, TEACHER);
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call!(app, Method::PATCH, &submit, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "Pending Chair Review");
    assert!(body["chair_submitted_at"].is_string());

    // Submitting twice is a workflow error.
    let (status, body) = call!(app, Method::PATCH, &submit, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Syllabus cannot be submitted from its current status.");

    let template = review_form::find_active_template(&pool)
        .await
        .expect("query template")
        .expect("seeded template");
    let indicators = template.indicator_ids();
    let chair_review = format!("/syllabi/{id}/review-syllabus-chair/");

    let reject = json!({ "decision": "reject", "srf_no": indicators });
    let (status, body) = call!(app, Method::POST, &chair_review, fx.chair_id, CHAIR, reject);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["non_field_errors"][0], "Cannot reject when all responses are YES.");

    let approve = json!({ "decision": "Approve", "srf_no": indicators });
    let (status, body) = call!(app, Method::POST, &chair_review, fx.chair_id, CHAIR, approve);
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["detail"], "Syllabus approved successfully.");
    assert_eq!(body["syllabus_id"], id);

    let review_form = format!("/syllabi/{id}/review-form/");
    let (status, body) = call!(app, Method::GET, review_form, fx.chair_id, CHAIR);
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reviewed_by_snapshot"], "Carmen Ramos");

    // The dean has to explain a return.
    let dean_review = format!("/syllabi/{id}/review-syllabus-dean/");
    let blank = json!({ "decision": "reject", "feedback_text": "  " });
    let (status, body) = call!(app, Method::PATCH, &dean_review, fx.dean_id, DEAN, blank);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Feedback text is required when rejecting.");

    let feedback = json!({ "decision": "reject", "feedback_text": "Align CO1 with PO a." });
    let (status, body) = call!(app, Method::PATCH, &dean_review, fx.dean_id, DEAN, feedback);
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "Returned by Dean");
    assert_eq!(body["dean_feedback"]["feedback_text"], "Align CO1 with PO a.");

    // Returned documents are read-only.
    let (status, _) = call!(
        app,
        Method::PATCH,
        format!("/syllabi/{id}/"),
        fx.leader_id,
        LEADER,
        json!({ "class_schedules": "MWF" })
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let replicate = format!("/syllabi/{id}/replicate-syllabus/");
    let (status, body) = call!(app, Method::POST, &replicate, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["version"], 2);
    assert_eq!(body["status"], "Requires Revision");
    assert_eq!(body["previous_version"]["id"], id);
    assert_eq!(body["course_outlines"].as_array().map(Vec::len), Some(3));
    let v2 = body["id"].as_i64().expect("new id");

    // The old version is no longer the latest.
    let (status, body) = call!(app, Method::POST, &replicate, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Only the latest version can be replicated.");

    let versions = format!("/syllabi/{v2}/syllabus-versions/");
    let (status, body) = call!(app, Method::GET, versions, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::OK);
    let versions: Vec<i64> = body
        .as_array()
        .expect("version list")
        .iter()
        .filter_map(|v| v["version"].as_i64())
        .collect();
    assert_eq!(versions, vec![2, 1]);
}

#[sqlx::test]
async fn test_second_syllabus_for_group_is_refused(pool: PgPool) {
    common::seed(&pool).await;
    let fx = create_fixture(&pool).await;
    let app = db_app!(pool);

    let body = json!({ "bayanihan_group_id": fx.group_id });
    let (status, _) = call!(app, Method::POST, "/syllabi/", fx.leader_id, LEADER, body.clone());
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call!(app, Method::POST, "/syllabi/", fx.leader_id, LEADER, body);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["non_field_errors"][0],
        "This course already has a syllabus for the selected school year."
    );
}

#[sqlx::test]
async fn test_unheld_role_is_refused(pool: PgPool) {
    common::seed(&pool).await;
    let fx = create_fixture(&pool).await;
    let app = db_app!(pool);

    let body = json!({ "bayanihan_group_id": fx.group_id });
    let (status, body) = call!(app, Method::POST, "/syllabi/", fx.leader_id, DEAN, body);
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "You are not a Dean.");
}

#[sqlx::test]
async fn test_audit_trail_is_paginated(pool: PgPool) {
    common::seed(&pool).await;
    let fx = create_fixture(&pool).await;
    let auditor = create_user(&pool, "Ada", "Torres", None).await;
    grant_role(&pool, auditor, "AUDITOR", None).await;
    let app = db_app!(pool);

    let id = ready_syllabus!(app, &fx);

    let logs = format!("/syllabi/{id}/audit-logs/");
    let (status, _) = call!(app, Method::GET, &logs, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call!(app, Method::GET, format!("{logs}?per_page=2"), auditor, "AUDITOR");
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["per_page"], 2);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    // created, updated, outcome, copo, instructors and three outlines
    assert!(body["total"].as_i64().unwrap_or(0) >= 8, "{body}");
}

#[sqlx::test]
async fn test_stale_transition_is_a_conflict(pool: PgPool) {
    common::seed(&pool).await;
    let fx = create_fixture(&pool).await;
    let app = db_app!(pool);
    let id = ready_syllabus!(app, &fx);

    // Plan a submit from the draft, then let another request submit first.
    let record = syllabus::get_record(&pool, id).await.expect("load syllabus");
    let state = record.state(true).expect("draft state");
    let stale = workflow::plan(&state, Action::Submit).expect("submit is legal for a draft");

    let submit = format!("/syllabi/{id}/submit-syllabus/");
    let (status, body) = call!(app, Method::PATCH, submit, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::OK, "{body}");

    let mut tx = pool.begin().await.expect("begin");
    let result = workflow::queries::apply_transition(
        &mut tx,
        DocumentKind::Syllabus,
        id,
        fx.leader_id,
        &stale,
        Utc::now(),
        json!({}),
    )
    .await;
    let err = result.expect_err("stale plan must not apply");
    assert!(matches!(err, AppError::Workflow(WorkflowError::Conflict)), "{err:?}");
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
    assert_eq!(err.to_string(), "Document was modified by another request.");
    tx.rollback().await.expect("rollback");

    // The winning submit is the only one on record.
    let (submits,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_entries \
         WHERE target_type = 'syllabus' AND target_id = $1 AND action = 'syllabus.submitted'",
    )
    .bind(id)
    .fetch_one(&pool)
    .await
    .expect("count submits");
    assert_eq!(submits, 1);
}

// ---------------------------------------------------------------------------
// TOS
// ---------------------------------------------------------------------------

fn tos_body(syllabus_id: i64, pct: [i32; 4]) -> Value {
    json!({
        "syllabus_id": syllabus_id,
        "term": "MIDTERM",
        "total_items": 40,
        "col1_percentage": pct[0],
        "col2_percentage": pct[1],
        "col3_percentage": pct[2],
        "col4_percentage": pct[3],
        "selected_topics": ["Arrays", "Linked lists"]
    })
}

#[sqlx::test]
async fn test_tos_review_cycle(pool: PgPool) {
    common::seed(&pool).await;
    let fx = create_fixture(&pool).await;
    let app = db_app!(pool);
    let syllabus_id = ready_syllabus!(app, &fx);

    let body = tos_body(syllabus_id, [51, 0, 0, 49]);
    let (status, body) = call!(app, Method::POST, "/tos/", fx.leader_id, LEADER, body);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["non_field_errors"][0], "Knowledge cannot exceed 50%.");

    let body = tos_body(syllabus_id, [20, 20, 20, 39]);
    let (status, body) = call!(app, Method::POST, "/tos/", fx.leader_id, LEADER, body);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["non_field_errors"][0], "Total cognitive levels must equal 100%.");

    // Levels that only sum to 100 after i32 wraparound.
    let body = tos_body(syllabus_id, [50, i32::MAX, i32::MAX, 52]);
    let (status, body) = call!(app, Method::POST, "/tos/", fx.leader_id, LEADER, body);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["non_field_errors"][0], "Total cognitive levels must equal 100%.");

    let body = tos_body(syllabus_id, [20, 20, 30, 30]);
    let (status, body) = call!(app, Method::POST, "/tos/", fx.leader_id, LEADER, body);
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "Draft");
    let tos_id = body["id"].as_i64().expect("tos id");
    let rows = body["tos_rows"].as_array().expect("rows").clone();
    assert_eq!(rows.len(), 2);
    let items: i64 = rows.iter().filter_map(|r| r["no_items"].as_i64()).sum();
    assert_eq!(items, 40);
    // 10 of 40 hours on arrays
    assert_eq!(rows[0]["topic"], "Arrays");
    assert_eq!(rows[0]["no_items"], 10);

    let body = tos_body(syllabus_id, [20, 20, 30, 30]);
    let (status, body) = call!(app, Method::POST, "/tos/", fx.leader_id, LEADER, body);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let expected = format!(
        "A TOS for syllabus {} (2025-2026) and term MIDTERM already exists.",
        fx.course_code
    );
    assert_eq!(body["non_field_errors"][0], expected.as_str());

    let update_rows = format!("/tos/{tos_id}/update-rows/");
    let row_id = rows[0]["id"].as_i64().expect("row id");
    let patch = json!({ "rows": [{ "id": row_id, "no_items": 12 }, { "id": -1, "no_items": 3 }] });
    let (status, body) = call!(app, Method::PUT, &update_rows, fx.leader_id, LEADER, patch);
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updated_rows"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["updated_rows"][0]["no_items"], 12);

    let bad = json!({ "rows": "all" });
    let (status, body) = call!(app, Method::PUT, &update_rows, fx.leader_id, LEADER, bad);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid payload format.");

    let submit = format!("/tos/{tos_id}/submit-tos/");
    let (status, body) = call!(app, Method::PATCH, submit, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "Pending Chair Review");

    let review = format!("/tos/{tos_id}/review-tos/");
    let later = json!({ "decision": "later" });
    let (status, body) = call!(app, Method::PATCH, &review, fx.chair_id, CHAIR, later);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid decision. Must be 'approve' or 'reject'.");

    let reject = json!({ "decision": "reject" });
    let (status, body) = call!(app, Method::PATCH, &review, fx.chair_id, CHAIR, reject);
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "Returned by Chair");

    let empty = json!({ "rows": [] });
    let (status, body) = call!(app, Method::PUT, &update_rows, fx.leader_id, LEADER, empty);
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let replicate = format!("/tos/{tos_id}/replicate-tos/");
    let (status, body) = call!(app, Method::POST, replicate, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["version"], 2);
    assert_eq!(body["status"], "Requires Revision");
    assert_eq!(body["tos_rows"].as_array().map(Vec::len), Some(2));
    let v2 = body["id"].as_i64().expect("new id");

    let submit = format!("/tos/{v2}/submit-tos/");
    let (status, body) = call!(app, Method::PATCH, submit, fx.leader_id, LEADER);
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "Revisions Applied");

    let approve = json!({ "decision": "approve" });
    let review = format!("/tos/{v2}/review-tos/");
    let (status, body) = call!(app, Method::PATCH, review, fx.chair_id, CHAIR, approve);
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "Approved by Chair");
    let actions = body["available_actions"]["actions"].as_array().expect("actions");
    assert!(!actions.contains(&json!("edit")));
    assert!(!actions.contains(&json!("chair_approve")));
}
