//! Shared test infrastructure.
//!
//! Database-backed tests run under `#[sqlx::test]`, which needs
//! `DATABASE_URL` pointing at a Postgres server the test user may create
//! databases on. Each test gets a fresh database with `migrations/` applied.

#![allow(dead_code, unused_macros)]

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::{Value, json};
use syllaflow::db;

// ============================================================================
// HTTP HELPERS
// ============================================================================

/// The full route table over `$pool`.
macro_rules! db_app {
    ($pool:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($pool.clone()))
                .configure(syllaflow::handlers::configure)
                .default_service(actix_web::web::to(syllaflow::handlers::not_found)),
        )
        .await
    };
}

/// Send a request as `user` acting as `role`, returning status and JSON body.
macro_rules! call {
    ($app:expr, $method:expr, $uri:expr, $user:expr, $role:expr) => {
        call!($app, $method, $uri, $user, $role, serde_json::json!({}))
    };
    ($app:expr, $method:expr, $uri:expr, $user:expr, $role:expr, $body:expr) => {{
        let uri = $uri;
        let sep = if uri.contains('?') { '&' } else { '?' };
        let req = actix_web::test::TestRequest::default()
            .method($method)
            .uri(&format!("{uri}{sep}role={}", $role))
            .insert_header(("X-User-Id", $user.to_string()))
            .set_json($body)
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        let status = resp.status();
        let bytes = actix_web::test::read_body(resp).await;
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
        (status, body)
    }};
}

/// Create a syllabus and fill it until it passes every submission check:
/// MIDTERM holds Arrays (10 h) and Linked lists (30 h), FINALS holds Trees (40 h).
macro_rules! ready_syllabus {
    ($app:expr, $fx:expr) => {{
        use actix_web::http::{Method, StatusCode};
        use $crate::common::{LEADER, outline};

        let fx: &$crate::common::Fixture = $fx;
        let group = serde_json::json!({ "bayanihan_group_id": fx.group_id });
        let (status, body) = call!($app, Method::POST, "/syllabi/", fx.leader_id, LEADER, group);
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["status"], "Draft");
        assert_eq!(body["version"], 1);
        let id = body["id"].as_i64().expect("syllabus id");

        let submit = format!("/syllabi/{id}/submit-syllabus/");
        let (status, body) = call!($app, Method::PATCH, submit, fx.leader_id, LEADER);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["non_field_errors"][0],
            "Please provide the consultation schedule before submitting the syllabus."
        );

        let fields = serde_json::json!({
            "consultation_hours": "Tue 1-3PM",
            "consultation_room": "CS 204",
            "consultation_contact": "cs@example.edu",
            "course_description": "<p>Linear and non-linear structures.</p>"
        });
        let uri = format!("/syllabi/{id}/");
        let (status, body) = call!($app, Method::PATCH, uri, fx.leader_id, LEADER, fields);
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["course_description"], "<p>Linear and non-linear structures.</p>");

        let (status, co) = call!(
            $app,
            Method::POST,
            format!("/syllabi/{id}/course-outcomes/"),
            fx.leader_id,
            LEADER,
            serde_json::json!({ "co_code": "CO1", "co_description": "Implement basic structures" })
        );
        assert_eq!(status, StatusCode::CREATED, "{co}");
        let copo = serde_json::json!({
            "course_outcome_id": co["id"],
            "program_outcome_id": fx.program_outcome_id,
            "syllabus_co_po_code": "i"
        });
        let uri = format!("/syllabi/{id}/copos/");
        let (status, body) = call!($app, Method::POST, uri, fx.leader_id, LEADER, copo);
        assert_eq!(status, StatusCode::CREATED, "{body}");

        let (status, body) = call!(
            $app,
            Method::PUT,
            format!("/syllabi/{id}/instructors/"),
            fx.leader_id,
            LEADER,
            serde_json::json!({ "instructor_ids": [fx.teacher_id] })
        );
        assert_eq!(status, StatusCode::OK, "{body}");

        for row in [
            outline("MIDTERM", 10, "Arrays"),
            outline("MIDTERM", 30, "Linked lists"),
            outline("FINALS", 40, "Trees"),
        ] {
            let uri = format!("/syllabi/{id}/course-outlines/");
            let (status, body) = call!($app, Method::POST, uri, fx.leader_id, LEADER, row);
            assert_eq!(status, StatusCode::CREATED, "{body}");
        }
        id
    }};
}

pub const LEADER: &str = "BAYANIHAN_LEADER";
pub const TEACHER: &str = "BAYANIHAN_TEACHER";
pub const CHAIR: &str = "CHAIRPERSON";
pub const DEAN: &str = "DEAN";

pub fn outline(term: &str, hours: i32, topic: &str) -> Value {
    json!({ "syllabus_term": term, "allotted_hour": hours, "topics": topic })
}

// ============================================================================
// DATABASE SETUP
// ============================================================================

/// Seed the review form template into a freshly migrated test database.
pub async fn seed(pool: &PgPool) {
    let _ = env_logger::builder().is_test(true).try_init();
    db::seed_review_form(pool).await.expect("seed review form");
}

/// A pool that never connects, for requests refused before any query.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .connect_lazy("postgres://syllaflow@127.0.0.1:1/unused")
        .expect("lazy pool")
}

fn unique(prefix: &str) -> String {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{}_{n}_{}", std::process::id(), rand::random::<u32>())
}

// ============================================================================
// FIXTURES
// ============================================================================

/// One course with its group, leader, chair and dean.
pub struct Fixture {
    pub college_id: i64,
    pub department_id: i64,
    pub program_id: i64,
    pub program_outcome_id: i64,
    pub group_id: i64,
    pub course_code: String,
    pub leader_id: i64,
    pub teacher_id: i64,
    pub chair_id: i64,
    pub dean_id: i64,
}

pub async fn create_user(pool: &PgPool, first: &str, last: &str, signature: Option<&str>) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (username, first_name, last_name, signature) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(unique("user"))
    .bind(first)
    .bind(last)
    .bind(signature)
    .fetch_one(pool)
    .await
    .expect("insert user");
    id
}

pub async fn grant_role(pool: &PgPool, user_id: i64, role: &str, entity: Option<(&str, i64)>) {
    sqlx::query(
        "INSERT INTO user_roles (user_id, role, entity_type, entity_id) VALUES ($1, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(role)
    .bind(entity.map(|(t, _)| t))
    .bind(entity.map(|(_, id)| id))
    .execute(pool)
    .await
    .expect("insert user role");
}

async fn insert_id(pool: &PgPool, sql: &str, a: String, b: Option<i64>) -> i64 {
    let mut query = sqlx::query_as::<_, (i64,)>(sql);
    if let Some(b) = b {
        query = query.bind(b);
    }
    let (id,) = query.bind(a).fetch_one(pool).await.expect(sql);
    id
}

pub async fn create_fixture(pool: &PgPool) -> Fixture {
    let college_id = insert_id(
        pool,
        "INSERT INTO colleges (college_description, college_code) VALUES ('College of Computing', $1) RETURNING id",
        unique("CC"),
        None,
    )
    .await;
    let department_id = insert_id(
        pool,
        "INSERT INTO departments (college_id, department_name) VALUES ($1, $2) RETURNING id",
        unique("Computer Science"),
        Some(college_id),
    )
    .await;
    let program_id = insert_id(
        pool,
        "INSERT INTO programs (department_id, program_name) VALUES ($1, $2) RETURNING id",
        unique("BSCS"),
        Some(department_id),
    )
    .await;
    let program_outcome_id = insert_id(
        pool,
        "INSERT INTO program_outcomes (program_id, po_letter, po_description) \
         VALUES ($1, 'a', $2) RETURNING id",
        "Apply computing knowledge".to_string(),
        Some(program_id),
    )
    .await;
    let curriculum_id = insert_id(
        pool,
        "INSERT INTO curricula (program_id, effective_year) VALUES ($1, $2) RETURNING id",
        "2024".to_string(),
        Some(program_id),
    )
    .await;
    let course_code = unique("CS201");
    let course_id = insert_id(
        pool,
        "INSERT INTO courses (curriculum_id, course_code, course_title) \
         VALUES ($1, $2, 'Data Structures') RETURNING id",
        course_code.clone(),
        Some(curriculum_id),
    )
    .await;
    let group_id = insert_id(
        pool,
        "INSERT INTO bayanihan_groups (course_id, school_year) VALUES ($1, $2) RETURNING id",
        "2025-2026".to_string(),
        Some(course_id),
    )
    .await;

    let leader_id = create_user(pool, "Lea", "Reyes", Some("signatures/lea.png")).await;
    let teacher_id = create_user(pool, "Tomas", "Santos", None).await;
    let chair_id = create_user(pool, "Carmen", "Ramos", None).await;
    let dean_id = create_user(pool, "Diego", "Lim", None).await;

    grant_role(pool, leader_id, "BAYANIHAN_LEADER", None).await;
    grant_role(pool, teacher_id, "BAYANIHAN_TEACHER", None).await;
    grant_role(pool, chair_id, "CHAIRPERSON", Some(("Department", department_id))).await;
    grant_role(pool, dean_id, "DEAN", Some(("College", college_id))).await;

    let member_sql =
        "INSERT INTO bayanihan_group_users (group_id, user_id, role) VALUES ($1, $2, $3)";
    for (user_id, role) in [(leader_id, "LEADER"), (teacher_id, "TEACHER")] {
        sqlx::query(member_sql)
            .bind(group_id)
            .bind(user_id)
            .bind(role)
            .execute(pool)
            .await
            .expect("insert group member");
    }

    Fixture {
        college_id,
        department_id,
        program_id,
        program_outcome_id,
        group_id,
        course_code,
        leader_id,
        teacher_id,
        chair_id,
        dean_id,
    }
}
