use sqlx::PgPool;

use super::types::UserSummary;
use crate::errors::AppError;

const SELECT_USER: &str = "\
    SELECT u.id, u.username, u.prefix, u.first_name, u.last_name, u.suffix, u.signature \
    FROM users u";

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<UserSummary>, AppError> {
    let sql = format!("{SELECT_USER} WHERE u.id = $1");
    let user = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<UserSummary>, AppError> {
    let sql = format!(
        "{SELECT_USER} WHERE u.id = ANY($1) ORDER BY u.last_name, u.first_name, u.id"
    );
    let users = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(users)
}

/// The chairperson assigned to a department, if any.
pub async fn find_department_chair(
    pool: &PgPool,
    department_id: i64,
) -> Result<Option<UserSummary>, AppError> {
    let sql = format!(
        "{SELECT_USER} \
         JOIN user_roles r ON r.user_id = u.id \
         WHERE r.role = 'CHAIRPERSON' AND r.entity_type = 'Department' AND r.entity_id = $1 \
         ORDER BY r.id LIMIT 1"
    );
    let user = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(department_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// The dean assigned to a college, if any.
pub async fn find_college_dean(
    pool: &PgPool,
    college_id: i64,
) -> Result<Option<UserSummary>, AppError> {
    let sql = format!(
        "{SELECT_USER} \
         JOIN user_roles r ON r.user_id = u.id \
         WHERE r.role = 'DEAN' AND r.entity_type = 'College' AND r.entity_id = $1 \
         ORDER BY r.id LIMIT 1"
    );
    let user = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(college_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}
