use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::user::UserSummary;

/// A bayanihan group with the course chain it belongs to.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupContext {
    pub group_id: i64,
    pub school_year: String,
    pub course_id: i64,
    pub course_code: String,
    pub course_title: String,
    pub course_semester: String,
    pub course_year_level: String,
    pub curriculum_id: i64,
    pub program_id: i64,
    pub department_id: i64,
    pub college_id: i64,
}

pub async fn find_context(pool: &PgPool, group_id: i64) -> Result<Option<GroupContext>, AppError> {
    let ctx = sqlx::query_as::<_, GroupContext>(
        "SELECT g.id AS group_id, g.school_year, \
                c.id AS course_id, c.course_code, c.course_title, \
                c.course_semester, c.course_year_level, \
                cu.id AS curriculum_id, p.id AS program_id, \
                d.id AS department_id, d.college_id \
         FROM bayanihan_groups g \
         JOIN courses c ON c.id = g.course_id \
         JOIN curricula cu ON cu.id = c.curriculum_id \
         JOIN programs p ON p.id = cu.program_id \
         JOIN departments d ON d.id = p.department_id \
         WHERE g.id = $1",
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await?;
    Ok(ctx)
}

/// The group's LEADER member. Groups have at most one in practice; the
/// earliest assignment wins if data says otherwise.
pub async fn find_leader(pool: &PgPool, group_id: i64) -> Result<Option<UserSummary>, AppError> {
    let leader = sqlx::query_as::<_, UserSummary>(
        "SELECT u.id, u.username, u.prefix, u.first_name, u.last_name, u.suffix, u.signature \
         FROM bayanihan_group_users m \
         JOIN users u ON u.id = m.user_id \
         WHERE m.group_id = $1 AND m.role = 'LEADER' \
         ORDER BY m.id LIMIT 1",
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await?;
    Ok(leader)
}
