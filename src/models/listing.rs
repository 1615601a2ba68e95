//! Role-scoped document lists.
//!
//! A list shows one row per document chain (the bayanihan group for syllabi,
//! group and term for TOS): the highest version that has reached the stage
//! the caller's role works at. Chairs only see versions that were submitted
//! to them, deans only what reached the dean, auditors only approved work.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::auth::{Actor, Role};
use crate::errors::AppError;
use crate::models::workflow::DocumentKind;

/// Query string of `GET /syllabi/` and `GET /tos/`. Text filters compare
/// case-insensitively; `search` matches course code or title.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub year_level: Option<String>,
    pub program: Option<i64>,
    pub department: Option<i64>,
    /// TOS only.
    pub term: Option<String>,
}

impl ListQuery {
    /// `(page, per_page)`, with the page at least 1 and at most 100 rows.
    pub fn paging(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(25).clamp(1, 100);
        (page, per_page)
    }
}

/// Which documents fall under the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    Everything,
    /// Groups the caller belongs to with this membership role.
    Groups(&'static str),
    /// Departments the caller chairs.
    Department,
    /// Colleges the caller is dean of.
    College,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPolicy {
    pub reach: Reach,
    /// Timestamp a version must carry before this role lists it.
    pub stage: Option<&'static str>,
}

/// The list policy of a role, or `None` when the role has no list of this
/// kind of document.
pub fn policy(kind: DocumentKind, role: Role) -> Option<ListPolicy> {
    let (reach, stage) = match (kind, role) {
        (_, Role::Admin) => (Reach::Everything, None),
        (_, Role::BayanihanLeader) => (Reach::Groups("LEADER"), None),
        (_, Role::BayanihanTeacher) => (Reach::Groups("TEACHER"), None),
        (_, Role::Chairperson) => (Reach::Department, Some("chair_submitted_at")),
        (DocumentKind::Syllabus, Role::Dean) => (Reach::College, Some("dean_submitted_at")),
        (DocumentKind::Syllabus, Role::Auditor) => (Reach::Everything, Some("dean_approved_at")),
        (DocumentKind::Tos, Role::Auditor) => (Reach::Everything, Some("chair_approved_at")),
        (DocumentKind::Tos, Role::Dean) => return None,
    };
    Some(ListPolicy { reach, stage })
}

/// `ILIKE` pattern matching `text` anywhere, with wildcards in it escaped.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.trim().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn table(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Syllabus => "syllabi",
        DocumentKind::Tos => "tos",
    }
}

const JOINS: &str = " \
    JOIN bayanihan_groups g ON g.id = doc.bayanihan_group_id \
    JOIN courses c ON c.id = doc.course_id \
    JOIN programs p ON p.id = doc.program_id \
    JOIN departments d ON d.id = p.department_id";

fn push_from(qb: &mut QueryBuilder<'_, Postgres>, kind: DocumentKind) {
    qb.push(" FROM ").push(table(kind)).push(" doc").push(JOINS);
}

fn push_conditions(
    qb: &mut QueryBuilder<'_, Postgres>,
    kind: DocumentKind,
    policy: ListPolicy,
    user_id: i64,
    query: &ListQuery,
) {
    qb.push(" WHERE doc.version = (SELECT MAX(v.version) FROM ")
        .push(table(kind))
        .push(" v WHERE v.bayanihan_group_id = doc.bayanihan_group_id");
    if kind == DocumentKind::Tos {
        qb.push(" AND v.term = doc.term");
    }
    if let Some(stage) = policy.stage {
        qb.push(" AND v.").push(stage).push(" IS NOT NULL");
    }
    qb.push(")");

    match policy.reach {
        Reach::Everything => {}
        Reach::Groups(group_role) => {
            qb.push(" AND doc.bayanihan_group_id IN ")
                .push("(SELECT group_id FROM bayanihan_group_users WHERE user_id = ")
                .push_bind(user_id)
                .push(" AND role = ")
                .push_bind(group_role)
                .push(")");
        }
        Reach::Department => {
            qb.push(" AND p.department_id IN (SELECT entity_id FROM user_roles WHERE user_id = ")
                .push_bind(user_id)
                .push(" AND role = 'CHAIRPERSON' AND entity_type = 'Department')");
        }
        Reach::College => {
            qb.push(" AND d.college_id IN (SELECT entity_id FROM user_roles WHERE user_id = ")
                .push_bind(user_id)
                .push(" AND role = 'DEAN' AND entity_type = 'College')");
        }
    }

    let text_filters = [
        ("doc.status", &query.status),
        ("g.school_year", &query.school_year),
        ("c.course_semester", &query.semester),
        ("c.course_year_level", &query.year_level),
    ];
    for (column, value) in text_filters {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            qb.push(" AND LOWER(")
                .push(column)
                .push(") = LOWER(")
                .push_bind(value.to_string())
                .push(")");
        }
    }
    if kind == DocumentKind::Tos {
        if let Some(term) = query.term.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            qb.push(" AND doc.term = ").push_bind(term.to_ascii_uppercase());
        }
    }
    if let Some(program) = query.program {
        qb.push(" AND doc.program_id = ").push_bind(program);
    }
    if let Some(department) = query.department {
        qb.push(" AND p.department_id = ").push_bind(department);
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search);
        qb.push(" AND (c.course_code ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.course_title ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub struct DocumentPage<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
}

/// One page of the caller's list, newest update first. `columns` is the
/// select list over `doc`, `g` (group), `c` (course), `p` (program) and
/// `d` (department).
pub async fn fetch_page<T>(
    pool: &PgPool,
    kind: DocumentKind,
    columns: &str,
    actor: &Actor,
    query: &ListQuery,
) -> Result<DocumentPage<T>, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let policy = policy(kind, actor.role).ok_or_else(|| {
        AppError::PermissionDenied(
            "You do not have permission to perform this action.".to_string(),
        )
    })?;
    if let Reach::Groups(group_role) = policy.reach {
        require_membership(pool, actor.user_id, group_role).await?;
    }
    let (page, per_page) = query.paging();

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    push_from(&mut count, kind);
    push_conditions(&mut count, kind, policy, actor.user_id, query);
    let (total_count,) = count.build_query_as::<(i64,)>().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT ");
    select.push(columns);
    push_from(&mut select, kind);
    push_conditions(&mut select, kind, policy, actor.user_id, query);
    select
        .push(" ORDER BY doc.updated_at DESC, doc.id DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind((page - 1) * per_page);
    let items = select.build_query_as::<T>().fetch_all(pool).await?;

    Ok(DocumentPage {
        items,
        page,
        per_page,
        total_count,
    })
}

async fn require_membership(
    pool: &PgPool,
    user_id: i64,
    group_role: &str,
) -> Result<(), AppError> {
    let (member,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM bayanihan_group_users WHERE user_id = $1 AND role = $2)",
    )
    .bind(user_id)
    .bind(group_role)
    .fetch_one(pool)
    .await?;
    if member {
        return Ok(());
    }
    let who = if group_role == "LEADER" { "leader" } else { "teacher" };
    Err(AppError::PermissionDenied(format!(
        "You are not a {who} in any Bayanihan group."
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reviewers_only_list_what_reached_them() {
        let chair = policy(DocumentKind::Syllabus, Role::Chairperson).unwrap();
        assert_eq!(chair.reach, Reach::Department);
        assert_eq!(chair.stage, Some("chair_submitted_at"));

        let dean = policy(DocumentKind::Syllabus, Role::Dean).unwrap();
        assert_eq!(dean.reach, Reach::College);
        assert_eq!(dean.stage, Some("dean_submitted_at"));

        assert_eq!(
            policy(DocumentKind::Syllabus, Role::Auditor).unwrap().stage,
            Some("dean_approved_at")
        );
        assert_eq!(
            policy(DocumentKind::Tos, Role::Auditor).unwrap().stage,
            Some("chair_approved_at")
        );
    }

    #[test]
    fn group_members_list_every_latest_version() {
        for kind in [DocumentKind::Syllabus, DocumentKind::Tos] {
            let leader = policy(kind, Role::BayanihanLeader).unwrap();
            assert_eq!(leader.reach, Reach::Groups("LEADER"));
            assert_eq!(leader.stage, None);
            assert_eq!(
                policy(kind, Role::BayanihanTeacher).unwrap().reach,
                Reach::Groups("TEACHER")
            );
            assert_eq!(policy(kind, Role::Admin).unwrap().reach, Reach::Everything);
        }
    }

    #[test]
    fn deans_have_no_tos_list() {
        assert_eq!(policy(DocumentKind::Tos, Role::Dean), None);
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" CS 2 "), "%CS 2%");
        assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }

    #[test]
    fn paging_is_clamped() {
        let query = ListQuery {
            page: Some(0),
            per_page: Some(500),
            ..ListQuery::default()
        };
        assert_eq!(query.paging(), (1, 100));
        assert_eq!(ListQuery::default().paging(), (1, 25));
    }
}
