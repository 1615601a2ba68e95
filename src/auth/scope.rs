//! Resource-scoped authorization.
//!
//! The role table says what a role may do in general. These checks confirm
//! the caller holds that role *for this document*:
//!
//! ```text
//! leader / teacher --(bayanihan_group_users)--> group    --> document
//! chairperson      --(user_roles Department)--> department --> program --> document
//! dean             --(user_roles College)----> college   --> document
//! ```
//!
//! Admin bypasses every scope check. Auditors may view everything.

use sqlx::PgPool;

use super::actor::Actor;
use super::role::{Capability, Role};
use crate::errors::AppError;

/// Where a document sits in the academic hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentScope {
    pub group_id: i64,
    pub department_id: i64,
    pub college_id: i64,
}

pub async fn user_exists(pool: &PgPool, user_id: i64) -> Result<bool, AppError> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

pub async fn holds_role(pool: &PgPool, user_id: i64, role: Role) -> Result<bool, AppError> {
    let (held,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)",
    )
    .bind(user_id)
    .bind(role.code())
    .fetch_one(pool)
    .await?;
    Ok(held)
}

/// Membership in a bayanihan group. `group_role = None` accepts any member.
pub async fn is_group_member(
    pool: &PgPool,
    user_id: i64,
    group_id: i64,
    group_role: Option<&str>,
) -> Result<bool, AppError> {
    let (member,): (bool,) = sqlx::query_as(
        "SELECT EXISTS ( \
             SELECT 1 FROM bayanihan_group_users \
             WHERE user_id = $1 AND group_id = $2 AND ($3::TEXT IS NULL OR role = $3))",
    )
    .bind(user_id)
    .bind(group_id)
    .bind(group_role)
    .fetch_one(pool)
    .await?;
    Ok(member)
}

async fn holds_entity_role(
    pool: &PgPool,
    user_id: i64,
    role: Role,
    entity_type: &str,
    entity_id: i64,
) -> Result<bool, AppError> {
    let (held,): (bool,) = sqlx::query_as(
        "SELECT EXISTS ( \
             SELECT 1 FROM user_roles \
             WHERE user_id = $1 AND role = $2 AND entity_type = $3 AND entity_id = $4)",
    )
    .bind(user_id)
    .bind(role.code())
    .bind(entity_type)
    .bind(entity_id)
    .fetch_one(pool)
    .await?;
    Ok(held)
}

pub async fn is_chair_of_department(
    pool: &PgPool,
    user_id: i64,
    department_id: i64,
) -> Result<bool, AppError> {
    holds_entity_role(pool, user_id, Role::Chairperson, "Department", department_id).await
}

pub async fn is_dean_of_college(
    pool: &PgPool,
    user_id: i64,
    college_id: i64,
) -> Result<bool, AppError> {
    holds_entity_role(pool, user_id, Role::Dean, "College", college_id).await
}

/// Whether the actor may exercise `cap` on a document in `scope`.
pub async fn has_document_capability(
    pool: &PgPool,
    actor: &Actor,
    scope: &DocumentScope,
    cap: Capability,
) -> Result<bool, AppError> {
    if !actor.capabilities().has(cap) {
        return Ok(false);
    }
    if actor.is_admin() {
        return Ok(true);
    }
    let uid = actor.user_id;
    match (cap, actor.role) {
        (Capability::View | Capability::Audit, Role::Auditor) => Ok(true),
        (Capability::View, Role::BayanihanLeader | Role::BayanihanTeacher) => {
            is_group_member(pool, uid, scope.group_id, None).await
        }
        (Capability::Edit, Role::BayanihanLeader) => {
            is_group_member(pool, uid, scope.group_id, Some("LEADER")).await
        }
        (Capability::View | Capability::ReviewChair, Role::Chairperson) => {
            is_chair_of_department(pool, uid, scope.department_id).await
        }
        (Capability::View | Capability::ReviewDean, Role::Dean) => {
            is_dean_of_college(pool, uid, scope.college_id).await
        }
        _ => Ok(false),
    }
}

/// `has_document_capability`, but as a guard returning 403.
pub async fn require_document_capability(
    pool: &PgPool,
    actor: &Actor,
    scope: &DocumentScope,
    cap: Capability,
) -> Result<(), AppError> {
    let message = match cap {
        Capability::View => "You do not have permission to get this data.",
        Capability::Edit => "Only the Bayanihan Leader of this group can perform this action.",
        Capability::ReviewChair => "You are not the Chairperson of this document's department.",
        Capability::ReviewDean => "You are not the Dean of this document's college.",
        Capability::Audit => "You are not an Auditor.",
    };
    ensure_document_capability(pool, actor, scope, cap, message).await
}

/// Same guard with a caller-chosen denial message, e.g. "You do not have
/// permission to submit this syllabus.".
pub async fn ensure_document_capability(
    pool: &PgPool,
    actor: &Actor,
    scope: &DocumentScope,
    cap: Capability,
    denied: &str,
) -> Result<(), AppError> {
    if has_document_capability(pool, actor, scope, cap).await? {
        return Ok(());
    }
    log::warn!(
        "user {} as {} denied {:?} on group {}",
        actor.user_id,
        actor.role,
        cap,
        scope.group_id
    );
    Err(AppError::PermissionDenied(denied.to_string()))
}

/// Capabilities the actor can actually exercise on this document, for
/// computing available actions.
pub async fn document_capabilities(
    pool: &PgPool,
    actor: &Actor,
    scope: &DocumentScope,
) -> Result<super::role::Capabilities, AppError> {
    let mut held = Vec::new();
    for cap in actor.capabilities().0 {
        if has_document_capability(pool, actor, scope, cap).await? {
            held.push(cap);
        }
    }
    Ok(super::role::Capabilities(held))
}
