pub mod crud;
pub mod read;
pub mod workflow;

use sqlx::PgPool;

use crate::auth::scope::{self, DocumentScope};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::tos::{self, TosDetail};
use crate::models::workflow::derive_available_actions;

/// Load a TOS with the actions available to this caller.
pub(crate) async fn load_detail(
    pool: &PgPool,
    actor: &Actor,
    scope: &DocumentScope,
    id: i64,
) -> Result<TosDetail, AppError> {
    let mut detail = tos::find_detail(pool, id).await?.ok_or(AppError::NotFound)?;
    let state = detail.state()?;
    let caps = scope::document_capabilities(pool, actor, scope).await?;
    detail.available_actions = Some(derive_available_actions(&state, &caps));
    Ok(detail)
}
