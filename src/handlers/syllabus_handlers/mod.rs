pub mod content;
pub mod read;
pub mod workflow;

use sqlx::PgPool;

use crate::auth::scope::{self, DocumentScope};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::syllabus::{self, readiness, OutlineTerm, SyllabusDetail};
use crate::models::workflow::derive_available_actions;

/// Load a syllabus with the actions available to this caller. Editable
/// drafts also carry the hour advisories for the two graded terms.
pub(crate) async fn load_detail(
    pool: &PgPool,
    actor: &Actor,
    scope: &DocumentScope,
    id: i64,
) -> Result<SyllabusDetail, AppError> {
    let mut detail = syllabus::find_detail(pool, id).await?.ok_or(AppError::NotFound)?;
    let state = detail.state()?;
    let caps = scope::document_capabilities(pool, actor, scope).await?;

    let mut view = derive_available_actions(&state, &caps);
    if view.status.is_editable() {
        for term in [OutlineTerm::Midterm, OutlineTerm::Finals] {
            let total = readiness::term_hours(&detail.course_outlines, term);
            view.banners.extend(readiness::hours_advisory(term, total));
        }
    }
    detail.available_actions = Some(view);
    Ok(detail)
}
