use sqlx::{PgConnection, PgPool};

use super::allocation;
use super::types::*;
use crate::auth::scope::DocumentScope;
use crate::auth::Actor;
use crate::errors::{AppError, ValidationErrors};
use crate::models::bayanihan;
use crate::models::listing::{self, DocumentPage, ListQuery};
use crate::models::syllabus::{self, CourseInfo};
use crate::models::workflow::{self, DocumentKind, Status};

const SELECT_TOS: &str = "\
    SELECT id, syllabus_id, user_id, bayanihan_group_id, course_id, program_id, term, \
           total_items, col1_percentage, col2_percentage, col3_percentage, col4_percentage, \
           col1_expected, col2_expected, col3_expected, col4_expected, tos_cpys, \
           version, status, chair_submitted_at, chair_returned_at, chair_approved_at, \
           created_at, updated_at \
    FROM tos";

pub async fn find_record(pool: &PgPool, id: i64) -> Result<Option<TosRecord>, AppError> {
    let sql = format!("{SELECT_TOS} WHERE id = $1");
    let record = sqlx::query_as::<_, TosRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

pub async fn get_record(pool: &PgPool, id: i64) -> Result<TosRecord, AppError> {
    find_record(pool, id).await?.ok_or(AppError::NotFound)
}

/// Latest means the highest version for the same group and term.
pub async fn is_latest(pool: &PgPool, record: &TosRecord) -> Result<bool, AppError> {
    let (max,): (Option<i32>,) = sqlx::query_as(
        "SELECT MAX(version) FROM tos WHERE bayanihan_group_id = $1 AND term = $2",
    )
    .bind(record.bayanihan_group_id)
    .bind(&record.term)
    .fetch_one(pool)
    .await?;
    Ok(max == Some(record.version))
}

pub async fn find_scope(pool: &PgPool, id: i64) -> Result<Option<DocumentScope>, AppError> {
    let row: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT t.bayanihan_group_id, p.department_id, d.college_id \
         FROM tos t \
         JOIN programs p ON p.id = t.program_id \
         JOIN departments d ON d.id = p.department_id \
         WHERE t.id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(group_id, department_id, college_id)| DocumentScope {
        group_id,
        department_id,
        college_id,
    }))
}

pub async fn get_scope(pool: &PgPool, id: i64) -> Result<DocumentScope, AppError> {
    find_scope(pool, id).await?.ok_or(AppError::NotFound)
}

/// The caller's TOS list: latest version per group and term.
pub async fn find_page(
    pool: &PgPool,
    actor: &Actor,
    query: &ListQuery,
) -> Result<DocumentPage<TosListItem>, AppError> {
    listing::fetch_page(
        pool,
        DocumentKind::Tos,
        "doc.id, doc.syllabus_id, doc.bayanihan_group_id, doc.term, doc.version, doc.status, \
         doc.total_items, c.course_code, c.course_title, c.course_semester, c.course_year_level, \
         g.school_year, doc.program_id, doc.chair_submitted_at, doc.chair_approved_at, doc.updated_at",
        actor,
        query,
    )
    .await
}

const SELECT_ROW: &str = "\
    SELECT id, row_order, topic, no_hours, percent, no_items, \
           col1_value, col2_value, col3_value, col4_value \
    FROM tos_rows";

pub async fn find_rows(pool: &PgPool, tos_id: i64) -> Result<Vec<TosRow>, AppError> {
    let sql = format!("{SELECT_ROW} WHERE tos_id = $1 ORDER BY row_order, id");
    let rows = sqlx::query_as::<_, TosRow>(&sql)
        .bind(tos_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<TosDetail>, AppError> {
    let Some(record) = find_record(pool, id).await? else {
        return Ok(None);
    };
    let ctx = bayanihan::find_context(pool, record.bayanihan_group_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Some(TosDetail {
        course: CourseInfo {
            course_code: ctx.course_code,
            course_title: ctx.course_title,
            course_semester: ctx.course_semester,
            course_year_level: ctx.course_year_level,
            school_year: ctx.school_year,
        },
        is_latest: is_latest(pool, &record).await?,
        tos_rows: find_rows(pool, id).await?,
        available_actions: None,
        record,
    }))
}

/// Every version for the same group and term, newest first.
pub async fn find_versions(pool: &PgPool, record: &TosRecord) -> Result<Vec<TosVersion>, AppError> {
    let versions = sqlx::query_as::<_, TosVersion>(
        "SELECT id, term, status, version, chair_submitted_at, chair_returned_at, chair_approved_at \
         FROM tos WHERE bayanihan_group_id = $1 AND term = $2 ORDER BY version DESC",
    )
    .bind(record.bayanihan_group_id)
    .bind(&record.term)
    .fetch_all(pool)
    .await?;
    Ok(versions)
}

/// `(topic, hours)` of the selected outlines for a TOS term. SEMI-FINALS
/// reads the PRE-FINALS outlines.
pub async fn outline_topics(
    pool: &PgPool,
    syllabus_id: i64,
    term: TosTerm,
    selected: &[String],
) -> Result<Vec<(String, u32)>, AppError> {
    let outline_term = term.outline_term();
    let outlines = syllabus::find_term_outlines(pool, syllabus_id, outline_term).await?;
    let topics = allocation::select_topics(&outlines, selected);
    if topics.is_empty() {
        return Err(ValidationErrors::field(
            "selected_topics",
            format!("None of the selected topics match the {outline_term} course outlines."),
        )
        .into());
    }
    Ok(topics)
}

/// Lay the selected topics out as rows under already validated settings.
pub fn allocate(
    settings: &TosSettings,
    topics: &[(String, u32)],
) -> Result<([u32; 4], Vec<NewTosRow>), AppError> {
    let percentages = settings.percentages().map(|p| p.max(0) as u32);
    let total = settings.total_items.max(0) as u32;
    allocation::build_rows(total, percentages, topics).map_err(|e| {
        log::warn!("{e}");
        AppError::Validation(ValidationErrors::general(e.to_string()))
    })
}

/// Whether the syllabus already has a TOS for `term`. Locks the syllabus row
/// first, so concurrent creations for one syllabus run one after the other.
pub async fn exists_for(
    conn: &mut PgConnection,
    syllabus_id: i64,
    term: TosTerm,
) -> Result<bool, AppError> {
    sqlx::query("SELECT id FROM syllabi WHERE id = $1 FOR UPDATE")
        .bind(syllabus_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM tos WHERE syllabus_id = $1 AND term = $2)")
            .bind(syllabus_id)
            .bind(term.as_str())
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

async fn insert_rows(
    conn: &mut PgConnection,
    tos_id: i64,
    rows: &[NewTosRow],
) -> Result<(), AppError> {
    for (order, row) in rows.iter().enumerate() {
        sqlx::query(
            "INSERT INTO tos_rows \
                 (tos_id, row_order, topic, no_hours, percent, no_items, \
                  col1_value, col2_value, col3_value, col4_value) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(tos_id)
        .bind(order as i32)
        .bind(&row.topic)
        .bind(row.no_hours)
        .bind(row.percent)
        .bind(row.no_items)
        .bind(row.columns[0])
        .bind(row.columns[1])
        .bind(row.columns[2])
        .bind(row.columns[3])
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Where a new TOS hangs in the hierarchy, copied from its syllabus.
pub struct TosOwner {
    pub syllabus_id: i64,
    pub user_id: i64,
    pub bayanihan_group_id: i64,
    pub course_id: i64,
    pub program_id: i64,
}

/// Insert a Draft version 1 with its allocated rows.
pub async fn create(
    conn: &mut PgConnection,
    owner: &TosOwner,
    term: TosTerm,
    settings: &TosSettings,
    expected: [u32; 4],
    rows: &[NewTosRow],
) -> Result<i64, AppError> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO tos \
             (syllabus_id, user_id, bayanihan_group_id, course_id, program_id, term, total_items, \
              col1_percentage, col2_percentage, col3_percentage, col4_percentage, \
              col1_expected, col2_expected, col3_expected, col4_expected, tos_cpys, version, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 1, $17) \
         RETURNING id",
    )
    .bind(owner.syllabus_id)
    .bind(owner.user_id)
    .bind(owner.bayanihan_group_id)
    .bind(owner.course_id)
    .bind(owner.program_id)
    .bind(term.as_str())
    .bind(settings.total_items)
    .bind(settings.col1_percentage)
    .bind(settings.col2_percentage)
    .bind(settings.col3_percentage)
    .bind(settings.col4_percentage)
    .bind(expected[0] as i32)
    .bind(expected[1] as i32)
    .bind(expected[2] as i32)
    .bind(expected[3] as i32)
    .bind(&settings.tos_cpys)
    .bind(Status::Draft.as_str())
    .fetch_one(&mut *conn)
    .await?;

    insert_rows(conn, id, rows).await?;
    Ok(id)
}

/// Replace settings and rebuild every row. The caller holds the row lock.
pub async fn replace_settings(
    conn: &mut PgConnection,
    id: i64,
    settings: &TosSettings,
    expected: [u32; 4],
    rows: &[NewTosRow],
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE tos SET total_items = $2, \
             col1_percentage = $3, col2_percentage = $4, col3_percentage = $5, col4_percentage = $6, \
             col1_expected = $7, col2_expected = $8, col3_expected = $9, col4_expected = $10, \
             tos_cpys = $11, updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(settings.total_items)
    .bind(settings.col1_percentage)
    .bind(settings.col2_percentage)
    .bind(settings.col3_percentage)
    .bind(settings.col4_percentage)
    .bind(expected[0] as i32)
    .bind(expected[1] as i32)
    .bind(expected[2] as i32)
    .bind(expected[3] as i32)
    .bind(&settings.tos_cpys)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM tos_rows WHERE tos_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    insert_rows(conn, id, rows).await
}

fn check_patch(patch: &RowPatch, errors: &mut ValidationErrors) {
    let numbers = [
        ("no_hours", patch.no_hours),
        ("percent", patch.percent),
        ("no_items", patch.no_items),
        ("col1_value", patch.col1_value),
        ("col2_value", patch.col2_value),
        ("col3_value", patch.col3_value),
        ("col4_value", patch.col4_value),
    ];
    for (field, value) in numbers {
        if value.is_some_and(|v| v < 0) {
            errors.add(field, "Ensure this value is greater than or equal to 0.");
        }
    }
    if patch.topic.as_deref().is_some_and(|t| t.trim().is_empty()) {
        errors.add("topic", "This field may not be blank.");
    }
}

/// Apply partial row edits. Ids that are not rows of this TOS are skipped.
/// Returns the rows as updated.
pub async fn update_rows(
    conn: &mut PgConnection,
    tos_id: i64,
    patches: &[RowPatch],
) -> Result<Vec<TosRow>, AppError> {
    let mut errors = ValidationErrors::new();
    for patch in patches {
        check_patch(patch, &mut errors);
    }
    errors.into_result()?;

    let mut updated = Vec::new();
    for patch in patches {
        let row = sqlx::query_as::<_, TosRow>(
            "UPDATE tos_rows SET \
                 topic = COALESCE($3, topic), \
                 no_hours = COALESCE($4, no_hours), \
                 percent = COALESCE($5, percent), \
                 no_items = COALESCE($6, no_items), \
                 col1_value = COALESCE($7, col1_value), \
                 col2_value = COALESCE($8, col2_value), \
                 col3_value = COALESCE($9, col3_value), \
                 col4_value = COALESCE($10, col4_value) \
             WHERE id = $1 AND tos_id = $2 \
             RETURNING id, row_order, topic, no_hours, percent, no_items, \
                       col1_value, col2_value, col3_value, col4_value",
        )
        .bind(patch.id)
        .bind(tos_id)
        .bind(patch.topic.as_deref())
        .bind(patch.no_hours)
        .bind(patch.percent)
        .bind(patch.no_items)
        .bind(patch.col1_value)
        .bind(patch.col2_value)
        .bind(patch.col3_value)
        .bind(patch.col4_value)
        .fetch_optional(&mut *conn)
        .await?;
        match row {
            Some(row) => updated.push(row),
            None => log::warn!("tos {tos_id}: skipping unknown row {}", patch.id),
        }
    }
    Ok(updated)
}

/// Copy a returned TOS into the next version with its rows, in Requires
/// Revision and with an empty timeline.
pub async fn replicate(conn: &mut PgConnection, source: &TosRecord) -> Result<i64, AppError> {
    let (max,): (Option<i32>,) = sqlx::query_as(
        "SELECT MAX(version) FROM tos WHERE bayanihan_group_id = $1 AND term = $2",
    )
    .bind(source.bayanihan_group_id)
    .bind(&source.term)
    .fetch_one(&mut *conn)
    .await?;
    if max != Some(source.version) {
        return Err(workflow::WorkflowError::Conflict.into());
    }

    let (new_id,): (i64,) = sqlx::query_as(
        "INSERT INTO tos \
             (syllabus_id, user_id, bayanihan_group_id, course_id, program_id, term, total_items, \
              col1_percentage, col2_percentage, col3_percentage, col4_percentage, \
              col1_expected, col2_expected, col3_expected, col4_expected, tos_cpys, version, status) \
         SELECT syllabus_id, user_id, bayanihan_group_id, course_id, program_id, term, total_items, \
                col1_percentage, col2_percentage, col3_percentage, col4_percentage, \
                col1_expected, col2_expected, col3_expected, col4_expected, tos_cpys, version + 1, $2 \
         FROM tos WHERE id = $1 \
         RETURNING id",
    )
    .bind(source.id)
    .bind(Status::RequiresRevision.as_str())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO tos_rows \
             (tos_id, row_order, topic, no_hours, percent, no_items, \
              col1_value, col2_value, col3_value, col4_value) \
         SELECT $2, row_order, topic, no_hours, percent, no_items, \
                col1_value, col2_value, col3_value, col4_value \
         FROM tos_rows WHERE tos_id = $1 ORDER BY row_order, id",
    )
    .bind(source.id)
    .bind(new_id)
    .execute(&mut *conn)
    .await?;

    log::info!("tos {} replicated as version {} (id {new_id})", source.id, source.version + 1);
    Ok(new_id)
}

pub async fn lock_editable(conn: &mut PgConnection, id: i64) -> Result<(), AppError> {
    workflow::queries::lock_editable(conn, DocumentKind::Tos, id).await
}
