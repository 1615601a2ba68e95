use sqlx::{PgConnection, PgPool};

use super::readiness;
use super::types::*;
use crate::auth::scope::DocumentScope;
use crate::auth::Actor;
use crate::errors::{AppError, ValidationErrors};
use crate::models::bayanihan::{self, GroupContext};
use crate::models::listing::{self, DocumentPage, ListQuery};
use crate::models::user::{self, UserSummary};
use crate::models::workflow::{self, DocumentKind, Status};
use crate::models::review_form;

const SELECT_SYLLABUS: &str = "\
    SELECT id, bayanihan_group_id, course_id, college_id, program_id, curriculum_id, \
           version, status, class_schedules, building_room, class_contact, \
           consultation_hours, consultation_room, consultation_contact, \
           course_description, course_requirements, effective_date, \
           chair_submitted_at, chair_rejected_at, dean_submitted_at, \
           dean_rejected_at, dean_approved_at, created_at, updated_at \
    FROM syllabi";

pub async fn find_record(pool: &PgPool, id: i64) -> Result<Option<SyllabusRecord>, AppError> {
    let sql = format!("{SELECT_SYLLABUS} WHERE id = $1");
    let record = sqlx::query_as::<_, SyllabusRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

/// `find_record`, or 404.
pub async fn get_record(pool: &PgPool, id: i64) -> Result<SyllabusRecord, AppError> {
    find_record(pool, id).await?.ok_or(AppError::NotFound)
}

/// Whether this row holds the highest version of its group.
pub async fn is_latest(pool: &PgPool, record: &SyllabusRecord) -> Result<bool, AppError> {
    let (max,): (Option<i32>,) =
        sqlx::query_as("SELECT MAX(version) FROM syllabi WHERE bayanihan_group_id = $1")
            .bind(record.bayanihan_group_id)
            .fetch_one(pool)
            .await?;
    Ok(max == Some(record.version))
}

pub async fn find_scope(pool: &PgPool, id: i64) -> Result<Option<DocumentScope>, AppError> {
    let row: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT s.bayanihan_group_id, p.department_id, s.college_id \
         FROM syllabi s JOIN programs p ON p.id = s.program_id \
         WHERE s.id = $1",
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

pub async fn find_instructors(
    pool: &PgPool,
    syllabus_id: i64,
) -> Result<Vec<UserSummary>, AppError> {
    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT u.id, u.username, u.prefix, u.first_name, u.last_name, u.suffix, u.signature \
         FROM syllabus_instructors si JOIN users u ON u.id = si.user_id \
         WHERE si.syllabus_id = $1 ORDER BY si.id",
    )
    .bind(syllabus_id)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn find_course_outcomes(
    pool: &PgPool,
    syllabus_id: i64,
) -> Result<Vec<CourseOutcome>, AppError> {
    let outcomes = sqlx::query_as::<_, CourseOutcome>(
        "SELECT id, co_code, co_description FROM syllabus_course_outcomes \
         WHERE syllabus_id = $1 ORDER BY id",
    )
    .bind(syllabus_id)
    .fetch_all(pool)
    .await?;
    Ok(outcomes)
}

pub async fn find_copos(pool: &PgPool, syllabus_id: i64) -> Result<Vec<CoPo>, AppError> {
    let copos = sqlx::query_as::<_, CoPo>(
        "SELECT m.id, m.course_outcome_id, m.program_outcome_id, po.po_letter, m.syllabus_co_po_code \
         FROM syllabus_co_pos m \
         JOIN syllabus_course_outcomes co ON co.id = m.course_outcome_id \
         JOIN program_outcomes po ON po.id = m.program_outcome_id \
         WHERE co.syllabus_id = $1 ORDER BY co.id, po.po_letter",
    )
    .bind(syllabus_id)
    .fetch_all(pool)
    .await?;
    Ok(copos)
}

const SELECT_OUTLINE: &str = "\
    SELECT id, syllabus_term, row_no, allotted_hour, allotted_time, intended_learning, \
           topics, suggested_readings, learning_activities, assessment_tools, \
           grading_criteria, remarks \
    FROM syllabus_course_outlines";

pub async fn find_course_outlines(
    pool: &PgPool,
    syllabus_id: i64,
) -> Result<Vec<CourseOutline>, AppError> {
    let sql = format!(
        "{SELECT_OUTLINE} WHERE syllabus_id = $1 \
         ORDER BY CASE syllabus_term \
             WHEN 'PRELIM' THEN 1 WHEN 'MIDTERM' THEN 2 \
             WHEN 'PRE-FINALS' THEN 3 ELSE 4 END, row_no, id"
    );
    let outlines = sqlx::query_as::<_, CourseOutline>(&sql)
        .bind(syllabus_id)
        .fetch_all(pool)
        .await?;
    Ok(outlines)
}

/// Outlines of one term, in row order.
pub async fn find_term_outlines(
    pool: &PgPool,
    syllabus_id: i64,
    term: OutlineTerm,
) -> Result<Vec<CourseOutline>, AppError> {
    let sql = format!(
        "{SELECT_OUTLINE} WHERE syllabus_id = $1 AND syllabus_term = $2 ORDER BY row_no, id"
    );
    let outlines = sqlx::query_as::<_, CourseOutline>(&sql)
        .bind(syllabus_id)
        .bind(term.as_str())
        .fetch_all(pool)
        .await?;
    Ok(outlines)
}

pub async fn find_dean_feedback(
    pool: &PgPool,
    syllabus_id: i64,
) -> Result<Option<DeanFeedback>, AppError> {
    let feedback = sqlx::query_as::<_, DeanFeedback>(
        "SELECT id, user_id, feedback_text, created_at FROM syllabus_dean_feedback \
         WHERE syllabus_id = $1",
    )
    .bind(syllabus_id)
    .fetch_optional(pool)
    .await?;
    Ok(feedback)
}

async fn find_previous_version(
    pool: &PgPool,
    record: &SyllabusRecord,
) -> Result<Option<PreviousVersion>, AppError> {
    if record.version <= 1 {
        return Ok(None);
    }
    let sql = format!("{SELECT_SYLLABUS} WHERE bayanihan_group_id = $1 AND version = $2");
    let Some(prev) = sqlx::query_as::<_, SyllabusRecord>(&sql)
        .bind(record.bayanihan_group_id)
        .bind(record.version - 1)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let mut summary = PreviousVersion {
        id: prev.id,
        version: prev.version,
        status: prev.status.clone(),
        review_form: None,
        dean_feedback: None,
    };
    match prev.status.parse::<Status>() {
        Ok(Status::ReturnedByChair) => {
            summary.review_form = review_form::find_for_syllabus(pool, prev.id).await?;
        }
        Ok(Status::ReturnedByDean) => {
            summary.dean_feedback = find_dean_feedback(pool, prev.id).await?;
        }
        _ => return Ok(None),
    }
    Ok(Some(summary))
}

/// Load the full document. `available_actions` is left for the caller,
/// who knows the viewer.
pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<SyllabusDetail>, AppError> {
    let Some(record) = find_record(pool, id).await? else {
        return Ok(None);
    };
    let ctx = bayanihan::find_context(pool, record.bayanihan_group_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let detail = SyllabusDetail {
        course: CourseInfo {
            course_code: ctx.course_code,
            course_title: ctx.course_title,
            course_semester: ctx.course_semester,
            course_year_level: ctx.course_year_level,
            school_year: ctx.school_year,
        },
        is_latest: is_latest(pool, &record).await?,
        bayanihan_leader: bayanihan::find_leader(pool, record.bayanihan_group_id).await?,
        instructors: find_instructors(pool, id).await?,
        course_outcomes: find_course_outcomes(pool, id).await?,
        syllcopos: find_copos(pool, id).await?,
        course_outlines: find_course_outlines(pool, id).await?,
        review_form: review_form::find_for_syllabus(pool, id).await?,
        dean_feedback: find_dean_feedback(pool, id).await?,
        previous_version: find_previous_version(pool, &record).await?,
        available_actions: None,
        record,
    };
    Ok(Some(detail))
}

/// The caller's syllabus list: latest version per group, as far as the role
/// gets to see it.
pub async fn find_page(
    pool: &PgPool,
    actor: &Actor,
    query: &ListQuery,
) -> Result<DocumentPage<SyllabusListItem>, AppError> {
    listing::fetch_page(
        pool,
        DocumentKind::Syllabus,
        "doc.id, doc.bayanihan_group_id, doc.version, doc.status, c.course_code, c.course_title, \
         c.course_semester, c.course_year_level, g.school_year, doc.program_id, p.department_id, \
         d.college_id, doc.chair_submitted_at, doc.dean_submitted_at, doc.dean_approved_at, \
         doc.updated_at",
        actor,
        query,
    )
    .await
}

/// Every version in the group, newest first.
pub async fn find_versions(pool: &PgPool, group_id: i64) -> Result<Vec<SyllabusVersion>, AppError> {
    let versions = sqlx::query_as::<_, SyllabusVersion>(
        "SELECT id, status, version, chair_submitted_at, chair_rejected_at, \
                dean_submitted_at, dean_rejected_at, dean_approved_at \
         FROM syllabi WHERE bayanihan_group_id = $1 ORDER BY version DESC",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;
    Ok(versions)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub const DUPLICATE_SYLLABUS: &str =
    "This course already has a syllabus for the selected school year.";

/// Create version 1 of a group's syllabus, in Draft.
pub async fn create(pool: &PgPool, ctx: &GroupContext, new: &NewSyllabus) -> Result<i64, AppError> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM syllabi WHERE bayanihan_group_id = $1)")
            .bind(ctx.group_id)
            .fetch_one(pool)
            .await?;
    if exists {
        return Err(ValidationErrors::general(DUPLICATE_SYLLABUS).into());
    }

    let dean = user::find_college_dean(pool, ctx.college_id).await?;
    let chair = user::find_department_chair(pool, ctx.department_id).await?;
    let missing: Vec<&str> = [(dean.is_none(), "Dean"), (chair.is_none(), "Chairperson")]
        .into_iter()
        .filter_map(|(absent, who)| absent.then_some(who))
        .collect();
    if !missing.is_empty() {
        return Err(ValidationErrors::general(format!(
            "Cannot create syllabus: no {} assigned.",
            missing.join(", ")
        ))
        .into());
    }

    let inserted: Result<(i64,), sqlx::Error> = sqlx::query_as(
        "INSERT INTO syllabi \
             (bayanihan_group_id, course_id, college_id, program_id, curriculum_id, \
              effective_date, version, status) \
         VALUES ($1, $2, $3, $4, $5, $6, 1, $7) RETURNING id",
    )
    .bind(ctx.group_id)
    .bind(ctx.course_id)
    .bind(ctx.college_id)
    .bind(ctx.program_id)
    .bind(ctx.curriculum_id)
    .bind(new.effective_date)
    .bind(Status::Draft.as_str())
    .fetch_one(pool)
    .await;

    match inserted {
        Ok((id,)) => Ok(id),
        Err(e) if is_unique_violation(&e) => {
            Err(ValidationErrors::general(DUPLICATE_SYLLABUS).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Apply a partial field update. The caller holds the row lock.
pub async fn update_fields(
    conn: &mut PgConnection,
    id: i64,
    update: &SyllabusFieldsUpdate,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE syllabi SET \
             effective_date = COALESCE($2, effective_date), \
             class_schedules = COALESCE($3, class_schedules), \
             building_room = COALESCE($4, building_room), \
             class_contact = COALESCE($5, class_contact), \
             consultation_hours = COALESCE($6, consultation_hours), \
             consultation_room = COALESCE($7, consultation_room), \
             consultation_contact = COALESCE($8, consultation_contact), \
             course_description = COALESCE($9, course_description), \
             course_requirements = COALESCE($10, course_requirements), \
             updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(update.effective_date)
    .bind(update.class_schedules.as_deref())
    .bind(update.building_room.as_deref())
    .bind(update.class_contact.as_deref())
    .bind(update.consultation_hours.as_deref())
    .bind(update.consultation_room.as_deref())
    .bind(update.consultation_contact.as_deref())
    .bind(update.course_description.as_deref())
    .bind(update.course_requirements.as_deref())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Replace the instructor list. Unknown user ids are a validation error.
pub async fn replace_instructors(
    conn: &mut PgConnection,
    id: i64,
    user_ids: &[i64],
) -> Result<(), AppError> {
    let mut unique: Vec<i64> = Vec::with_capacity(user_ids.len());
    for uid in user_ids {
        if !unique.contains(uid) {
            unique.push(*uid);
        }
    }

    let known: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ANY($1)")
        .bind(&unique)
        .fetch_all(&mut *conn)
        .await?;
    let mut errors = ValidationErrors::new();
    for uid in &unique {
        if !known.iter().any(|(k,)| k == uid) {
            errors.add("instructor_ids", format!("Invalid pk \"{uid}\" - object does not exist."));
        }
    }
    errors.into_result()?;

    sqlx::query("DELETE FROM syllabus_instructors WHERE syllabus_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    for uid in &unique {
        sqlx::query("INSERT INTO syllabus_instructors (syllabus_id, user_id) VALUES ($1, $2)")
            .bind(id)
            .bind(uid)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn add_course_outcome(
    conn: &mut PgConnection,
    id: i64,
    new: &NewCourseOutcome,
) -> Result<CourseOutcome, AppError> {
    let mut errors = ValidationErrors::new();
    if new.co_code.trim().is_empty() {
        errors.add("co_code", "This field may not be blank.");
    }
    if new.co_description.trim().is_empty() {
        errors.add("co_description", "This field may not be blank.");
    }
    errors.into_result()?;

    let outcome = sqlx::query_as::<_, CourseOutcome>(
        "INSERT INTO syllabus_course_outcomes (syllabus_id, co_code, co_description) \
         VALUES ($1, $2, $3) RETURNING id, co_code, co_description",
    )
    .bind(id)
    .bind(new.co_code.trim())
    .bind(new.co_description.trim())
    .fetch_one(&mut *conn)
    .await?;
    Ok(outcome)
}

/// Hour total of a term, read under the caller's row lock. `except` leaves
/// one outline out, for updates.
async fn locked_term_hours(
    conn: &mut PgConnection,
    id: i64,
    term: OutlineTerm,
    except: Option<i64>,
) -> Result<i64, AppError> {
    let (total,): (Option<i64>,) = sqlx::query_as(
        "SELECT SUM(allotted_hour) FROM syllabus_course_outlines \
         WHERE syllabus_id = $1 AND syllabus_term = $2 AND ($3::BIGINT IS NULL OR id <> $3)",
    )
    .bind(id)
    .bind(term.as_str())
    .bind(except)
    .fetch_one(&mut *conn)
    .await?;
    Ok(total.unwrap_or(0))
}

fn parse_term(raw: &str) -> Result<OutlineTerm, ValidationErrors> {
    raw.parse::<OutlineTerm>()
        .map_err(|msg| ValidationErrors::field("syllabus_term", msg))
}

pub async fn add_course_outline(
    conn: &mut PgConnection,
    id: i64,
    new: &NewCourseOutline,
) -> Result<CourseOutline, AppError> {
    let term = parse_term(&new.syllabus_term)?;
    let others = locked_term_hours(&mut *conn, id, term, None).await?;
    readiness::check_outline_hours(term, others, new.allotted_hour)?;

    let outline = sqlx::query_as::<_, CourseOutline>(
        "INSERT INTO syllabus_course_outlines \
             (syllabus_id, syllabus_term, row_no, allotted_hour, allotted_time, intended_learning, \
              topics, suggested_readings, learning_activities, assessment_tools, grading_criteria, remarks) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING id, syllabus_term, row_no, allotted_hour, allotted_time, intended_learning, \
                   topics, suggested_readings, learning_activities, assessment_tools, \
                   grading_criteria, remarks",
    )
    .bind(id)
    .bind(term.as_str())
    .bind(new.row_no)
    .bind(new.allotted_hour)
    .bind(&new.allotted_time)
    .bind(&new.intended_learning)
    .bind(&new.topics)
    .bind(&new.suggested_readings)
    .bind(&new.learning_activities)
    .bind(&new.assessment_tools)
    .bind(&new.grading_criteria)
    .bind(&new.remarks)
    .fetch_one(&mut *conn)
    .await?;
    Ok(outline)
}

fn parse_copo_code(raw: &str) -> Result<String, ValidationErrors> {
    let code = raw.trim().to_ascii_lowercase();
    if !matches!(code.as_str(), "i" | "e" | "d") {
        return Err(ValidationErrors::field(
            "syllabus_co_po_code",
            format!("\"{raw}\" is not a valid choice."),
        ));
    }
    Ok(code)
}

pub async fn add_copo(conn: &mut PgConnection, id: i64, new: &NewCoPo) -> Result<CoPo, AppError> {
    let code = parse_copo_code(&new.syllabus_co_po_code)?;

    let (outcome_ok,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM syllabus_course_outcomes WHERE id = $1 AND syllabus_id = $2)",
    )
    .bind(new.course_outcome_id)
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    if !outcome_ok {
        return Err(ValidationErrors::field(
            "course_outcome_id",
            format!("Course outcome with id={} does not exist.", new.course_outcome_id),
        )
        .into());
    }

    let po_letter: Option<(String,)> = sqlx::query_as(
        "SELECT po.po_letter FROM program_outcomes po \
         JOIN syllabi s ON s.program_id = po.program_id \
         WHERE po.id = $1 AND s.id = $2",
    )
    .bind(new.program_outcome_id)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some((po_letter,)) = po_letter else {
        return Err(ValidationErrors::field(
            "program_outcome_id",
            "Program outcome does not belong to this syllabus' program.",
        )
        .into());
    };

    let inserted: Result<(i64,), sqlx::Error> = sqlx::query_as(
        "INSERT INTO syllabus_co_pos (course_outcome_id, program_outcome_id, syllabus_co_po_code) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(new.course_outcome_id)
    .bind(new.program_outcome_id)
    .bind(&code)
    .fetch_one(&mut *conn)
    .await;

    match inserted {
        Ok((copo_id,)) => Ok(CoPo {
            id: copo_id,
            course_outcome_id: new.course_outcome_id,
            program_outcome_id: new.program_outcome_id,
            po_letter,
            syllabus_co_po_code: code,
        }),
        Err(e) if is_unique_violation(&e) => Err(ValidationErrors::general(
            "This Course Outcome is already mapped to this Program Outcome.",
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}

pub async fn update_course_outcome(
    conn: &mut PgConnection,
    id: i64,
    outcome_id: i64,
    update: &CourseOutcomeUpdate,
) -> Result<CourseOutcome, AppError> {
    if update.co_code.is_none() && update.co_description.is_none() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }
    let mut errors = ValidationErrors::new();
    if update.co_code.as_deref().is_some_and(|v| v.trim().is_empty()) {
        errors.add("co_code", "This field may not be blank.");
    }
    if update.co_description.as_deref().is_some_and(|v| v.trim().is_empty()) {
        errors.add("co_description", "This field may not be blank.");
    }
    errors.into_result()?;

    let outcome = sqlx::query_as::<_, CourseOutcome>(
        "UPDATE syllabus_course_outcomes SET \
             co_code = COALESCE($3, co_code), \
             co_description = COALESCE($4, co_description) \
         WHERE id = $1 AND syllabus_id = $2 \
         RETURNING id, co_code, co_description",
    )
    .bind(outcome_id)
    .bind(id)
    .bind(update.co_code.as_deref().map(str::trim))
    .bind(update.co_description.as_deref().map(str::trim))
    .fetch_optional(&mut *conn)
    .await?;
    outcome.ok_or(AppError::NotFound)
}

/// Delete a course outcome. Its CO-PO mappings go with it.
pub async fn delete_course_outcome(
    conn: &mut PgConnection,
    id: i64,
    outcome_id: i64,
) -> Result<(), AppError> {
    let sql = "DELETE FROM syllabus_course_outcomes WHERE id = $1 AND syllabus_id = $2";
    let result = sqlx::query(sql)
        .bind(outcome_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Apply a partial outline update. A changed term or hour count is checked
/// against the cap of the term the outline ends up in.
pub async fn update_course_outline(
    conn: &mut PgConnection,
    id: i64,
    outline_id: i64,
    update: &CourseOutlineUpdate,
) -> Result<CourseOutline, AppError> {
    if update.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }
    let sql = format!("{SELECT_OUTLINE} WHERE id = $1 AND syllabus_id = $2 FOR UPDATE");
    let current = sqlx::query_as::<_, CourseOutline>(&sql)
        .bind(outline_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let term = match &update.syllabus_term {
        Some(raw) => parse_term(raw)?,
        None => parse_term(&current.syllabus_term)?,
    };
    let hours = update.allotted_hour.unwrap_or(current.allotted_hour);
    if update.syllabus_term.is_some() || update.allotted_hour.is_some() {
        let others = locked_term_hours(&mut *conn, id, term, Some(outline_id)).await?;
        readiness::check_outline_hours(term, others, hours)?;
    }

    let outline = sqlx::query_as::<_, CourseOutline>(
        "UPDATE syllabus_course_outlines SET \
             syllabus_term = $3, \
             row_no = COALESCE($4, row_no), \
             allotted_hour = $5, \
             allotted_time = COALESCE($6, allotted_time), \
             intended_learning = COALESCE($7, intended_learning), \
             topics = COALESCE($8, topics), \
             suggested_readings = COALESCE($9, suggested_readings), \
             learning_activities = COALESCE($10, learning_activities), \
             assessment_tools = COALESCE($11, assessment_tools), \
             grading_criteria = COALESCE($12, grading_criteria), \
             remarks = COALESCE($13, remarks) \
         WHERE id = $1 AND syllabus_id = $2 \
         RETURNING id, syllabus_term, row_no, allotted_hour, allotted_time, intended_learning, \
                   topics, suggested_readings, learning_activities, assessment_tools, \
                   grading_criteria, remarks",
    )
    .bind(outline_id)
    .bind(id)
    .bind(term.as_str())
    .bind(update.row_no)
    .bind(hours)
    .bind(update.allotted_time.as_deref())
    .bind(update.intended_learning.as_deref())
    .bind(update.topics.as_deref())
    .bind(update.suggested_readings.as_deref())
    .bind(update.learning_activities.as_deref())
    .bind(update.assessment_tools.as_deref())
    .bind(update.grading_criteria.as_deref())
    .bind(update.remarks.as_deref())
    .fetch_one(&mut *conn)
    .await?;
    Ok(outline)
}

pub async fn delete_course_outline(
    conn: &mut PgConnection,
    id: i64,
    outline_id: i64,
) -> Result<(), AppError> {
    let sql = "DELETE FROM syllabus_course_outlines WHERE id = $1 AND syllabus_id = $2";
    let result = sqlx::query(sql)
        .bind(outline_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Set `row_no` from the given positions. Every id must be an outline of this
/// syllabus, otherwise nothing is written.
pub async fn reorder_course_outlines(
    conn: &mut PgConnection,
    id: i64,
    order: &OutlineOrder,
) -> Result<(), AppError> {
    if order.order.is_empty() {
        return Err(AppError::BadRequest("No order provided.".to_string()));
    }
    let ids: Vec<i64> = order.order.iter().map(|p| p.id).collect();
    let known: Vec<(i64,)> = sqlx::query_as(
        "SELECT id FROM syllabus_course_outlines WHERE syllabus_id = $1 AND id = ANY($2)",
    )
    .bind(id)
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut errors = ValidationErrors::new();
    for outline_id in &ids {
        if !known.iter().any(|(k,)| k == outline_id) {
            errors.add("order", format!("Course outline with id={outline_id} does not exist."));
        }
    }
    errors.into_result()?;

    let sql = "UPDATE syllabus_course_outlines SET row_no = $3 WHERE id = $1 AND syllabus_id = $2";
    for position in &order.order {
        sqlx::query(sql)
            .bind(position.id)
            .bind(id)
            .bind(position.position)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn update_copo(
    conn: &mut PgConnection,
    id: i64,
    copo_id: i64,
    update: &CoPoUpdate,
) -> Result<CoPo, AppError> {
    let code = parse_copo_code(&update.syllabus_co_po_code)?;
    let copo = sqlx::query_as::<_, CoPo>(
        "UPDATE syllabus_co_pos m SET syllabus_co_po_code = $3 \
         FROM syllabus_course_outcomes co, program_outcomes po \
         WHERE m.id = $1 AND co.id = m.course_outcome_id AND co.syllabus_id = $2 \
           AND po.id = m.program_outcome_id \
         RETURNING m.id, m.course_outcome_id, m.program_outcome_id, po.po_letter, m.syllabus_co_po_code",
    )
    .bind(copo_id)
    .bind(id)
    .bind(&code)
    .fetch_optional(&mut *conn)
    .await?;
    copo.ok_or(AppError::NotFound)
}

pub async fn delete_copo(conn: &mut PgConnection, id: i64, copo_id: i64) -> Result<(), AppError> {
    let result = sqlx::query(
        "DELETE FROM syllabus_co_pos m USING syllabus_course_outcomes co \
         WHERE m.id = $1 AND co.id = m.course_outcome_id AND co.syllabus_id = $2",
    )
    .bind(copo_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Record (or replace) the dean's feedback on a version.
pub async fn upsert_dean_feedback(
    conn: &mut PgConnection,
    syllabus_id: i64,
    user_id: i64,
    text: &str,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO syllabus_dean_feedback (syllabus_id, user_id, feedback_text) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (syllabus_id) DO UPDATE \
             SET user_id = EXCLUDED.user_id, feedback_text = EXCLUDED.feedback_text, created_at = now()",
    )
    .bind(syllabus_id)
    .bind(user_id)
    .bind(text)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Copy a returned syllabus into the next version, in Requires Revision with
/// an empty timeline. Every child row is copied; CO-PO mappings follow their
/// copied course outcome. Returns the new id.
/// The caller holds the source row lock, so a concurrent replication shows up
/// here as a newer version and fails as a conflict.
pub async fn replicate(conn: &mut PgConnection, source: &SyllabusRecord) -> Result<i64, AppError> {
    let (max,): (Option<i32>,) =
        sqlx::query_as("SELECT MAX(version) FROM syllabi WHERE bayanihan_group_id = $1")
            .bind(source.bayanihan_group_id)
            .fetch_one(&mut *conn)
            .await?;
    if max != Some(source.version) {
        return Err(workflow::WorkflowError::Conflict.into());
    }

    let (new_id,): (i64,) = sqlx::query_as(
        "INSERT INTO syllabi \
             (bayanihan_group_id, course_id, college_id, program_id, curriculum_id, version, status, \
              class_schedules, building_room, class_contact, consultation_hours, consultation_room, \
              consultation_contact, course_description, course_requirements, effective_date) \
         SELECT bayanihan_group_id, course_id, college_id, program_id, curriculum_id, version + 1, $2, \
                class_schedules, building_room, class_contact, consultation_hours, consultation_room, \
                consultation_contact, course_description, course_requirements, effective_date \
         FROM syllabi WHERE id = $1 \
         RETURNING id",
    )
    .bind(source.id)
    .bind(Status::RequiresRevision.as_str())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO syllabus_instructors (syllabus_id, user_id) \
         SELECT $2, user_id FROM syllabus_instructors WHERE syllabus_id = $1 ORDER BY id",
    )
    .bind(source.id)
    .bind(new_id)
    .execute(&mut *conn)
    .await?;

    let outcomes: Vec<(i64, String, String)> = sqlx::query_as(
        "SELECT id, co_code, co_description FROM syllabus_course_outcomes \
         WHERE syllabus_id = $1 ORDER BY id",
    )
    .bind(source.id)
    .fetch_all(&mut *conn)
    .await?;
    for (old_co, code, description) in outcomes {
        let (new_co,): (i64,) = sqlx::query_as(
            "INSERT INTO syllabus_course_outcomes (syllabus_id, co_code, co_description) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(new_id)
        .bind(code)
        .bind(description)
        .fetch_one(&mut *conn)
        .await?;
        sqlx::query(
            "INSERT INTO syllabus_co_pos (course_outcome_id, program_outcome_id, syllabus_co_po_code) \
             SELECT $2, program_outcome_id, syllabus_co_po_code FROM syllabus_co_pos \
             WHERE course_outcome_id = $1 ORDER BY id",
        )
        .bind(old_co)
        .bind(new_co)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        "INSERT INTO syllabus_course_outlines \
             (syllabus_id, syllabus_term, row_no, allotted_hour, allotted_time, intended_learning, \
              topics, suggested_readings, learning_activities, assessment_tools, grading_criteria, remarks) \
         SELECT $2, syllabus_term, row_no, allotted_hour, allotted_time, intended_learning, \
                topics, suggested_readings, learning_activities, assessment_tools, grading_criteria, remarks \
         FROM syllabus_course_outlines WHERE syllabus_id = $1 ORDER BY id",
    )
    .bind(source.id)
    .bind(new_id)
    .execute(&mut *conn)
    .await?;

    log::info!(
        "syllabus {} replicated as version {} (id {new_id})",
        source.id,
        source.version + 1
    );
    Ok(new_id)
}

/// Lock the row and require an editable status, for content endpoints.
pub async fn lock_editable(conn: &mut PgConnection, id: i64) -> Result<(), AppError> {
    workflow::queries::lock_editable(conn, DocumentKind::Syllabus, id).await
}
