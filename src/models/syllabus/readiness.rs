//! Content checks a syllabus must pass before it goes to the chairperson.

use super::types::{CourseOutline, OutlineTerm, SyllabusDetail};
use crate::errors::ValidationErrors;
use crate::models::workflow::{Banner, Tone};

/// Hours each of MIDTERM and FINALS must add up to.
pub const TERM_HOURS: u32 = 40;

const MISSING_CONSULTATION_HOURS: &str =
    "Please provide the consultation schedule before submitting the syllabus.";
const MISSING_CONSULTATION_ROOM: &str =
    "Please provide the consultation bldg.rm. before submitting the syllabus.";
const MISSING_CONSULTATION_CONTACT: &str =
    "Please provide the consultation contact information before submitting the syllabus.";
const MISSING_DESCRIPTION: &str =
    "Please provide a Course Description before submitting the syllabus.";
const MISSING_OUTCOMES: &str = "No Course Outcomes found. Please add Course Outcomes.";
const MISSING_INSTRUCTORS: &str =
    "No instructors are assigned to this syllabus. Please add at least one instructor.";
const MISSING_COPO: &str =
    "Missing CO–PO Mapping. Please complete the Course Outcome to Program Outcome mapping.";
const MISSING_OUTLINES: &str =
    "Course Outlines incomplete. Please ensure both MIDTERM and FINALS outlines are provided.";
const MISSING_SIGNATURE: &str = "Cannot submit syllabus because the Bayanihan Leader does not have a signature set. Please upload the signature in the leader's profile first.";

pub fn term_hours(outlines: &[CourseOutline], term: OutlineTerm) -> u32 {
    outlines
        .iter()
        .filter(|o| o.is_term(term))
        .map(|o| o.allotted_hour.max(0) as u32)
        .fold(0, u32::saturating_add)
}

/// Refuse an outline whose hours would take its term past `TERM_HOURS`.
/// `others` is the term's total without the outline being written.
pub fn check_outline_hours(
    term: OutlineTerm,
    others: i64,
    hours: i32,
) -> Result<(), ValidationErrors> {
    if hours < 0 {
        return Err(ValidationErrors::field(
            "allotted_hour",
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    if others + i64::from(hours) > i64::from(TERM_HOURS) {
        return Err(ValidationErrors::field(
            "allotted_hour",
            format!("Total allotted hours for {term} cannot exceed {TERM_HOURS}. Currently at {others}."),
        ));
    }
    Ok(())
}

/// The first failing check, under `non_field_errors`.
pub fn check_submission(syllabus: &SyllabusDetail) -> Result<(), ValidationErrors> {
    first_failure(syllabus).map_or(Ok(()), |msg| Err(ValidationErrors::general(msg)))
}

fn first_failure(s: &SyllabusDetail) -> Option<String> {
    let blank = |v: &str| v.trim().is_empty();
    let r = &s.record;

    if blank(&r.consultation_hours) {
        return Some(MISSING_CONSULTATION_HOURS.into());
    }
    if blank(&r.consultation_room) {
        return Some(MISSING_CONSULTATION_ROOM.into());
    }
    if blank(&r.consultation_contact) {
        return Some(MISSING_CONSULTATION_CONTACT.into());
    }
    if blank(&r.course_description) {
        return Some(MISSING_DESCRIPTION.into());
    }
    if s.course_outcomes.is_empty() {
        return Some(MISSING_OUTCOMES.into());
    }
    if s.instructors.is_empty() {
        return Some(MISSING_INSTRUCTORS.into());
    }
    if s.syllcopos.is_empty() {
        return Some(MISSING_COPO.into());
    }

    let has = |term| s.course_outlines.iter().any(|o| o.is_term(term));
    if !has(OutlineTerm::Midterm) || !has(OutlineTerm::Finals) {
        return Some(MISSING_OUTLINES.into());
    }
    for term in [OutlineTerm::Midterm, OutlineTerm::Finals] {
        let total = term_hours(&s.course_outlines, term);
        if total != TERM_HOURS {
            return Some(format!(
                "{} instructional hours must total {TERM_HOURS} hours. Current total: {total} hours.",
                term.label()
            ));
        }
    }

    if !s.bayanihan_leader.as_ref().is_some_and(|l| l.has_signature()) {
        return Some(MISSING_SIGNATURE.into());
    }
    None
}

/// Live feedback while outlines are edited. Only MIDTERM and FINALS carry a
/// fixed hour target; below 36 hours there is nothing to say yet.
pub fn hours_advisory(term: OutlineTerm, total: u32) -> Option<Banner> {
    if !matches!(term, OutlineTerm::Midterm | OutlineTerm::Finals) {
        return None;
    }
    let label = term.label();
    let (tone, message) = match total {
        t if t > TERM_HOURS => (
            Tone::Danger,
            format!("{label} hours ({t}) exceeded the {TERM_HOURS}-hour limit."),
        ),
        TERM_HOURS => (
            Tone::Success,
            format!("{label} instructional hours reached exactly {TERM_HOURS}."),
        ),
        t if t > TERM_HOURS - 5 => (
            Tone::Warning,
            format!("{label} hours ({t}) are nearing the {TERM_HOURS}-hour limit."),
        ),
        _ => return None,
    };
    Some(Banner { tone, message })
}
