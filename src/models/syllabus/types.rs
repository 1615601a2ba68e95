use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::review_form::SrfForm;
use crate::models::user::UserSummary;
use crate::models::workflow::{
    AvailableActions, DocumentKind, DocumentState, Status, Timeline, WorkflowError,
};

/// One row of `syllabi`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyllabusRecord {
    pub id: i64,
    pub bayanihan_group_id: i64,
    pub course_id: i64,
    pub college_id: i64,
    pub program_id: i64,
    pub curriculum_id: i64,
    pub version: i32,
    pub status: String,
    pub class_schedules: String,
    pub building_room: String,
    pub class_contact: String,
    pub consultation_hours: String,
    pub consultation_room: String,
    pub consultation_contact: String,
    pub course_description: String,
    pub course_requirements: String,
    pub effective_date: Option<NaiveDate>,
    pub chair_submitted_at: Option<DateTime<Utc>>,
    pub chair_rejected_at: Option<DateTime<Utc>>,
    pub dean_submitted_at: Option<DateTime<Utc>>,
    pub dean_rejected_at: Option<DateTime<Utc>>,
    pub dean_approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyllabusRecord {
    pub fn timeline(&self) -> Timeline {
        Timeline {
            chair_submitted_at: self.chair_submitted_at,
            chair_rejected_at: self.chair_rejected_at,
            dean_submitted_at: self.dean_submitted_at,
            dean_rejected_at: self.dean_rejected_at,
            dean_approved_at: self.dean_approved_at,
            ..Timeline::default()
        }
    }

    pub fn state(&self, is_latest: bool) -> Result<DocumentState, WorkflowError> {
        Ok(DocumentState {
            kind: DocumentKind::Syllabus,
            status: self.status.parse::<Status>()?,
            timeline: self.timeline(),
            version: self.version,
            is_latest,
        })
    }
}

/// Term a course outline row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutlineTerm {
    #[serde(rename = "PRELIM")]
    Prelim,
    #[serde(rename = "MIDTERM")]
    Midterm,
    #[serde(rename = "PRE-FINALS")]
    PreFinals,
    #[serde(rename = "FINALS")]
    Finals,
}

impl OutlineTerm {
    pub fn as_str(self) -> &'static str {
        match self {
            OutlineTerm::Prelim => "PRELIM",
            OutlineTerm::Midterm => "MIDTERM",
            OutlineTerm::PreFinals => "PRE-FINALS",
            OutlineTerm::Finals => "FINALS",
        }
    }

    /// Title-case name used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            OutlineTerm::Prelim => "Prelim",
            OutlineTerm::Midterm => "Midterm",
            OutlineTerm::PreFinals => "Pre-Finals",
            OutlineTerm::Finals => "Finals",
        }
    }
}

impl fmt::Display for OutlineTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlineTerm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRELIM" => Ok(OutlineTerm::Prelim),
            "MIDTERM" => Ok(OutlineTerm::Midterm),
            "PRE-FINALS" => Ok(OutlineTerm::PreFinals),
            "FINALS" => Ok(OutlineTerm::Finals),
            other => Err(format!("'{other}' is not a valid syllabus term.")),
        }
    }
}

/// Course and school-year labels shown on the document header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseInfo {
    pub course_code: String,
    pub course_title: String,
    pub course_semester: String,
    pub course_year_level: String,
    pub school_year: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CourseOutcome {
    pub id: i64,
    pub co_code: String,
    pub co_description: String,
}

/// A course outcome mapped to a program outcome with an i/e/d level.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoPo {
    pub id: i64,
    pub course_outcome_id: i64,
    pub program_outcome_id: i64,
    pub po_letter: String,
    pub syllabus_co_po_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CourseOutline {
    pub id: i64,
    pub syllabus_term: String,
    pub row_no: i32,
    pub allotted_hour: i32,
    pub allotted_time: String,
    pub intended_learning: String,
    pub topics: String,
    pub suggested_readings: String,
    pub learning_activities: String,
    pub assessment_tools: String,
    pub grading_criteria: String,
    pub remarks: String,
}

impl CourseOutline {
    pub fn is_term(&self, term: OutlineTerm) -> bool {
        self.syllabus_term.eq_ignore_ascii_case(term.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeanFeedback {
    pub id: i64,
    pub user_id: i64,
    pub feedback_text: String,
    pub created_at: DateTime<Utc>,
}

/// The version just before this one, with the review that returned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousVersion {
    pub id: i64,
    pub version: i32,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_form: Option<SrfForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dean_feedback: Option<DeanFeedback>,
}

/// Everything a syllabus page renders, as served by `GET /syllabi/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyllabusDetail {
    #[serde(flatten)]
    pub record: SyllabusRecord,
    pub course: CourseInfo,
    pub is_latest: bool,
    pub bayanihan_leader: Option<UserSummary>,
    pub instructors: Vec<UserSummary>,
    pub course_outcomes: Vec<CourseOutcome>,
    pub syllcopos: Vec<CoPo>,
    pub course_outlines: Vec<CourseOutline>,
    pub review_form: Option<SrfForm>,
    pub dean_feedback: Option<DeanFeedback>,
    pub previous_version: Option<PreviousVersion>,
    #[serde(default)]
    pub available_actions: Option<AvailableActions>,
}

impl SyllabusDetail {
    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn state(&self) -> Result<DocumentState, WorkflowError> {
        self.record.state(self.is_latest)
    }
}

/// Entry of `GET /syllabi/{id}/syllabus-versions/`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyllabusVersion {
    pub id: i64,
    pub status: String,
    pub version: i32,
    pub chair_submitted_at: Option<DateTime<Utc>>,
    pub chair_rejected_at: Option<DateTime<Utc>>,
    pub dean_submitted_at: Option<DateTime<Utc>>,
    pub dean_rejected_at: Option<DateTime<Utc>>,
    pub dean_approved_at: Option<DateTime<Utc>>,
}

/// Row of `GET /syllabi/`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyllabusListItem {
    pub id: i64,
    pub bayanihan_group_id: i64,
    pub version: i32,
    pub status: String,
    pub course_code: String,
    pub course_title: String,
    pub course_semester: String,
    pub course_year_level: String,
    pub school_year: String,
    pub program_id: i64,
    pub department_id: i64,
    pub college_id: i64,
    pub chair_submitted_at: Option<DateTime<Utc>>,
    pub dean_submitted_at: Option<DateTime<Utc>>,
    pub dean_approved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSyllabus {
    pub bayanihan_group_id: i64,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

/// Partial update of the descriptive fields. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyllabusFieldsUpdate {
    pub effective_date: Option<NaiveDate>,
    pub class_schedules: Option<String>,
    pub building_room: Option<String>,
    pub class_contact: Option<String>,
    pub consultation_hours: Option<String>,
    pub consultation_room: Option<String>,
    pub consultation_contact: Option<String>,
    pub course_description: Option<String>,
    pub course_requirements: Option<String>,
}

impl SyllabusFieldsUpdate {
    pub fn is_empty(&self) -> bool {
        self.effective_date.is_none()
            && self.class_schedules.is_none()
            && self.building_room.is_none()
            && self.class_contact.is_none()
            && self.consultation_hours.is_none()
            && self.consultation_room.is_none()
            && self.consultation_contact.is_none()
            && self.course_description.is_none()
            && self.course_requirements.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorsUpdate {
    pub instructor_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseOutcome {
    pub co_code: String,
    pub co_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoPo {
    pub course_outcome_id: i64,
    pub program_outcome_id: i64,
    pub syllabus_co_po_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseOutline {
    pub syllabus_term: String,
    #[serde(default)]
    pub row_no: i32,
    #[serde(default)]
    pub allotted_hour: i32,
    #[serde(default)]
    pub allotted_time: String,
    #[serde(default)]
    pub intended_learning: String,
    #[serde(default)]
    pub topics: String,
    #[serde(default)]
    pub suggested_readings: String,
    #[serde(default)]
    pub learning_activities: String,
    #[serde(default)]
    pub assessment_tools: String,
    #[serde(default)]
    pub grading_criteria: String,
    #[serde(default)]
    pub remarks: String,
}

/// Partial update of a course outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseOutcomeUpdate {
    pub co_code: Option<String>,
    pub co_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoPoUpdate {
    pub syllabus_co_po_code: String,
}

/// Partial update of a course outline. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseOutlineUpdate {
    pub syllabus_term: Option<String>,
    pub row_no: Option<i32>,
    pub allotted_hour: Option<i32>,
    pub allotted_time: Option<String>,
    pub intended_learning: Option<String>,
    pub topics: Option<String>,
    pub suggested_readings: Option<String>,
    pub learning_activities: Option<String>,
    pub assessment_tools: Option<String>,
    pub grading_criteria: Option<String>,
    pub remarks: Option<String>,
}

impl CourseOutlineUpdate {
    pub fn is_empty(&self) -> bool {
        self.syllabus_term.is_none()
            && self.row_no.is_none()
            && self.allotted_hour.is_none()
            && self.allotted_time.is_none()
            && self.intended_learning.is_none()
            && self.topics.is_none()
            && self.suggested_readings.is_none()
            && self.learning_activities.is_none()
            && self.assessment_tools.is_none()
            && self.grading_criteria.is_none()
            && self.remarks.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutlinePosition {
    pub id: i64,
    pub position: i32,
}

/// Body of `POST /syllabi/{id}/course-outlines/reorder/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineOrder {
    #[serde(default)]
    pub order: Vec<OutlinePosition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_terms_parse_case_insensitively() {
        assert_eq!("pre-finals".parse::<OutlineTerm>(), Ok(OutlineTerm::PreFinals));
        assert_eq!(" MIDTERM ".parse::<OutlineTerm>(), Ok(OutlineTerm::Midterm));
        assert!("SEMI-FINALS".parse::<OutlineTerm>().is_err());
    }

    #[test]
    fn outline_term_serializes_with_hyphen() {
        assert_eq!(serde_json::to_string(&OutlineTerm::PreFinals).unwrap(), "\"PRE-FINALS\"");
    }
}
