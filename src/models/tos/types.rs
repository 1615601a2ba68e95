use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::syllabus::{CourseInfo, OutlineTerm};
use crate::models::workflow::{
    AvailableActions, DocumentKind, DocumentState, Status, Timeline, WorkflowError,
};

/// Examination term a TOS covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TosTerm {
    #[serde(rename = "PRELIM")]
    Prelim,
    #[serde(rename = "MIDTERM")]
    Midterm,
    #[serde(rename = "SEMI-FINALS")]
    SemiFinals,
    #[serde(rename = "FINALS")]
    Finals,
}

impl TosTerm {
    pub fn as_str(self) -> &'static str {
        match self {
            TosTerm::Prelim => "PRELIM",
            TosTerm::Midterm => "MIDTERM",
            TosTerm::SemiFinals => "SEMI-FINALS",
            TosTerm::Finals => "FINALS",
        }
    }

    /// Syllabus outline term whose topics this TOS draws from.
    pub fn outline_term(self) -> OutlineTerm {
        match self {
            TosTerm::Prelim => OutlineTerm::Prelim,
            TosTerm::Midterm => OutlineTerm::Midterm,
            TosTerm::SemiFinals => OutlineTerm::PreFinals,
            TosTerm::Finals => OutlineTerm::Finals,
        }
    }
}

impl fmt::Display for TosTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TosTerm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRELIM" => Ok(TosTerm::Prelim),
            "MIDTERM" => Ok(TosTerm::Midterm),
            "SEMI-FINALS" => Ok(TosTerm::SemiFinals),
            "FINALS" => Ok(TosTerm::Finals),
            other => Err(format!("\"{other}\" is not a valid choice.")),
        }
    }
}

/// Item count and the split across the four cognitive levels: Knowledge,
/// Comprehension, Application, Analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TosSettings {
    pub total_items: i32,
    pub col1_percentage: i32,
    pub col2_percentage: i32,
    pub col3_percentage: i32,
    pub col4_percentage: i32,
    #[serde(default)]
    pub tos_cpys: String,
}

impl TosSettings {
    pub fn percentages(&self) -> [i32; 4] {
        [
            self.col1_percentage,
            self.col2_percentage,
            self.col3_percentage,
            self.col4_percentage,
        ]
    }
}

/// Row of `GET /tos/`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TosListItem {
    pub id: i64,
    pub syllabus_id: i64,
    pub bayanihan_group_id: i64,
    pub term: String,
    pub version: i32,
    pub status: String,
    pub total_items: i32,
    pub course_code: String,
    pub course_title: String,
    pub course_semester: String,
    pub course_year_level: String,
    pub school_year: String,
    pub program_id: i64,
    pub chair_submitted_at: Option<DateTime<Utc>>,
    pub chair_approved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TosRecord {
    pub id: i64,
    pub syllabus_id: i64,
    pub user_id: i64,
    pub bayanihan_group_id: i64,
    pub course_id: i64,
    pub program_id: i64,
    pub term: String,
    pub total_items: i32,
    pub col1_percentage: i32,
    pub col2_percentage: i32,
    pub col3_percentage: i32,
    pub col4_percentage: i32,
    pub col1_expected: i32,
    pub col2_expected: i32,
    pub col3_expected: i32,
    pub col4_expected: i32,
    pub tos_cpys: String,
    pub version: i32,
    pub status: String,
    pub chair_submitted_at: Option<DateTime<Utc>>,
    pub chair_returned_at: Option<DateTime<Utc>>,
    pub chair_approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TosRecord {
    pub fn timeline(&self) -> Timeline {
        Timeline {
            chair_submitted_at: self.chair_submitted_at,
            chair_returned_at: self.chair_returned_at,
            chair_approved_at: self.chair_approved_at,
            ..Timeline::default()
        }
    }

    pub fn state(&self, is_latest: bool) -> Result<DocumentState, WorkflowError> {
        Ok(DocumentState {
            kind: DocumentKind::Tos,
            status: self.status.parse::<Status>()?,
            timeline: self.timeline(),
            version: self.version,
            is_latest,
        })
    }

    pub fn settings(&self) -> TosSettings {
        TosSettings {
            total_items: self.total_items,
            col1_percentage: self.col1_percentage,
            col2_percentage: self.col2_percentage,
            col3_percentage: self.col3_percentage,
            col4_percentage: self.col4_percentage,
            tos_cpys: self.tos_cpys.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TosRow {
    pub id: i64,
    pub row_order: i32,
    pub topic: String,
    pub no_hours: i32,
    pub percent: i32,
    pub no_items: i32,
    pub col1_value: i32,
    pub col2_value: i32,
    pub col3_value: i32,
    pub col4_value: i32,
}

/// A row ready to insert, as produced by allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTosRow {
    pub topic: String,
    pub no_hours: i32,
    pub percent: i32,
    pub no_items: i32,
    pub columns: [i32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TosDetail {
    #[serde(flatten)]
    pub record: TosRecord,
    pub course: CourseInfo,
    pub is_latest: bool,
    pub tos_rows: Vec<TosRow>,
    #[serde(default)]
    pub available_actions: Option<AvailableActions>,
}

impl TosDetail {
    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn state(&self) -> Result<DocumentState, WorkflowError> {
        self.record.state(self.is_latest)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TosVersion {
    pub id: i64,
    pub term: String,
    pub status: String,
    pub version: i32,
    pub chair_submitted_at: Option<DateTime<Utc>>,
    pub chair_returned_at: Option<DateTime<Utc>>,
    pub chair_approved_at: Option<DateTime<Utc>>,
}

/// Body of `POST /tos/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTos {
    pub syllabus_id: i64,
    pub term: String,
    #[serde(flatten)]
    pub settings: TosSettings,
    #[serde(default)]
    pub selected_topics: Vec<String>,
}

/// Body of `PUT /tos/{id}/`. The term is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TosUpdate {
    #[serde(flatten)]
    pub settings: TosSettings,
    #[serde(default)]
    pub selected_topics: Vec<String>,
}

/// One entry of `PUT /tos/{id}/update-rows/`. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowPatch {
    pub id: i64,
    pub topic: Option<String>,
    pub no_hours: Option<i32>,
    pub percent: Option<i32>,
    pub no_items: Option<i32>,
    pub col1_value: Option<i32>,
    pub col2_value: Option<i32>,
    pub col3_value: Option<i32>,
    pub col4_value: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowsUpdate {
    pub rows: Vec<RowPatch>,
}

/// Reply to `PUT /tos/{id}/update-rows/`: the rows that matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowsUpdated {
    pub updated_rows: Vec<TosRow>,
}
