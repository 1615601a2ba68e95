use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A reviewer's answer to one checklist indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Yes,
    No,
}

impl Response {
    pub fn as_str(self) -> &'static str {
        match self {
            Response::Yes => "yes",
            Response::No => "no",
        }
    }
}

impl FromStr for Response {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Response::Yes),
            "no" => Ok(Response::No),
            _ => Err(()),
        }
    }
}

/// Reviewer verdict, shared by chair review, dean review and TOS review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

pub const INVALID_DECISION: &str = "Invalid decision. Must be 'approve' or 'reject'.";

impl Decision {
    pub fn parse(raw: &str) -> Option<Decision> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Decision::Approve),
            "reject" => Some(Decision::Reject),
            _ => None,
        }
    }

    /// Stored `srf_forms.action`: 1 approved, 0 rejected.
    pub fn action_code(self) -> i16 {
        match self {
            Decision::Approve => 1,
            Decision::Reject => 0,
        }
    }

    pub fn from_action_code(code: i16) -> Option<Decision> {
        match code {
            1 => Some(Decision::Approve),
            0 => Some(Decision::Reject),
            _ => None,
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Part,
    Indicator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFormItem {
    pub id: i64,
    pub item_type: ItemType,
    pub text: String,
    pub order: i32,
    pub syllabus_section: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFormTemplate {
    pub id: i64,
    pub code_no: String,
    pub title: String,
    pub description: String,
    pub revision_no: i32,
    pub effective_date: Option<NaiveDate>,
    pub items: Vec<ReviewFormItem>,
}

impl ReviewFormTemplate {
    /// Ids of the items that take a response, in template order.
    pub fn indicator_ids(&self) -> Vec<i64> {
        self.items
            .iter()
            .filter(|i| i.item_type == ItemType::Indicator)
            .map(|i| i.id)
            .collect()
    }
}

/// One answered line of a submitted review form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrfIndicator {
    pub id: i64,
    pub item_id: i64,
    pub item_text: String,
    pub item_order: i32,
    pub response: Option<Response>,
    pub remarks: String,
}

/// A chair's submitted review of one syllabus version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrfForm {
    pub id: i64,
    pub syllabus_id: i64,
    pub form_template_id: i64,
    pub code_no: String,
    pub title: String,
    pub user_id: i64,
    pub reviewed_by_snapshot: String,
    pub action: Option<Decision>,
    pub review_date: DateTime<Utc>,
    pub indicators: Vec<SrfIndicator>,
}

/// Everything needed to persist a chair review.
pub struct NewSrfForm<'a> {
    pub syllabus_id: i64,
    pub form_template_id: i64,
    pub user_id: i64,
    pub reviewed_by_snapshot: &'a str,
    pub decision: Decision,
    pub entries: &'a [super::checklist::ChecklistEntry],
}

/// Body of `POST /syllabi/{id}/review-syllabus-chair/`: parallel arrays keyed
/// by position in `srf_no`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChairReviewRequest {
    pub decision: String,
    #[serde(default)]
    pub srf_no: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srf_yes_no: Option<Vec<Option<super::checklist::WireResponse>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srf_remarks: Option<Vec<Option<String>>>,
}

/// Body of `POST /syllabi/{id}/review/`. `action` is 1 to approve, 0 to reject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub action: i16,
    #[serde(default)]
    pub checklist: Vec<ReviewItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub item: i64,
    pub response: Option<Response>,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeanReviewRequest {
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,
}

/// Body of `PATCH /tos/{id}/review-tos/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: String,
}

/// Reply to a chair review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChairReviewOutcome {
    pub detail: String,
    pub srf_form_id: i64,
    pub syllabus_id: i64,
}
