//! Which banners and buttons a caller should see for a document.
//!
//! Every role view renders from this one function, parameterized by the
//! caller's capability set. Status is always decoded from the timeline, so a
//! stale status string cannot unlock an action.

use serde::{Deserialize, Serialize};

use super::status::{DocumentKind, Status};
use super::timeline::{derive_status, TimelineField};
use super::transition::{plan, Action, DocumentState};
use crate::auth::role::{Capabilities, Capability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub tone: Tone,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Edit,
    Submit,
    ChairApprove,
    ChairReturn,
    DeanApprove,
    DeanReturn,
    Replicate,
    ViewReviewForm,
    ViewDeanFeedback,
    ViewAuditLog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableActions {
    pub status: Status,
    pub banners: Vec<Banner>,
    pub actions: Vec<ActionKind>,
}

impl AvailableActions {
    pub fn allows(&self, action: ActionKind) -> bool {
        self.actions.contains(&action)
    }
}

fn required_capability(action: Action) -> Capability {
    match action {
        Action::Submit | Action::Replicate => Capability::Edit,
        Action::ChairApprove | Action::ChairReturn => Capability::ReviewChair,
        Action::DeanApprove | Action::DeanReturn => Capability::ReviewDean,
    }
}

fn action_kind(action: Action) -> ActionKind {
    match action {
        Action::Submit => ActionKind::Submit,
        Action::ChairApprove => ActionKind::ChairApprove,
        Action::ChairReturn => ActionKind::ChairReturn,
        Action::DeanApprove => ActionKind::DeanApprove,
        Action::DeanReturn => ActionKind::DeanReturn,
        Action::Replicate => ActionKind::Replicate,
    }
}

fn banner(kind: DocumentKind, status: Status) -> Option<Banner> {
    let (tone, message) = match (kind, status) {
        (DocumentKind::Syllabus, Status::PendingChairReview) => (
            Tone::Info,
            "This syllabus has been submitted to the Chairman for review.",
        ),
        (DocumentKind::Syllabus, Status::ReturnedByChair) => (
            Tone::Danger,
            "The Chairman has returned this syllabus. Check the review form for the revisions.",
        ),
        (DocumentKind::Syllabus, Status::RevisionsApplied) => (
            Tone::Info,
            "This syllabus has been re-submitted with revisions and is awaiting Chairman's re-review.",
        ),
        (DocumentKind::Syllabus, Status::ApprovedByChair) => (
            Tone::Success,
            "This syllabus has been approved by the Chairman. It is now pending Dean’s review.",
        ),
        (DocumentKind::Syllabus, Status::ReturnedByDean) => (
            Tone::Danger,
            "The Dean has returned this syllabus. Please check Dean feedback and revise accordingly.",
        ),
        (DocumentKind::Syllabus, Status::ApprovedByDean) => (
            Tone::Success,
            "This syllabus has been fully approved by the Dean.",
        ),
        (DocumentKind::Tos, Status::PendingChairReview) => (
            Tone::Info,
            "This TOS has been submitted to the Chairperson for review.",
        ),
        (DocumentKind::Tos, Status::ReturnedByChair) => {
            (Tone::Danger, "The Chairperson has returned this TOS.")
        }
        (DocumentKind::Tos, Status::RevisionsApplied) => (
            Tone::Info,
            "This TOS has been re-submitted with revisions and is awaiting Chairperson's re-review.",
        ),
        (DocumentKind::Tos, Status::ApprovedByChair) => {
            (Tone::Success, "This TOS has been approved by the Chairperson.")
        }
        (DocumentKind::Tos, Status::RequiresRevision) => (
            Tone::Warning,
            "Revisions are required before this TOS can proceed.",
        ),
        _ => return None,
    };
    Some(Banner {
        tone,
        message: message.to_string(),
    })
}

pub fn derive_available_actions(state: &DocumentState, caps: &Capabilities) -> AvailableActions {
    let status = derive_status(state.kind, &state.timeline, state.is_revision());
    let decoded = DocumentState { status, ..*state };

    let mut actions = Vec::new();
    if status.is_editable() && caps.has(Capability::Edit) {
        actions.push(ActionKind::Edit);
    }
    for action in Action::ALL {
        if caps.has(required_capability(action)) && plan(&decoded, action).is_ok() {
            actions.push(action_kind(action));
        }
    }

    let timeline = &state.timeline;
    if state.kind == DocumentKind::Syllabus
        && (timeline.is_set(TimelineField::ChairRejectedAt)
            || timeline.is_set(TimelineField::DeanSubmittedAt))
    {
        actions.push(ActionKind::ViewReviewForm);
    }
    if timeline.is_set(TimelineField::DeanRejectedAt) {
        actions.push(ActionKind::ViewDeanFeedback);
    }
    if caps.has(Capability::Audit) {
        actions.push(ActionKind::ViewAuditLog);
    }

    AvailableActions {
        status,
        banners: banner(state.kind, status).into_iter().collect(),
        actions,
    }
}
