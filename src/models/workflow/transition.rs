use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::{DocumentKind, Status, UnknownStatus};
use super::timeline::{derive_status, Timeline, TimelineError, TimelineField};

/// A review action requested against a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Submit,
    ChairApprove,
    ChairReturn,
    DeanApprove,
    DeanReturn,
    Replicate,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Submit,
        Action::ChairApprove,
        Action::ChairReturn,
        Action::DeanApprove,
        Action::DeanReturn,
        Action::Replicate,
    ];

    /// Audit action name, e.g. `syllabus.chair_approved`.
    pub fn audit_action(self, kind: DocumentKind) -> String {
        let verb = match self {
            Action::Submit => "submitted",
            Action::ChairApprove => "chair_approved",
            Action::ChairReturn => "chair_returned",
            Action::DeanApprove => "dean_approved",
            Action::DeanReturn => "dean_returned",
            Action::Replicate => "replicated",
        };
        format!("{}.{}", kind.target_type(), verb)
    }
}

/// Everything the state machine needs to know about a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentState {
    pub kind: DocumentKind,
    pub status: Status,
    pub timeline: Timeline,
    pub version: i32,
    pub is_latest: bool,
}

impl DocumentState {
    pub fn is_revision(&self) -> bool {
        self.version > 1
    }

    pub fn derived_status(&self) -> Status {
        derive_status(self.kind, &self.timeline, self.is_revision())
    }

    /// The stored status string must agree with its timeline.
    pub fn verify(&self) -> Result<(), WorkflowError> {
        self.timeline.check(self.kind).map_err(WorkflowError::Timeline)?;
        let derived = self.derived_status();
        if derived != self.status {
            return Err(WorkflowError::Inconsistent {
                stored: self.status,
                derived,
            });
        }
        Ok(())
    }
}

/// A legal move from one status to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub action: Action,
    pub from: Status,
    pub to: Status,
    /// Timeline field set by the move. `None` for replication, which starts a
    /// fresh row instead of stamping the current one.
    pub stamp: Option<TimelineField>,
}

impl Transition {
    pub fn apply(&self, timeline: &Timeline, at: DateTime<Utc>) -> Timeline {
        let mut next = *timeline;
        if let Some(field) = self.stamp {
            next.stamp(field, at);
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    UnknownStatus(String),
    Inconsistent { stored: Status, derived: Status },
    Timeline(TimelineError),
    Terminal { kind: DocumentKind },
    NoDeanStage,
    NotLatest,
    NotAllowed { kind: DocumentKind, action: Action, status: Status },
    /// The row changed between read and compare-and-set.
    Conflict,
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::UnknownStatus(raw) => {
                write!(f, "Stored status '{raw}' is not a known status.")
            }
            WorkflowError::Inconsistent { stored, derived } => write!(
                f,
                "Stored status '{stored}' does not match its review history ('{derived}')."
            ),
            WorkflowError::Timeline(e) => write!(f, "Inconsistent review history: {e}."),
            WorkflowError::Terminal { kind } => write!(
                f,
                "{} is already fully approved and can no longer change.",
                kind.label()
            ),
            WorkflowError::NoDeanStage => write!(f, "TOS documents have no dean review stage."),
            WorkflowError::NotLatest => write!(f, "Only the latest version can be replicated."),
            WorkflowError::NotAllowed { kind, action, .. } => match (kind, action) {
                (_, Action::Submit) => write!(
                    f,
                    "{} cannot be submitted from its current status.",
                    kind.label()
                ),
                (DocumentKind::Syllabus, Action::Replicate) => {
                    write!(f, "Replication allowed only for returned syllabi.")
                }
                (DocumentKind::Tos, Action::Replicate) => {
                    write!(f, "Replication allowed only for returned TOS.")
                }
                (_, Action::ChairApprove | Action::ChairReturn) => {
                    write!(f, "{} is not awaiting chair review.", kind.label())
                }
                (_, Action::DeanApprove | Action::DeanReturn) => {
                    write!(f, "{} is not awaiting dean review.", kind.label())
                }
            },
            WorkflowError::Conflict => write!(f, "Document was modified by another request."),
        }
    }
}

impl From<UnknownStatus> for WorkflowError {
    fn from(e: UnknownStatus) -> Self {
        WorkflowError::UnknownStatus(e.0)
    }
}

/// Decide whether `action` is legal for `state`, and what it leads to.
pub fn plan(state: &DocumentState, action: Action) -> Result<Transition, WorkflowError> {
    use DocumentKind::{Syllabus, Tos};
    use Status::*;

    state.verify()?;
    let kind = state.kind;
    let from = state.status;

    if kind == Tos && matches!(action, Action::DeanApprove | Action::DeanReturn) {
        return Err(WorkflowError::NoDeanStage);
    }
    if from.is_terminal(kind) {
        return Err(WorkflowError::Terminal { kind });
    }

    let (to, stamp) = match (kind, action, from) {
        (_, Action::Submit, Draft) => (PendingChairReview, Some(TimelineField::ChairSubmittedAt)),
        (_, Action::Submit, RequiresRevision) => {
            (RevisionsApplied, Some(TimelineField::ChairSubmittedAt))
        }
        // Chair approval of a syllabus doubles as the submission to the dean.
        (Syllabus, Action::ChairApprove, PendingChairReview | RevisionsApplied) => {
            (ApprovedByChair, Some(TimelineField::DeanSubmittedAt))
        }
        (Tos, Action::ChairApprove, PendingChairReview | RevisionsApplied) => {
            (ApprovedByChair, Some(TimelineField::ChairApprovedAt))
        }
        (Syllabus, Action::ChairReturn, PendingChairReview | RevisionsApplied) => {
            (ReturnedByChair, Some(TimelineField::ChairRejectedAt))
        }
        (Tos, Action::ChairReturn, PendingChairReview | RevisionsApplied) => {
            (ReturnedByChair, Some(TimelineField::ChairReturnedAt))
        }
        (Syllabus, Action::DeanApprove, ApprovedByChair) => {
            (ApprovedByDean, Some(TimelineField::DeanApprovedAt))
        }
        (Syllabus, Action::DeanReturn, ApprovedByChair) => {
            (ReturnedByDean, Some(TimelineField::DeanRejectedAt))
        }
        (Syllabus, Action::Replicate, ReturnedByChair | ReturnedByDean)
        | (Tos, Action::Replicate, ReturnedByChair) => {
            if !state.is_latest {
                return Err(WorkflowError::NotLatest);
            }
            (RequiresRevision, None)
        }
        _ => return Err(WorkflowError::NotAllowed { kind, action, status: from }),
    };

    Ok(Transition { action, from, to, stamp })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fresh(kind: DocumentKind, version: i32) -> DocumentState {
        let status = if version > 1 {
            Status::RequiresRevision
        } else {
            Status::Draft
        };
        DocumentState {
            kind,
            status,
            timeline: Timeline::default(),
            version,
            is_latest: true,
        }
    }

    fn step(state: &DocumentState, action: Action, at: DateTime<Utc>) -> DocumentState {
        let t = plan(state, action).unwrap();
        DocumentState {
            status: t.to,
            timeline: t.apply(&state.timeline, at),
            ..*state
        }
    }

    /// Walk every reachable state breadth-first and confirm that decoding the
    /// stamped timeline always lands on the status the transition promised.
    #[test]
    fn every_reachable_state_round_trips() {
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        for kind in [DocumentKind::Syllabus, DocumentKind::Tos] {
            for version in [1, 2] {
                let mut queue = vec![(fresh(kind, version), start)];
                let mut seen = 0;
                while let Some((state, at)) = queue.pop() {
                    seen += 1;
                    assert!(state.verify().is_ok(), "{state:?}");
                    for action in Action::ALL {
                        let Ok(t) = plan(&state, action) else { continue };
                        if t.stamp.is_none() {
                            continue;
                        }
                        let next_at = at + Duration::minutes(5);
                        let timeline = t.apply(&state.timeline, next_at);
                        assert_eq!(
                            derive_status(kind, &timeline, state.is_revision()),
                            t.to,
                            "{kind:?} {action:?} from {}",
                            state.status
                        );
                        queue.push((DocumentState { status: t.to, timeline, ..state }, next_at));
                    }
                }
                assert!(seen >= 4);
            }
        }
    }

    #[test]
    fn syllabus_happy_path_to_dean_approval() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let s = fresh(DocumentKind::Syllabus, 1);
        let s = step(&s, Action::Submit, t0);
        assert_eq!(s.status, Status::PendingChairReview);
        let s = step(&s, Action::ChairApprove, t0 + Duration::hours(1));
        assert_eq!(s.status, Status::ApprovedByChair);
        assert!(s.timeline.dean_submitted_at.is_some());
        let s = step(&s, Action::DeanApprove, t0 + Duration::hours(2));
        assert_eq!(s.status, Status::ApprovedByDean);
        assert_eq!(
            plan(&s, Action::Replicate),
            Err(WorkflowError::Terminal { kind: DocumentKind::Syllabus })
        );
    }

    #[test]
    fn resubmitted_revision_reads_as_revisions_applied() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let s = step(&fresh(DocumentKind::Tos, 3), Action::Submit, t0);
        assert_eq!(s.status, Status::RevisionsApplied);
        let s = step(&s, Action::ChairApprove, t0 + Duration::hours(1));
        assert_eq!(s.status, Status::ApprovedByChair);
        assert!(s.status.is_terminal(DocumentKind::Tos));
    }

    #[test]
    fn replicate_requires_latest_version() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let s = step(&fresh(DocumentKind::Syllabus, 1), Action::Submit, t0);
        let mut s = step(&s, Action::ChairReturn, t0 + Duration::hours(1));
        assert_eq!(s.status, Status::ReturnedByChair);

        let t = plan(&s, Action::Replicate).unwrap();
        assert_eq!(t.to, Status::RequiresRevision);
        assert_eq!(t.stamp, None);

        s.is_latest = false;
        assert_eq!(plan(&s, Action::Replicate), Err(WorkflowError::NotLatest));
    }

    #[test]
    fn replicate_from_draft_uses_legacy_message() {
        let err = plan(&fresh(DocumentKind::Syllabus, 1), Action::Replicate).unwrap_err();
        assert_eq!(err.to_string(), "Replication allowed only for returned syllabi.");
        let err = plan(&fresh(DocumentKind::Tos, 1), Action::Replicate).unwrap_err();
        assert_eq!(err.to_string(), "Replication allowed only for returned TOS.");
    }

    #[test]
    fn double_submit_is_refused() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let s = step(&fresh(DocumentKind::Syllabus, 1), Action::Submit, t0);
        let err = plan(&s, Action::Submit).unwrap_err();
        assert_eq!(err.to_string(), "Syllabus cannot be submitted from its current status.");
    }

    #[test]
    fn dean_actions_do_not_exist_for_tos() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let s = step(&fresh(DocumentKind::Tos, 1), Action::Submit, t0);
        assert_eq!(plan(&s, Action::DeanApprove), Err(WorkflowError::NoDeanStage));
    }

    #[test]
    fn status_that_disagrees_with_timeline_is_rejected() {
        let mut s = fresh(DocumentKind::Syllabus, 1);
        s.status = Status::ApprovedByChair;
        assert_eq!(
            plan(&s, Action::DeanApprove),
            Err(WorkflowError::Inconsistent {
                stored: Status::ApprovedByChair,
                derived: Status::Draft,
            })
        );
    }
}
