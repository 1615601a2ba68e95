use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::{DocumentKind, Status};

/// The nullable transition instants of a document. A field is set iff the
/// transition it names has happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub chair_submitted_at: Option<DateTime<Utc>>,
    pub chair_rejected_at: Option<DateTime<Utc>>,
    pub dean_submitted_at: Option<DateTime<Utc>>,
    pub dean_rejected_at: Option<DateTime<Utc>>,
    pub dean_approved_at: Option<DateTime<Utc>>,
    pub chair_returned_at: Option<DateTime<Utc>>,
    pub chair_approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineField {
    ChairSubmittedAt,
    ChairRejectedAt,
    DeanSubmittedAt,
    DeanRejectedAt,
    DeanApprovedAt,
    ChairReturnedAt,
    ChairApprovedAt,
}

impl TimelineField {
    pub const ALL: [TimelineField; 7] = [
        TimelineField::ChairSubmittedAt,
        TimelineField::ChairRejectedAt,
        TimelineField::DeanSubmittedAt,
        TimelineField::DeanRejectedAt,
        TimelineField::DeanApprovedAt,
        TimelineField::ChairReturnedAt,
        TimelineField::ChairApprovedAt,
    ];

    /// Column name in the document table. Only ever interpolated from this
    /// fixed set, never from request input.
    pub fn column(self) -> &'static str {
        match self {
            TimelineField::ChairSubmittedAt => "chair_submitted_at",
            TimelineField::ChairRejectedAt => "chair_rejected_at",
            TimelineField::DeanSubmittedAt => "dean_submitted_at",
            TimelineField::DeanRejectedAt => "dean_rejected_at",
            TimelineField::DeanApprovedAt => "dean_approved_at",
            TimelineField::ChairReturnedAt => "chair_returned_at",
            TimelineField::ChairApprovedAt => "chair_approved_at",
        }
    }

    pub fn belongs_to(self, kind: DocumentKind) -> bool {
        match self {
            TimelineField::ChairSubmittedAt => true,
            TimelineField::ChairRejectedAt
            | TimelineField::DeanSubmittedAt
            | TimelineField::DeanRejectedAt
            | TimelineField::DeanApprovedAt => kind == DocumentKind::Syllabus,
            TimelineField::ChairReturnedAt | TimelineField::ChairApprovedAt => {
                kind == DocumentKind::Tos
            }
        }
    }
}

/// (field, prerequisite, mutually exclusive sibling)
type Rule = (TimelineField, Option<TimelineField>, Option<TimelineField>);

const SYLLABUS_RULES: &[Rule] = &[
    (TimelineField::ChairSubmittedAt, None, None),
    (
        TimelineField::ChairRejectedAt,
        Some(TimelineField::ChairSubmittedAt),
        Some(TimelineField::DeanSubmittedAt),
    ),
    (TimelineField::DeanSubmittedAt, Some(TimelineField::ChairSubmittedAt), None),
    (
        TimelineField::DeanRejectedAt,
        Some(TimelineField::DeanSubmittedAt),
        Some(TimelineField::DeanApprovedAt),
    ),
    (TimelineField::DeanApprovedAt, Some(TimelineField::DeanSubmittedAt), None),
];

const TOS_RULES: &[Rule] = &[
    (TimelineField::ChairSubmittedAt, None, None),
    (
        TimelineField::ChairReturnedAt,
        Some(TimelineField::ChairSubmittedAt),
        Some(TimelineField::ChairApprovedAt),
    ),
    (TimelineField::ChairApprovedAt, Some(TimelineField::ChairSubmittedAt), None),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineError {
    ForeignField(TimelineField),
    MissingPrerequisite { field: TimelineField, requires: TimelineField },
    Conflicting(TimelineField, TimelineField),
    OutOfOrder { field: TimelineField, before: TimelineField },
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineError::ForeignField(field) => {
                write!(f, "{} does not apply to this document type", field.column())
            }
            TimelineError::MissingPrerequisite { field, requires } => {
                write!(f, "{} is set but {} is not", field.column(), requires.column())
            }
            TimelineError::Conflicting(a, b) => {
                write!(f, "{} and {} cannot both be set", a.column(), b.column())
            }
            TimelineError::OutOfOrder { field, before } => {
                write!(f, "{} is earlier than {}", field.column(), before.column())
            }
        }
    }
}

impl Timeline {
    pub fn get(&self, field: TimelineField) -> Option<DateTime<Utc>> {
        match field {
            TimelineField::ChairSubmittedAt => self.chair_submitted_at,
            TimelineField::ChairRejectedAt => self.chair_rejected_at,
            TimelineField::DeanSubmittedAt => self.dean_submitted_at,
            TimelineField::DeanRejectedAt => self.dean_rejected_at,
            TimelineField::DeanApprovedAt => self.dean_approved_at,
            TimelineField::ChairReturnedAt => self.chair_returned_at,
            TimelineField::ChairApprovedAt => self.chair_approved_at,
        }
    }

    pub fn is_set(&self, field: TimelineField) -> bool {
        self.get(field).is_some()
    }

    pub fn stamp(&mut self, field: TimelineField, at: DateTime<Utc>) {
        let slot = match field {
            TimelineField::ChairSubmittedAt => &mut self.chair_submitted_at,
            TimelineField::ChairRejectedAt => &mut self.chair_rejected_at,
            TimelineField::DeanSubmittedAt => &mut self.dean_submitted_at,
            TimelineField::DeanRejectedAt => &mut self.dean_rejected_at,
            TimelineField::DeanApprovedAt => &mut self.dean_approved_at,
            TimelineField::ChairReturnedAt => &mut self.chair_returned_at,
            TimelineField::ChairApprovedAt => &mut self.chair_approved_at,
        };
        *slot = Some(at);
    }

    /// A timeline is consistent when it is a prefix of one legal review path
    /// with non-decreasing instants, and carries nothing from the other kind.
    pub fn check(&self, kind: DocumentKind) -> Result<(), TimelineError> {
        if let Some(field) = TimelineField::ALL
            .into_iter()
            .find(|f| !f.belongs_to(kind) && self.is_set(*f))
        {
            return Err(TimelineError::ForeignField(field));
        }

        let rules = match kind {
            DocumentKind::Syllabus => SYLLABUS_RULES,
            DocumentKind::Tos => TOS_RULES,
        };
        for &(field, requires, excludes) in rules {
            let Some(at) = self.get(field) else { continue };
            if let Some(prior) = requires {
                match self.get(prior) {
                    None => {
                        return Err(TimelineError::MissingPrerequisite { field, requires: prior });
                    }
                    Some(prior_at) if at < prior_at => {
                        return Err(TimelineError::OutOfOrder { field, before: prior });
                    }
                    Some(_) => {}
                }
            }
            if let Some(other) = excludes {
                if self.is_set(other) {
                    return Err(TimelineError::Conflicting(field, other));
                }
            }
        }
        Ok(())
    }
}

/// Decode the status purely from which instants are set. `is_revision`
/// (version > 1) only separates Draft from Requires Revision and Pending
/// Chair Review from Revisions Applied.
pub fn derive_status(kind: DocumentKind, timeline: &Timeline, is_revision: bool) -> Status {
    let submitted = if is_revision {
        Status::RevisionsApplied
    } else {
        Status::PendingChairReview
    };
    let unsubmitted = if is_revision {
        Status::RequiresRevision
    } else {
        Status::Draft
    };

    match kind {
        DocumentKind::Syllabus => {
            if timeline.dean_approved_at.is_some() {
                Status::ApprovedByDean
            } else if timeline.dean_rejected_at.is_some() {
                Status::ReturnedByDean
            } else if timeline.dean_submitted_at.is_some() {
                Status::ApprovedByChair
            } else if timeline.chair_rejected_at.is_some() {
                Status::ReturnedByChair
            } else if timeline.chair_submitted_at.is_some() {
                submitted
            } else {
                unsubmitted
            }
        }
        DocumentKind::Tos => {
            if timeline.chair_approved_at.is_some() {
                Status::ApprovedByChair
            } else if timeline.chair_returned_at.is_some() {
                Status::ReturnedByChair
            } else if timeline.chair_submitted_at.is_some() {
                submitted
            } else {
                unsubmitted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn empty_timeline_is_draft_or_requires_revision() {
        let t = Timeline::default();
        assert_eq!(derive_status(DocumentKind::Syllabus, &t, false), Status::Draft);
        assert_eq!(derive_status(DocumentKind::Syllabus, &t, true), Status::RequiresRevision);
        assert_eq!(derive_status(DocumentKind::Tos, &t, false), Status::Draft);
    }

    #[test]
    fn chair_approval_reads_as_pending_dean() {
        let mut t = Timeline::default();
        t.stamp(TimelineField::ChairSubmittedAt, at(8));
        t.stamp(TimelineField::DeanSubmittedAt, at(9));
        assert_eq!(derive_status(DocumentKind::Syllabus, &t, false), Status::ApprovedByChair);
        assert!(t.check(DocumentKind::Syllabus).is_ok());
    }

    #[test]
    fn rejects_missing_prerequisite() {
        let mut t = Timeline::default();
        t.stamp(TimelineField::DeanApprovedAt, at(9));
        assert_eq!(
            t.check(DocumentKind::Syllabus),
            Err(TimelineError::MissingPrerequisite {
                field: TimelineField::DeanApprovedAt,
                requires: TimelineField::DeanSubmittedAt,
            })
        );
    }

    #[test]
    fn rejects_chair_rejection_alongside_dean_submission() {
        let mut t = Timeline::default();
        t.stamp(TimelineField::ChairSubmittedAt, at(8));
        t.stamp(TimelineField::ChairRejectedAt, at(9));
        t.stamp(TimelineField::DeanSubmittedAt, at(10));
        assert_eq!(
            t.check(DocumentKind::Syllabus),
            Err(TimelineError::Conflicting(
                TimelineField::ChairRejectedAt,
                TimelineField::DeanSubmittedAt
            ))
        );
    }

    #[test]
    fn rejects_out_of_order_instants() {
        let mut t = Timeline::default();
        t.stamp(TimelineField::ChairSubmittedAt, at(10));
        t.stamp(TimelineField::ChairReturnedAt, at(9));
        assert_eq!(
            t.check(DocumentKind::Tos),
            Err(TimelineError::OutOfOrder {
                field: TimelineField::ChairReturnedAt,
                before: TimelineField::ChairSubmittedAt,
            })
        );
    }

    #[test]
    fn rejects_fields_of_the_other_kind() {
        let mut t = Timeline::default();
        t.stamp(TimelineField::ChairSubmittedAt, at(8));
        t.stamp(TimelineField::ChairApprovedAt, at(9));
        assert_eq!(
            t.check(DocumentKind::Syllabus),
            Err(TimelineError::ForeignField(TimelineField::ChairApprovedAt))
        );
        assert!(t.check(DocumentKind::Tos).is_ok());
    }
}
