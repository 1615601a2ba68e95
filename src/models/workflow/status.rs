use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two document types that move through review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Syllabus,
    Tos,
}

impl DocumentKind {
    /// Human-facing name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Syllabus => "Syllabus",
            DocumentKind::Tos => "TOS",
        }
    }

    /// `target_type` written to the audit trail.
    pub fn target_type(self) -> &'static str {
        match self {
            DocumentKind::Syllabus => "syllabus",
            DocumentKind::Tos => "tos",
        }
    }
}

/// Review status. The wire strings are the ones existing clients branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Draft")]
    Draft,
    #[serde(rename = "Requires Revision")]
    RequiresRevision,
    #[serde(rename = "Pending Chair Review")]
    PendingChairReview,
    #[serde(rename = "Revisions Applied")]
    RevisionsApplied,
    #[serde(rename = "Returned by Chair")]
    ReturnedByChair,
    #[serde(rename = "Approved by Chair")]
    ApprovedByChair,
    #[serde(rename = "Returned by Dean")]
    ReturnedByDean,
    #[serde(rename = "Approved by Dean")]
    ApprovedByDean,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Draft,
        Status::RequiresRevision,
        Status::PendingChairReview,
        Status::RevisionsApplied,
        Status::ReturnedByChair,
        Status::ApprovedByChair,
        Status::ReturnedByDean,
        Status::ApprovedByDean,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::RequiresRevision => "Requires Revision",
            Status::PendingChairReview => "Pending Chair Review",
            Status::RevisionsApplied => "Revisions Applied",
            Status::ReturnedByChair => "Returned by Chair",
            Status::ApprovedByChair => "Approved by Chair",
            Status::ReturnedByDean => "Returned by Dean",
            Status::ApprovedByDean => "Approved by Dean",
        }
    }

    /// Whether this status exists in the given document kind's state machine.
    pub fn applies_to(self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Syllabus => true,
            DocumentKind::Tos => !matches!(self, Status::ReturnedByDean | Status::ApprovedByDean),
        }
    }

    /// Terminal statuses accept no further mutation.
    pub fn is_terminal(self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Syllabus => self == Status::ApprovedByDean,
            DocumentKind::Tos => self == Status::ApprovedByChair,
        }
    }

    /// Content can only be edited before it is handed to a reviewer.
    pub fn is_editable(self) -> bool {
        matches!(self, Status::Draft | Status::RequiresRevision)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown document status: {}", self.0)
    }
}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_string() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("approved".parse::<Status>().is_err());
    }

    #[test]
    fn tos_has_no_dean_states() {
        assert!(!Status::ApprovedByDean.applies_to(DocumentKind::Tos));
        assert!(!Status::ReturnedByDean.applies_to(DocumentKind::Tos));
        assert!(Status::ApprovedByChair.is_terminal(DocumentKind::Tos));
        assert!(!Status::ApprovedByChair.is_terminal(DocumentKind::Syllabus));
    }
}
