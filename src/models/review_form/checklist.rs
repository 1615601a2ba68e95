//! Chair review checklist rules, shared by the server handlers and the client.

use serde::{Deserialize, Serialize};

use super::types::{Decision, Response};
use crate::errors::ValidationErrors;

pub const ALL_MUST_BE_YES: &str = "All must be marked YES to approve.";
pub const CANNOT_REJECT_ALL_YES: &str = "Cannot reject when all responses are YES.";
pub const RESPONSE_REQUIRED: &str = "Response required.";
pub const REMARKS_REQUIRED: &str = "Remarks required for NO responses.";
pub const FEEDBACK_REQUIRED: &str = "Feedback text is required when rejecting.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub id: i64,
    pub response: Option<Response>,
    #[serde(default)]
    pub remarks: String,
}

impl ChecklistEntry {
    pub fn new(id: i64, response: Option<Response>, remarks: impl Into<String>) -> Self {
        ChecklistEntry {
            id,
            response,
            remarks: remarks.into(),
        }
    }

    fn is_yes(&self) -> bool {
        self.response == Some(Response::Yes)
    }
}

/// Check a checklist against a decision. Errors are keyed by item id, except
/// the all-yes rejection which is a general error.
pub fn validate_checklist(
    entries: &[ChecklistEntry],
    decision: Decision,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    match decision {
        Decision::Approve => {
            for entry in entries.iter().filter(|e| !e.is_yes()) {
                errors.add(entry.id.to_string(), ALL_MUST_BE_YES);
            }
        }
        Decision::Reject => {
            if entries.iter().all(ChecklistEntry::is_yes) {
                return Err(ValidationErrors::general(CANNOT_REJECT_ALL_YES));
            }
            for entry in entries {
                match entry.response {
                    None => errors.add(entry.id.to_string(), RESPONSE_REQUIRED),
                    Some(Response::No) if entry.remarks.trim().is_empty() => {
                        errors.add(entry.id.to_string(), REMARKS_REQUIRED)
                    }
                    _ => {}
                }
            }
        }
    }
    errors.into_result()
}

/// A dean who returns a syllabus has to say why.
pub fn validate_dean_feedback(
    decision: Decision,
    feedback_text: Option<&str>,
) -> Result<(), ValidationErrors> {
    let blank = feedback_text.is_none_or(|t| t.trim().is_empty());
    if decision == Decision::Reject && blank {
        return Err(ValidationErrors::general(FEEDBACK_REQUIRED));
    }
    Ok(())
}

/// One element of `srf_yes_no`. Clients send either `"yes"`/`"no"` or a
/// boolean, and `null` for an unanswered item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireResponse {
    Flag(bool),
    Text(String),
}

impl WireResponse {
    fn to_response(&self) -> Result<Response, ()> {
        match self {
            WireResponse::Flag(true) => Ok(Response::Yes),
            WireResponse::Flag(false) => Ok(Response::No),
            WireResponse::Text(s) => s.parse(),
        }
    }
}

/// Zip the parallel arrays of a `review-syllabus-chair` payload into entries.
///
/// Without `srf_yes_no` every listed item counts as answered `yes`, the
/// shorthand approving clients use.
pub fn from_wire(
    srf_no: &[i64],
    srf_yes_no: Option<&[Option<WireResponse>]>,
    srf_remarks: Option<&[Option<String>]>,
) -> Result<Vec<ChecklistEntry>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(responses) = srf_yes_no {
        if responses.len() != srf_no.len() {
            errors.add("srf_yes_no", "Must have one entry per item in srf_no.");
        }
    }
    if let Some(remarks) = srf_remarks {
        if remarks.len() != srf_no.len() {
            errors.add("srf_remarks", "Must have one entry per item in srf_no.");
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut entries = Vec::with_capacity(srf_no.len());
    for (idx, &id) in srf_no.iter().enumerate() {
        let response = match srf_yes_no {
            None => Some(Response::Yes),
            Some(responses) => match &responses[idx] {
                None => None,
                Some(raw) => match raw.to_response() {
                    Ok(r) => Some(r),
                    Err(()) => {
                        errors.add(id.to_string(), "Response must be 'yes', 'no' or null.");
                        None
                    }
                },
            },
        };
        let remarks = srf_remarks
            .and_then(|r| r[idx].clone())
            .unwrap_or_default();
        entries.push(ChecklistEntry { id, response, remarks });
    }
    errors.into_result()?;
    Ok(entries)
}

/// Lay submitted entries over the template's indicators, in template order.
/// Indicators absent from the submission count as unanswered; ids that are
/// not indicators of the template are rejected.
pub fn against_template(
    submitted: &[ChecklistEntry],
    indicator_ids: &[i64],
) -> Result<Vec<ChecklistEntry>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for entry in submitted {
        if !indicator_ids.contains(&entry.id) {
            errors.add(
                entry.id.to_string(),
                "Item is not an indicator of the active review form.",
            );
        }
    }
    let mut seen = Vec::new();
    for entry in submitted {
        if seen.contains(&entry.id) {
            errors.add(entry.id.to_string(), "Item appears more than once.");
        }
        seen.push(entry.id);
    }
    errors.into_result()?;

    Ok(indicator_ids
        .iter()
        .map(|&id| {
            submitted
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .unwrap_or_else(|| ChecklistEntry::new(id, None, ""))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yes(id: i64) -> ChecklistEntry {
        ChecklistEntry::new(id, Some(Response::Yes), "")
    }

    fn no(id: i64, remarks: &str) -> ChecklistEntry {
        ChecklistEntry::new(id, Some(Response::No), remarks)
    }

    #[test]
    fn approve_succeeds_when_every_item_is_yes() {
        assert!(validate_checklist(&[yes(1), yes(2), yes(3)], Decision::Approve).is_ok());
    }

    #[test]
    fn approve_flags_each_non_yes_item() {
        let entries = [yes(1), no(2, "fix"), ChecklistEntry::new(3, None, "")];
        let errors = validate_checklist(&entries, Decision::Approve).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["2", "3"]);
        assert_eq!(errors.get("2").unwrap(), &[ALL_MUST_BE_YES.to_string()]);
    }

    #[test]
    fn reject_with_all_yes_is_refused() {
        let errors = validate_checklist(&[yes(1), yes(2)], Decision::Reject).unwrap_err();
        assert_eq!(
            errors.get(ValidationErrors::NON_FIELD).unwrap(),
            &[CANNOT_REJECT_ALL_YES.to_string()]
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn reject_requires_remarks_on_no() {
        let errors = validate_checklist(&[yes(1), no(2, "   ")], Decision::Reject).unwrap_err();
        assert_eq!(errors.get("2").unwrap(), &[REMARKS_REQUIRED.to_string()]);
        assert!(validate_checklist(&[yes(1), no(2, "Add rubrics")], Decision::Reject).is_ok());
    }

    #[test]
    fn reject_requires_every_item_answered() {
        let entries = [no(1, "missing PO letters"), ChecklistEntry::new(2, None, "")];
        let errors = validate_checklist(&entries, Decision::Reject).unwrap_err();
        assert_eq!(errors.get("2").unwrap(), &[RESPONSE_REQUIRED.to_string()]);
        assert!(errors.get("1").is_none());
    }

    #[test]
    fn dean_reject_needs_feedback() {
        let errors = validate_dean_feedback(Decision::Reject, Some("  ")).unwrap_err();
        assert_eq!(errors.first_message(), Some(FEEDBACK_REQUIRED));
        assert!(validate_dean_feedback(Decision::Reject, None).is_err());
        assert!(validate_dean_feedback(Decision::Reject, Some("Align COs with POs")).is_ok());
        assert!(validate_dean_feedback(Decision::Approve, None).is_ok());
    }

    #[test]
    fn wire_payload_without_responses_means_all_yes() {
        let entries = from_wire(&[4, 5], None, None).unwrap();
        assert!(entries.iter().all(|e| e.response == Some(Response::Yes)));
    }

    #[test]
    fn wire_payload_accepts_strings_and_booleans() {
        let responses = vec![
            Some(WireResponse::Text("no".into())),
            Some(WireResponse::Flag(true)),
            None,
        ];
        let remarks = vec![Some("Rubrics missing".to_string()), None, None];
        let entries = from_wire(&[7, 8, 9], Some(&responses), Some(&remarks)).unwrap();
        assert_eq!(entries[0], no(7, "Rubrics missing"));
        assert_eq!(entries[1], yes(8));
        assert_eq!(entries[2].response, None);
    }

    #[test]
    fn wire_payload_with_mismatched_lengths_fails() {
        let responses = vec![Some(WireResponse::Flag(true))];
        let errors = from_wire(&[1, 2], Some(&responses), None).unwrap_err();
        assert!(errors.get("srf_yes_no").is_some());
    }

    #[test]
    fn missing_indicators_count_as_unanswered() {
        let laid = against_template(&[yes(11)], &[10, 11, 12]).unwrap();
        assert_eq!(laid.len(), 3);
        assert_eq!(laid[0].response, None);
        assert_eq!(laid[1], yes(11));
        assert!(validate_checklist(&laid, Decision::Approve).is_err());
    }

    #[test]
    fn unknown_items_are_rejected() {
        let errors = against_template(&[yes(99)], &[10, 11]).unwrap_err();
        assert!(errors.get("99").is_some());
    }
}
