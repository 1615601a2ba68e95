use super::types::{TosSettings, TosTerm};
use crate::errors::ValidationErrors;

pub const INVALID_TOTAL_ITEMS: &str = "Please select a valid total item number.";
pub const KNOWLEDGE_OVER_LIMIT: &str = "Knowledge cannot exceed 50%.";
pub const LEVELS_NOT_100: &str = "Total cognitive levels must equal 100%.";
pub const NO_TOPICS: &str = "Please select at least one topic.";
pub const NEGATIVE_LEVEL: &str = "Cognitive level percentages cannot be negative.";

/// Highest share the Knowledge level may take.
pub const MAX_KNOWLEDGE: i32 = 50;

/// Check TOS settings, reporting only the first rule that fails.
pub fn validate_settings(
    settings: &TosSettings,
    selected_topics: &[String],
) -> Result<(), ValidationErrors> {
    let pct = settings.percentages();
    let message = if settings.total_items < 1 {
        INVALID_TOTAL_ITEMS
    } else if settings.col1_percentage > MAX_KNOWLEDGE {
        KNOWLEDGE_OVER_LIMIT
    } else if pct.iter().map(|p| i64::from(*p)).sum::<i64>() != 100 {
        LEVELS_NOT_100
    } else if !selected_topics.iter().any(|t| !t.trim().is_empty()) {
        NO_TOPICS
    } else if pct.iter().any(|p| *p < 0) {
        NEGATIVE_LEVEL
    } else {
        return Ok(());
    };
    Err(ValidationErrors::general(message))
}

/// Refusal for a second TOS on the same syllabus and term.
pub fn duplicate_message(course_code: &str, school_year: &str, term: TosTerm) -> String {
    format!("A TOS for syllabus {course_code} ({school_year}) and term {term} already exists.")
}
