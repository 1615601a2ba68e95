use serde::{Deserialize, Serialize};

/// A person as shown on documents: instructors, reviewers, leaders.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
    pub suffix: String,
    pub signature: Option<String>,
}

impl UserSummary {
    /// "Dr. Ana Cruz PhD", or the username when no name parts are set.
    pub fn display_name(&self) -> String {
        let full = [
            self.prefix.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.suffix.as_str(),
        ]
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }

    pub fn has_signature(&self) -> bool {
        self.signature.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(prefix: &str, first: &str, last: &str, suffix: &str) -> UserSummary {
        UserSummary {
            id: 1,
            username: "acruz".into(),
            prefix: prefix.into(),
            first_name: first.into(),
            last_name: last.into(),
            suffix: suffix.into(),
            signature: None,
        }
    }

    #[test]
    fn display_name_skips_blank_parts() {
        assert_eq!(user("Dr.", "Ana", "Cruz", "").display_name(), "Dr. Ana Cruz");
        assert_eq!(user("", "Ana", "Cruz", "PhD").display_name(), "Ana Cruz PhD");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        assert_eq!(user("", " ", "", "").display_name(), "acruz");
    }

    #[test]
    fn blank_signature_is_no_signature() {
        let mut u = user("", "Ana", "Cruz", "");
        assert!(!u.has_signature());
        u.signature = Some("  ".into());
        assert!(!u.has_signature());
        u.signature = Some("signatures/acruz.png".into());
        assert!(u.has_signature());
    }
}
