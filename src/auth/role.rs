use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles a user can act under. The acting role is chosen per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Auditor,
    Chairperson,
    Dean,
    BayanihanLeader,
    BayanihanTeacher,
}

/// What a role may do to a document, independent of which document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    Edit,
    ReviewChair,
    ReviewDean,
    Audit,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Auditor,
        Role::Chairperson,
        Role::Dean,
        Role::BayanihanLeader,
        Role::BayanihanTeacher,
    ];

    /// Value stored in `user_roles.role`.
    pub fn code(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Auditor => "AUDITOR",
            Role::Chairperson => "CHAIRPERSON",
            Role::Dean => "DEAN",
            Role::BayanihanLeader => "BAYANIHAN_LEADER",
            Role::BayanihanTeacher => "BAYANIHAN_TEACHER",
        }
    }

    /// Refusal used when the caller claims a role they do not hold.
    pub fn not_held_message(self) -> &'static str {
        match self {
            Role::Admin => "You are not an Admin.",
            Role::Auditor => "You are not an Auditor.",
            Role::Chairperson => "You are not a Chairperson.",
            Role::Dean => "You are not a Dean.",
            Role::BayanihanLeader => "You are not a Bayanihan Leader.",
            Role::BayanihanTeacher => "You are not a Bayanihan Teacher.",
        }
    }

    /// The single role → capability table.
    pub fn capabilities(self) -> Capabilities {
        use Capability::*;
        let caps: &[Capability] = match self {
            Role::Admin => &[View, Edit, ReviewChair, ReviewDean, Audit],
            Role::Auditor => &[View, Audit],
            Role::Chairperson => &[View, ReviewChair],
            Role::Dean => &[View, ReviewDean],
            Role::BayanihanLeader => &[View, Edit],
            Role::BayanihanTeacher => &[View],
        };
        Capabilities(caps.to_vec())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRole;

impl FromStr for Role {
    type Err = InvalidRole;

    /// Case-insensitive; `bayanihan_leader` and `BAYANIHAN_LEADER` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Role::ALL
            .into_iter()
            .find(|r| r.code() == upper)
            .ok_or(InvalidRole)
    }
}

/// Capability set held by the caller for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(pub Vec<Capability>);

impl Capabilities {
    pub fn has(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_parameter_case_insensitively() {
        assert_eq!("chairperson".parse::<Role>(), Ok(Role::Chairperson));
        assert_eq!("BAYANIHAN_LEADER".parse::<Role>(), Ok(Role::BayanihanLeader));
        assert_eq!("student".parse::<Role>(), Err(InvalidRole));
    }

    #[test]
    fn only_admin_holds_every_capability() {
        for role in Role::ALL {
            let caps = role.capabilities();
            assert!(caps.has(Capability::View), "{role} must be able to view");
            let all = [
                Capability::Edit,
                Capability::ReviewChair,
                Capability::ReviewDean,
                Capability::Audit,
            ]
            .into_iter()
            .all(|c| caps.has(c));
            assert_eq!(all, role == Role::Admin);
        }
    }

    #[test]
    fn teachers_are_read_only() {
        assert_eq!(
            Role::BayanihanTeacher.capabilities(),
            Capabilities(vec![Capability::View])
        );
    }
}
