use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Platform role of an authenticated account.
///
/// Roles are never stored on the account itself; they are derived by probing
/// the `administrators`, `teachers` and `students` collections in priority
/// order. An account matching none of them has no role, and every caller
/// must treat that as "deny".
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    Teacher,
    Admin,
}

impl Role {
    /// Indicates whether the role belongs to tutoring-service staff.
    pub fn is_staff(self) -> bool {
        self >= Role::Teacher
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Parent => write!(f, "parent"),
            Role::Teacher => write!(f, "teacher"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> String {
        role.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_order_by_privilege() {
        assert!(Role::Admin > Role::Teacher);
        assert!(Role::Teacher > Role::Parent);
    }

    #[test]
    fn only_staff_roles_are_staff() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Teacher.is_staff());
        assert!(!Role::Parent.is_staff());
    }
}
