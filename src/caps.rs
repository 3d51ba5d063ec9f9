use serde::Serialize;
use utoipa::ToSchema;

use crate::data::assignment::{Assignment, AssignmentRole};
use crate::role::Role;

/// What a caller may do to one student's weekly todo list.
///
/// Resolved once per request from the caller's platform role and, for
/// teachers, their active assignment to the student in question. The route
/// layer checks the relevant flag before every mutation; the data layer
/// itself is permission-agnostic.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, ToSchema)]
pub struct Capabilities {
    pub can_edit_tasks: bool,
    pub can_add_tasks: bool,
    pub can_delete_tasks: bool,
    pub can_reorder_tasks: bool,
    pub can_edit_comments: bool,
    pub can_publish: bool,
}

impl Capabilities {
    pub fn all() -> Capabilities {
        Capabilities {
            can_edit_tasks: true,
            can_add_tasks: true,
            can_delete_tasks: true,
            can_reorder_tasks: true,
            can_edit_comments: true,
            can_publish: true,
        }
    }

    /// Lesson-only teachers may annotate the plan but never change it.
    pub fn comment_only() -> Capabilities {
        Capabilities {
            can_edit_comments: true,
            ..Capabilities::none()
        }
    }

    pub fn none() -> Capabilities {
        Capabilities {
            can_edit_tasks: false,
            can_add_tasks: false,
            can_delete_tasks: false,
            can_reorder_tasks: false,
            can_edit_comments: false,
            can_publish: false,
        }
    }

    /// Whether the set grants anything at all. Holding any capability means
    /// the caller is staff with standing for this student.
    pub fn any(self) -> bool {
        self != Capabilities::none()
    }

    /// Capability policy.
    ///
    /// Admins hold every capability for every student. A teacher's
    /// capabilities come entirely from their assignment to the student:
    /// interview-lead grants everything, lesson-only grants comments, and
    /// no active assignment grants nothing at all. An ended assignment must
    /// never leak its historical rights, so anything not currently active
    /// resolves like no assignment. Parents and unauthenticated callers get
    /// the empty set.
    pub fn resolve(role: Option<Role>, assignment: Option<&Assignment>) -> Capabilities {
        match role {
            Some(Role::Admin) => Capabilities::all(),
            Some(Role::Teacher) => match assignment {
                Some(a) if a.is_active() => match a.role {
                    AssignmentRole::InterviewLead => Capabilities::all(),
                    AssignmentRole::LessonOnly => Capabilities::comment_only(),
                },
                _ => Capabilities::none(),
            },
            Some(Role::Parent) | None => Capabilities::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::assignment::{Assignment, AssignmentRole, AssignmentStatus};
    use uuid::Uuid;

    fn assignment(role: AssignmentRole) -> Assignment {
        Assignment::new(Uuid::new_v4(), Uuid::new_v4(), role)
    }

    #[test]
    fn admins_hold_every_capability() {
        assert_eq!(
            Capabilities::resolve(Some(Role::Admin), None),
            Capabilities::all()
        );
    }

    #[test]
    fn interview_lead_teachers_hold_every_capability() {
        let a = assignment(AssignmentRole::InterviewLead);
        let caps = Capabilities::resolve(Some(Role::Teacher), Some(&a));
        assert_eq!(caps, Capabilities::all());
        assert!(caps.can_publish);
    }

    #[test]
    fn lesson_only_teachers_may_only_comment() {
        let a = assignment(AssignmentRole::LessonOnly);
        let caps = Capabilities::resolve(Some(Role::Teacher), Some(&a));
        assert_eq!(
            caps,
            Capabilities {
                can_edit_tasks: false,
                can_add_tasks: false,
                can_delete_tasks: false,
                can_reorder_tasks: false,
                can_edit_comments: true,
                can_publish: false,
            }
        );
    }

    #[test]
    fn unassigned_teachers_hold_nothing() {
        assert_eq!(
            Capabilities::resolve(Some(Role::Teacher), None),
            Capabilities::none()
        );
    }

    #[test]
    fn ended_assignments_grant_nothing() {
        let mut a = assignment(AssignmentRole::InterviewLead);
        a.status = AssignmentStatus::Ended;
        assert_eq!(
            Capabilities::resolve(Some(Role::Teacher), Some(&a)),
            Capabilities::none()
        );
    }

    #[test]
    fn parents_and_anonymous_callers_hold_nothing() {
        assert_eq!(
            Capabilities::resolve(Some(Role::Parent), None),
            Capabilities::none()
        );
        assert_eq!(Capabilities::resolve(None, None), Capabilities::none());
    }
}
