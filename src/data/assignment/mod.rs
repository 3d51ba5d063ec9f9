use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

pub static ASSIGNMENT_COLLECTION_NAME: &str = "assignments";

/// Track of a teacher-student assignment.
///
/// The interview lead owns the student's weekly plan; lesson-only teachers
/// give lessons and may annotate the plan with comments but never change it.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRole {
    InterviewLead,
    LessonOnly,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Assignment {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    /// References `teachers._id`, not the auth account id.
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub role: AssignmentRole,
    pub status: AssignmentStatus,
    #[serde(default = "Utc::now")]
    pub started_on: DateTime<Utc>,
    #[serde(default)]
    pub ended_on: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn new(teacher_id: Uuid, student_id: Uuid, role: AssignmentRole) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            teacher_id,
            student_id,
            role,
            status: AssignmentStatus::Active,
            started_on: Utc::now(),
            ended_on: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

/// Picks the assignment that decides a teacher's rights when several are
/// active for the same pair: an interview-lead assignment always outranks
/// lesson-only ones.
pub fn preferred_assignment(assignments: Vec<Assignment>) -> Option<Assignment> {
    let mut preferred: Option<Assignment> = None;

    for assignment in assignments {
        match &preferred {
            Some(p) if p.role == AssignmentRole::InterviewLead => break,
            _ if assignment.role == AssignmentRole::InterviewLead => {
                preferred = Some(assignment);
            }
            None => preferred = Some(assignment),
            Some(_) => {}
        }
    }

    preferred
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assignments_start_active() {
        let a = Assignment::new(Uuid::new_v4(), Uuid::new_v4(), AssignmentRole::LessonOnly);
        assert!(a.is_active());
        assert!(a.ended_on.is_none());
    }

    #[test]
    fn interview_lead_outranks_lesson_only() {
        let teacher = Uuid::new_v4();
        let student = Uuid::new_v4();
        let lesson = Assignment::new(teacher, student, AssignmentRole::LessonOnly);
        let lead = Assignment::new(teacher, student, AssignmentRole::InterviewLead);

        let picked = preferred_assignment(vec![lesson.clone(), lead.clone()]).unwrap();
        assert_eq!(picked.id, lead.id);

        let picked = preferred_assignment(vec![lead.clone(), lesson]).unwrap();
        assert_eq!(picked.id, lead.id);
    }

    #[test]
    fn no_assignments_picks_none() {
        assert!(preferred_assignment(vec![]).is_none());
    }
}
