use bson::doc;
use mongodb::options::FindOptions;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::caps::Capabilities;
use crate::data::account::db::AccountDbExt;
use crate::resp::problem::Problem;
use crate::role::Role;

use super::{
    preferred_assignment, Assignment, AssignmentRole, AssignmentStatus, ASSIGNMENT_COLLECTION_NAME,
};

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn assignment_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Assignment doesn't exist.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn already_ended(id: Uuid) -> Problem {
        Problem::new_untyped(Status::Conflict, "Assignment has already ended.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn interview_lead_exists(student_id: Uuid) -> Problem {
        Problem::new_untyped(
            Status::Conflict,
            "Student already has an active interview-lead assignment.",
        )
        .insert("student_id", student_id.to_string())
    }
}

fn active_pair_filter(teacher_id: Uuid, student_id: Uuid) -> bson::Document {
    doc! {
        "teacher_id": teacher_id.to_string(),
        "student_id": student_id.to_string(),
        "status": "active",
    }
}

fn active_interview_lead_filter(student_id: Uuid) -> bson::Document {
    doc! {
        "student_id": student_id.to_string(),
        "role": "interview_lead",
        "status": "active",
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewAssignmentData {
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub role: AssignmentRole,
}

pub trait AssignmentDbExt {
    /// The assignment deciding a teacher's rights over one student. Only
    /// active assignments are considered; when interview-lead and
    /// lesson-only assignments coexist the interview-lead one wins.
    async fn find_active_assignment(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Assignment>, Problem>;

    async fn assignments_for_student(&self, student_id: Uuid)
        -> Result<Vec<Assignment>, Problem>;

    async fn create_assignment(&self, data: NewAssignmentData) -> Result<Assignment, Problem>;

    /// Flips an assignment to ended. The permission engine ignores it from
    /// that point on, historical record included.
    async fn end_assignment(&self, id: Uuid) -> Result<Assignment, Problem>;
}

impl AssignmentDbExt for Database {
    async fn find_active_assignment(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Assignment>, Problem> {
        let assignments: Vec<Assignment> = self
            .collection(ASSIGNMENT_COLLECTION_NAME)
            .find(active_pair_filter(teacher_id, student_id), None)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)?;

        Ok(preferred_assignment(assignments))
    }

    async fn assignments_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<Assignment>, Problem> {
        let options = FindOptions::builder()
            .sort(doc! { "started_on": 1 })
            .build();

        self.collection(ASSIGNMENT_COLLECTION_NAME)
            .find(doc! { "student_id": student_id.to_string() }, options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn create_assignment(&self, data: NewAssignmentData) -> Result<Assignment, Problem> {
        use crate::data::account::db::problem as account_problem;

        if self.get_teacher(data.teacher_id).await?.is_none() {
            return Err(account_problem::teacher_not_found(data.teacher_id));
        }
        if self.get_student(data.student_id).await?.is_none() {
            return Err(account_problem::student_not_found(data.student_id));
        }

        // One interview lead per student; extra leads would make edit rights
        // ambiguous.
        if data.role == AssignmentRole::InterviewLead {
            let existing = self
                .collection::<Assignment>(ASSIGNMENT_COLLECTION_NAME)
                .find_one(active_interview_lead_filter(data.student_id), None)
                .await
                .map_err(Problem::from)?;

            if existing.is_some() {
                return Err(problem::interview_lead_exists(data.student_id));
            }
        }

        let assignment = Assignment::new(data.teacher_id, data.student_id, data.role);

        self.collection::<Assignment>(ASSIGNMENT_COLLECTION_NAME)
            .insert_one(&assignment, None)
            .await
            .map_err(Problem::from)?;

        Ok(assignment)
    }

    async fn end_assignment(&self, id: Uuid) -> Result<Assignment, Problem> {
        let collection = self.collection::<Assignment>(ASSIGNMENT_COLLECTION_NAME);

        let existing = collection
            .find_one(crate::data::filter::by_id(id), None)
            .await
            .map_err(Problem::from)?
            .ok_or_else(|| problem::assignment_not_found(id))?;

        if existing.status == AssignmentStatus::Ended {
            return Err(problem::already_ended(id));
        }

        let ended_on = bson::to_bson(&chrono::Utc::now()).expect("timestamps serialize to BSON");

        collection
            .find_one_and_update(
                crate::data::filter::by_id(id),
                doc! { "$set": { "status": "ended", "ended_on": ended_on } },
                mongodb::options::FindOneAndUpdateOptions::builder()
                    .return_document(mongodb::options::ReturnDocument::After)
                    .build(),
            )
            .await
            .map_err(Problem::from)?
            .ok_or_else(|| problem::assignment_not_found(id))
    }
}

pub trait CapabilityDbExt {
    /// The permission engine: role resolution composed with assignment
    /// lookup. Admins skip the lookup entirely; teachers get whatever their
    /// assignment to this student grants; everyone else gets nothing.
    async fn capabilities_for(
        &self,
        user_id: Uuid,
        student_id: Uuid,
    ) -> Result<Capabilities, Problem>;
}

impl CapabilityDbExt for Database {
    async fn capabilities_for(
        &self,
        user_id: Uuid,
        student_id: Uuid,
    ) -> Result<Capabilities, Problem> {
        let role = self.resolve_role(user_id).await?;

        let assignment = match role {
            Some(Role::Teacher) => match self.find_active_teacher(user_id).await? {
                Some(teacher) => self.find_active_assignment(teacher.id, student_id).await?,
                None => None,
            },
            _ => None,
        };

        Ok(Capabilities::resolve(role, assignment.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_filter_only_matches_active_assignments() {
        let filter = active_pair_filter(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(filter.get_str("status").unwrap(), "active");
    }

    #[test]
    fn assignment_enums_serialize_to_the_filtered_values() {
        let lead = bson::to_bson(&AssignmentRole::InterviewLead).unwrap();
        assert_eq!(lead, bson::Bson::String("interview_lead".to_string()));

        let ended = bson::to_bson(&AssignmentStatus::Ended).unwrap();
        assert_eq!(ended, bson::Bson::String("ended".to_string()));
    }

    #[test]
    fn interview_lead_filter_pins_role_and_status() {
        let filter = active_interview_lead_filter(Uuid::new_v4());
        assert_eq!(filter.get_str("role").unwrap(), "interview_lead");
        assert_eq!(filter.get_str("status").unwrap(), "active");
    }
}
