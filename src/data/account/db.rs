use bson::doc;
use mongodb::options::FindOptions;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;
use crate::role::Role;

use super::{
    AccountStatus, Administrator, Student, Teacher, ADMINISTRATOR_COLLECTION_NAME,
    STUDENT_COLLECTION_NAME, TEACHER_COLLECTION_NAME,
};

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn student_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Student doesn't exist.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn teacher_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Teacher doesn't exist.")
            .insert("id", id.to_string())
    }
}

/// Staff probes match on the auth account id and require the record to be
/// active. Suspended staff fall out of the query result itself, so the
/// resolver can't accidentally grant them a lower-priority role by falling
/// through on an explicit rejection.
fn active_staff_filter(user_id: Uuid) -> bson::Document {
    doc! {
        "user_id": user_id.to_string(),
        "account_status": "active",
    }
}

/// The parent probe has no status condition; any student record naming the
/// account as guardian makes it a parent.
fn parent_filter(user_id: Uuid) -> bson::Document {
    doc! { "parent_user_id": user_id.to_string() }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewStudentData {
    pub name: String,
    #[serde(default)]
    pub grade: Option<String>,
    pub parent_user_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTeacherData {
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<String>,
}

pub trait AccountDbExt {
    /// Derives the caller's platform role by probing the administrator,
    /// teacher and student collections in that priority order. Returns
    /// `None` when no collection claims the account; callers must deny
    /// access in that case.
    async fn resolve_role(&self, user_id: Uuid) -> Result<Option<Role>, Problem>;

    /// The teacher record behind an auth account, if one is active.
    async fn find_active_teacher(&self, user_id: Uuid) -> Result<Option<Teacher>, Problem>;

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, Problem>;
    async fn get_teacher(&self, id: Uuid) -> Result<Option<Teacher>, Problem>;
    async fn students_of_parent(&self, parent_user_id: Uuid) -> Result<Vec<Student>, Problem>;

    async fn list_students(&self, page: PageState) -> Result<(u64, Vec<Student>), Problem>;
    async fn list_teachers(&self, page: PageState) -> Result<(u64, Vec<Teacher>), Problem>;

    async fn create_student(&self, data: NewStudentData) -> Result<Student, Problem>;
    async fn create_teacher(&self, data: NewTeacherData) -> Result<Teacher, Problem>;
    async fn set_teacher_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Teacher, Problem>;
}

impl AccountDbExt for Database {
    async fn resolve_role(&self, user_id: Uuid) -> Result<Option<Role>, Problem> {
        let admin = self
            .collection::<Administrator>(ADMINISTRATOR_COLLECTION_NAME)
            .find_one(active_staff_filter(user_id), None)
            .await
            .map_err(Problem::from)?;
        if admin.is_some() {
            return Ok(Some(Role::Admin));
        }

        if self.find_active_teacher(user_id).await?.is_some() {
            return Ok(Some(Role::Teacher));
        }

        let student = self
            .collection::<Student>(STUDENT_COLLECTION_NAME)
            .find_one(parent_filter(user_id), None)
            .await
            .map_err(Problem::from)?;
        if student.is_some() {
            return Ok(Some(Role::Parent));
        }

        tracing::debug!("account {} matches no role", user_id);
        Ok(None)
    }

    async fn find_active_teacher(&self, user_id: Uuid) -> Result<Option<Teacher>, Problem> {
        self.collection(TEACHER_COLLECTION_NAME)
            .find_one(active_staff_filter(user_id), None)
            .await
            .map_err(Problem::from)
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, Problem> {
        self.collection(STUDENT_COLLECTION_NAME)
            .find_one(crate::data::filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn get_teacher(&self, id: Uuid) -> Result<Option<Teacher>, Problem> {
        self.collection(TEACHER_COLLECTION_NAME)
            .find_one(crate::data::filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn students_of_parent(&self, parent_user_id: Uuid) -> Result<Vec<Student>, Problem> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();

        self.collection(STUDENT_COLLECTION_NAME)
            .find(parent_filter(parent_user_id), options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn list_students(&self, page: PageState) -> Result<(u64, Vec<Student>), Problem> {
        let collection = self.collection::<Student>(STUDENT_COLLECTION_NAME);

        let total = collection
            .count_documents(None, None)
            .await
            .map_err(Problem::from)?;

        let options = FindOptions::builder()
            .sort(doc! { "name": 1 })
            .skip(page.skip())
            .limit(page.limit())
            .build();

        let students = collection
            .find(None, options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)?;

        Ok((total, students))
    }

    async fn list_teachers(&self, page: PageState) -> Result<(u64, Vec<Teacher>), Problem> {
        let collection = self.collection::<Teacher>(TEACHER_COLLECTION_NAME);

        let total = collection
            .count_documents(None, None)
            .await
            .map_err(Problem::from)?;

        let options = FindOptions::builder()
            .sort(doc! { "name": 1 })
            .skip(page.skip())
            .limit(page.limit())
            .build();

        let teachers = collection
            .find(None, options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)?;

        Ok((total, teachers))
    }

    async fn create_student(&self, data: NewStudentData) -> Result<Student, Problem> {
        let student = Student::new(data.name, data.grade, data.parent_user_id);

        self.collection::<Student>(STUDENT_COLLECTION_NAME)
            .insert_one(&student, None)
            .await
            .map_err(Problem::from)?;

        Ok(student)
    }

    async fn create_teacher(&self, data: NewTeacherData) -> Result<Teacher, Problem> {
        let teacher = Teacher::new(data.user_id, data.name, data.subjects);

        self.collection::<Teacher>(TEACHER_COLLECTION_NAME)
            .insert_one(&teacher, None)
            .await
            .map_err(Problem::from)?;

        Ok(teacher)
    }

    async fn set_teacher_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Teacher, Problem> {
        let status_bson = bson::to_bson(&status).expect("AccountStatus must serialize to BSON");

        let updated = self
            .collection::<Teacher>(TEACHER_COLLECTION_NAME)
            .find_one_and_update(
                crate::data::filter::by_id(id),
                doc! { "$set": { "account_status": status_bson } },
                mongodb::options::FindOneAndUpdateOptions::builder()
                    .return_document(mongodb::options::ReturnDocument::After)
                    .build(),
            )
            .await
            .map_err(Problem::from)?;

        updated.ok_or_else(|| problem::teacher_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_probes_only_match_active_records() {
        let user = Uuid::new_v4();
        let filter = active_staff_filter(user);

        assert_eq!(filter.get_str("user_id").unwrap(), user.to_string());
        assert_eq!(filter.get_str("account_status").unwrap(), "active");
    }

    #[test]
    fn parent_probe_carries_no_status_condition() {
        let user = Uuid::new_v4();
        let filter = parent_filter(user);

        assert_eq!(filter.get_str("parent_user_id").unwrap(), user.to_string());
        assert!(!filter.contains_key("account_status"));
    }

    #[test]
    fn account_status_serializes_to_the_probed_value() {
        let active = bson::to_bson(&AccountStatus::Active).unwrap();
        assert_eq!(active, bson::Bson::String("active".to_string()));
    }
}
