use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

pub static TODO_LIST_COLLECTION_NAME: &str = "todo_lists";
pub static TASK_COLLECTION_NAME: &str = "tasks";
pub static TEACHER_COMMENT_COLLECTION_NAME: &str = "teacher_comments";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListStatus {
    Draft,
    Published,
}

/// A student's weekly task plan.
///
/// Lists start as drafts visible to staff only. Publishing reveals the list
/// to the family and stamps `list_creation_date` the first time; the stamp
/// survives unpublishing and republishing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodoList {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub student_id: Uuid,
    /// Monday of the week the plan covers.
    #[schema(value_type = String)]
    pub week_start: NaiveDate,
    pub status: ListStatus,
    #[serde(default)]
    pub list_creation_date: Option<DateTime<Utc>>,
}

impl TodoList {
    pub fn new(student_id: Uuid, week_start: NaiveDate) -> TodoList {
        TodoList {
            id: Uuid::new_v4(),
            student_id,
            week_start,
            status: ListStatus::Draft,
            list_creation_date: None,
        }
    }

    /// Draft → published. Returns whether anything changed; publishing an
    /// already-published list is a no-op.
    pub fn publish(&mut self, at: DateTime<Utc>) -> bool {
        if self.status == ListStatus::Published {
            return false;
        }

        self.status = ListStatus::Published;
        if self.list_creation_date.is_none() {
            self.list_creation_date = Some(at);
        }
        true
    }

    /// Published → draft. `list_creation_date` is never cleared.
    pub fn unpublish(&mut self) -> bool {
        if self.status == ListStatus::Draft {
            return false;
        }

        self.status = ListStatus::Draft;
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub list_id: Uuid,
    #[schema(value_type = String)]
    pub target_date: NaiveDate,
    pub content: String,
    #[serde(default)]
    pub done: bool,
    /// Position within (list, target_date); lowest first.
    pub display_order: i32,
}

impl Task {
    pub fn new(
        list_id: Uuid,
        target_date: NaiveDate,
        content: impl ToString,
        display_order: i32,
    ) -> Task {
        Task {
            id: Uuid::new_v4(),
            list_id,
            target_date,
            content: content.to_string(),
            done: false,
            display_order,
        }
    }
}

/// Where a task lands when inserted without an explicit position: after the
/// date's current tail, or at 0 on an empty date.
pub fn next_display_order(existing: &[i32]) -> i32 {
    existing.iter().max().map(|max| max + 1).unwrap_or(0)
}

/// A staff note on one day of a student's plan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeacherComment {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub list_id: Uuid,
    #[schema(value_type = String)]
    pub target_date: NaiveDate,
    /// Auth account id of the author. Usually a teacher, occasionally an
    /// administrator.
    pub teacher_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl TeacherComment {
    pub fn new(
        list_id: Uuid,
        target_date: NaiveDate,
        teacher_id: Uuid,
        content: impl ToString,
        notes: Option<String>,
    ) -> TeacherComment {
        TeacherComment {
            id: Uuid::new_v4(),
            list_id,
            target_date,
            teacher_id,
            content: content.to_string(),
            notes,
            created: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 8).unwrap()
    }

    #[test]
    fn publish_stamps_creation_date_once() {
        let mut list = TodoList::new(Uuid::new_v4(), week());
        let first = Utc::now();

        assert!(list.publish(first));
        assert_eq!(list.status, ListStatus::Published);
        assert_eq!(list.list_creation_date, Some(first));

        // Publishing again changes nothing, timestamp included.
        assert!(!list.publish(first + Duration::hours(2)));
        assert_eq!(list.list_creation_date, Some(first));
    }

    #[test]
    fn unpublish_reverts_status_but_keeps_the_stamp() {
        let mut list = TodoList::new(Uuid::new_v4(), week());
        let first = Utc::now();
        list.publish(first);

        assert!(list.unpublish());
        assert_eq!(list.status, ListStatus::Draft);
        assert_eq!(list.list_creation_date, Some(first));

        // Republishing later keeps the original stamp.
        assert!(list.publish(first + Duration::days(1)));
        assert_eq!(list.list_creation_date, Some(first));
    }

    #[test]
    fn unpublishing_a_draft_is_a_no_op() {
        let mut list = TodoList::new(Uuid::new_v4(), week());
        assert!(!list.unpublish());
        assert_eq!(list.status, ListStatus::Draft);
    }

    #[test]
    fn tasks_append_after_the_current_tail() {
        assert_eq!(next_display_order(&[0, 1, 3]), 4);
        assert_eq!(next_display_order(&[2, 0]), 3);
    }

    #[test]
    fn first_task_of_a_date_lands_at_zero() {
        assert_eq!(next_display_order(&[]), 0);
    }
}
