use bson::doc;
use chrono::{NaiveDate, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::filter;
use crate::resp::problem::Problem;

use super::{
    next_display_order, Task, TeacherComment, TodoList, TASK_COLLECTION_NAME,
    TEACHER_COMMENT_COLLECTION_NAME, TODO_LIST_COLLECTION_NAME,
};

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn week_not_found(student_id: Uuid, week_start: chrono::NaiveDate) -> Problem {
        Problem::new_untyped(Status::NotFound, "No todo list for that week.")
            .insert("student_id", student_id.to_string())
            .insert("week_start", week_start.to_string())
    }

    #[inline]
    pub fn list_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Todo list doesn't exist.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn task_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Task doesn't exist.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn comment_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Comment doesn't exist.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn reorder_mismatch() -> Problem {
        Problem::new_untyped(
            Status::Conflict,
            "Reorder must list every task of the date exactly once.",
        )
    }
}

fn list_week_filter(student_id: Uuid, week_start: NaiveDate) -> bson::Document {
    doc! {
        "student_id": student_id.to_string(),
        "week_start": week_start.to_string(),
    }
}

fn list_tasks_filter(list_id: Uuid) -> bson::Document {
    doc! { "list_id": list_id.to_string() }
}

fn date_tasks_filter(list_id: Uuid, target_date: NaiveDate) -> bson::Document {
    doc! {
        "list_id": list_id.to_string(),
        "target_date": target_date.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTaskData {
    #[schema(value_type = String)]
    pub target_date: NaiveDate,
    pub content: String,
    /// Omitted → appended after the date's current tail.
    #[serde(default)]
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TaskUpdateData {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCommentData {
    #[schema(value_type = String)]
    pub target_date: NaiveDate,
    pub content: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CommentUpdateData {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub trait TodoDbExt {
    async fn get_todo_list(
        &self,
        student_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Option<TodoList>, Problem>;

    /// Lists are created lazily by the first write for a (student, week)
    /// pair; they start as drafts.
    async fn get_or_create_todo_list(
        &self,
        student_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<TodoList, Problem>;

    async fn get_list(&self, list_id: Uuid) -> Result<Option<TodoList>, Problem>;

    /// Applies the draft/published transition and persists it when anything
    /// changed. Re-publishing a published list returns it untouched.
    async fn set_list_published(&self, list_id: Uuid, publish: bool)
        -> Result<TodoList, Problem>;

    async fn tasks_for_list(&self, list_id: Uuid) -> Result<Vec<Task>, Problem>;
    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, Problem>;
    async fn add_task(&self, list_id: Uuid, data: NewTaskData) -> Result<Task, Problem>;
    async fn update_task(&self, task_id: Uuid, patch: TaskUpdateData) -> Result<Task, Problem>;
    async fn delete_task(&self, task_id: Uuid) -> Result<Task, Problem>;

    /// Rewrites `display_order` of one date's tasks to match `ordered`.
    /// The id list must cover exactly the date's tasks.
    async fn reorder_tasks(
        &self,
        list_id: Uuid,
        target_date: NaiveDate,
        ordered: &[Uuid],
    ) -> Result<Vec<Task>, Problem>;

    async fn comments_for_list(&self, list_id: Uuid) -> Result<Vec<TeacherComment>, Problem>;
    async fn get_comment(&self, id: Uuid) -> Result<Option<TeacherComment>, Problem>;
    async fn add_comment(
        &self,
        list_id: Uuid,
        author_user_id: Uuid,
        data: NewCommentData,
    ) -> Result<TeacherComment, Problem>;
    async fn update_comment(
        &self,
        id: Uuid,
        patch: CommentUpdateData,
    ) -> Result<TeacherComment, Problem>;
    async fn delete_comment(&self, id: Uuid) -> Result<TeacherComment, Problem>;
}

impl TodoDbExt for Database {
    async fn get_todo_list(
        &self,
        student_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Option<TodoList>, Problem> {
        self.collection(TODO_LIST_COLLECTION_NAME)
            .find_one(list_week_filter(student_id, week_start), None)
            .await
            .map_err(Problem::from)
    }

    async fn get_or_create_todo_list(
        &self,
        student_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<TodoList, Problem> {
        if let Some(existing) = self.get_todo_list(student_id, week_start).await? {
            return Ok(existing);
        }

        let list = TodoList::new(student_id, week_start);
        tracing::info!(
            "creating todo list {} for student {} week {}",
            list.id,
            student_id,
            week_start
        );

        self.collection::<TodoList>(TODO_LIST_COLLECTION_NAME)
            .insert_one(&list, None)
            .await
            .map_err(Problem::from)?;

        Ok(list)
    }

    async fn get_list(&self, list_id: Uuid) -> Result<Option<TodoList>, Problem> {
        self.collection(TODO_LIST_COLLECTION_NAME)
            .find_one(filter::by_id(list_id), None)
            .await
            .map_err(Problem::from)
    }

    async fn set_list_published(
        &self,
        list_id: Uuid,
        publish: bool,
    ) -> Result<TodoList, Problem> {
        let mut list = self
            .get_list(list_id)
            .await?
            .ok_or_else(|| problem::list_not_found(list_id))?;

        let changed = if publish {
            list.publish(Utc::now())
        } else {
            list.unpublish()
        };

        if !changed {
            return Ok(list);
        }

        let status = bson::to_bson(&list.status).expect("ListStatus must serialize to BSON");
        let creation_date = bson::to_bson(&list.list_creation_date)
            .expect("timestamps must serialize to BSON");

        self.collection::<TodoList>(TODO_LIST_COLLECTION_NAME)
            .update_one(
                filter::by_id(list_id),
                doc! { "$set": { "status": status, "list_creation_date": creation_date } },
                None,
            )
            .await
            .map_err(Problem::from)?;

        Ok(list)
    }

    async fn tasks_for_list(&self, list_id: Uuid) -> Result<Vec<Task>, Problem> {
        let options = FindOptions::builder()
            .sort(doc! { "target_date": 1, "display_order": 1 })
            .build();

        self.collection(TASK_COLLECTION_NAME)
            .find(list_tasks_filter(list_id), options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, Problem> {
        self.collection(TASK_COLLECTION_NAME)
            .find_one(filter::by_id(task_id), None)
            .await
            .map_err(Problem::from)
    }

    async fn add_task(&self, list_id: Uuid, data: NewTaskData) -> Result<Task, Problem> {
        let display_order = match data.display_order {
            Some(explicit) => explicit,
            None => {
                let siblings: Vec<Task> = self
                    .collection(TASK_COLLECTION_NAME)
                    .find(date_tasks_filter(list_id, data.target_date), None)
                    .await
                    .map_err(Problem::from)?
                    .try_collect()
                    .await
                    .map_err(Problem::from)?;

                let orders: Vec<i32> = siblings.iter().map(|t| t.display_order).collect();
                next_display_order(&orders)
            }
        };

        let task = Task::new(list_id, data.target_date, data.content, display_order);

        self.collection::<Task>(TASK_COLLECTION_NAME)
            .insert_one(&task, None)
            .await
            .map_err(Problem::from)?;

        Ok(task)
    }

    async fn update_task(&self, task_id: Uuid, patch: TaskUpdateData) -> Result<Task, Problem> {
        let mut set = bson::Document::new();
        if let Some(content) = patch.content {
            set.insert("content", content);
        }
        if let Some(done) = patch.done {
            set.insert("done", done);
        }

        if set.is_empty() {
            return self
                .get_task(task_id)
                .await?
                .ok_or_else(|| problem::task_not_found(task_id));
        }

        self.collection::<Task>(TASK_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(task_id),
                doc! { "$set": set },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await
            .map_err(Problem::from)?
            .ok_or_else(|| problem::task_not_found(task_id))
    }

    async fn delete_task(&self, task_id: Uuid) -> Result<Task, Problem> {
        self.collection(TASK_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(task_id), None)
            .await
            .map_err(Problem::from)?
            .ok_or_else(|| problem::task_not_found(task_id))
    }

    async fn reorder_tasks(
        &self,
        list_id: Uuid,
        target_date: NaiveDate,
        ordered: &[Uuid],
    ) -> Result<Vec<Task>, Problem> {
        let current: Vec<Task> = self
            .collection(TASK_COLLECTION_NAME)
            .find(date_tasks_filter(list_id, target_date), None)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)?;

        let mut current_ids: Vec<Uuid> = current.iter().map(|t| t.id).collect();
        let mut requested: Vec<Uuid> = ordered.to_vec();
        current_ids.sort();
        requested.sort();
        if current_ids != requested {
            return Err(problem::reorder_mismatch());
        }

        let collection = self.collection::<Task>(TASK_COLLECTION_NAME);
        for (position, task_id) in ordered.iter().enumerate() {
            collection
                .update_one(
                    filter::by_id(*task_id),
                    doc! { "$set": { "display_order": position as i32 } },
                    None,
                )
                .await
                .map_err(Problem::from)?;
        }

        let options = FindOptions::builder()
            .sort(doc! { "display_order": 1 })
            .build();
        collection
            .find(date_tasks_filter(list_id, target_date), options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn comments_for_list(&self, list_id: Uuid) -> Result<Vec<TeacherComment>, Problem> {
        let options = FindOptions::builder()
            .sort(doc! { "target_date": 1, "created": 1 })
            .build();

        self.collection(TEACHER_COMMENT_COLLECTION_NAME)
            .find(list_tasks_filter(list_id), options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<TeacherComment>, Problem> {
        self.collection(TEACHER_COMMENT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn add_comment(
        &self,
        list_id: Uuid,
        author_user_id: Uuid,
        data: NewCommentData,
    ) -> Result<TeacherComment, Problem> {
        let comment = TeacherComment::new(
            list_id,
            data.target_date,
            author_user_id,
            data.content,
            data.notes,
        );

        self.collection::<TeacherComment>(TEACHER_COMMENT_COLLECTION_NAME)
            .insert_one(&comment, None)
            .await
            .map_err(Problem::from)?;

        Ok(comment)
    }

    async fn update_comment(
        &self,
        id: Uuid,
        patch: CommentUpdateData,
    ) -> Result<TeacherComment, Problem> {
        let mut set = bson::Document::new();
        if let Some(content) = patch.content {
            set.insert("content", content);
        }
        if let Some(notes) = patch.notes {
            set.insert("notes", notes);
        }

        if set.is_empty() {
            return self
                .get_comment(id)
                .await?
                .ok_or_else(|| problem::comment_not_found(id));
        }

        self.collection::<TeacherComment>(TEACHER_COMMENT_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": set },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await
            .map_err(Problem::from)?
            .ok_or_else(|| problem::comment_not_found(id))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<TeacherComment, Problem> {
        self.collection(TEACHER_COMMENT_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)?
            .ok_or_else(|| problem::comment_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_filter_matches_serialized_dates() {
        let student = Uuid::new_v4();
        let week = NaiveDate::from_ymd_opt(2024, 4, 8).unwrap();
        let filter = list_week_filter(student, week);

        assert_eq!(filter.get_str("week_start").unwrap(), "2024-04-08");
        assert_eq!(filter.get_str("student_id").unwrap(), student.to_string());
    }

    #[test]
    fn date_filter_scopes_to_list_and_date() {
        let list = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let filter = date_tasks_filter(list, date);

        assert_eq!(filter.get_str("list_id").unwrap(), list.to_string());
        assert_eq!(filter.get_str("target_date").unwrap(), "2024-04-10");
    }
}
