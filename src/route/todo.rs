use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::caps::Capabilities;
use crate::data::account::db::{problem as account_problem, AccountDbExt};
use crate::data::account::Student;
use crate::data::assignment::db::CapabilityDbExt;
use crate::data::todo::db::{
    problem as todo_problem, CommentUpdateData, NewCommentData, NewTaskData, TaskUpdateData,
    TodoDbExt,
};
use crate::data::todo::{ListStatus, Task, TeacherComment, TodoList};
use crate::resp::jwt::SessionToken;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::util::IsoDate;

#[derive(Debug, Serialize, ToSchema)]
pub struct TodoWeekResponse {
    pub list: TodoList,
    pub tasks: Vec<Task>,
    pub comments: Vec<TeacherComment>,
    /// What the caller may do to this list; clients drive their UI off it.
    pub capabilities: Capabilities,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderData {
    #[schema(value_type = String)]
    pub target_date: chrono::NaiveDate,
    pub ordered: Vec<Uuid>,
}

async fn load_student(db: &Database, id: Uuid) -> Result<Student, Problem> {
    db.get_student(id)
        .await?
        .ok_or_else(|| account_problem::student_not_found(id))
}

/// Fetch one week of a student's plan.
///
/// Staff standing comes from the capability set; families are recognized by
/// the guardian account on the student record and only ever see published
/// lists (a draft reads as absent to them).
#[utoipa::path(
    params(
        ("student_id", description = "student ID"),
        ("week_start", description = "Monday of the requested week, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "The week's plan with the caller's capabilities", body = TodoWeekResponse),
        (status = 403, description = "Caller has no standing for this student", body = Problem),
        (status = 404, description = "No list exists for that week", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/todo/<student_id>/<week_start>")]
#[tracing::instrument]
pub async fn todo_week_get(
    student_id: Uuid,
    week_start: IsoDate,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<TodoWeekResponse>, Problem> {
    let student = load_student(db, student_id).await?;
    let capabilities = db.capabilities_for(auth.user, student.id).await?;

    let family_view = !capabilities.any();
    if family_view && student.parent_user_id != auth.user {
        return Err(problems::forbidden("view_todo_list"));
    }

    let list = db
        .get_todo_list(student_id, week_start.0)
        .await?
        .ok_or_else(|| todo_problem::week_not_found(student_id, week_start.0))?;

    if family_view && list.status != ListStatus::Published {
        return Err(todo_problem::week_not_found(student_id, week_start.0));
    }

    let tasks = db.tasks_for_list(list.id).await?;
    let comments = db.comments_for_list(list.id).await?;

    Ok(Json(TodoWeekResponse {
        list,
        tasks,
        comments,
        capabilities,
    }))
}

/// Add a task to a week's plan, creating the draft list on first write.
#[utoipa::path(request_body = NewTaskData, security(("jwt" = [])))]
#[post("/todo/<student_id>/<week_start>/tasks", format = "application/json", data = "<task>")]
#[tracing::instrument]
pub async fn task_create(
    student_id: Uuid,
    week_start: IsoDate,
    task: Json<NewTaskData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Task>, Problem> {
    let student = load_student(db, student_id).await?;

    let capabilities = db.capabilities_for(auth.user, student.id).await?;
    if !capabilities.can_add_tasks {
        return Err(problems::forbidden("can_add_tasks"));
    }

    let list = db.get_or_create_todo_list(student.id, week_start.0).await?;
    let task = db.add_task(list.id, task.into_inner()).await?;

    Ok(Json(task))
}

/// Update a task's content or completion flag.
#[utoipa::path(request_body = TaskUpdateData, security(("jwt" = [])))]
#[put("/todo/tasks/<task_id>", format = "application/json", data = "<patch>")]
#[tracing::instrument]
pub async fn task_update(
    task_id: Uuid,
    patch: Json<TaskUpdateData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Task>, Problem> {
    let task = db
        .get_task(task_id)
        .await?
        .ok_or_else(|| todo_problem::task_not_found(task_id))?;
    let list = db
        .get_list(task.list_id)
        .await?
        .ok_or_else(|| todo_problem::list_not_found(task.list_id))?;

    let capabilities = db.capabilities_for(auth.user, list.student_id).await?;
    if !capabilities.can_edit_tasks {
        return Err(problems::forbidden("can_edit_tasks"));
    }

    Ok(Json(db.update_task(task_id, patch.into_inner()).await?))
}

#[utoipa::path(
    responses(
        (status = 200, description = "The removed task", body = Task),
        (status = 403, description = "Caller may not delete tasks", body = Problem),
        (status = 404, description = "Task doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/todo/tasks/<task_id>")]
#[tracing::instrument]
pub async fn task_delete(
    task_id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Task>, Problem> {
    let task = db
        .get_task(task_id)
        .await?
        .ok_or_else(|| todo_problem::task_not_found(task_id))?;
    let list = db
        .get_list(task.list_id)
        .await?
        .ok_or_else(|| todo_problem::list_not_found(task.list_id))?;

    let capabilities = db.capabilities_for(auth.user, list.student_id).await?;
    if !capabilities.can_delete_tasks {
        return Err(problems::forbidden("can_delete_tasks"));
    }

    Ok(Json(db.delete_task(task_id).await?))
}

/// Rewrite the ordering of one date's tasks.
#[utoipa::path(request_body = ReorderData, security(("jwt" = [])))]
#[put("/todo/lists/<list_id>/order", format = "application/json", data = "<order>")]
#[tracing::instrument]
pub async fn task_reorder(
    list_id: Uuid,
    order: Json<ReorderData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Vec<Task>>, Problem> {
    let list = db
        .get_list(list_id)
        .await?
        .ok_or_else(|| todo_problem::list_not_found(list_id))?;

    let capabilities = db.capabilities_for(auth.user, list.student_id).await?;
    if !capabilities.can_reorder_tasks {
        return Err(problems::forbidden("can_reorder_tasks"));
    }

    let order = order.into_inner();
    let tasks = db
        .reorder_tasks(list_id, order.target_date, &order.ordered)
        .await?;

    Ok(Json(tasks))
}

/// Publish a draft list to the family. Idempotent; the first publish stamps
/// the list's creation date.
#[utoipa::path(
    responses(
        (status = 200, description = "The published list", body = TodoList),
        (status = 403, description = "Caller may not publish", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/todo/lists/<list_id>/publish")]
#[tracing::instrument]
pub async fn list_publish(
    list_id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<TodoList>, Problem> {
    set_published(list_id, true, auth, db).await
}

/// Pull a published list back to draft. The creation-date stamp stays.
#[utoipa::path(security(("jwt" = [])))]
#[put("/todo/lists/<list_id>/unpublish")]
#[tracing::instrument]
pub async fn list_unpublish(
    list_id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<TodoList>, Problem> {
    set_published(list_id, false, auth, db).await
}

async fn set_published(
    list_id: Uuid,
    publish: bool,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<TodoList>, Problem> {
    let list = db
        .get_list(list_id)
        .await?
        .ok_or_else(|| todo_problem::list_not_found(list_id))?;

    let capabilities = db.capabilities_for(auth.user, list.student_id).await?;
    if !capabilities.can_publish {
        return Err(problems::forbidden("can_publish"));
    }

    Ok(Json(db.set_list_published(list_id, publish).await?))
}

/// Leave a staff comment on one day of the plan.
#[utoipa::path(request_body = NewCommentData, security(("jwt" = [])))]
#[post("/todo/lists/<list_id>/comments", format = "application/json", data = "<comment>")]
#[tracing::instrument]
pub async fn comment_create(
    list_id: Uuid,
    comment: Json<NewCommentData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<TeacherComment>, Problem> {
    let list = db
        .get_list(list_id)
        .await?
        .ok_or_else(|| todo_problem::list_not_found(list_id))?;

    let capabilities = db.capabilities_for(auth.user, list.student_id).await?;
    if !capabilities.can_edit_comments {
        return Err(problems::forbidden("can_edit_comments"));
    }

    let comment = db
        .add_comment(list_id, auth.user, comment.into_inner())
        .await?;

    Ok(Json(comment))
}

#[utoipa::path(request_body = CommentUpdateData, security(("jwt" = [])))]
#[put("/todo/comments/<comment_id>", format = "application/json", data = "<patch>")]
#[tracing::instrument]
pub async fn comment_update(
    comment_id: Uuid,
    patch: Json<CommentUpdateData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<TeacherComment>, Problem> {
    authorize_comment_author(comment_id, &auth, db).await?;

    Ok(Json(db.update_comment(comment_id, patch.into_inner()).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[delete("/todo/comments/<comment_id>")]
#[tracing::instrument]
pub async fn comment_delete(
    comment_id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<TeacherComment>, Problem> {
    authorize_comment_author(comment_id, &auth, db).await?;

    Ok(Json(db.delete_comment(comment_id).await?))
}

/// Comments may be changed by whoever may edit comments on the list, but
/// only the author touches their own text unless an administrator steps in.
async fn authorize_comment_author(
    comment_id: Uuid,
    auth: &SessionToken,
    db: &Database,
) -> Result<(), Problem> {
    let comment = db
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| todo_problem::comment_not_found(comment_id))?;
    let list = db
        .get_list(comment.list_id)
        .await?
        .ok_or_else(|| todo_problem::list_not_found(comment.list_id))?;

    let capabilities = db.capabilities_for(auth.user, list.student_id).await?;
    if !capabilities.can_edit_comments {
        return Err(problems::forbidden("can_edit_comments"));
    }

    if comment.teacher_id != auth.user {
        let role = db.resolve_role(auth.user).await?;
        if role != Some(Role::Admin) {
            return Err(problems::forbidden("edit_own_comment"));
        }
    }

    Ok(())
}
