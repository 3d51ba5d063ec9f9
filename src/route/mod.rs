use std::collections::BTreeMap;

use mongodb::Database;
use rocket::{Build, Rocket, Route};

pub mod accounts;
pub mod files;
pub mod lesson;
pub mod todo;

use accounts::*;
use files::*;
use lesson::*;
use todo::*;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::data::account::db::AccountDbExt;
use crate::resp::jwt::doc::JWTAuth;
use crate::resp::jwt::SessionToken;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::{caps, data};

/// Admin-only surface guard, used by the web console routes.
pub(crate) async fn require_admin(db: &Database, auth: &SessionToken) -> Result<(), Problem> {
    match db.resolve_role(auth.user).await? {
        Some(Role::Admin) => Ok(()),
        _ => Err(problems::forbidden("admin")),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        who_am_i,
        student_list,
        student_create,
        teacher_list,
        teacher_create,
        teacher_set_status,
        assignment_list,
        assignment_create,
        assignment_end,
        todo_week_get,
        task_create,
        task_update,
        task_delete,
        task_reorder,
        list_publish,
        list_unpublish,
        comment_create,
        comment_update,
        comment_delete,
        schedule_get,
        lesson_create,
        lesson_set_status,
        absence_file,
        absence_reschedule,
        additional_file,
        additional_approve
    ),
    components(schemas(
        Role,
        caps::Capabilities,
        data::account::AccountStatus,
        data::account::Student,
        data::account::Teacher,
        data::account::db::NewStudentData,
        data::account::db::NewTeacherData,
        data::assignment::Assignment,
        data::assignment::AssignmentRole,
        data::assignment::AssignmentStatus,
        data::assignment::db::NewAssignmentData,
        data::todo::TodoList,
        data::todo::ListStatus,
        data::todo::Task,
        data::todo::TeacherComment,
        data::todo::db::NewTaskData,
        data::todo::db::TaskUpdateData,
        data::todo::db::NewCommentData,
        data::todo::db::CommentUpdateData,
        data::lesson::LessonSlot,
        data::lesson::SlotType,
        data::lesson::SlotStatus,
        data::lesson::AbsenceRequest,
        data::lesson::AbsenceStatus,
        data::lesson::AdditionalLessonRequest,
        data::lesson::AdditionalRequestStatus,
        data::lesson::db::NewLessonSlotData,
        data::lesson::db::RescheduleData,
        WhoAmIResponse,
        StudentListResponse,
        TeacherListResponse,
        TeacherStatusData,
        TodoWeekResponse,
        ReorderData,
        ScheduleResponse,
        SlotStatusData,
        AbsenceData,
        RescheduleResponse,
        NewAdditionalRequestData,
        ApproveAdditionalData,
        Problem
    )),
    modifiers(&JWTAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api_v1() -> Vec<Route> {
    routes![
        who_am_i,
        student_list,
        student_create,
        teacher_list,
        teacher_create,
        teacher_set_status,
        assignment_list,
        assignment_create,
        assignment_end,
        todo_week_get,
        task_create,
        task_update,
        task_delete,
        task_reorder,
        list_publish,
        list_unpublish,
        comment_create,
        comment_update,
        comment_delete,
        schedule_get,
        lesson_create,
        lesson_set_status,
        absence_file,
        absence_reschedule,
        additional_file,
        additional_approve
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api/v1", api_v1())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
        )
        .mount("/", routes![app, app_path])
}
