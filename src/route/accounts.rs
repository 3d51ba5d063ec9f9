use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::account::db::{AccountDbExt, NewStudentData, NewTeacherData};
use crate::data::account::{AccountStatus, Student, Teacher};
use crate::data::assignment::db::{AssignmentDbExt, NewAssignmentData};
use crate::data::assignment::Assignment;
use crate::middleware::paging::PageState;
use crate::resp::jwt::{auth_problem, SessionToken};
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::route::require_admin;

#[derive(Debug, Serialize, ToSchema)]
pub struct WhoAmIResponse {
    pub user: Uuid,
    pub role: Role,
    /// The caller's own students; empty unless the role is parent.
    pub students: Vec<Student>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentListResponse {
    pub total: u64,
    pub page: u32,
    pub students: Vec<Student>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeacherListResponse {
    pub total: u64,
    pub page: u32,
    pub teachers: Vec<Teacher>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TeacherStatusData {
    pub account_status: AccountStatus,
}

/// Who the caller is according to the account collections.
///
/// Resolution is fail-closed: an account with no role gets a 401 and the
/// client is expected to sign the user out.
#[utoipa::path(
    responses(
        (status = 200, description = "Resolved identity", body = WhoAmIResponse),
        (status = 401, description = "Account resolves to no role", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/me")]
#[tracing::instrument]
pub async fn who_am_i(
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<WhoAmIResponse>, Problem> {
    let role = db
        .resolve_role(auth.user)
        .await?
        .ok_or_else(|| auth_problem("Account has no role on this platform."))?;

    let students = match role {
        Role::Parent => db.students_of_parent(auth.user).await?,
        _ => vec![],
    };

    Ok(Json(WhoAmIResponse {
        user: auth.user,
        role,
        students,
    }))
}

#[utoipa::path(
    responses(
        (status = 200, description = "One page of students", body = StudentListResponse),
    ),
    security(("jwt" = []))
)]
#[get("/students")]
#[tracing::instrument]
pub async fn student_list(
    page: PageState,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<StudentListResponse>, Problem> {
    require_admin(db, &auth).await?;

    let (total, students) = db.list_students(page).await?;

    Ok(Json(StudentListResponse {
        total,
        page: page.page,
        students,
    }))
}

/// Enroll a student, linking the guardian's auth account.
#[utoipa::path(request_body = NewStudentData, security(("jwt" = [])))]
#[post("/students", format = "application/json", data = "<student>")]
#[tracing::instrument]
pub async fn student_create(
    student: Json<NewStudentData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Student>, Problem> {
    require_admin(db, &auth).await?;

    Ok(Json(db.create_student(student.into_inner()).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[get("/teachers")]
#[tracing::instrument]
pub async fn teacher_list(
    page: PageState,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<TeacherListResponse>, Problem> {
    require_admin(db, &auth).await?;

    let (total, teachers) = db.list_teachers(page).await?;

    Ok(Json(TeacherListResponse {
        total,
        page: page.page,
        teachers,
    }))
}

#[utoipa::path(request_body = NewTeacherData, security(("jwt" = [])))]
#[post("/teachers", format = "application/json", data = "<teacher>")]
#[tracing::instrument]
pub async fn teacher_create(
    teacher: Json<NewTeacherData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Teacher>, Problem> {
    require_admin(db, &auth).await?;

    Ok(Json(db.create_teacher(teacher.into_inner()).await?))
}

/// Activate or deactivate a teacher. Deactivation revokes the teacher role
/// on the very next request, since role probes only match active records.
#[utoipa::path(request_body = TeacherStatusData, security(("jwt" = [])))]
#[put("/teachers/<teacher_id>/status", format = "application/json", data = "<status>")]
#[tracing::instrument]
pub async fn teacher_set_status(
    teacher_id: Uuid,
    status: Json<TeacherStatusData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Teacher>, Problem> {
    require_admin(db, &auth).await?;

    let teacher = db
        .set_teacher_status(teacher_id, status.into_inner().account_status)
        .await?;

    Ok(Json(teacher))
}

#[utoipa::path(
    params(("student_id", description = "student ID")),
    responses(
        (status = 200, description = "Every assignment the student ever had", body = Vec<Assignment>),
    ),
    security(("jwt" = []))
)]
#[get("/students/<student_id>/assignments")]
#[tracing::instrument]
pub async fn assignment_list(
    student_id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Vec<Assignment>>, Problem> {
    require_admin(db, &auth).await?;

    Ok(Json(db.assignments_for_student(student_id).await?))
}

/// Assign a teacher to a student. At most one active interview lead is
/// allowed per student.
#[utoipa::path(
    request_body = NewAssignmentData,
    responses(
        (status = 200, description = "The created assignment", body = Assignment),
        (status = 409, description = "Student already has an interview lead", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/assignments", format = "application/json", data = "<assignment>")]
#[tracing::instrument]
pub async fn assignment_create(
    assignment: Json<NewAssignmentData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Assignment>, Problem> {
    require_admin(db, &auth).await?;

    Ok(Json(db.create_assignment(assignment.into_inner()).await?))
}

/// End an assignment. The permission engine stops honoring it immediately.
#[utoipa::path(security(("jwt" = [])))]
#[put("/assignments/<assignment_id>/end")]
#[tracing::instrument]
pub async fn assignment_end(
    assignment_id: Uuid,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<Assignment>, Problem> {
    require_admin(db, &auth).await?;

    Ok(Json(db.end_assignment(assignment_id).await?))
}
