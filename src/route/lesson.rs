use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::account::db::{problem as account_problem, AccountDbExt};
use crate::data::account::Student;
use crate::data::assignment::db::CapabilityDbExt;
use crate::data::lesson::db::{
    problem as lesson_problem, LessonDbExt, NewLessonSlotData, RescheduleData,
};
use crate::data::lesson::{AbsenceRequest, AdditionalLessonRequest, LessonSlot, SlotStatus};
use crate::resp::jwt::SessionToken;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::route::require_admin;
use crate::util::IsoDate;

#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleResponse {
    pub slots: Vec<LessonSlot>,
    pub absence_requests: Vec<AbsenceRequest>,
    pub additional_requests: Vec<AdditionalLessonRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SlotStatusData {
    pub status: SlotStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AbsenceData {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RescheduleResponse {
    pub request: AbsenceRequest,
    pub original: LessonSlot,
    pub replacement: LessonSlot,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewAdditionalRequestData {
    pub student_id: Uuid,
    #[schema(value_type = String)]
    pub requested_date: chrono::NaiveDate,
    #[schema(value_type = String)]
    pub starts_at: chrono::NaiveTime,
    #[schema(value_type = String)]
    pub ends_at: chrono::NaiveTime,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveAdditionalData {
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
}

async fn load_student(db: &Database, id: Uuid) -> Result<Student, Problem> {
    db.get_student(id)
        .await?
        .ok_or_else(|| account_problem::student_not_found(id))
}

/// Families act for their own students; administrators for anyone.
async fn require_family_or_admin(
    db: &Database,
    auth: &SessionToken,
    student: &Student,
) -> Result<(), Problem> {
    if student.parent_user_id == auth.user {
        return Ok(());
    }

    match db.resolve_role(auth.user).await? {
        Some(Role::Admin) => Ok(()),
        _ => Err(problems::forbidden("family_or_admin")),
    }
}

/// A student's schedule with its absence and additional-lesson requests.
#[utoipa::path(
    params(
        ("student_id", description = "student ID"),
        ("from", description = "window start, YYYY-MM-DD"),
        ("to", description = "window end, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Slots and requests in the window", body = ScheduleResponse),
        (status = 403, description = "Caller has no standing for this student", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/schedule/<student_id>?<from>&<to>")]
#[tracing::instrument]
pub async fn schedule_get(
    student_id: Uuid,
    from: Option<IsoDate>,
    to: Option<IsoDate>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<ScheduleResponse>, Problem> {
    let student = load_student(db, student_id).await?;

    let capabilities = db.capabilities_for(auth.user, student.id).await?;
    if !capabilities.any() && student.parent_user_id != auth.user {
        return Err(problems::forbidden("view_schedule"));
    }

    let slots = db
        .lesson_slots_for_student(student.id, from.map(|d| d.0), to.map(|d| d.0))
        .await?;
    let absence_requests = db.absence_requests_for_student(student.id).await?;
    let additional_requests = db.additional_requests_for_student(student.id).await?;

    Ok(Json(ScheduleResponse {
        slots,
        absence_requests,
        additional_requests,
    }))
}

/// Book a regular or fixed-meeting slot.
#[utoipa::path(request_body = NewLessonSlotData, security(("jwt" = [])))]
#[post("/lessons", format = "application/json", data = "<slot>")]
#[tracing::instrument]
pub async fn lesson_create(
    slot: Json<NewLessonSlotData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<LessonSlot>, Problem> {
    require_admin(db, &auth).await?;

    Ok(Json(db.create_lesson_slot(slot.into_inner()).await?))
}

/// Settle a slot as completed or absent. Administrators may settle any
/// slot; a teacher only the slots assigned to them.
#[utoipa::path(
    request_body = SlotStatusData,
    responses(
        (status = 200, description = "The settled slot", body = LessonSlot),
        (status = 409, description = "Slot already settled or status reserved", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/lessons/<slot_id>/status", format = "application/json", data = "<status>")]
#[tracing::instrument]
pub async fn lesson_set_status(
    slot_id: Uuid,
    status: Json<SlotStatusData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<LessonSlot>, Problem> {
    let slot = db
        .get_lesson_slot(slot_id)
        .await?
        .ok_or_else(|| lesson_problem::slot_not_found(slot_id))?;

    match db.resolve_role(auth.user).await? {
        Some(Role::Admin) => {}
        Some(Role::Teacher) => {
            let teacher = db
                .find_active_teacher(auth.user)
                .await?
                .ok_or_else(|| problems::forbidden("active_teacher"))?;
            if slot.teacher_id != Some(teacher.id) {
                return Err(problems::forbidden("own_lesson_slot"));
            }
        }
        _ => return Err(problems::forbidden("staff")),
    }

    Ok(Json(db.set_slot_status(slot_id, status.status).await?))
}

/// File an absence notice for a booked slot.
#[utoipa::path(request_body = AbsenceData, security(("jwt" = [])))]
#[post("/lessons/<slot_id>/absence", format = "application/json", data = "<absence>")]
#[tracing::instrument]
pub async fn absence_file(
    slot_id: Uuid,
    absence: Json<AbsenceData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<AbsenceRequest>, Problem> {
    let slot = db
        .get_lesson_slot(slot_id)
        .await?
        .ok_or_else(|| lesson_problem::slot_not_found(slot_id))?;
    let student = load_student(db, slot.student_id).await?;

    require_family_or_admin(db, &auth, &student).await?;

    let request = db
        .file_absence_request(slot_id, absence.into_inner().reason)
        .await?;

    Ok(Json(request))
}

/// Book the make-up lesson for an absence. Retires the original slot and
/// settles the request in one compound operation.
#[utoipa::path(
    request_body = RescheduleData,
    responses(
        (status = 200, description = "Settled request with original and replacement slots", body = RescheduleResponse),
        (status = 409, description = "Absence already rescheduled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/absences/<request_id>/reschedule", format = "application/json", data = "<slot>")]
#[tracing::instrument]
pub async fn absence_reschedule(
    request_id: Uuid,
    slot: Json<RescheduleData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<RescheduleResponse>, Problem> {
    require_admin(db, &auth).await?;

    let (request, original, replacement) =
        db.reschedule_absence(request_id, slot.into_inner()).await?;

    Ok(Json(RescheduleResponse {
        request,
        original,
        replacement,
    }))
}

/// Ask for an extra lesson in a given window.
#[utoipa::path(request_body = NewAdditionalRequestData, security(("jwt" = [])))]
#[post("/additional", format = "application/json", data = "<request>")]
#[tracing::instrument]
pub async fn additional_file(
    request: Json<NewAdditionalRequestData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<AdditionalLessonRequest>, Problem> {
    let data = request.into_inner();
    let student = load_student(db, data.student_id).await?;

    require_family_or_admin(db, &auth, &student).await?;

    let request = db
        .file_additional_request(
            student.id,
            data.requested_date,
            data.starts_at,
            data.ends_at,
            data.note,
        )
        .await?;

    Ok(Json(request))
}

/// Approve an extra-lesson request, booking the slot it asked for.
#[utoipa::path(
    request_body = ApproveAdditionalData,
    responses(
        (status = 200, description = "The booked slot", body = LessonSlot),
        (status = 409, description = "Request already approved", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/additional/<request_id>/approve", format = "application/json", data = "<approval>")]
#[tracing::instrument]
pub async fn additional_approve(
    request_id: Uuid,
    approval: Json<ApproveAdditionalData>,
    auth: SessionToken,
    db: &State<Database>,
) -> Result<Json<LessonSlot>, Problem> {
    require_admin(db, &auth).await?;

    let (_, booked) = db
        .approve_additional_request(request_id, approval.into_inner().teacher_id)
        .await?;

    Ok(Json(booked))
}
