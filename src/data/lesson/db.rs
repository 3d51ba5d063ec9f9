use bson::doc;
use chrono::{NaiveDate, NaiveTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::account::db::AccountDbExt;
use crate::data::filter;
use crate::resp::problem::Problem;

use super::{
    AbsenceRequest, AbsenceStatus, AdditionalLessonRequest, AdditionalRequestStatus, LessonSlot,
    SlotStatus, SlotType, ABSENCE_REQUEST_COLLECTION_NAME,
    ADDITIONAL_LESSON_REQUEST_COLLECTION_NAME, LESSON_SLOT_COLLECTION_NAME,
};

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn slot_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Lesson slot doesn't exist.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn absence_request_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Absence request doesn't exist.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn additional_request_not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Additional lesson request doesn't exist.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn slot_already_settled(id: Uuid, status: crate::data::lesson::SlotStatus) -> Problem {
        Problem::new_untyped(Status::Conflict, "Lesson slot is already settled.")
            .insert("id", id.to_string())
            .insert("status", status)
    }

    #[inline]
    pub fn duplicate_absence_request(slot_id: Uuid) -> Problem {
        Problem::new_untyped(
            Status::Conflict,
            "Slot already has an absence request.",
        )
        .insert("slot_id", slot_id.to_string())
    }

    #[inline]
    pub fn already_rescheduled(id: Uuid) -> Problem {
        Problem::new_untyped(Status::Conflict, "Absence was already rescheduled.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn already_booked(id: Uuid) -> Problem {
        Problem::new_untyped(Status::Conflict, "Request was already approved and booked.")
            .insert("id", id.to_string())
    }

    #[inline]
    pub fn reserved_slot_type() -> Problem {
        Problem::new_untyped(
            Status::Conflict,
            "Rescheduled and additional slots are created by their own operations.",
        )
    }

    #[inline]
    pub fn reserved_status() -> Problem {
        Problem::new_untyped(
            Status::Conflict,
            "Slots may only be marked completed or absent directly.",
        )
    }
}

fn student_filter(student_id: Uuid) -> bson::Document {
    doc! { "student_id": student_id.to_string() }
}

fn slot_ref_filter(slot_id: Uuid) -> bson::Document {
    doc! { "slot_id": slot_id.to_string() }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewLessonSlotData {
    pub student_id: Uuid,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
    pub slot_type: SlotType,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub starts_at: NaiveTime,
    #[schema(value_type = String)]
    pub ends_at: NaiveTime,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RescheduleData {
    #[schema(value_type = String)]
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub starts_at: NaiveTime,
    #[schema(value_type = String)]
    pub ends_at: NaiveTime,
}

pub trait LessonDbExt {
    async fn get_lesson_slot(&self, id: Uuid) -> Result<Option<LessonSlot>, Problem>;

    /// A student's schedule, optionally windowed by date (inclusive).
    async fn lesson_slots_for_student(
        &self,
        student_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<LessonSlot>, Problem>;

    /// Books a regular or fixed-meeting slot. Rescheduled and additional
    /// slots can only come out of their compound operations, which is what
    /// keeps their linkage fields populated.
    async fn create_lesson_slot(&self, data: NewLessonSlotData) -> Result<LessonSlot, Problem>;

    /// Settles a live slot as completed or absent. Everything else is
    /// rejected: terminal slots stay terminal, and `rescheduled_source`
    /// is reserved for the reschedule operation.
    async fn set_slot_status(&self, id: Uuid, status: SlotStatus)
        -> Result<LessonSlot, Problem>;

    async fn absence_requests_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<AbsenceRequest>, Problem>;
    async fn get_absence_request(&self, id: Uuid) -> Result<Option<AbsenceRequest>, Problem>;
    async fn file_absence_request(
        &self,
        slot_id: Uuid,
        reason: Option<String>,
    ) -> Result<AbsenceRequest, Problem>;

    /// The reschedule transaction: book the make-up slot, retire the
    /// original, settle the absence request. Readers never observe a
    /// retired original without its replacement because the replacement is
    /// written first and the original's update is the commit point.
    async fn reschedule_absence(
        &self,
        request_id: Uuid,
        data: RescheduleData,
    ) -> Result<(AbsenceRequest, LessonSlot, LessonSlot), Problem>;

    async fn additional_requests_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<AdditionalLessonRequest>, Problem>;
    async fn get_additional_request(
        &self,
        id: Uuid,
    ) -> Result<Option<AdditionalLessonRequest>, Problem>;
    async fn file_additional_request(
        &self,
        student_id: Uuid,
        requested_date: NaiveDate,
        starts_at: NaiveTime,
        ends_at: NaiveTime,
        note: Option<String>,
    ) -> Result<AdditionalLessonRequest, Problem>;

    /// Books the requested extra lesson and marks the request approved,
    /// with the same write discipline as [`reschedule_absence`].
    async fn approve_additional_request(
        &self,
        request_id: Uuid,
        teacher_id: Option<Uuid>,
    ) -> Result<(AdditionalLessonRequest, LessonSlot), Problem>;
}

impl LessonDbExt for Database {
    async fn get_lesson_slot(&self, id: Uuid) -> Result<Option<LessonSlot>, Problem> {
        self.collection(LESSON_SLOT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn lesson_slots_for_student(
        &self,
        student_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<LessonSlot>, Problem> {
        let mut query = student_filter(student_id);

        // ISO dates compare chronologically as strings.
        let mut window = bson::Document::new();
        if let Some(from) = from {
            window.insert("$gte", from.to_string());
        }
        if let Some(to) = to {
            window.insert("$lte", to.to_string());
        }
        if !window.is_empty() {
            query.insert("date", window);
        }

        let options = FindOptions::builder()
            .sort(doc! { "date": 1, "starts_at": 1 })
            .build();

        self.collection(LESSON_SLOT_COLLECTION_NAME)
            .find(query, options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn create_lesson_slot(&self, data: NewLessonSlotData) -> Result<LessonSlot, Problem> {
        use crate::data::account::db::problem as account_problem;

        match data.slot_type {
            SlotType::Regular | SlotType::FixedMeeting => {}
            SlotType::Rescheduled | SlotType::Additional => {
                return Err(problem::reserved_slot_type())
            }
        }

        if self.get_student(data.student_id).await?.is_none() {
            return Err(account_problem::student_not_found(data.student_id));
        }

        let slot = LessonSlot::new(
            data.student_id,
            data.teacher_id,
            data.slot_type,
            data.date,
            data.starts_at,
            data.ends_at,
        );

        self.collection::<LessonSlot>(LESSON_SLOT_COLLECTION_NAME)
            .insert_one(&slot, None)
            .await
            .map_err(Problem::from)?;

        Ok(slot)
    }

    async fn set_slot_status(
        &self,
        id: Uuid,
        status: SlotStatus,
    ) -> Result<LessonSlot, Problem> {
        match status {
            SlotStatus::Completed | SlotStatus::Absent => {}
            SlotStatus::AsScheduled | SlotStatus::RescheduledSource => {
                return Err(problem::reserved_status())
            }
        }

        let slot = self
            .get_lesson_slot(id)
            .await?
            .ok_or_else(|| problem::slot_not_found(id))?;

        if !slot.status.can_become(status) {
            return Err(problem::slot_already_settled(id, slot.status));
        }

        let status_bson = bson::to_bson(&status).expect("SlotStatus must serialize to BSON");

        self.collection::<LessonSlot>(LESSON_SLOT_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": { "status": status_bson } },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await
            .map_err(Problem::from)?
            .ok_or_else(|| problem::slot_not_found(id))
    }

    async fn absence_requests_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<AbsenceRequest>, Problem> {
        let options = FindOptions::builder().sort(doc! { "created": 1 }).build();

        self.collection(ABSENCE_REQUEST_COLLECTION_NAME)
            .find(student_filter(student_id), options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn get_absence_request(&self, id: Uuid) -> Result<Option<AbsenceRequest>, Problem> {
        self.collection(ABSENCE_REQUEST_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn file_absence_request(
        &self,
        slot_id: Uuid,
        reason: Option<String>,
    ) -> Result<AbsenceRequest, Problem> {
        let slot = self
            .get_lesson_slot(slot_id)
            .await?
            .ok_or_else(|| problem::slot_not_found(slot_id))?;

        if slot.status.is_terminal() {
            return Err(problem::slot_already_settled(slot_id, slot.status));
        }

        let existing: Option<AbsenceRequest> = self
            .collection(ABSENCE_REQUEST_COLLECTION_NAME)
            .find_one(slot_ref_filter(slot_id), None)
            .await
            .map_err(Problem::from)?;
        if existing.is_some() {
            return Err(problem::duplicate_absence_request(slot_id));
        }

        let request = AbsenceRequest::new(slot.student_id, slot_id, reason);

        self.collection::<AbsenceRequest>(ABSENCE_REQUEST_COLLECTION_NAME)
            .insert_one(&request, None)
            .await
            .map_err(Problem::from)?;

        Ok(request)
    }

    async fn reschedule_absence(
        &self,
        request_id: Uuid,
        data: RescheduleData,
    ) -> Result<(AbsenceRequest, LessonSlot, LessonSlot), Problem> {
        let mut request = self
            .get_absence_request(request_id)
            .await?
            .ok_or_else(|| problem::absence_request_not_found(request_id))?;

        if request.status == AbsenceStatus::Rescheduled {
            return Err(problem::already_rescheduled(request_id));
        }

        let mut original = self
            .get_lesson_slot(request.slot_id)
            .await?
            .ok_or_else(|| problem::slot_not_found(request.slot_id))?;

        if !original.status.can_become(SlotStatus::RescheduledSource) {
            return Err(problem::slot_already_settled(original.id, original.status));
        }

        let slots = self.collection::<LessonSlot>(LESSON_SLOT_COLLECTION_NAME);
        let requests = self.collection::<AbsenceRequest>(ABSENCE_REQUEST_COLLECTION_NAME);

        // Step 1: the replacement. Inert until the original points at it,
        // so a failure after this write leaves no visible inconsistency.
        let replacement =
            original.reschedule_replacement(data.date, data.starts_at, data.ends_at);
        slots
            .insert_one(&replacement, None)
            .await
            .map_err(Problem::from)?;

        // Step 2: retire the original. This is the commit point.
        let retired = slots
            .update_one(
                filter::by_id(original.id),
                doc! { "$set": {
                    "status": "rescheduled_source",
                    "rescheduled_to": replacement.id.to_string(),
                } },
                None,
            )
            .await;

        if let Err(e) = retired {
            if let Err(cleanup) = slots.delete_one(filter::by_id(replacement.id), None).await {
                tracing::error!(
                    "failed to delete orphaned replacement slot {}: {}",
                    replacement.id,
                    cleanup
                );
            }
            return Err(Problem::from(e));
        }

        // Step 3: settle the request.
        let settled = requests
            .update_one(
                filter::by_id(request.id),
                doc! { "$set": { "status": "rescheduled" } },
                None,
            )
            .await;

        if let Err(e) = settled {
            let revert = slots
                .update_one(
                    filter::by_id(original.id),
                    doc! {
                        "$set": { "status": "as_scheduled" },
                        "$unset": { "rescheduled_to": "" },
                    },
                    None,
                )
                .await;
            if let Err(cleanup) = revert {
                tracing::error!(
                    "failed to revert slot {} after reschedule failure: {}",
                    original.id,
                    cleanup
                );
            } else if let Err(cleanup) =
                slots.delete_one(filter::by_id(replacement.id), None).await
            {
                tracing::error!(
                    "failed to delete orphaned replacement slot {}: {}",
                    replacement.id,
                    cleanup
                );
            }
            return Err(Problem::from(e));
        }

        original.status = SlotStatus::RescheduledSource;
        original.rescheduled_to = Some(replacement.id);
        request.status = AbsenceStatus::Rescheduled;

        tracing::info!(
            "rescheduled slot {} to {} for absence request {}",
            original.id,
            replacement.id,
            request.id
        );

        Ok((request, original, replacement))
    }

    async fn additional_requests_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<AdditionalLessonRequest>, Problem> {
        let options = FindOptions::builder().sort(doc! { "created": 1 }).build();

        self.collection(ADDITIONAL_LESSON_REQUEST_COLLECTION_NAME)
            .find(student_filter(student_id), options)
            .await
            .map_err(Problem::from)?
            .try_collect()
            .await
            .map_err(Problem::from)
    }

    async fn get_additional_request(
        &self,
        id: Uuid,
    ) -> Result<Option<AdditionalLessonRequest>, Problem> {
        self.collection(ADDITIONAL_LESSON_REQUEST_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn file_additional_request(
        &self,
        student_id: Uuid,
        requested_date: NaiveDate,
        starts_at: NaiveTime,
        ends_at: NaiveTime,
        note: Option<String>,
    ) -> Result<AdditionalLessonRequest, Problem> {
        use crate::data::account::db::problem as account_problem;

        if self.get_student(student_id).await?.is_none() {
            return Err(account_problem::student_not_found(student_id));
        }

        let request =
            AdditionalLessonRequest::new(student_id, requested_date, starts_at, ends_at, note);

        self.collection::<AdditionalLessonRequest>(ADDITIONAL_LESSON_REQUEST_COLLECTION_NAME)
            .insert_one(&request, None)
            .await
            .map_err(Problem::from)?;

        Ok(request)
    }

    async fn approve_additional_request(
        &self,
        request_id: Uuid,
        teacher_id: Option<Uuid>,
    ) -> Result<(AdditionalLessonRequest, LessonSlot), Problem> {
        let mut request = self
            .get_additional_request(request_id)
            .await?
            .ok_or_else(|| problem::additional_request_not_found(request_id))?;

        if request.status == AdditionalRequestStatus::ApprovedAndBooked {
            return Err(problem::already_booked(request_id));
        }

        let slots = self.collection::<LessonSlot>(LESSON_SLOT_COLLECTION_NAME);
        let requests = self
            .collection::<AdditionalLessonRequest>(ADDITIONAL_LESSON_REQUEST_COLLECTION_NAME);

        let booked = request.booked_slot(teacher_id);
        slots
            .insert_one(&booked, None)
            .await
            .map_err(Problem::from)?;

        let approved = requests
            .update_one(
                filter::by_id(request.id),
                doc! { "$set": {
                    "status": "approved_and_booked",
                    "created_lesson_slot_id": booked.id.to_string(),
                } },
                None,
            )
            .await;

        if let Err(e) = approved {
            if let Err(cleanup) = slots.delete_one(filter::by_id(booked.id), None).await {
                tracing::error!(
                    "failed to delete orphaned additional slot {}: {}",
                    booked.id,
                    cleanup
                );
            }
            return Err(Problem::from(e));
        }

        request.status = AdditionalRequestStatus::ApprovedAndBooked;
        request.created_lesson_slot_id = Some(booked.id);

        tracing::info!(
            "booked additional slot {} for request {}",
            booked.id,
            request.id
        );

        Ok((request, booked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_values_serialize_to_the_written_literals() {
        let source = bson::to_bson(&SlotStatus::RescheduledSource).unwrap();
        assert_eq!(source, bson::Bson::String("rescheduled_source".to_string()));

        let scheduled = bson::to_bson(&SlotStatus::AsScheduled).unwrap();
        assert_eq!(scheduled, bson::Bson::String("as_scheduled".to_string()));

        let rescheduled = bson::to_bson(&AbsenceStatus::Rescheduled).unwrap();
        assert_eq!(rescheduled, bson::Bson::String("rescheduled".to_string()));

        let booked = bson::to_bson(&AdditionalRequestStatus::ApprovedAndBooked).unwrap();
        assert_eq!(booked, bson::Bson::String("approved_and_booked".to_string()));
    }

    #[test]
    fn date_window_is_inclusive_on_both_ends() {
        let mut window = bson::Document::new();
        window.insert("$gte", "2024-04-08");
        window.insert("$lte", "2024-04-14");

        assert_eq!(window.get_str("$gte").unwrap(), "2024-04-08");
        assert_eq!(window.get_str("$lte").unwrap(), "2024-04-14");
    }
}
