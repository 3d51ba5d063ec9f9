use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

pub static LESSON_SLOT_COLLECTION_NAME: &str = "lesson_slots";
pub static ABSENCE_REQUEST_COLLECTION_NAME: &str = "absence_requests";
pub static ADDITIONAL_LESSON_REQUEST_COLLECTION_NAME: &str = "additional_lesson_requests";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Regular,
    FixedMeeting,
    Rescheduled,
    Additional,
}

/// `AsScheduled` is the only live state; the other three are terminal for
/// the slot instance. A rescheduled slot keeps existing as the trace of the
/// original booking and points at its replacement.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    AsScheduled,
    Completed,
    Absent,
    RescheduledSource,
}

impl SlotStatus {
    pub fn is_terminal(self) -> bool {
        self != SlotStatus::AsScheduled
    }

    pub fn can_become(self, next: SlotStatus) -> bool {
        self == SlotStatus::AsScheduled && next != SlotStatus::AsScheduled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonSlot {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
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
    pub status: SlotStatus,
    /// Set on a rescheduled-source slot: the replacement's id.
    #[serde(default)]
    pub rescheduled_to: Option<Uuid>,
    /// Set on a replacement slot: the original's id.
    #[serde(default)]
    pub original_slot_id_for_reschedule: Option<Uuid>,
}

impl LessonSlot {
    pub fn new(
        student_id: Uuid,
        teacher_id: Option<Uuid>,
        slot_type: SlotType,
        date: NaiveDate,
        starts_at: NaiveTime,
        ends_at: NaiveTime,
    ) -> LessonSlot {
        LessonSlot {
            id: Uuid::new_v4(),
            student_id,
            teacher_id,
            slot_type,
            date,
            starts_at,
            ends_at,
            status: SlotStatus::AsScheduled,
            rescheduled_to: None,
            original_slot_id_for_reschedule: None,
        }
    }

    /// Builds the make-up slot replacing this one. The replacement starts
    /// live and carries the back-reference the reschedule trace relies on.
    pub fn reschedule_replacement(
        &self,
        date: NaiveDate,
        starts_at: NaiveTime,
        ends_at: NaiveTime,
    ) -> LessonSlot {
        LessonSlot {
            original_slot_id_for_reschedule: Some(self.id),
            ..LessonSlot::new(
                self.student_id,
                self.teacher_id,
                SlotType::Rescheduled,
                date,
                starts_at,
                ends_at,
            )
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceStatus {
    NotYetRescheduled,
    Rescheduled,
}

/// A family's notice that a booked slot will be missed. Lives next to the
/// slot until an administrator books the make-up lesson.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AbsenceRequest {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub student_id: Uuid,
    pub slot_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: AbsenceStatus,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl AbsenceRequest {
    pub fn new(student_id: Uuid, slot_id: Uuid, reason: Option<String>) -> AbsenceRequest {
        AbsenceRequest {
            id: Uuid::new_v4(),
            student_id,
            slot_id,
            reason,
            status: AbsenceStatus::NotYetRescheduled,
            created: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalRequestStatus {
    Requested,
    ApprovedAndBooked,
}

/// A family's ask for an extra lesson in a given window. Approval books a
/// real slot and records its id on the request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdditionalLessonRequest {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub student_id: Uuid,
    #[schema(value_type = String)]
    pub requested_date: NaiveDate,
    #[schema(value_type = String)]
    pub starts_at: NaiveTime,
    #[schema(value_type = String)]
    pub ends_at: NaiveTime,
    #[serde(default)]
    pub note: Option<String>,
    pub status: AdditionalRequestStatus,
    #[serde(default)]
    pub created_lesson_slot_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl AdditionalLessonRequest {
    pub fn new(
        student_id: Uuid,
        requested_date: NaiveDate,
        starts_at: NaiveTime,
        ends_at: NaiveTime,
        note: Option<String>,
    ) -> AdditionalLessonRequest {
        AdditionalLessonRequest {
            id: Uuid::new_v4(),
            student_id,
            requested_date,
            starts_at,
            ends_at,
            note,
            status: AdditionalRequestStatus::Requested,
            created_lesson_slot_id: None,
            created: Utc::now(),
        }
    }

    /// Builds the extra slot an approval books, assigned to `teacher_id`
    /// when the administrator already picked one.
    pub fn booked_slot(&self, teacher_id: Option<Uuid>) -> LessonSlot {
        LessonSlot::new(
            self.student_id,
            teacher_id,
            SlotType::Additional,
            self.requested_date,
            self.starts_at,
            self.ends_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> LessonSlot {
        LessonSlot::new(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            SlotType::Regular,
            NaiveDate::from_ymd_opt(2024, 4, 9).unwrap(),
            NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )
    }

    #[test]
    fn scheduled_slots_may_reach_every_terminal_state() {
        let from = SlotStatus::AsScheduled;
        assert!(from.can_become(SlotStatus::Completed));
        assert!(from.can_become(SlotStatus::Absent));
        assert!(from.can_become(SlotStatus::RescheduledSource));
        assert!(!from.can_become(SlotStatus::AsScheduled));
    }

    #[test]
    fn terminal_states_stay_terminal() {
        for terminal in [
            SlotStatus::Completed,
            SlotStatus::Absent,
            SlotStatus::RescheduledSource,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_become(SlotStatus::Completed));
            assert!(!terminal.can_become(SlotStatus::AsScheduled));
        }
    }

    #[test]
    fn replacement_slots_trace_back_to_the_original() {
        let original = slot();
        let replacement = original.reschedule_replacement(
            NaiveDate::from_ymd_opt(2024, 4, 16).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
        );

        assert_eq!(
            replacement.original_slot_id_for_reschedule,
            Some(original.id)
        );
        assert_eq!(replacement.slot_type, SlotType::Rescheduled);
        assert_eq!(replacement.status, SlotStatus::AsScheduled);
        assert_eq!(replacement.student_id, original.student_id);
        assert_eq!(replacement.teacher_id, original.teacher_id);
    }

    #[test]
    fn approval_books_an_additional_slot_in_the_requested_window() {
        let request = AdditionalLessonRequest::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 4, 20).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            None,
        );
        let teacher = Uuid::new_v4();
        let booked = request.booked_slot(Some(teacher));

        assert_eq!(booked.slot_type, SlotType::Additional);
        assert_eq!(booked.status, SlotStatus::AsScheduled);
        assert_eq!(booked.student_id, request.student_id);
        assert_eq!(booked.teacher_id, Some(teacher));
        assert_eq!(booked.date, request.requested_date);
        assert_eq!(booked.starts_at, request.starts_at);
        assert_eq!(booked.ends_at, request.ends_at);
    }
}
