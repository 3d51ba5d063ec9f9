use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

pub static ADMINISTRATOR_COLLECTION_NAME: &str = "administrators";
pub static TEACHER_COLLECTION_NAME: &str = "teachers";
pub static STUDENT_COLLECTION_NAME: &str = "students";

/// Lifecycle of a staff account. Role resolution only ever matches active
/// staff; flipping a record to inactive revokes access on the next request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Administrator {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    /// Account id issued by the auth service.
    pub user_id: Uuid,
    pub name: String,
    pub account_status: AccountStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Teacher {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    /// Account id issued by the auth service.
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    pub account_status: AccountStatus,
    #[serde(default = "Utc::now")]
    pub joined_on: DateTime<Utc>,
}

impl Teacher {
    pub fn new(user_id: Uuid, name: impl ToString, subjects: Vec<String>) -> Teacher {
        let id = Uuid::new_v4();
        tracing::info!("creating teacher record {} for account {}", id, user_id);

        Teacher {
            id,
            user_id,
            name: name.to_string(),
            subjects,
            account_status: AccountStatus::Active,
            joined_on: Utc::now(),
        }
    }
}

/// An enrolled student. The guardian's auth account is recorded on the
/// student record, which is also what makes that account resolve to the
/// parent role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Student {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub grade: Option<String>,
    pub parent_user_id: Uuid,
    #[serde(default = "Utc::now")]
    pub enrolled_on: DateTime<Utc>,
}

impl Student {
    pub fn new(name: impl ToString, grade: Option<String>, parent_user_id: Uuid) -> Student {
        let id = Uuid::new_v4();
        tracing::info!("enrolling student record {}", id);

        Student {
            id,
            name: name.to_string(),
            grade,
            parent_user_id,
            enrolled_on: Utc::now(),
        }
    }
}
