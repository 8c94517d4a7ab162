use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod db;

pub static CLASS_COLLECTION_NAME: &str = "classes";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl ClassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassStatus::Pending => "pending",
            ClassStatus::Approved => "approved",
            ClassStatus::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_name: Option<String>,
    pub instructor_email: String,
    #[serde(default)]
    pub status: ClassStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub available_seats: i64,
    #[serde(default)]
    pub total_enrolled_students: i64,
}

impl Class {
    /// Enrollment has no floor on `available_seats`, so a full class goes
    /// negative instead of refusing students.
    pub fn is_overbooked(&self) -> bool {
        self.available_seats < 0
    }
}
