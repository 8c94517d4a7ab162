use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::resp::util::date_time_as_unix_millis;

pub mod db;

pub static PAYMENT_COLLECTION_NAME: &str = "payments";

/// Record of a successful charge. Never updated or deleted once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_email: String,
    pub price: f64,
    pub transaction_id: String,
    #[serde(default = "Utc::now", with = "date_time_as_unix_millis")]
    #[schema(value_type = i64)]
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}
