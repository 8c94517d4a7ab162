use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::data::cart::CartItem;
use crate::resp::util::date_time_as_unix_millis;

pub mod db;

pub static ENROLLED_COLLECTION_NAME: &str = "enrolledClasses";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledClass {
    #[serde(rename = "_id")]
    pub id: String,
    pub class_id: String,
    pub student_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_name: Option<String>,
    #[serde(default = "Utc::now", with = "date_time_as_unix_millis")]
    #[schema(value_type = i64)]
    pub date: DateTime<Utc>,
}

impl From<&CartItem> for EnrolledClass {
    fn from(item: &CartItem) -> Self {
        EnrolledClass {
            id: crate::data::new_id(),
            class_id: item.class_id.clone(),
            student_email: item.student_email.clone(),
            class_name: item.class_name.clone(),
            image: item.image.clone(),
            price: item.price,
            instructor_name: item.instructor_name.clone(),
            date: Utc::now(),
        }
    }
}
