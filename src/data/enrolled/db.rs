use chrono::Utc;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::data::{filter, is_duplicate_key};
use crate::resp::problem::{problems, Problem};
use crate::resp::result::{CreateResponse, ExistsResponse, InsertResponse};

use super::{EnrolledClass, ENROLLED_COLLECTION_NAME};

pub static ALREADY_ENROLLED_MESSAGE: &str = "You have already enrolled into this class!";

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCreateData {
    pub class_id: String,
    pub student_email: String,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub instructor_name: Option<String>,
}

impl EnrollmentCreateData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.class_id.trim().is_empty() {
            return Err(problems::bad_request("Enrollment needs a class id."));
        }
        Ok(())
    }
}

impl From<EnrollmentCreateData> for EnrolledClass {
    fn from(data: EnrollmentCreateData) -> Self {
        EnrolledClass {
            id: crate::data::new_id(),
            class_id: data.class_id,
            student_email: data.student_email,
            class_name: data.class_name,
            image: data.image,
            price: data.price,
            instructor_name: data.instructor_name,
            date: Utc::now(),
        }
    }
}

pub trait EnrolledDbExt {
    /// Inserts an enrollment. A second one for the same class and student is
    /// rejected by the unique index and reported as a soft conflict.
    async fn enroll(&self, enrollment: &EnrolledClass) -> Result<CreateResponse, mongodb::error::Error>;

    async fn find_enrollment(
        &self,
        class_id: impl AsRef<str>,
        email: impl AsRef<str>,
    ) -> Result<Option<EnrolledClass>, mongodb::error::Error>;

    async fn student_enrollments(
        &self,
        email: impl AsRef<str>,
    ) -> Result<Vec<EnrolledClass>, mongodb::error::Error>;

    async fn delete_enrollment(&self, id: impl AsRef<str>) -> Result<u64, mongodb::error::Error>;
}

impl EnrolledDbExt for Database {
    async fn enroll(&self, enrollment: &EnrolledClass) -> Result<CreateResponse, mongodb::error::Error> {
        tracing::info!(
            "Enrolling {} into class {}",
            enrollment.student_email,
            enrollment.class_id
        );

        match self
            .collection::<EnrolledClass>(ENROLLED_COLLECTION_NAME)
            .insert_one(enrollment, None)
            .await
        {
            Ok(_) => Ok(CreateResponse::Inserted(InsertResponse::new(&enrollment.id))),
            Err(e) if is_duplicate_key(&e) => Ok(CreateResponse::Exists(ExistsResponse::flagged(
                ALREADY_ENROLLED_MESSAGE,
            ))),
            Err(e) => Err(e),
        }
    }

    async fn find_enrollment(
        &self,
        class_id: impl AsRef<str>,
        email: impl AsRef<str>,
    ) -> Result<Option<EnrolledClass>, mongodb::error::Error> {
        self.collection::<EnrolledClass>(ENROLLED_COLLECTION_NAME)
            .find_one(filter::by_class_and_student(class_id, email), None)
            .await
    }

    async fn student_enrollments(
        &self,
        email: impl AsRef<str>,
    ) -> Result<Vec<EnrolledClass>, mongodb::error::Error> {
        self.collection::<EnrolledClass>(ENROLLED_COLLECTION_NAME)
            .find(filter::by_student(email), None)
            .await?
            .try_collect()
            .await
    }

    async fn delete_enrollment(&self, id: impl AsRef<str>) -> Result<u64, mongodb::error::Error> {
        let result = self
            .collection::<EnrolledClass>(ENROLLED_COLLECTION_NAME)
            .delete_one(filter::by_id(id), None)
            .await?;

        Ok(result.deleted_count)
    }
}
