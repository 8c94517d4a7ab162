use bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::results::UpdateResult;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::data::filter;
use crate::resp::problem::{problems, Problem};
use crate::resp::result::InsertResponse;

use super::{Class, ClassStatus, CLASS_COLLECTION_NAME};

pub const POPULAR_CLASS_LIMIT: i64 = 6;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassCreateData {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub instructor_name: Option<String>,
    pub available_seats: i64,
}

impl ClassCreateData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.name.trim().is_empty() {
            return Err(problems::bad_request("Class name can't be empty."));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(problems::bad_request("Class price must be a non-negative number."));
        }
        if self.available_seats < 0 {
            return Err(problems::bad_request("Available seats can't be negative."));
        }
        Ok(())
    }

    /// Builds the stored class. The owner is always the requesting instructor.
    pub fn into_class(self, instructor_email: impl ToString) -> Class {
        Class {
            id: crate::data::new_id(),
            name: self.name,
            image: self.image,
            price: self.price,
            instructor_name: self.instructor_name,
            instructor_email: instructor_email.to_string(),
            status: ClassStatus::Pending,
            feedback: None,
            available_seats: self.available_seats,
            total_enrolled_students: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusUpdateData {
    pub status: ClassStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FeedbackUpdateData {
    pub feedback: String,
}

pub trait ClassDbExt {
    async fn create_class(&self, class: &Class) -> Result<InsertResponse, mongodb::error::Error>;

    async fn list_classes(&self) -> Result<Vec<Class>, mongodb::error::Error>;
    async fn list_approved_classes(&self) -> Result<Vec<Class>, mongodb::error::Error>;
    async fn list_popular_classes(&self, limit: i64) -> Result<Vec<Class>, mongodb::error::Error>;
    async fn list_instructor_classes(
        &self,
        email: impl AsRef<str>,
    ) -> Result<Vec<Class>, mongodb::error::Error>;

    async fn set_class_status(
        &self,
        id: impl AsRef<str>,
        status: ClassStatus,
    ) -> Result<UpdateResult, mongodb::error::Error>;
    async fn set_class_feedback(
        &self,
        id: impl AsRef<str>,
        feedback: impl AsRef<str>,
    ) -> Result<UpdateResult, mongodb::error::Error>;

    /// Applies the enroll transition in a single document update and returns
    /// the class as it is afterwards.
    async fn enroll_class(&self, id: impl AsRef<str>) -> Result<Option<Class>, mongodb::error::Error>;

    /// Inverse of [`ClassDbExt::enroll_class`].
    async fn unenroll_class(&self, id: impl AsRef<str>) -> Result<UpdateResult, mongodb::error::Error>;
}

async fn find_classes(
    db: &Database,
    filter: impl Into<Option<bson::Document>>,
    options: impl Into<Option<FindOptions>>,
) -> Result<Vec<Class>, mongodb::error::Error> {
    db.collection::<Class>(CLASS_COLLECTION_NAME)
        .find(filter, options)
        .await?
        .try_collect()
        .await
}

impl ClassDbExt for Database {
    async fn create_class(&self, class: &Class) -> Result<InsertResponse, mongodb::error::Error> {
        tracing::info!(
            "Creating class {} for instructor {}",
            class.id,
            class.instructor_email
        );

        self.collection::<Class>(CLASS_COLLECTION_NAME)
            .insert_one(class, None)
            .await?;

        Ok(InsertResponse::new(&class.id))
    }

    async fn list_classes(&self) -> Result<Vec<Class>, mongodb::error::Error> {
        find_classes(self, None, None).await
    }

    async fn list_approved_classes(&self) -> Result<Vec<Class>, mongodb::error::Error> {
        find_classes(
            self,
            doc! { "status": ClassStatus::Approved.as_str() },
            None,
        )
        .await
    }

    async fn list_popular_classes(&self, limit: i64) -> Result<Vec<Class>, mongodb::error::Error> {
        let options = FindOptions::builder()
            .sort(doc! { "totalEnrolledStudents": -1 })
            .limit(limit)
            .build();

        find_classes(self, None, options).await
    }

    async fn list_instructor_classes(
        &self,
        email: impl AsRef<str>,
    ) -> Result<Vec<Class>, mongodb::error::Error> {
        find_classes(self, doc! { "instructorEmail": email.as_ref() }, None).await
    }

    async fn set_class_status(
        &self,
        id: impl AsRef<str>,
        status: ClassStatus,
    ) -> Result<UpdateResult, mongodb::error::Error> {
        tracing::info!("Setting status of class {} to '{}'", id.as_ref(), status.as_str());

        self.collection::<Class>(CLASS_COLLECTION_NAME)
            .update_one(
                filter::by_id(id),
                doc! { "$set": { "status": status.as_str() } },
                None,
            )
            .await
    }

    async fn set_class_feedback(
        &self,
        id: impl AsRef<str>,
        feedback: impl AsRef<str>,
    ) -> Result<UpdateResult, mongodb::error::Error> {
        self.collection::<Class>(CLASS_COLLECTION_NAME)
            .update_one(
                filter::by_id(id),
                doc! { "$set": { "feedback": feedback.as_ref() } },
                None,
            )
            .await
    }

    async fn enroll_class(&self, id: impl AsRef<str>) -> Result<Option<Class>, mongodb::error::Error> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let class = self
            .collection::<Class>(CLASS_COLLECTION_NAME)
            .find_one_and_update(filter::by_id(id.as_ref()), enroll_update(1), options)
            .await?;

        if let Some(class) = &class {
            if class.is_overbooked() {
                tracing::warn!(
                    "class {} is overbooked: {} available seats",
                    class.id,
                    class.available_seats
                );
            }
        }

        Ok(class)
    }

    async fn unenroll_class(&self, id: impl AsRef<str>) -> Result<UpdateResult, mongodb::error::Error> {
        self.collection::<Class>(CLASS_COLLECTION_NAME)
            .update_one(filter::by_id(id), enroll_update(-1), None)
            .await
    }
}

/// `$inc` moving `students` students into (or out of, when negative) a class.
pub fn enroll_update(students: i64) -> bson::Document {
    doc! {
        "$inc": {
            "availableSeats": -students,
            "totalEnrolledStudents": students,
        }
    }
}
