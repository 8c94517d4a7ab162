use bson::doc;
use chrono::Utc;
use mongodb::options::FindOptions;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::data::filter;
use crate::resp::problem::{problems, Problem};
use crate::resp::result::InsertResponse;

use super::{Payment, PAYMENT_COLLECTION_NAME};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreateData {
    pub student_email: String,
    pub price: f64,
    pub transaction_id: String,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub cart_id: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
}

impl PaymentCreateData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.transaction_id.trim().is_empty() {
            return Err(problems::bad_request("Payment needs a transaction id."));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(problems::bad_request("Payment price must be a non-negative number."));
        }
        Ok(())
    }
}

impl From<PaymentCreateData> for Payment {
    fn from(data: PaymentCreateData) -> Self {
        Payment {
            id: crate::data::new_id(),
            student_email: data.student_email,
            price: data.price,
            transaction_id: data.transaction_id,
            date: Utc::now(),
            class_id: data.class_id,
            cart_id: data.cart_id,
            class_name: data.class_name,
        }
    }
}

pub trait PaymentDbExt {
    async fn record_payment(&self, payment: &Payment) -> Result<InsertResponse, mongodb::error::Error>;

    /// Payments of a student, newest first.
    async fn student_payments(
        &self,
        email: impl AsRef<str>,
    ) -> Result<Vec<Payment>, mongodb::error::Error>;
}

impl PaymentDbExt for Database {
    async fn record_payment(&self, payment: &Payment) -> Result<InsertResponse, mongodb::error::Error> {
        tracing::info!(
            "Recording payment {} of {} by {}",
            payment.transaction_id,
            payment.price,
            payment.student_email
        );

        self.collection::<Payment>(PAYMENT_COLLECTION_NAME)
            .insert_one(payment, None)
            .await?;

        Ok(InsertResponse::new(&payment.id))
    }

    async fn student_payments(
        &self,
        email: impl AsRef<str>,
    ) -> Result<Vec<Payment>, mongodb::error::Error> {
        let options = FindOptions::builder().sort(doc! { "date": -1 }).build();

        self.collection::<Payment>(PAYMENT_COLLECTION_NAME)
            .find(filter::by_student(email), options)
            .await?
            .try_collect()
            .await
    }
}
