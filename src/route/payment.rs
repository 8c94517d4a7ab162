use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::checkout::{self, CheckoutData, CheckoutResponse};
use crate::config::Config;
use crate::data::payment::db::{PaymentCreateData, PaymentDbExt};
use crate::data::payment::Payment;
use crate::guard::{Authorized, Student};
use crate::payment::PaymentGateway;
use crate::resp::problem::{problems, Problem};
use crate::resp::result::InsertResponse;
use crate::util::price_to_minor_units;

use super::own_listing;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentIntentData {
    /// Price in major currency units, e.g. `25.5`.
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSecretResponse {
    pub client_secret: String,
}

/// Start a card payment
#[utoipa::path(
    request_body = PaymentIntentData,
    responses(
        (status = 200, description = "Secret the client confirms the payment with", body = ClientSecretResponse),
        (status = 400, description = "Price isn't a positive amount", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student", body = Problem),
        (status = 500, description = "Payment provider failure", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/create-payment-intent", format = "application/json", data = "<intent>")]
#[tracing::instrument(skip(gateway))]
pub async fn payment_intent(
    intent: Json<PaymentIntentData>,
    auth: Authorized<Student>,
    gateway: &State<Box<dyn PaymentGateway>>,
    config: &State<Config>,
) -> Result<Json<ClientSecretResponse>, Problem> {
    let amount = price_to_minor_units(intent.price).ok_or_else(|| {
        problems::bad_request(format!("{} isn't a chargeable price.", intent.price))
    })?;

    let created = gateway
        .create_intent(amount, &config.payment_currency)
        .await?;

    Ok(Json(ClientSecretResponse {
        client_secret: created.client_secret,
    }))
}

/// List the caller's payments, newest first
#[utoipa::path(
    params(("email" = Option<String>, Query, description = "student's email, must be the caller's")),
    responses(
        (status = 200, description = "Payments, empty without an email", body = Vec<Payment>),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or not the caller's email", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/payments?<email>")]
#[tracing::instrument(skip(db))]
pub async fn payment_list(
    email: Option<String>,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<Vec<Payment>>, Problem> {
    match own_listing(&auth.identity, email)? {
        Some(email) => Ok(Json(db.student_payments(email).await?)),
        None => Ok(Json(Vec::new())),
    }
}

/// Record a confirmed payment
#[utoipa::path(
    request_body = PaymentCreateData,
    responses(
        (status = 200, description = "Inserted payment", body = InsertResponse),
        (status = 400, description = "Invalid payment", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or not the caller's email", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/payments", format = "application/json", data = "<payment>")]
#[tracing::instrument(skip(db))]
pub async fn payment_create(
    payment: Json<PaymentCreateData>,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<InsertResponse>, Problem> {
    payment.validate()?;
    if !auth.identity.is(&payment.student_email) {
        return Err(problems::forbidden());
    }

    let payment = Payment::from(payment.into_inner());
    Ok(Json(db.record_payment(&payment).await?))
}

/// Turn a paid cart item into an enrollment
#[utoipa::path(
    request_body = CheckoutData,
    responses(
        (status = 200, description = "Receipt, or already-enrolled message", body = CheckoutResponse),
        (status = 400, description = "Missing transaction id or no valid price", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or someone else's cart item", body = Problem),
        (status = 404, description = "Unknown cart item or class", body = Problem),
        (status = 500, description = "Storage failure, all steps rolled back", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/checkout", format = "application/json", data = "<order>")]
#[tracing::instrument(skip(db))]
pub async fn checkout_complete(
    order: Json<CheckoutData>,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<CheckoutResponse>, Problem> {
    Ok(Json(
        checkout::checkout(db.inner(), &auth.identity, order.into_inner()).await?,
    ))
}
