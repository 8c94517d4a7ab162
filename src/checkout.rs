//! Server side checkout: turns a paid cart item into an enrollment.
//!
//! The steps touch three collections, so instead of a multi-document
//! transaction every durable step has a compensating action that runs when a
//! later step fails.

use mongodb::Database;
use rocket::http::Status;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::data::cart::db::CartDbExt;
use crate::data::cart::CartItem;
use crate::data::class::db::ClassDbExt;
use crate::data::enrolled::db::{EnrolledDbExt, ALREADY_ENROLLED_MESSAGE};
use crate::data::enrolled::EnrolledClass;
use crate::data::payment::db::PaymentDbExt;
use crate::data::payment::Payment;
use crate::resp::jwt::Identity;
use crate::resp::problem::{problems, Problem};
use crate::resp::result::ExistsResponse;

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart item {0} doesn't exist")]
    CartItemNotFound(String),
    #[error("cart item {0} belongs to another student")]
    NotOwner(String),
    #[error("class {0} doesn't exist")]
    ClassNotFound(String),
    #[error("missing transaction id")]
    MissingTransaction,
    #[error("no valid price to charge: {0:?}")]
    InvalidPrice(Option<f64>),
    #[error("storage failed during checkout: {0}")]
    Store(#[source] StoreError),
}

impl From<CheckoutError> for Problem {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::CartItemNotFound(id) => problems::not_found("Cart item", id),
            CheckoutError::NotOwner(_) => problems::forbidden(),
            CheckoutError::ClassNotFound(id) => problems::not_found("Class", id),
            CheckoutError::MissingTransaction => {
                problems::bad_request("Checkout needs the confirmed transaction id.")
            }
            CheckoutError::InvalidPrice(None) => {
                problems::bad_request("Neither the checkout nor the cart item has a price.")
            }
            CheckoutError::InvalidPrice(Some(price)) => problems::bad_request(format!(
                "{} isn't a valid price, it must be a non-negative number.",
                price
            )),
            CheckoutError::Store(e) => {
                tracing::error!("checkout storage error: {}", e);
                Problem::new(
                    Status::InternalServerError,
                    "Checkout failed. No enrollment was recorded.",
                )
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutData {
    pub cart_id: String,
    /// Provider transaction id of the confirmed payment.
    pub transaction_id: String,
    /// Charged price, defaults to the cart item's price.
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub payment_id: String,
    pub enrollment_id: String,
    pub cart_removed: bool,
}

/// Result of a checkout that didn't fail. Both variants are sent with `200 OK`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CheckoutResponse {
    Completed(CheckoutReceipt),
    Exists(ExistsResponse),
}

/// Storage operations checkout is made of.
#[rocket::async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn cart_item(&self, id: &str) -> Result<Option<CartItem>, StoreError>;
    /// `Ok(false)` when the (class, student) pair is already enrolled.
    async fn insert_enrollment(&self, enrollment: &EnrolledClass) -> Result<bool, StoreError>;
    async fn remove_enrollment(&self, id: &str) -> Result<(), StoreError>;
    /// `Ok(false)` when the class doesn't exist.
    async fn take_seat(&self, class_id: &str) -> Result<bool, StoreError>;
    async fn release_seat(&self, class_id: &str) -> Result<(), StoreError>;
    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError>;
    async fn remove_cart_item(&self, id: &str) -> Result<(), StoreError>;
}

#[rocket::async_trait]
impl CheckoutStore for Database {
    async fn cart_item(&self, id: &str) -> Result<Option<CartItem>, StoreError> {
        Ok(self.find_cart_item(id).await?)
    }

    async fn insert_enrollment(&self, enrollment: &EnrolledClass) -> Result<bool, StoreError> {
        Ok(!self.enroll(enrollment).await?.is_conflict())
    }

    async fn remove_enrollment(&self, id: &str) -> Result<(), StoreError> {
        self.delete_enrollment(id).await?;
        Ok(())
    }

    async fn take_seat(&self, class_id: &str) -> Result<bool, StoreError> {
        Ok(self.enroll_class(class_id).await?.is_some())
    }

    async fn release_seat(&self, class_id: &str) -> Result<(), StoreError> {
        self.unenroll_class(class_id).await?;
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        self.record_payment(payment).await?;
        Ok(())
    }

    async fn remove_cart_item(&self, id: &str) -> Result<(), StoreError> {
        self.delete_cart_item(id).await?;
        Ok(())
    }
}

/// Undo steps, run newest first.
enum Compensation {
    RemoveEnrollment(String),
    ReleaseSeat(String),
}

async fn compensate(store: &dyn CheckoutStore, done: Vec<Compensation>) {
    for step in done.into_iter().rev() {
        let result = match &step {
            Compensation::RemoveEnrollment(id) => store.remove_enrollment(id).await,
            Compensation::ReleaseSeat(class_id) => store.release_seat(class_id).await,
        };
        if let Err(e) = result {
            match step {
                Compensation::RemoveEnrollment(id) => {
                    tracing::error!("unable to remove enrollment {} after failed checkout: {}", id, e)
                }
                Compensation::ReleaseSeat(class_id) => tracing::error!(
                    "unable to release seat of class {} after failed checkout: {}",
                    class_id,
                    e
                ),
            }
        }
    }
}

#[tracing::instrument(skip(store))]
pub async fn checkout(
    store: &dyn CheckoutStore,
    student: &Identity,
    data: CheckoutData,
) -> Result<CheckoutResponse, CheckoutError> {
    if data.transaction_id.trim().is_empty() {
        return Err(CheckoutError::MissingTransaction);
    }

    let item = store
        .cart_item(&data.cart_id)
        .await
        .map_err(CheckoutError::Store)?
        .ok_or_else(|| CheckoutError::CartItemNotFound(data.cart_id.clone()))?;
    if !student.is(&item.student_email) {
        return Err(CheckoutError::NotOwner(item.id));
    }

    // payments are append-only, so the amount is settled before any write
    let price = match data.price.or(item.price) {
        Some(price) if price.is_finite() && price >= 0.0 => price,
        other => return Err(CheckoutError::InvalidPrice(other)),
    };

    let mut done = Vec::new();

    let enrollment = EnrolledClass::from(&item);
    if !store
        .insert_enrollment(&enrollment)
        .await
        .map_err(CheckoutError::Store)?
    {
        tracing::debug!("{} is already enrolled into {}", item.student_email, item.class_id);
        return Ok(CheckoutResponse::Exists(ExistsResponse::flagged(
            ALREADY_ENROLLED_MESSAGE,
        )));
    }
    done.push(Compensation::RemoveEnrollment(enrollment.id.clone()));

    match store.take_seat(&item.class_id).await {
        Ok(true) => done.push(Compensation::ReleaseSeat(item.class_id.clone())),
        Ok(false) => {
            compensate(store, done).await;
            return Err(CheckoutError::ClassNotFound(item.class_id));
        }
        Err(e) => {
            compensate(store, done).await;
            return Err(CheckoutError::Store(e));
        }
    }

    let payment = Payment {
        id: crate::data::new_id(),
        student_email: item.student_email.clone(),
        price,
        transaction_id: data.transaction_id,
        date: chrono::Utc::now(),
        class_id: Some(item.class_id.clone()),
        cart_id: Some(item.id.clone()),
        class_name: item.class_name.clone(),
    };
    if let Err(e) = store.insert_payment(&payment).await {
        compensate(store, done).await;
        return Err(CheckoutError::Store(e));
    }

    // Payments are append-only, so nothing before this point is undone anymore.
    let cart_removed = match store.remove_cart_item(&item.id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("checkout done but cart item {} wasn't removed: {}", item.id, e);
            false
        }
    };

    tracing::info!(
        "{} checked out class {} (payment {})",
        item.student_email,
        item.class_id,
        payment.id
    );

    Ok(CheckoutResponse::Completed(CheckoutReceipt {
        payment_id: payment.id,
        enrollment_id: enrollment.id,
        cart_removed,
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Enrollment,
        Seat,
        Payment,
        Cart,
    }

    #[derive(Default)]
    struct State {
        carts: HashMap<String, CartItem>,
        enrollments: HashMap<String, EnrolledClass>,
        // class id -> (available seats, enrolled students)
        classes: HashMap<String, (i64, i64)>,
        payments: Vec<Payment>,
    }

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<State>,
        fail: Option<Step>,
    }

    fn injected() -> StoreError {
        Box::new(std::io::Error::new(std::io::ErrorKind::Other, "injected failure"))
    }

    impl MemoryStore {
        fn failing(step: Step) -> Self {
            MemoryStore {
                fail: Some(step),
                ..Default::default()
            }
        }

        fn check(&self, step: Step) -> Result<(), StoreError> {
            if self.fail == Some(step) {
                Err(injected())
            } else {
                Ok(())
            }
        }

        fn seed(&self, seats: i64) {
            let mut state = self.state.lock().unwrap();
            state.classes.insert("class-1".to_string(), (seats, 0));
            state.carts.insert(
                "cart-1".to_string(),
                CartItem {
                    id: "cart-1".to_string(),
                    class_id: "class-1".to_string(),
                    student_email: "s@x.com".to_string(),
                    class_name: Some("Boxing".to_string()),
                    image: None,
                    price: Some(45.0),
                    instructor_name: None,
                },
            );
        }
    }

    #[rocket::async_trait]
    impl CheckoutStore for MemoryStore {
        async fn cart_item(&self, id: &str) -> Result<Option<CartItem>, StoreError> {
            // lets concurrent checkouts interleave between steps
            tokio::task::yield_now().await;
            Ok(self.state.lock().unwrap().carts.get(id).cloned())
        }

        async fn insert_enrollment(&self, enrollment: &EnrolledClass) -> Result<bool, StoreError> {
            self.check(Step::Enrollment)?;
            let mut state = self.state.lock().unwrap();
            let exists = state.enrollments.values().any(|e| {
                e.class_id == enrollment.class_id && e.student_email == enrollment.student_email
            });
            if exists {
                return Ok(false);
            }
            state
                .enrollments
                .insert(enrollment.id.clone(), enrollment.clone());
            Ok(true)
        }

        async fn remove_enrollment(&self, id: &str) -> Result<(), StoreError> {
            self.state.lock().unwrap().enrollments.remove(id);
            Ok(())
        }

        async fn take_seat(&self, class_id: &str) -> Result<bool, StoreError> {
            tokio::task::yield_now().await;
            self.check(Step::Seat)?;
            let mut state = self.state.lock().unwrap();
            match state.classes.get_mut(class_id) {
                Some((seats, enrolled)) => {
                    *seats -= 1;
                    *enrolled += 1;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn release_seat(&self, class_id: &str) -> Result<(), StoreError> {
            let mut state = self.state.lock().unwrap();
            if let Some((seats, enrolled)) = state.classes.get_mut(class_id) {
                *seats += 1;
                *enrolled -= 1;
            }
            Ok(())
        }

        async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
            self.check(Step::Payment)?;
            self.state.lock().unwrap().payments.push(payment.clone());
            Ok(())
        }

        async fn remove_cart_item(&self, id: &str) -> Result<(), StoreError> {
            self.check(Step::Cart)?;
            self.state.lock().unwrap().carts.remove(id);
            Ok(())
        }
    }

    fn student() -> Identity {
        Identity {
            email: "s@x.com".to_string(),
        }
    }

    fn data() -> CheckoutData {
        CheckoutData {
            cart_id: "cart-1".to_string(),
            transaction_id: "pi_123".to_string(),
            price: None,
        }
    }

    async fn complete(store: &MemoryStore, data: CheckoutData) -> CheckoutReceipt {
        match checkout(store, &student(), data).await {
            Ok(CheckoutResponse::Completed(receipt)) => receipt,
            other => panic!("expected a completed checkout, got {:?}", other),
        }
    }

    fn assert_untouched(store: &MemoryStore, seats: i64) {
        let state = store.state.lock().unwrap();
        assert!(state.enrollments.is_empty(), "enrollment left behind");
        assert!(state.payments.is_empty(), "payment left behind");
        assert_eq!(state.classes.get("class-1"), Some(&(seats, 0)));
        assert!(state.carts.contains_key("cart-1"));
    }

    #[rocket::async_test]
    async fn successful_checkout_applies_every_step() {
        let store = MemoryStore::default();
        store.seed(10);

        let receipt = complete(&store, data()).await;
        assert!(receipt.cart_removed);

        let state = store.state.lock().unwrap();
        assert_eq!(state.classes.get("class-1"), Some(&(9, 1)));
        assert_eq!(state.enrollments.len(), 1);
        assert!(state.enrollments.contains_key(&receipt.enrollment_id));
        assert_eq!(state.payments.len(), 1);
        assert_eq!(state.payments[0].price, 45.0);
        assert_eq!(state.payments[0].transaction_id, "pi_123");
        assert!(state.carts.is_empty());
    }

    #[rocket::async_test]
    async fn full_class_still_enrolls() {
        let store = MemoryStore::default();
        store.seed(0);

        complete(&store, data()).await;

        let state = store.state.lock().unwrap();
        assert_eq!(state.classes.get("class-1"), Some(&(-1, 1)));
    }

    #[rocket::async_test]
    async fn failing_enrollment_changes_nothing() {
        let store = MemoryStore::failing(Step::Enrollment);
        store.seed(10);

        let err = checkout(&store, &student(), data()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Store(_)));
        assert_untouched(&store, 10);
    }

    #[rocket::async_test]
    async fn failing_seat_update_removes_enrollment() {
        let store = MemoryStore::failing(Step::Seat);
        store.seed(10);

        assert!(checkout(&store, &student(), data()).await.is_err());
        assert_untouched(&store, 10);
    }

    #[rocket::async_test]
    async fn failing_payment_rolls_back_enrollment_and_seat() {
        let store = MemoryStore::failing(Step::Payment);
        store.seed(10);

        let err = checkout(&store, &student(), data()).await.unwrap_err();
        assert_eq!(Problem::from(err).status, Status::InternalServerError);
        assert_untouched(&store, 10);
    }

    #[rocket::async_test]
    async fn failing_cart_removal_keeps_enrollment() {
        let store = MemoryStore::failing(Step::Cart);
        store.seed(10);

        let receipt = complete(&store, data()).await;
        assert!(!receipt.cart_removed);

        let state = store.state.lock().unwrap();
        assert_eq!(state.payments.len(), 1);
        assert_eq!(state.classes.get("class-1"), Some(&(9, 1)));
    }

    #[rocket::async_test]
    async fn second_checkout_is_a_conflict() {
        let store = MemoryStore::default();
        store.seed(10);
        complete(&store, data()).await;
        // put the same class back into the cart
        store.seed(9);

        let response = checkout(&store, &student(), data()).await.unwrap();
        assert_eq!(
            response,
            CheckoutResponse::Exists(ExistsResponse::flagged(ALREADY_ENROLLED_MESSAGE))
        );

        let state = store.state.lock().unwrap();
        assert_eq!(state.payments.len(), 1);
        assert_eq!(state.enrollments.len(), 1);
        assert_eq!(state.classes.get("class-1"), Some(&(9, 0)));
    }

    #[rocket::async_test]
    async fn concurrent_checkouts_enroll_once() {
        let store = MemoryStore::default();
        store.seed(10);
        let me = student();

        let (a, b) = tokio::join!(
            checkout(&store, &me, data()),
            checkout(&store, &me, data())
        );

        // both read the cart item before either enrolled
        let outcomes = [a.unwrap(), b.unwrap()];
        let completed = outcomes
            .iter()
            .filter(|it| matches!(it, CheckoutResponse::Completed(_)))
            .count();
        let conflicts = outcomes
            .iter()
            .filter(|it| matches!(it, CheckoutResponse::Exists(_)))
            .count();
        assert_eq!((completed, conflicts), (1, 1));

        let state = store.state.lock().unwrap();
        assert_eq!(state.enrollments.len(), 1);
        assert_eq!(state.payments.len(), 1);
        assert_eq!(state.classes.get("class-1"), Some(&(9, 1)));
    }

    #[rocket::async_test]
    async fn negative_price_is_rejected_before_writing() {
        let store = MemoryStore::default();
        store.seed(10);

        let mut negative = data();
        negative.price = Some(-100.0);
        let err = checkout(&store, &student(), negative).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidPrice(Some(_))));
        assert_eq!(Problem::from(err).status, Status::BadRequest);

        let mut not_a_number = data();
        not_a_number.price = Some(f64::INFINITY);
        assert!(checkout(&store, &student(), not_a_number).await.is_err());

        assert_untouched(&store, 10);
    }

    #[rocket::async_test]
    async fn missing_price_is_rejected_before_writing() {
        let store = MemoryStore::default();
        store.seed(10);
        store
            .state
            .lock()
            .unwrap()
            .carts
            .get_mut("cart-1")
            .unwrap()
            .price = None;

        let err = checkout(&store, &student(), data()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidPrice(None)));
        assert_eq!(Problem::from(err).status, Status::BadRequest);
        assert_untouched(&store, 10);

        let mut priced = data();
        priced.price = Some(30.0);
        complete(&store, priced).await;
        assert_eq!(store.state.lock().unwrap().payments[0].price, 30.0);
    }

    #[rocket::async_test]
    async fn missing_class_is_compensated() {
        let store = MemoryStore::default();
        store.seed(10);
        store.state.lock().unwrap().classes.clear();

        let err = checkout(&store, &student(), data()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ClassNotFound(_)));
        assert!(store.state.lock().unwrap().enrollments.is_empty());
    }

    #[rocket::async_test]
    async fn someone_elses_cart_is_forbidden() {
        let store = MemoryStore::default();
        store.seed(10);
        let intruder = Identity {
            email: "other@x.com".to_string(),
        };

        let err = checkout(&store, &intruder, data()).await.unwrap_err();
        assert_eq!(Problem::from(err).status, Status::Forbidden);
        assert_untouched(&store, 10);
    }

    #[rocket::async_test]
    async fn unknown_cart_and_blank_transaction_are_rejected() {
        let store = MemoryStore::default();
        store.seed(10);

        let mut unknown = data();
        unknown.cart_id = "nope".to_string();
        let err = checkout(&store, &student(), unknown).await.unwrap_err();
        assert_eq!(Problem::from(err).status, Status::NotFound);

        let mut blank = data();
        blank.transaction_id = " ".to_string();
        let err = checkout(&store, &student(), blank).await.unwrap_err();
        assert_eq!(Problem::from(err).status, Status::BadRequest);
    }
}
