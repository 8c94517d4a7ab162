use mongodb::results::DeleteResult;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::data::enrolled::db::EnrolledDbExt;
use crate::data::{filter, is_duplicate_key};
use crate::resp::problem::{problems, Problem};
use crate::resp::result::{CreateResponse, ExistsResponse, InsertResponse};

use super::{Admission, CartItem, CART_COLLECTION_NAME};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartCreateData {
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

impl CartCreateData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.class_id.trim().is_empty() {
            return Err(problems::bad_request("Cart item needs a class id."));
        }
        Ok(())
    }
}

impl From<CartCreateData> for CartItem {
    fn from(data: CartCreateData) -> Self {
        CartItem {
            id: crate::data::new_id(),
            class_id: data.class_id,
            student_email: data.student_email,
            class_name: data.class_name,
            image: data.image,
            price: data.price,
            instructor_name: data.instructor_name,
        }
    }
}

fn conflict(admission: Admission) -> CreateResponse {
    CreateResponse::Exists(ExistsResponse::flagged(
        admission.message().unwrap_or_default(),
    ))
}

pub trait CartDbExt {
    /// Adds a class to a student's cart unless it's already there or the
    /// student is already enrolled in it.
    async fn add_to_cart(&self, item: CartCreateData) -> Result<CreateResponse, mongodb::error::Error>;

    async fn find_cart_item(&self, id: impl AsRef<str>)
        -> Result<Option<CartItem>, mongodb::error::Error>;

    async fn student_cart(&self, email: impl AsRef<str>) -> Result<Vec<CartItem>, mongodb::error::Error>;

    async fn delete_cart_item(&self, id: impl AsRef<str>) -> Result<DeleteResult, mongodb::error::Error>;
}

/// Lookups the cart admission rule runs against.
#[rocket::async_trait]
pub trait CartStore: Send + Sync {
    async fn in_cart(&self, class_id: &str, email: &str) -> Result<bool, mongodb::error::Error>;
    async fn is_enrolled(&self, class_id: &str, email: &str)
        -> Result<bool, mongodb::error::Error>;
    /// `Ok(false)` when the (class, student) pair is already stored.
    async fn insert_cart_item(&self, item: &CartItem) -> Result<bool, mongodb::error::Error>;
}

#[rocket::async_trait]
impl CartStore for Database {
    async fn in_cart(&self, class_id: &str, email: &str) -> Result<bool, mongodb::error::Error> {
        Ok(self
            .collection::<CartItem>(CART_COLLECTION_NAME)
            .find_one(filter::by_class_and_student(class_id, email), None)
            .await?
            .is_some())
    }

    async fn is_enrolled(
        &self,
        class_id: &str,
        email: &str,
    ) -> Result<bool, mongodb::error::Error> {
        Ok(self.find_enrollment(class_id, email).await?.is_some())
    }

    async fn insert_cart_item(&self, item: &CartItem) -> Result<bool, mongodb::error::Error> {
        match self
            .collection::<CartItem>(CART_COLLECTION_NAME)
            .insert_one(item, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

pub async fn admit_to_cart(
    store: &dyn CartStore,
    item: CartCreateData,
) -> Result<CreateResponse, mongodb::error::Error> {
    let in_cart = store.in_cart(&item.class_id, &item.student_email).await?;
    let enrolled = !in_cart
        && store
            .is_enrolled(&item.class_id, &item.student_email)
            .await?;

    let admission = Admission::decide(in_cart, enrolled);
    if admission != Admission::Admit {
        tracing::debug!(
            "class {} not added to cart of {}: {:?}",
            item.class_id,
            item.student_email,
            admission
        );
        return Ok(conflict(admission));
    }

    let item = CartItem::from(item);
    if store.insert_cart_item(&item).await? {
        Ok(CreateResponse::Inserted(InsertResponse::new(&item.id)))
    } else {
        // lost a race against a concurrent add of the same class
        Ok(conflict(Admission::AlreadyInCart))
    }
}

impl CartDbExt for Database {
    async fn add_to_cart(&self, item: CartCreateData) -> Result<CreateResponse, mongodb::error::Error> {
        admit_to_cart(self, item).await
    }

    async fn find_cart_item(
        &self,
        id: impl AsRef<str>,
    ) -> Result<Option<CartItem>, mongodb::error::Error> {
        self.collection::<CartItem>(CART_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
    }

    async fn student_cart(&self, email: impl AsRef<str>) -> Result<Vec<CartItem>, mongodb::error::Error> {
        self.collection::<CartItem>(CART_COLLECTION_NAME)
            .find(filter::by_student(email), None)
            .await?
            .try_collect()
            .await
    }

    async fn delete_cart_item(&self, id: impl AsRef<str>) -> Result<DeleteResult, mongodb::error::Error> {
        tracing::debug!("removing cart item {}", id.as_ref());

        self.collection::<CartItem>(CART_COLLECTION_NAME)
            .delete_one(filter::by_id(id), None)
            .await
    }
}
