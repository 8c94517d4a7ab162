use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::data::enrolled::db::ALREADY_ENROLLED_MESSAGE;

pub mod db;

pub static CART_COLLECTION_NAME: &str = "carts";
pub static ALREADY_IN_CART_MESSAGE: &str = "You have already added this class to your cart!";

/// A class a student intends to pay for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
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
}

/// Outcome of checking whether a class may go into a student's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    AlreadyInCart,
    AlreadyEnrolled,
}

impl Admission {
    /// The cart check comes first, enrollment second.
    pub fn decide(in_cart: bool, enrolled: bool) -> Admission {
        if in_cart {
            Admission::AlreadyInCart
        } else if enrolled {
            Admission::AlreadyEnrolled
        } else {
            Admission::Admit
        }
    }

    pub fn message(self) -> Option<&'static str> {
        match self {
            Admission::Admit => None,
            Admission::AlreadyInCart => Some(ALREADY_IN_CART_MESSAGE),
            Admission::AlreadyEnrolled => Some(ALREADY_ENROLLED_MESSAGE),
        }
    }
}
