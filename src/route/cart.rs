use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::cart::db::{CartCreateData, CartDbExt};
use crate::data::cart::CartItem;
use crate::guard::{Authorized, Student};
use crate::resp::problem::{problems, Problem};
use crate::resp::result::{CreateResponse, DeleteResponse};

use super::own_listing;

/// List the caller's cart
#[utoipa::path(
    params(("email" = Option<String>, Query, description = "student's email, must be the caller's")),
    responses(
        (status = 200, description = "Cart items, empty without an email", body = Vec<CartItem>),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or not the caller's email", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/carts?<email>")]
#[tracing::instrument(skip(db))]
pub async fn cart_list(
    email: Option<String>,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<Vec<CartItem>>, Problem> {
    match own_listing(&auth.identity, email)? {
        Some(email) => Ok(Json(db.student_cart(email).await?)),
        None => Ok(Json(Vec::new())),
    }
}

/// Get a single cart item
#[utoipa::path(
    params(("id", description = "cart item ID")),
    responses(
        (status = 200, description = "The cart item or null", body = CartItem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or someone else's item", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/carts/<id>")]
#[tracing::instrument(skip(db))]
pub async fn cart_get(
    id: String,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<Option<CartItem>>, Problem> {
    let item = db.find_cart_item(&id).await?;

    match item {
        Some(item) if !auth.identity.is(&item.student_email) => Err(problems::forbidden()),
        item => Ok(Json(item)),
    }
}

/// Add a class to the caller's cart
#[utoipa::path(
    request_body = CartCreateData,
    responses(
        (status = 200, description = "Inserted item or already-added message", body = CreateResponse),
        (status = 400, description = "Invalid cart item", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or not the caller's email", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/carts", format = "application/json", data = "<item>")]
#[tracing::instrument(skip(db))]
pub async fn cart_add(
    item: Json<CartCreateData>,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<CreateResponse>, Problem> {
    item.validate()?;
    if !auth.identity.is(&item.student_email) {
        return Err(problems::forbidden());
    }

    let response = db.add_to_cart(item.into_inner()).await?;
    if response.is_conflict() {
        tracing::debug!("{} already has that class", auth.email());
    }

    Ok(Json(response))
}

/// Remove an item from the caller's cart
#[utoipa::path(
    params(("id", description = "cart item ID")),
    responses(
        (status = 200, description = "Delete acknowledgement", body = DeleteResponse),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or someone else's item", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/carts/<id>")]
#[tracing::instrument(skip(db))]
pub async fn cart_delete(
    id: String,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<DeleteResponse>, Problem> {
    if let Some(item) = db.find_cart_item(&id).await? {
        if !auth.identity.is(&item.student_email) {
            return Err(problems::forbidden());
        }
    }

    Ok(Json(DeleteResponse::from(db.delete_cart_item(&id).await?)))
}
