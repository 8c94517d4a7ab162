use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::data::user::db::{RoleUpdateData, UserCreateData, UserDbExt, POPULAR_INSTRUCTOR_LIMIT};
use crate::data::user::User;
use crate::guard::{Admin, Authorized};
use crate::resp::jwt::Identity;
use crate::resp::problem::Problem;
use crate::resp::result::{CreateResponse, UpdateResponse};
use crate::role::Role;

/// Register a user on first sign-in
#[utoipa::path(
    request_body = UserCreateData,
    responses(
        (status = 200, description = "Inserted user or already-exists message", body = CreateResponse),
        (status = 400, description = "Invalid email", body = Problem),
    )
)]
#[post("/users", format = "application/json", data = "<create_user>")]
#[tracing::instrument(skip(db))]
pub async fn user_create(
    create_user: Json<UserCreateData>,
    db: &State<Database>,
    c: &State<Config>,
) -> Result<Json<CreateResponse>, Problem> {
    create_user.validate()?;

    let initial_role = c
        .is_bootstrap_admin(&create_user.email)
        .then_some(Role::Admin);

    Ok(Json(db.create_user(create_user.into_inner(), initial_role).await?))
}

/// List all users
#[utoipa::path(
    responses(
        (status = 200, description = "All users", body = Vec<User>),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/users")]
#[tracing::instrument(skip(db))]
pub async fn user_list(
    auth: Authorized<Admin>,
    db: &State<Database>,
) -> Result<Json<Vec<User>>, Problem> {
    Ok(Json(db.list_users().await?))
}

/// List instructors
#[utoipa::path(
    responses((status = 200, description = "Users with the instructor role", body = Vec<User>))
)]
#[get("/users/instructors")]
#[tracing::instrument(skip(db))]
pub async fn instructor_list(db: &State<Database>) -> Result<Json<Vec<User>>, Problem> {
    Ok(Json(db.list_instructors(None).await?))
}

/// List featured instructors
#[utoipa::path(
    responses((status = 200, description = "Up to six instructors", body = Vec<User>))
)]
#[get("/users/instructors/popular")]
#[tracing::instrument(skip(db))]
pub async fn instructor_popular(db: &State<Database>) -> Result<Json<Vec<User>>, Problem> {
    Ok(Json(
        db.list_instructors(Some(POPULAR_INSTRUCTOR_LIMIT)).await?,
    ))
}

/// Assign a role to a user
#[utoipa::path(
    params(("id", description = "user ID")),
    request_body = RoleUpdateData,
    responses(
        (status = 200, description = "Update acknowledgement", body = UpdateResponse),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/users/<id>", format = "application/json", data = "<update>")]
#[tracing::instrument(skip(db))]
pub async fn user_set_role(
    id: String,
    update: Json<RoleUpdateData>,
    auth: Authorized<Admin>,
    db: &State<Database>,
) -> Result<Json<UpdateResponse>, Problem> {
    let result = db.set_user_role(&id, update.role).await?;
    if result.matched_count == 0 {
        tracing::debug!("no user with id {} to update", id);
    }

    Ok(Json(UpdateResponse::from(result)))
}

/// `{<role>: bool}`. Asking about anyone but yourself always answers `false`.
async fn role_check(
    role: Role,
    email: &str,
    identity: &Identity,
    db: &Database,
) -> Result<Json<Value>, Problem> {
    let has_role = if identity.is(email) {
        db.role_of(email).await? == Some(role)
    } else {
        tracing::debug!("{} asked for the role of {}", identity.email, email);
        false
    };

    let mut body = Map::new();
    body.insert(role.to_string(), Value::Bool(has_role));
    Ok(Json(Value::Object(body)))
}

/// Check whether the caller is an admin
#[utoipa::path(
    params(("email", description = "caller's email")),
    responses(
        (status = 200, description = "`{admin: bool}`"),
        (status = 401, description = "Missing or invalid token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/users/admin/<email>")]
#[tracing::instrument(skip(db))]
pub async fn user_is_admin(
    email: String,
    identity: Identity,
    db: &State<Database>,
) -> Result<Json<Value>, Problem> {
    role_check(Role::Admin, &email, &identity, db).await
}

/// Check whether the caller is an instructor
#[utoipa::path(
    params(("email", description = "caller's email")),
    responses(
        (status = 200, description = "`{instructor: bool}`"),
        (status = 401, description = "Missing or invalid token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/users/instructor/<email>")]
#[tracing::instrument(skip(db))]
pub async fn user_is_instructor(
    email: String,
    identity: Identity,
    db: &State<Database>,
) -> Result<Json<Value>, Problem> {
    role_check(Role::Instructor, &email, &identity, db).await
}

/// Check whether the caller is a student
#[utoipa::path(
    params(("email", description = "caller's email")),
    responses(
        (status = 200, description = "`{student: bool}`"),
        (status = 401, description = "Missing or invalid token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/users/student/<email>")]
#[tracing::instrument(skip(db))]
pub async fn user_is_student(
    email: String,
    identity: Identity,
    db: &State<Database>,
) -> Result<Json<Value>, Problem> {
    role_check(Role::Student, &email, &identity, db).await
}
