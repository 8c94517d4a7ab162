use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::class::db::{
    ClassCreateData, ClassDbExt, FeedbackUpdateData, StatusUpdateData, POPULAR_CLASS_LIMIT,
};
use crate::data::class::{Class, ClassStatus};
use crate::guard::{Admin, Authorized, Instructor, Student};
use crate::resp::problem::{problems, Problem};
use crate::resp::result::{InsertResponse, UpdateResponse};

/// List every class
#[utoipa::path(
    responses(
        (status = 200, description = "All classes regardless of status", body = Vec<Class>),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/classes")]
#[tracing::instrument(skip(db))]
pub async fn class_list(
    auth: Authorized<Admin>,
    db: &State<Database>,
) -> Result<Json<Vec<Class>>, Problem> {
    Ok(Json(db.list_classes().await?))
}

/// List approved classes
#[utoipa::path(
    responses((status = 200, description = "Publicly listed classes", body = Vec<Class>))
)]
#[get("/classes/approved")]
#[tracing::instrument(skip(db))]
pub async fn class_approved(db: &State<Database>) -> Result<Json<Vec<Class>>, Problem> {
    Ok(Json(db.list_approved_classes().await?))
}

/// List the most enrolled classes
#[utoipa::path(
    responses((status = 200, description = "Up to six classes by enrollment", body = Vec<Class>))
)]
#[get("/classes/popular")]
#[tracing::instrument(skip(db))]
pub async fn class_popular(db: &State<Database>) -> Result<Json<Vec<Class>>, Problem> {
    Ok(Json(db.list_popular_classes(POPULAR_CLASS_LIMIT).await?))
}

/// List classes of the calling instructor
#[utoipa::path(
    params(("email", description = "instructor's email, must be the caller's")),
    responses(
        (status = 200, description = "Classes the instructor created", body = Vec<Class>),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an instructor or not the caller's email", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/classes/<email>")]
#[tracing::instrument(skip(db))]
pub async fn class_by_instructor(
    email: String,
    auth: Authorized<Instructor>,
    db: &State<Database>,
) -> Result<Json<Vec<Class>>, Problem> {
    if !auth.identity.is(&email) {
        return Err(problems::forbidden());
    }

    Ok(Json(db.list_instructor_classes(&email).await?))
}

/// Create a class
#[utoipa::path(
    request_body = ClassCreateData,
    responses(
        (status = 200, description = "Inserted class", body = InsertResponse),
        (status = 400, description = "Invalid class data", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an instructor", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/classes", format = "application/json", data = "<class>")]
#[tracing::instrument(skip(db))]
pub async fn class_create(
    class: Json<ClassCreateData>,
    auth: Authorized<Instructor>,
    db: &State<Database>,
) -> Result<Json<InsertResponse>, Problem> {
    class.validate()?;

    let class = class.into_inner().into_class(auth.email());
    Ok(Json(db.create_class(&class).await?))
}

/// Approve or deny a class
#[utoipa::path(
    params(("id", description = "class ID")),
    request_body = StatusUpdateData,
    responses(
        (status = 200, description = "Update acknowledgement", body = UpdateResponse),
        (status = 400, description = "Status can't be set back to pending", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/classes/status/<id>", format = "application/json", data = "<update>")]
#[tracing::instrument(skip(db))]
pub async fn class_set_status(
    id: String,
    update: Json<StatusUpdateData>,
    auth: Authorized<Admin>,
    db: &State<Database>,
) -> Result<Json<UpdateResponse>, Problem> {
    if update.status == ClassStatus::Pending {
        return Err(problems::bad_request(
            "Class status can only be set to approved or denied.",
        ));
    }

    let result = db.set_class_status(&id, update.status).await?;
    tracing::info!("class {} marked {} by {}", id, update.status.as_str(), auth.email());

    Ok(Json(UpdateResponse::from(result)))
}

/// Leave admin feedback on a class
#[utoipa::path(
    params(("id", description = "class ID")),
    request_body = FeedbackUpdateData,
    responses(
        (status = 200, description = "Update acknowledgement", body = UpdateResponse),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/classes/feedback/<id>", format = "application/json", data = "<update>")]
#[tracing::instrument(skip(db))]
pub async fn class_set_feedback(
    id: String,
    update: Json<FeedbackUpdateData>,
    auth: Authorized<Admin>,
    db: &State<Database>,
) -> Result<Json<UpdateResponse>, Problem> {
    let result = db.set_class_feedback(&id, &update.feedback).await?;
    Ok(Json(UpdateResponse::from(result)))
}

/// Take a seat in a class after payment
#[utoipa::path(
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Update acknowledgement", body = UpdateResponse),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student", body = Problem),
        (status = 404, description = "No such class", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/classes/enrolled/<id>")]
#[tracing::instrument(skip(db))]
pub async fn class_enroll(
    id: String,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<UpdateResponse>, Problem> {
    match db.enroll_class(&id).await? {
        Some(class) => {
            tracing::debug!(
                "{} took a seat in {}, {} left",
                auth.email(),
                class.id,
                class.available_seats
            );
            Ok(Json(UpdateResponse {
                acknowledged: true,
                matched_count: 1,
                modified_count: 1,
            }))
        }
        None => Err(problems::not_found("Class", id)),
    }
}
