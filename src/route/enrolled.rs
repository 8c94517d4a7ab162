use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::enrolled::db::{EnrolledDbExt, EnrollmentCreateData};
use crate::data::enrolled::EnrolledClass;
use crate::guard::{Authorized, Student};
use crate::resp::problem::{problems, Problem};
use crate::resp::result::CreateResponse;

use super::own_listing;

/// List the caller's enrollments
#[utoipa::path(
    params(("email" = Option<String>, Query, description = "student's email, must be the caller's")),
    responses(
        (status = 200, description = "Enrolled classes, empty without an email", body = Vec<EnrolledClass>),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or not the caller's email", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/enrolledclasses?<email>")]
#[tracing::instrument(skip(db))]
pub async fn enrolled_list(
    email: Option<String>,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<Vec<EnrolledClass>>, Problem> {
    match own_listing(&auth.identity, email)? {
        Some(email) => Ok(Json(db.student_enrollments(email).await?)),
        None => Ok(Json(Vec::new())),
    }
}

/// Record an enrollment
#[utoipa::path(
    request_body = EnrollmentCreateData,
    responses(
        (status = 200, description = "Inserted enrollment or already-enrolled message", body = CreateResponse),
        (status = 400, description = "Invalid enrollment", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not a student or not the caller's email", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/enrolledclasses", format = "application/json", data = "<enrollment>")]
#[tracing::instrument(skip(db))]
pub async fn enrolled_create(
    enrollment: Json<EnrollmentCreateData>,
    auth: Authorized<Student>,
    db: &State<Database>,
) -> Result<Json<CreateResponse>, Problem> {
    enrollment.validate()?;
    if !auth.identity.is(&enrollment.student_email) {
        return Err(problems::forbidden());
    }

    let enrollment = EnrolledClass::from(enrollment.into_inner());
    Ok(Json(db.enroll(&enrollment).await?))
}
