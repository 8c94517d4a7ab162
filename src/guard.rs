//! Role based request guards.
//!
//! `Authorized<Student>` in a handler signature means: the bearer token is
//! valid and the user's stored role is `student`. The role is read from the
//! database on every request, so role changes apply immediately.

use std::marker::PhantomData;

use mongodb::Database;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};

use crate::data::user::db::UserDbExt;
use crate::resp::jwt::Identity;
use crate::resp::problem::Problem;
use crate::role::{self, Role};

pub trait RequiredRole: Send + Sync + 'static {
    const ROLE: Role;
}

#[derive(Debug)]
pub struct Admin;
#[derive(Debug)]
pub struct Instructor;
#[derive(Debug)]
pub struct Student;

impl RequiredRole for Admin {
    const ROLE: Role = Role::Admin;
}
impl RequiredRole for Instructor {
    const ROLE: Role = Role::Instructor;
}
impl RequiredRole for Student {
    const ROLE: Role = Role::Student;
}

#[derive(Debug)]
pub struct Authorized<R: RequiredRole> {
    pub identity: Identity,
    _role: PhantomData<R>,
}

impl<R: RequiredRole> Authorized<R> {
    pub fn email(&self) -> &str {
        &self.identity.email
    }
}

/// Looks up the stored role of `identity` and checks it against `required`.
pub async fn require_role(db: &Database, identity: &Identity, required: Role) -> Result<(), Problem> {
    let stored = db.role_of(&identity.email).await?;
    role::authorize(stored, required)
}

#[rocket::async_trait]
impl<'r, R: RequiredRole> FromRequest<'r> for Authorized<R> {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let identity = match req.guard::<Identity>().await {
            Outcome::Success(it) => it,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let db = match req.rocket().state::<Database>() {
            Some(it) => it,
            None => {
                tracing::error!("database isn't managed by the server");
                return Outcome::Error((Status::InternalServerError, Problem::default()));
            }
        };

        match require_role(db, &identity, R::ROLE).await {
            Ok(()) => Outcome::Success(Authorized {
                identity,
                _role: PhantomData,
            }),
            Err(problem) => {
                tracing::debug!("{} denied: needs role '{}'", identity.email, R::ROLE);
                Outcome::Error((problem.status, problem))
            }
        }
    }
}
