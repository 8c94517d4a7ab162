use bson::doc;
use mongodb::options::FindOptions;
use mongodb::results::UpdateResult;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::data::{filter, is_duplicate_key};
use crate::resp::problem::Problem;
use crate::resp::result::{CreateResponse, ExistsResponse, InsertResponse};
use crate::role::Role;

use super::{User, USER_COLLECTION_NAME};

pub static USER_EXISTS_MESSAGE: &str = "User Already Exists...";
pub const POPULAR_INSTRUCTOR_LIMIT: i64 = 6;

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> Problem {
        Problem::new(Status::BadRequest, "Bad email.")
            .insert_str("email", email)
            .detail(detail)
            .to_owned()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserCreateData {
    #[schema(format = "email")]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl UserCreateData {
    pub fn validate(&self) -> Result<(), Problem> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(problem::bad_email(
                self.email.clone(),
                "Not a valid e-mail address.",
            ));
        }
        if email.len() != self.email.len() {
            return Err(problem::bad_email(
                self.email.clone(),
                "E-mail address can't have surrounding whitespace.",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleUpdateData {
    pub role: Role,
}

pub trait UserDbExt {
    /// Inserts a user unless one with the same email exists.
    async fn create_user(
        &self,
        create_user: UserCreateData,
        initial_role: Option<Role>,
    ) -> Result<CreateResponse, mongodb::error::Error>;

    async fn find_user_by_email(
        &self,
        email: impl AsRef<str>,
    ) -> Result<Option<User>, mongodb::error::Error>;

    /// Role store lookup. Missing users have no role.
    async fn role_of(&self, email: impl AsRef<str>) -> Result<Option<Role>, mongodb::error::Error>;

    async fn list_users(&self) -> Result<Vec<User>, mongodb::error::Error>;

    async fn list_instructors(&self, limit: Option<i64>)
        -> Result<Vec<User>, mongodb::error::Error>;

    async fn set_user_role(
        &self,
        id: impl AsRef<str>,
        role: Role,
    ) -> Result<UpdateResult, mongodb::error::Error>;
}

/// Writes user registration runs against.
#[rocket::async_trait]
pub trait UserStore: Send + Sync {
    async fn email_taken(&self, email: &str) -> Result<bool, mongodb::error::Error>;
    /// `Ok(false)` when a user with the same email is already stored.
    async fn insert_user(&self, user: &User) -> Result<bool, mongodb::error::Error>;
}

#[rocket::async_trait]
impl UserStore for Database {
    async fn email_taken(&self, email: &str) -> Result<bool, mongodb::error::Error> {
        Ok(self.find_user_by_email(email).await?.is_some())
    }

    async fn insert_user(&self, user: &User) -> Result<bool, mongodb::error::Error> {
        match self
            .collection::<User>(USER_COLLECTION_NAME)
            .insert_one(user, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

pub async fn register_user(
    store: &dyn UserStore,
    create_user: UserCreateData,
    initial_role: Option<Role>,
) -> Result<CreateResponse, mongodb::error::Error> {
    let exists = || CreateResponse::Exists(ExistsResponse::unflagged(USER_EXISTS_MESSAGE));

    if store.email_taken(&create_user.email).await? {
        tracing::debug!("user '{}' already exists", create_user.email);
        return Ok(exists());
    }

    let mut user = User::from(create_user);
    user.role = initial_role;
    tracing::info!("Creating a new user with id: {}", user.id);

    if store.insert_user(&user).await? {
        Ok(CreateResponse::Inserted(InsertResponse::new(&user.id)))
    } else {
        // lost a race against a concurrent sign-in with the same email
        Ok(exists())
    }
}

impl UserDbExt for Database {
    async fn create_user(
        &self,
        create_user: UserCreateData,
        initial_role: Option<Role>,
    ) -> Result<CreateResponse, mongodb::error::Error> {
        register_user(self, create_user, initial_role).await
    }

    async fn find_user_by_email(
        &self,
        email: impl AsRef<str>,
    ) -> Result<Option<User>, mongodb::error::Error> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .find_one(filter::by_email(email), None)
            .await
    }

    async fn role_of(&self, email: impl AsRef<str>) -> Result<Option<Role>, mongodb::error::Error> {
        Ok(self
            .find_user_by_email(email)
            .await?
            .and_then(|user| user.role))
    }

    async fn list_users(&self) -> Result<Vec<User>, mongodb::error::Error> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .find(None, None)
            .await?
            .try_collect()
            .await
    }

    async fn list_instructors(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<User>, mongodb::error::Error> {
        let options = FindOptions::builder().limit(limit).build();

        self.collection::<User>(USER_COLLECTION_NAME)
            .find(doc! { "role": Role::Instructor.as_str() }, options)
            .await?
            .try_collect()
            .await
    }

    async fn set_user_role(
        &self,
        id: impl AsRef<str>,
        role: Role,
    ) -> Result<UpdateResult, mongodb::error::Error> {
        tracing::info!("Setting role of user {} to '{}'", id.as_ref(), role);

        self.collection::<User>(USER_COLLECTION_NAME)
            .update_one(
                filter::by_id(id),
                doc! { "$set": { "role": role.as_str() } },
                None,
            )
            .await
    }
}
