use std::io::Cursor;

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

/// Error response shared by every endpoint.
///
/// Serialized as `{"error": true, "message": ..., "detail"?: ..., ...body}`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub message: String,

    pub detail: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            message: "Internal server error".to_string(),
            detail: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new(status: Status, message: impl ToString) -> Problem {
        Problem {
            status,
            message: message.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut body = self.body.clone();

        body.insert(String::from("error"), Value::Bool(true));
        body.insert(String::from("message"), Value::from(self.message.clone()));
        if let Some(detail) = &self.detail {
            body.insert(String::from("detail"), Value::from(detail.clone()));
        }

        body
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body_string = Value::Object(self.to_json()).to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .raw_header("Content-Language", "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn unauthorized() -> Problem {
        Problem::new(Status::Unauthorized, "Unauthorized access")
    }

    #[inline]
    pub fn forbidden() -> Problem {
        Problem::new(Status::Forbidden, "forbidden message")
    }

    #[inline]
    pub fn parse_problem() -> Problem {
        Problem::new(
            Status::BadRequest,
            "There was a problem parsing part of the request.",
        )
    }

    #[inline]
    pub fn bad_request(detail: impl ToString) -> Problem {
        Problem::new(Status::BadRequest, "Bad request.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn not_found(what: &str, id: impl ToString) -> Problem {
        Problem::new(Status::NotFound, format!("{} doesn't exist.", what))
            .insert_str("id", id)
            .to_owned()
    }
}

impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        tracing::error!("MongoDB error: {}", e);

        fn mongodb_problem() -> Problem {
            Problem::new(
                Status::InternalServerError,
                "MongoDB failed while processing request.",
            )
        }

        fn access_problem() -> Problem {
            Problem::new(
                Status::InternalServerError,
                "Server was unable to access MongoDB.",
            )
        }

        fn bad_db_request() -> Problem {
            Problem::new(
                Status::InternalServerError,
                "MongoDB was unable to process bad server request.",
            )
        }

        fn bson_problem() -> Problem {
            Problem::new(
                Status::InternalServerError,
                "There was a problem with handling MongoDB bson.",
            )
        }

        match e.kind.as_ref() {
            ErrorKind::InvalidArgument { .. } => bad_db_request(),
            ErrorKind::Authentication { .. } => access_problem(),
            ErrorKind::BsonDeserialization(_) => bson_problem(),
            ErrorKind::BsonSerialization(_) => bson_problem(),
            ErrorKind::BulkWrite(_) => bad_db_request(),
            ErrorKind::Command(_) => bad_db_request(),
            ErrorKind::DnsResolve { .. } => access_problem(),
            ErrorKind::Io(_) => mongodb_problem()
                .detail("An IO error occurred. Submitted data might not be properly stored.")
                .clone(),
            ErrorKind::ServerSelection { .. } => access_problem(),
            ErrorKind::InvalidTlsConfig { .. } => access_problem(),
            ErrorKind::Write(_) => mongodb_problem()
                .detail("A write error occurred. Submitted data might not be properly stored.")
                .clone(),
            ErrorKind::IncompatibleServer { .. } => access_problem(),
            _ => mongodb_problem(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Problem {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => problems::unauthorized()
                .detail("Expired JWT signature.")
                .clone(),
            _ => problems::unauthorized(),
        }
    }
}
