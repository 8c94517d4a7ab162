use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};

use super::util::date_time_as_unix_seconds;
use crate::resp::problem::{problems, Problem};
use crate::security::Security;

static BEARER_PREFIX: &str = "Bearer ";

/// Claims carried by an access token: who the bearer claims to be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub email: String,
}

impl IdentityToken {
    pub fn new(email: impl ToString, lifetime: Duration) -> IdentityToken {
        let now = Utc::now();
        IdentityToken {
            iat: now,
            exp: now + lifetime,
            email: email.to_string(),
        }
    }

    pub fn encode_jwt(&self, secret: impl AsRef<[u8]>) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(secret.as_ref());

        encode(&header, &self, &key)
    }

    pub fn decode_jwt(
        token: &str,
        secret: impl AsRef<[u8]>,
    ) -> Result<IdentityToken, jsonwebtoken::errors::Error> {
        decode::<IdentityToken>(
            token,
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
    }
}

/// Verified identity of the request's bearer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

impl Identity {
    pub fn is(&self, email: impl AsRef<str>) -> bool {
        self.email == email.as_ref()
    }
}

pub fn bearer_token(header: Option<&str>) -> Result<&str, Problem> {
    let value = header.ok_or_else(|| {
        problems::unauthorized()
            .detail("No Authorization header.")
            .clone()
    })?;

    match value.strip_prefix(BEARER_PREFIX).map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(problems::unauthorized()
            .detail("Authorization header isn't a bearer token.")
            .clone()),
    }
}

pub fn extract_identity(
    header: Option<&str>,
    secret: impl AsRef<[u8]>,
) -> Result<Identity, Problem> {
    let token = bearer_token(header)?;
    tracing::trace!("extracted bearer token from authorization header");

    let claims = IdentityToken::decode_jwt(token, secret).map_err(Problem::from)?;
    tracing::debug!("decoded identity token for: {}", claims.email);

    Ok(Identity {
        email: claims.email,
    })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Identity {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security = match req.rocket().state::<Security>() {
            Some(it) => it,
            None => {
                tracing::error!("security material isn't managed by the server");
                return Outcome::Error((Status::InternalServerError, Problem::default()));
            }
        };

        match extract_identity(req.headers().get_one("Authorization"), &security.token_secret) {
            Ok(identity) => Outcome::Success(identity),
            Err(e) => {
                tracing::debug!("unable to verify bearer identity: {:?}", e.detail);
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> Self {
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            )
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}
