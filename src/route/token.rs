use chrono::Duration;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Config;
use crate::data::user::db::problem as user_problem;
use crate::resp::jwt::IdentityToken;
use crate::resp::problem::Problem;
use crate::security::Security;

/// Identity the client signed in with. Extra fields are accepted and ignored.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[schema(format = "email")]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Issue an access token
#[utoipa::path(
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Signed access token", body = TokenResponse),
        (status = 400, description = "Missing or invalid email", body = Problem),
    )
)]
#[post("/jwt", format = "application/json", data = "<identity>")]
#[tracing::instrument(skip(security))]
pub fn token_issue(
    identity: Json<TokenRequest>,
    security: &State<Security>,
    config: &State<Config>,
) -> Result<Json<TokenResponse>, Problem> {
    if !identity.email.contains('@') {
        return Err(user_problem::bad_email(
            identity.email.clone(),
            "Not a valid e-mail address.",
        ));
    }

    let claims = IdentityToken::new(
        &identity.email,
        Duration::minutes(config.token_lifetime_minutes),
    );
    let token = claims.encode_jwt(&security.token_secret).map_err(|e| {
        tracing::error!("unable to sign access token: {}", e);
        Problem::default()
    })?;

    Ok(Json(TokenResponse { token }))
}
