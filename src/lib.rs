#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;

use mongodb::{Client, Database};
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::error::{BackendError, ConfigurationError};
use crate::payment::{PaymentGateway, StripeGateway};
use crate::route::mount_api;
use crate::security::Security;

pub mod checkout;
pub mod config;
pub mod data;
pub mod error;
pub mod guard;
pub mod payment;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod util;

pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    tracing::info!("Loading security information...");
    let security = Security::load()?;

    tracing::info!("Connecting to MongoDB...");
    let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", c.mongodb_db);
    let db = client.database(c.mongodb_db.as_str());

    if let Err(e) = db.list_collection_names(None).await {
        tracing::error!("Unable to connect to MongoDB.");
        return Err(e.into());
    }
    data::ensure_indexes(&db).await?;

    let gateway = StripeGateway::from_config(&c)?;

    build(c, security, db, Box::new(gateway))
}

/// Assembles the server from already initialized parts.
pub fn build(
    c: Config,
    security: Security,
    db: Database,
    gateway: Box<dyn PaymentGateway>,
) -> Result<Rocket<Build>, BackendError> {
    tracing::info!("Starting HTTP server...");
    let mut r = rocket::build()
        .manage(c)
        .manage(security)
        .manage(db)
        .manage(gateway);

    tracing::info!("Setting up CORS...");
    let cors = rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![
            Method::Get,
            Method::Put,
            Method::Post,
            Method::Patch,
            Method::Delete,
        ]
        .into_iter()
        .map(From::from)
        .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    r = r.attach(cors);
    r = mount_api(r);

    Ok(r)
}
