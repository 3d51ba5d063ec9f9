extern crate tracing_futures;

#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;

use mongodb::{Client, Database};
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins, Cors};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::error::{BackendError, ConfigurationError};
use crate::route::mount_api;

pub mod caps;
pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod util;

fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global logger: {}", err);
    }

    // Route rocket's `log` output through the same subscriber.
    if let Err(err) = tracing_log::LogTracer::init() {
        eprintln!("Unable to bridge log records: {}", err);
    }
}

/// Loads settings, writing a generated default file on first boot so there
/// is something to edit.
fn load_config() -> Result<Config, BackendError> {
    match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            Ok(c)
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            Ok(c)
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            Err(other.into())
        }
    }
}

async fn connect_database(c: &Config) -> Result<Database, BackendError> {
    tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
    let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

    let db = client.database(c.mongodb_db.as_str());
    tracing::info!("Using MongoDB database: {}", c.mongodb_db);

    if let Err(err) = db.list_collection_names(None).await {
        tracing::error!("Unable to reach MongoDB.");
        return Err(err.into());
    }

    Ok(db)
}

/// The mobile app and the web console are served from other origins.
fn cors() -> Cors {
    rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: [Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()
    .expect("Unable to configure CORS.")
}

pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(level) = log_level {
        init_logging(level);
    }

    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    let config = load_config()?;
    let db = connect_database(&config).await?;

    tracing::info!("Starting HTTP server...");
    let rocket = rocket::build()
        .manage(config)
        .manage(db)
        .attach(cors());

    Ok(mount_api(rocket))
}
