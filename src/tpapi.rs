use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header::CONTENT_TYPE},
    routing::{delete, get, post},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    tpdb::{
        Database,
        accounts::{self, CredentialCheck},
    },
};

pub mod error;
pub mod extract;
pub mod uploads;

mod account_routes;
mod listing_routes;
mod profile_routes;
mod social_routes;

use error::{ApiResult, AppError};
use uploads::{DiskImageStore, ImageStore};

/// Everything a handler needs, passed through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub fn new(db: Database, images: Arc<dyn ImageStore>) -> Self {
        Self { db, images }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Database::new(&config.database_path),
            Arc::new(DiskImageStore::new(&config.upload_dir, &config.upload_url_prefix)),
        )
    }
}

pub fn router(state: AppState, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/listings", get(listing_routes::listings))
        .route("/createListing", post(listing_routes::create_listing))
        .route("/deletelisting", delete(listing_routes::delete_listing))
        .route("/deletelistings", delete(listing_routes::delete_listings))
        .route("/images", get(listing_routes::images))
        .route("/tags", get(listing_routes::tags))
        .route("/register", post(account_routes::register))
        .route("/login", post(account_routes::login))
        .route("/accounts", get(account_routes::list_accounts))
        .route("/deleteaccount", delete(account_routes::delete_account))
        .route("/like", post(social_routes::like).delete(social_routes::unlike))
        .route("/rate", post(social_routes::rate).delete(social_routes::unrate))
        .route("/profile", get(profile_routes::profile))
        .route("/editprofile", post(profile_routes::edit_profile))
        .route("/editcontactinfo", post(profile_routes::edit_contact_info));

    Router::new()
        .nest("/api", api)
        .nest_service(&config.upload_url_prefix, ServeDir::new(&config.upload_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<()> {
    let state = AppState::from_config(&config);
    state.db.initialize().context("Could not initialize the database.")?;

    let app = router(state, &config);

    let address = format!("0.0.0.0:{}", config.port);
    log::info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Could not bind to {address}"))?;
    log::info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    log::info!("Server shut down.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(err) => log::error!("Failed to listen for Ctrl+C: {err}"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                log::error!("Failed to install terminate handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Runs blocking database work off the async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Checks a username/password pair, failing with 401 on any mismatch.
pub(crate) fn authenticate(db: &Database, username: &str, password: &str) -> ApiResult<()> {
    match accounts::check_credentials(db, username, password)? {
        CredentialCheck::Valid => Ok(()),
        CredentialCheck::UnknownUser => Err(AppError::Unauthorized("Username not found".into())),
        CredentialCheck::WrongPassword => Err(AppError::Unauthorized("Incorrect password".into())),
    }
}

/// Unwraps a required request field. Blank strings count as missing.
pub(crate) fn required<'a>(value: &'a Option<String>, name: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::bad_request(format!("Missing required field: {name}")))
}
