pub mod api;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod testutils;

use config::{Config, ValidationError};
use errors::StoreError;
use service::ReviewService;
use shared::admin_service::AdminService;
use shared::http::serve_http_service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use store::AdminApiClient;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ReviewsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
    #[error("store client error: {0}")]
    Store(#[from] StoreError),
}

/// Runs the review relay until ctrl-c.
///
/// The public router and the admin service get their own listeners. `/ready`
/// on the admin listener turns false once shutdown begins.
pub async fn run(config: Config) -> Result<(), ReviewsError> {
    config.validate()?;

    let client = AdminApiClient::new(&config.store)?;
    let service = ReviewService::new(Arc::new(client));
    let app = api::router(service, config.cors.clone());

    let listener = bind(&config.listener).await?;
    let admin_listener = bind(&config.admin_listener).await?;

    let ready = Arc::new(AtomicBool::new(false));
    let admin_service = AdminService::<_, ReviewsError>::new({
        let ready = ready.clone();
        move || ready.load(Ordering::Relaxed)
    });

    let shutdown = {
        let ready = ready.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("could not listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
            ready.store(false, Ordering::Relaxed);
        }
    };

    ready.store(true, Ordering::Relaxed);

    tokio::select! {
        result = axum::serve(listener, app).with_graceful_shutdown(shutdown).into_future() => Ok(result?),
        result = serve_http_service(admin_listener, admin_service) => result,
    }
}

async fn bind(listener: &config::Listener) -> Result<TcpListener, ReviewsError> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let bound = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    Ok(bound)
}
