use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info};

use trackdex_bucket::BucketStore;
use trackdex_core::builder::{build_tracking_index, publish_index, BuildConfig};
use trackdex_core::combiner::{combine_manifests, CombineConfig};

use crate::config;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn BucketStore>,
    build: BuildConfig,
    combine: CombineConfig,
}

pub async fn run() -> Result<()> {
    let state = Arc::new(AppState {
        store: config::connect_store().await?,
        build: config::build_config()?,
        combine: config::combine_config()?,
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/build-index", post(build_index))
        .route("/api/combine", post(combine))
        .with_state(state);

    let port: u16 = std::env::var("TRACKDEX_PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(3000);
    let listener = TcpListener::bind((std::net::Ipv4Addr::UNSPECIFIED, port)).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Rebuild and publish the tracking index. The structured summary is
/// returned even when publishing fails, so operators always see what was
/// scanned and skipped.
async fn build_index(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let outcome = match build_tracking_index(state.store.as_ref(), &state.build).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("index build failed: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{err:#}") })),
            );
        }
    };

    match publish_index(state.store.as_ref(), &state.build, &outcome.index).await {
        Ok(url) => (
            StatusCode::OK,
            Json(json!({ "url": url, "summary": outcome.summary })),
        ),
        Err(err) => {
            error!("index publish failed: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": format!("{err:#}"),
                    "summary": outcome.summary,
                })),
            )
        }
    }
}

async fn combine(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match combine_manifests(state.store.as_ref(), &state.combine).await {
        Ok(summary) => (StatusCode::OK, Json(json!({ "summary": summary }))),
        Err(err) => {
            error!("combine run failed: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{err:#}") })),
            )
        }
    }
}
