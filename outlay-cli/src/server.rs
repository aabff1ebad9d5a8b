//! HTTP surface: the on-demand process-due endpoint.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use chrono::Utc;
use chrono_tz::Tz;
use outlay_core::{local_today, OutlayError};
use outlay_recurring::OnDemandTrigger;
use serde_json::json;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub trigger: OnDemandTrigger,
    /// Zone that defines "today" for requests.
    pub timezone: Tz,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/recurring/process-due", post(process_due))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn process_due(State(state): State<AppState>) -> Response {
    let today = local_today(Utc::now(), state.timezone);
    match state.trigger.run(today).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            error!(%today, error = %e, "on-demand recurring run failed");
            let status = match e {
                OutlayError::StoreUnavailable(_) | OutlayError::TransientStore(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "message": e.to_string() }))).into_response()
        }
    }
}

/// Serve until `shutdown` flips to true or its sender drops.
pub async fn serve(bind: &str, state: AppState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("http server")
}
