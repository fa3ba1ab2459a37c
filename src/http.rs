//! HTTP surface: the callback route the ad network is pointed at.

use axum::{
    Json, Router,
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;

use crate::app::AppContext;
use crate::callback::{CallbackOutcome, SsvCallback};
use crate::error::Result;

/// Build the gateway router
pub fn router(context: AppContext) -> Router {
    Router::new()
        .route("/api/admob/ssv-callback", get(ssv_callback))
        .with_state(context)
}

/// Body returned for every successfully handled callback
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub message: String,
}

/// The network delivers callbacks as HTTP GET and expects a 200 whenever the
/// transaction is (or already was) processed. The raw query string is kept
/// alongside the parsed fields because canonicalization needs the original
/// parameter order and encoding.
async fn ssv_callback(
    State(context): State<AppContext>,
    RawQuery(raw_query): RawQuery,
    Query(callback): Query<SsvCallback>,
) -> Result<impl IntoResponse> {
    let raw_query = raw_query.unwrap_or_default();
    let outcome = context.processor.process(&raw_query, &callback).await?;

    let message = match outcome {
        CallbackOutcome::Duplicate { .. } => "Transaction already processed.",
        CallbackOutcome::Rewarded { .. } | CallbackOutcome::Recorded { .. } => {
            "Callback processed."
        }
    };

    Ok((
        StatusCode::OK,
        Json(CallbackResponse {
            success: true,
            message: message.to_string(),
        }),
    ))
}
