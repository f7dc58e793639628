use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::services::tracking::{self, OpenRequest, TRANSPARENT_GIF};
use crate::AppState;

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct TrackQuery {
    emailId: Option<String>,
}

/// The pixel endpoint. Responds with the fixed transparent GIF no matter
/// what: missing id, unknown id, or a store failure all look identical to the
/// mail client. Caching is disabled so every render reaches the server.
async fn track_open(
    State(pool): State<sqlx::SqlitePool>,
    Query(query): Query<TrackQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(tracking_id) = query.emailId.as_deref().filter(|id| !id.is_empty()) {
        let request = OpenRequest {
            ip_address: headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_string()),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            referer: headers
                .get(header::REFERER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        tracking::record_open_quietly(&pool, tracking_id, request).await;
    } else {
        tracing::debug!("tracking request without emailId; returning pixel");
    }

    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, max-age=0",
            ),
            (header::PRAGMA, "no-cache"),
        ],
        TRANSPARENT_GIF,
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/track/open", get(track_open))
}
