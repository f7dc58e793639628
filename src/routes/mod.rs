use axum::Router;

use crate::AppState;

pub mod campaigns;
pub mod emails;
pub mod lists;
pub mod recipients;
pub mod tracking;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(tracking::router())
        .merge(emails::router())
        .merge(campaigns::router())
        .merge(recipients::router())
        .merge(lists::router())
}
