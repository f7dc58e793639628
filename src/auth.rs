use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::Error;
use crate::models::user::User;
use crate::AppState;

/// Extractor resolving the `X-API-Key` header to an active user. Every
/// authenticated route takes this; all queries downstream are scoped to the
/// resolved user's id.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(Error::Unauthorized)?;

        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE api_key = ? AND is_active = 1",
        )
        .bind(api_key)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(Error::Unauthorized)?;

        Ok(AuthUser(user))
    }
}
