use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth;
use crate::error::AppError;
use crate::state::AppState;

/// Extractor that requires an authenticated admin session.
/// Returns 401 if no valid session cookie is present.
pub struct AdminSession;

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = auth::cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let mut sessions = state.sessions.lock().await;
        if sessions.validate(&token) {
            Ok(AdminSession)
        } else {
            Err(AppError::Unauthorized)
        }
    }
}
