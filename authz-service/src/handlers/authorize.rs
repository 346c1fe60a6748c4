//! Authorization endpoint called once the OAuth code exchange succeeded.
//!
//! POST /authorize with `Authorization: Bearer <provider access token>`.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;

use crate::models::{ProviderTokens, User};
use crate::providers::RequestContext;
use crate::services::authorize_login;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub authorized: bool,
    /// Which whitelist dimension admitted the user.
    pub reason: &'static str,
    pub user: User,
}

#[tracing::instrument(skip_all, fields(request_id = %request_id.0))]
pub async fn authorize(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let access_token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing bearer token")))?;

    // One snapshot for the whole decision.
    let ctx = RequestContext::new(request_id.0, state.snapshot.snapshot());
    let tokens = ProviderTokens::with_access_token(access_token);

    let outcome = authorize_login(state.provider.as_ref(), &ctx, &tokens).await?;

    let status = if outcome.is_allowed() {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };

    Ok((
        status,
        Json(AuthorizeResponse {
            authorized: outcome.is_allowed(),
            reason: outcome.decision.as_str(),
            user: outcome.user,
        }),
    )
        .into_response())
}
