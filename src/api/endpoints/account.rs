//! Account endpoints for the authenticated caller.
//!
//! - `GET /api/me/activity[?limit=]`
//! - `POST /api/logout`

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::{self, Actor};
use crate::core_state::ActivityEntry;

const DEFAULT_ACTIVITY_LIMIT: u32 = 50;
const MAX_ACTIVITY_LIMIT: u32 = 500;

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u32>,
}

pub async fn activity(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    Ok(Json(ctx.core.recent_activity(&actor, limit)?))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub revoked: usize,
}

/// Revokes all of the caller's tokens, not just the presented one.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let revoked = auth::revoke_tokens(&conn, &actor)?;
    Ok(Json(LogoutResponse { revoked }))
}
