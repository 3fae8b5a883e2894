//! Notification inbox endpoints. Every actor role has an inbox.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::auth::Actor;
use crate::models::Notification;
use crate::notifications::{self, UnreadCount};

#[derive(Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct MarkedResponse {
    pub updated: usize,
}

/// `GET /api/notifications[?unread_only=&limit=]`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(notifications::list_for_recipient(
        &conn,
        &actor.id,
        query.unread_only,
        query.limit,
    )?))
}

/// `GET /api/notifications/unread-count`
pub async fn unread_count(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<UnreadCount>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(notifications::unread_count(&conn, &actor.id)?))
}

/// `POST /api/notifications/:id/read`
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(notifications::mark_read(&conn, &id, &actor.id)?))
}

/// `POST /api/notifications/read-all`
pub async fn mark_all_read(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<MarkedResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let updated = notifications::mark_all_read(&conn, &actor.id)?;
    Ok(Json(MarkedResponse { updated }))
}
