//! Shared note inbox endpoints (doctor).
//!
//! - `GET /api/shared-notes[?unread_only=]`
//! - `POST /api/shared-notes/:id/read`

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{doctor_id, parse_id, ApiContext};
use crate::auth::Actor;
use crate::models::SharedClinicalNote;
use crate::sharing::{self, SharedNoteEntry};

#[derive(Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn inbox(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<SharedNoteEntry>>, ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(sharing::inbox(&conn, &doctor, query.unread_only)?))
}

pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<SharedClinicalNote>, ApiError> {
    let id = parse_id(&id)?;
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(sharing::mark_read(&conn, &id, &doctor)?))
}
