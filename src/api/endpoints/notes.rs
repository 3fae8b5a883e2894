//! Clinical note endpoints.
//!
//! - `POST /api/notes` (doctor)
//! - `GET /api/notes/:id`
//! - `PUT /api/notes/:id` (author)
//! - `POST /api/notes/:id/share` (patient)

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{doctor_id, parse_id, patient_id, ApiContext};
use crate::auth::Actor;
use crate::models::{ClinicalNote, SharedClinicalNote};
use crate::notes::{self, NewNote, NoteUpdate};
use crate::sharing::{self, DirectShare};

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<NewNote>,
) -> Result<(StatusCode, Json<ClinicalNote>), ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    let note = notes::create_note(&conn, &doctor, &body)?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ClinicalNote>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(notes::get_note(&conn, &actor, &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(body): Json<NoteUpdate>,
) -> Result<Json<ClinicalNote>, ApiError> {
    let id = parse_id(&id)?;
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(notes::update_note(&conn, &doctor, &id, &body)?))
}

pub async fn share(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(body): Json<DirectShare>,
) -> Result<(StatusCode, Json<SharedClinicalNote>), ApiError> {
    let id = parse_id(&id)?;
    let patient = patient_id(&actor)?;
    let conn = ctx.core.open_db()?;
    let shared = sharing::share_with_doctor(&conn, &patient, &id, &body)?;
    Ok((StatusCode::CREATED, Json(shared)))
}
