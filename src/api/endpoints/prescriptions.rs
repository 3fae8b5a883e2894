//! Prescription endpoints.
//!
//! - `POST /api/prescriptions` (doctor)
//! - `GET /api/prescriptions` (scoped to the caller)
//! - `POST /api/prescriptions/:id/dispense` (pharmacy)
//! - `POST /api/prescriptions/:id/cancel` (doctor)

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{doctor_id, parse_id, pharmacy_id, ApiContext};
use crate::auth::Actor;
use crate::models::filters::PrescriptionFilter;
use crate::models::Prescription;
use crate::prescriptions::{self, PrescriptionRequest};

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<PrescriptionRequest>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    let rx = prescriptions::issue(&conn, &doctor, &body)?;
    Ok((StatusCode::CREATED, Json(rx)))
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<PrescriptionFilter>,
) -> Result<Json<Vec<Prescription>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::list_for_actor(&conn, &actor, &filter)?))
}

pub async fn dispense(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    let id = parse_id(&id)?;
    let pharmacy = pharmacy_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::dispense(&conn, &pharmacy, &id)?))
}

pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    let id = parse_id(&id)?;
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::cancel(&conn, &doctor, &id)?))
}
