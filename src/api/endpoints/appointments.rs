//! Appointment endpoints.
//!
//! - `POST /api/appointments` (doctor or patient, as a party)
//! - `GET /api/appointments`
//! - `POST /api/appointments/:id/cancel`, `/complete`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{doctor_id, parse_id, ApiContext};
use crate::appointments::{self, AppointmentRequest};
use crate::auth::Actor;
use crate::models::Appointment;

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let conn = ctx.core.open_db()?;
    let appt = appointments::schedule(&conn, &actor, &body)?;
    Ok((StatusCode::CREATED, Json(appt)))
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointments::list_for_actor(&conn, &actor)?))
}

pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(appointments::cancel(&conn, &actor, &id)?))
}

pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id)?;
    let doctor = doctor_id(&actor)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(appointments::complete(&conn, &doctor, &id)?))
}
