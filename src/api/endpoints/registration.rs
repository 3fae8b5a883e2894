//! Registration endpoints. Each returns the new record and its bearer token.
//!
//! - `POST /api/register/doctor`
//! - `POST /api/register/patient`
//! - `POST /api/register/pharmacy`

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::directory::{self, NewDoctor, NewPatient, NewPharmacy, Registration};
use crate::models::{Doctor, Patient, Pharmacy};

pub async fn doctor(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewDoctor>,
) -> Result<(StatusCode, Json<Registration<Doctor>>), ApiError> {
    let conn = ctx.core.open_db()?;
    let reg = directory::register_doctor(&conn, &body)?;
    Ok((StatusCode::CREATED, Json(reg)))
}

pub async fn patient(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewPatient>,
) -> Result<(StatusCode, Json<Registration<Patient>>), ApiError> {
    let conn = ctx.core.open_db()?;
    let reg = directory::register_patient(&conn, &body)?;
    Ok((StatusCode::CREATED, Json(reg)))
}

pub async fn pharmacy(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewPharmacy>,
) -> Result<(StatusCode, Json<Registration<Pharmacy>>), ApiError> {
    let conn = ctx.core.open_db()?;
    let reg = directory::register_pharmacy(&conn, &body)?;
    Ok((StatusCode::CREATED, Json(reg)))
}
