//! Directory endpoints.
//!
//! - `GET /api/me`
//! - `GET /api/doctors[?specialty=]`, `GET /api/doctors/:id`
//! - `GET /api/patients/:id`, `/notes`, `/referrals`

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::auth::Actor;
use crate::directory;
use crate::models::enums::ActorRole;
use crate::models::{ClinicalNote, Doctor, Patient, Pharmacy};
use crate::notes;
use crate::referrals::{self, ReferralDetails};
use crate::relationships;

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Profile {
    Doctor(Doctor),
    Patient(Patient),
    Pharmacy(Pharmacy),
}

/// `GET /api/me`: the caller's own record.
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Profile>, ApiError> {
    let conn = ctx.core.open_db()?;
    let profile = match actor.role {
        ActorRole::Doctor => Profile::Doctor(directory::require_doctor(&conn, &actor.id)?),
        ActorRole::Patient => Profile::Patient(directory::require_patient(&conn, &actor.id)?),
        ActorRole::Pharmacy => Profile::Pharmacy(directory::require_pharmacy(&conn, &actor.id)?),
    };
    Ok(Json(profile))
}

#[derive(Deserialize)]
pub struct DoctorQuery {
    pub specialty: Option<String>,
}

pub async fn list_doctors(
    State(ctx): State<ApiContext>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(directory::list_doctors(&conn, query.specialty.as_deref())?))
}

pub async fn get_doctor(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Doctor>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(directory::require_doctor(&conn, &id)?))
}

/// Patients see themselves; any doctor may look a patient up.
pub async fn get_patient(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let allowed = match actor.role {
        ActorRole::Patient => actor.id == id,
        ActorRole::Doctor => true,
        ActorRole::Pharmacy => false,
    };
    if !allowed {
        return Err(ApiError::Forbidden("You do not have access to this patient".into()));
    }
    let conn = ctx.core.open_db()?;
    Ok(Json(directory::require_patient(&conn, &id)?))
}

pub async fn patient_notes(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClinicalNote>>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(notes::list_for_patient(&conn, &actor, &id)?))
}

/// The patient, or a doctor in a care relationship with them.
pub async fn patient_referrals(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReferralDetails>>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let allowed = match actor.role {
        ActorRole::Patient => actor.id == id,
        ActorRole::Doctor => relationships::has_relationship(&conn, &actor.id, &id)?,
        ActorRole::Pharmacy => false,
    };
    if !allowed {
        return Err(ApiError::Forbidden(
            "You do not have access to this patient's referrals".into(),
        ));
    }
    Ok(Json(referrals::list_for_patient(&conn, &id)?))
}
