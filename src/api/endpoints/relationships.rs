//! `GET /api/relationships`: a doctor's patient panel, or a patient's
//! care team.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::Actor;
use crate::models::enums::ActorRole;
use crate::relationships::{self, CareTeamEntry, PatientPanelEntry};

#[derive(Serialize)]
#[serde(untagged)]
pub enum RelationshipList {
    Patients(Vec<PatientPanelEntry>),
    Doctors(Vec<CareTeamEntry>),
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<RelationshipList>, ApiError> {
    let conn = ctx.core.open_db()?;
    let list = match actor.role {
        ActorRole::Doctor => {
            RelationshipList::Patients(relationships::list_patients_for_doctor(&conn, &actor.id)?)
        }
        ActorRole::Patient => {
            RelationshipList::Doctors(relationships::list_doctors_for_patient(&conn, &actor.id)?)
        }
        ActorRole::Pharmacy => {
            return Err(ApiError::Forbidden("Pharmacies have no care relationships".into()));
        }
    };
    Ok(Json(list))
}
