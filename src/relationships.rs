//! Doctor-patient relationships.
//!
//! A relationship marks that a doctor may act on a patient's records. It is
//! created lazily by referral acceptance and appointment scheduling, and the
//! creation is idempotent per (doctor, patient).

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{self, now_timestamp};
use crate::error::CareError;
use crate::models::enums::RelationshipSource;
use crate::models::{Doctor, DoctorPatientRelationship, Patient};

/// A relationship joined with the patient record, for a doctor's panel.
#[derive(Debug, Clone, Serialize)]
pub struct PatientPanelEntry {
    pub relationship: DoctorPatientRelationship,
    pub patient: Option<Patient>,
}

/// A relationship joined with the doctor record, for a patient's care team.
#[derive(Debug, Clone, Serialize)]
pub struct CareTeamEntry {
    pub relationship: DoctorPatientRelationship,
    pub doctor: Option<Doctor>,
}

/// Creates the relationship if absent. Returns `true` when a row was written.
pub fn ensure_relationship(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
    source: RelationshipSource,
    referral_id: Option<Uuid>,
) -> Result<bool, CareError> {
    if repository::find_relationship(conn, doctor_id, patient_id)?.is_some() {
        tracing::debug!(%doctor_id, %patient_id, "Relationship already present");
        return Ok(false);
    }

    let rel = DoctorPatientRelationship {
        id: Uuid::new_v4(),
        doctor_id: *doctor_id,
        patient_id: *patient_id,
        source,
        referral_id,
        created_at: now_timestamp(),
    };
    repository::insert_relationship(conn, &rel)?;
    tracing::info!(
        %doctor_id,
        %patient_id,
        source = source.as_str(),
        "Doctor-patient relationship created"
    );
    Ok(true)
}

pub fn has_relationship(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
) -> Result<bool, CareError> {
    Ok(repository::find_relationship(conn, doctor_id, patient_id)?.is_some())
}

pub fn list_patients_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<PatientPanelEntry>, CareError> {
    repository::list_relationships_for_doctor(conn, doctor_id)?
        .into_iter()
        .map(|relationship| {
            let patient = repository::get_patient(conn, &relationship.patient_id)?;
            Ok(PatientPanelEntry {
                relationship,
                patient,
            })
        })
        .collect()
}

pub fn list_doctors_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<CareTeamEntry>, CareError> {
    repository::list_relationships_for_patient(conn, patient_id)?
        .into_iter()
        .map(|relationship| {
            let doctor = repository::get_doctor(conn, &relationship.doctor_id)?;
            Ok(CareTeamEntry {
                relationship,
                doctor,
            })
        })
        .collect()
}
