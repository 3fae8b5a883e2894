//! SOAP clinical notes.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::repository::{self, now_timestamp};
use crate::directory;
use crate::error::{require_text, CareError};
use crate::models::enums::ActorRole;
use crate::models::ClinicalNote;
use crate::relationships;
use crate::sharing;

#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub patient_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    pub title: String,
    #[serde(flatten)]
    pub body: SoapBody,
}

/// The four SOAP sections. Any may be blank, but not all of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoapBody {
    #[serde(default)]
    pub subjective: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub assessment: String,
    #[serde(default)]
    pub plan: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteUpdate {
    pub title: String,
    #[serde(flatten)]
    pub body: SoapBody,
}

pub fn create_note(
    conn: &Connection,
    doctor_id: &Uuid,
    new: &NewNote,
) -> Result<ClinicalNote, CareError> {
    let title = require_text("Title", &new.title)?;
    directory::require_doctor(conn, doctor_id)?;
    directory::require_patient(conn, &new.patient_id)?;
    if !relationships::has_relationship(conn, doctor_id, &new.patient_id)? {
        return Err(CareError::forbidden(
            "You do not have a care relationship with this patient",
        ));
    }
    if let Some(appointment_id) = new.appointment_id {
        let appt = repository::get_appointment(conn, &appointment_id)?
            .ok_or_else(|| CareError::not_found("Appointment", appointment_id))?;
        if appt.doctor_id != *doctor_id || appt.patient_id != new.patient_id {
            return Err(CareError::validation(
                "Appointment does not match this doctor and patient",
            ));
        }
    }

    let now = now_timestamp();
    let note = apply_body(
        ClinicalNote {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: *doctor_id,
            appointment_id: new.appointment_id,
            title,
            subjective: String::new(),
            objective: String::new(),
            assessment: String::new(),
            plan: String::new(),
            created_at: now,
            updated_at: now,
        },
        &new.body,
    )?;
    repository::insert_clinical_note(conn, &note)?;
    tracing::info!(
        note_id = %note.id,
        %doctor_id,
        patient_id = %note.patient_id,
        "Clinical note created"
    );
    Ok(note)
}

/// Only the author may edit a note.
pub fn update_note(
    conn: &Connection,
    doctor_id: &Uuid,
    note_id: &Uuid,
    update: &NoteUpdate,
) -> Result<ClinicalNote, CareError> {
    let existing = repository::get_clinical_note(conn, note_id)?
        .ok_or_else(|| CareError::not_found("Clinical note", note_id))?;
    if existing.doctor_id != *doctor_id {
        return Err(CareError::forbidden("Only the author can edit this note"));
    }

    let mut note = apply_body(existing, &update.body)?;
    note.title = require_text("Title", &update.title)?;
    note.updated_at = now_timestamp();
    repository::update_clinical_note(conn, &note)?;
    tracing::info!(note_id = %note.id, %doctor_id, "Clinical note updated");
    Ok(note)
}

pub fn get_note(
    conn: &Connection,
    actor: &Actor,
    note_id: &Uuid,
) -> Result<ClinicalNote, CareError> {
    let note = repository::get_clinical_note(conn, note_id)?
        .ok_or_else(|| CareError::not_found("Clinical note", note_id))?;
    let allowed = match actor.role {
        ActorRole::Patient => note.patient_id == actor.id,
        ActorRole::Doctor => sharing::can_doctor_view_note(conn, &actor.id, &note)?,
        ActorRole::Pharmacy => false,
    };
    if !allowed {
        return Err(CareError::forbidden("You do not have access to this note"));
    }
    Ok(note)
}

/// Notes for a patient that the actor may read, newest first.
pub fn list_for_patient(
    conn: &Connection,
    actor: &Actor,
    patient_id: &Uuid,
) -> Result<Vec<ClinicalNote>, CareError> {
    directory::require_patient(conn, patient_id)?;
    match actor.role {
        ActorRole::Patient if actor.id == *patient_id => {
            Ok(repository::list_notes_for_patient(conn, patient_id)?)
        }
        ActorRole::Doctor => {
            let mut visible = Vec::new();
            for note in repository::list_notes_for_patient(conn, patient_id)? {
                if sharing::can_doctor_view_note(conn, &actor.id, &note)? {
                    visible.push(note);
                }
            }
            Ok(visible)
        }
        _ => Err(CareError::forbidden("You do not have access to these notes")),
    }
}

fn apply_body(mut note: ClinicalNote, body: &SoapBody) -> Result<ClinicalNote, CareError> {
    note.subjective = body.subjective.trim().to_string();
    note.objective = body.objective.trim().to_string();
    note.assessment = body.assessment.trim().to_string();
    note.plan = body.plan.trim().to_string();
    if note.is_empty() {
        return Err(CareError::validation("At least one SOAP section is required"));
    }
    Ok(note)
}
