use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_opt_uuid, col_timestamp, col_uuid, format_timestamp, opt_uuid_str};
use crate::db::DatabaseError;
use crate::models::*;

const NOTE_COLUMNS: &str = "id, patient_id, doctor_id, appointment_id, title,
    subjective, objective, assessment, plan, created_at, updated_at";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<ClinicalNote> {
    Ok(ClinicalNote {
        id: col_uuid(row, 0)?,
        patient_id: col_uuid(row, 1)?,
        doctor_id: col_uuid(row, 2)?,
        appointment_id: col_opt_uuid(row, 3)?,
        title: row.get(4)?,
        subjective: row.get(5)?,
        objective: row.get(6)?,
        assessment: row.get(7)?,
        plan: row.get(8)?,
        created_at: col_timestamp(row, 9)?,
        updated_at: col_timestamp(row, 10)?,
    })
}

pub fn insert_clinical_note(conn: &Connection, note: &ClinicalNote) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO clinical_notes (id, patient_id, doctor_id, appointment_id, title,
         subjective, objective, assessment, plan, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            note.id.to_string(),
            note.patient_id.to_string(),
            note.doctor_id.to_string(),
            opt_uuid_str(note.appointment_id),
            note.title,
            note.subjective,
            note.objective,
            note.assessment,
            note.plan,
            format_timestamp(&note.created_at),
            format_timestamp(&note.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_clinical_note(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ClinicalNote>, DatabaseError> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM clinical_notes WHERE id = ?1"),
            params![id.to_string()],
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

/// Rewrites the SOAP body of an existing note.
pub fn update_clinical_note(conn: &Connection, note: &ClinicalNote) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE clinical_notes
         SET title = ?1, subjective = ?2, objective = ?3, assessment = ?4, plan = ?5,
             updated_at = ?6
         WHERE id = ?7",
        params![
            note.title,
            note.subjective,
            note.objective,
            note.assessment,
            note.plan,
            format_timestamp(&note.updated_at),
            note.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("ClinicalNote", note.id));
    }
    Ok(())
}

/// Notes for a patient, newest first.
pub fn list_notes_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ClinicalNote>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM clinical_notes
         WHERE patient_id = ?1
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], note_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
