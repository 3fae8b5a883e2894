use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_enum, col_opt_uuid, col_timestamp, col_uuid, format_timestamp, opt_uuid_str};
use crate::db::DatabaseError;
use crate::models::*;

const RELATIONSHIP_COLUMNS: &str = "id, doctor_id, patient_id, source, referral_id, created_at";

fn relationship_from_row(row: &Row<'_>) -> rusqlite::Result<DoctorPatientRelationship> {
    Ok(DoctorPatientRelationship {
        id: col_uuid(row, 0)?,
        doctor_id: col_uuid(row, 1)?,
        patient_id: col_uuid(row, 2)?,
        source: col_enum(row, 3)?,
        referral_id: col_opt_uuid(row, 4)?,
        created_at: col_timestamp(row, 5)?,
    })
}

pub fn insert_relationship(
    conn: &Connection,
    rel: &DoctorPatientRelationship,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctor_patient_relationships
         (id, doctor_id, patient_id, source, referral_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            rel.id.to_string(),
            rel.doctor_id.to_string(),
            rel.patient_id.to_string(),
            rel.source.as_str(),
            opt_uuid_str(rel.referral_id),
            format_timestamp(&rel.created_at),
        ],
    )?;
    Ok(())
}

pub fn find_relationship(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
) -> Result<Option<DoctorPatientRelationship>, DatabaseError> {
    let rel = conn
        .query_row(
            &format!(
                "SELECT {RELATIONSHIP_COLUMNS} FROM doctor_patient_relationships
                 WHERE doctor_id = ?1 AND patient_id = ?2"
            ),
            params![doctor_id.to_string(), patient_id.to_string()],
            relationship_from_row,
        )
        .optional()?;
    Ok(rel)
}

pub fn list_relationships_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<DoctorPatientRelationship>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RELATIONSHIP_COLUMNS} FROM doctor_patient_relationships
         WHERE doctor_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], relationship_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn list_relationships_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<DoctorPatientRelationship>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RELATIONSHIP_COLUMNS} FROM doctor_patient_relationships
         WHERE patient_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], relationship_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
