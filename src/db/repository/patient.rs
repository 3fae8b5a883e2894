use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{col_timestamp, col_uuid, format_timestamp};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, email, date_of_birth, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.email,
            patient.date_of_birth.map(|d| d.to_string()),
            format_timestamp(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            "SELECT id, name, email, date_of_birth, created_at FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok(Patient {
                    id: col_uuid(row, 0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    date_of_birth: row
                        .get::<_, Option<String>>(3)?
                        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
                    created_at: col_timestamp(row, 4)?,
                })
            },
        )
        .optional()?;
    Ok(patient)
}
