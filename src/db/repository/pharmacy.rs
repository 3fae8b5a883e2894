use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{col_timestamp, col_uuid, format_timestamp};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_pharmacy(conn: &Connection, pharmacy: &Pharmacy) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pharmacies (id, name, address, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            pharmacy.id.to_string(),
            pharmacy.name,
            pharmacy.address,
            format_timestamp(&pharmacy.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_pharmacy(conn: &Connection, id: &Uuid) -> Result<Option<Pharmacy>, DatabaseError> {
    let pharmacy = conn
        .query_row(
            "SELECT id, name, address, created_at FROM pharmacies WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok(Pharmacy {
                    id: col_uuid(row, 0)?,
                    name: row.get(1)?,
                    address: row.get(2)?,
                    created_at: col_timestamp(row, 3)?,
                })
            },
        )
        .optional()?;
    Ok(pharmacy)
}
