use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_timestamp, col_uuid, format_timestamp};
use crate::db::DatabaseError;
use crate::models::*;

const DOCTOR_COLUMNS: &str = "id, name, email, specialty, license_number, created_at";

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: col_uuid(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        specialty: row.get(3)?,
        license_number: row.get(4)?,
        created_at: col_timestamp(row, 5)?,
    })
}

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, email, specialty, license_number, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.email,
            doctor.specialty,
            doctor.license_number,
            format_timestamp(&doctor.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let doctor = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1"),
            params![id.to_string()],
            doctor_from_row,
        )
        .optional()?;
    Ok(doctor)
}

pub fn email_in_use(conn: &Connection, table: &str, email: &str) -> Result<bool, DatabaseError> {
    // Table names cannot be bound; only the two party tables are accepted.
    let sql = match table {
        "doctors" => "SELECT EXISTS(SELECT 1 FROM doctors WHERE email = ?1 COLLATE NOCASE)",
        "patients" => "SELECT EXISTS(SELECT 1 FROM patients WHERE email = ?1 COLLATE NOCASE)",
        other => {
            return Err(DatabaseError::ConstraintViolation(format!(
                "no email column on {other}"
            )))
        }
    };
    let exists: bool = conn.query_row(sql, params![email], |row| row.get(0))?;
    Ok(exists)
}

/// Lists doctors ordered by name, optionally restricted to a specialty
/// (case-insensitive).
pub fn list_doctors(
    conn: &Connection,
    specialty: Option<&str>,
) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors
         WHERE ?1 IS NULL OR specialty = ?1 COLLATE NOCASE
         ORDER BY name ASC"
    ))?;

    let rows = stmt.query_map(params![specialty.map(str::trim)], doctor_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::now_timestamp;
    use crate::db::sqlite::open_memory_database;

    fn doctor(name: &str, specialty: &str) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            name: name.into(),
            email: format!("{}@clinic.test", name.to_lowercase().replace(' ', ".")),
            specialty: specialty.into(),
            license_number: None,
            created_at: now_timestamp(),
        }
    }

    #[test]
    fn insert_and_get_doctor() {
        let conn = open_memory_database().unwrap();
        let d = doctor("Ana Ruiz", "Cardiology");
        insert_doctor(&conn, &d).unwrap();
        assert_eq!(get_doctor(&conn, &d.id).unwrap(), Some(d));
        assert!(get_doctor(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_filters_specialty_case_insensitively() {
        let conn = open_memory_database().unwrap();
        insert_doctor(&conn, &doctor("Ana Ruiz", "Cardiology")).unwrap();
        insert_doctor(&conn, &doctor("Ben Osei", "Dermatology")).unwrap();
        insert_doctor(&conn, &doctor("Cleo Park", "cardiology")).unwrap();

        let cardio = list_doctors(&conn, Some("CARDIOLOGY")).unwrap();
        assert_eq!(cardio.len(), 2);
        assert_eq!(list_doctors(&conn, None).unwrap().len(), 3);
    }

    #[test]
    fn duplicate_email_detected() {
        let conn = open_memory_database().unwrap();
        let d = doctor("Ana Ruiz", "Cardiology");
        insert_doctor(&conn, &d).unwrap();
        assert!(email_in_use(&conn, "doctors", "ANA.RUIZ@clinic.test").unwrap());
        assert!(!email_in_use(&conn, "patients", "ana.ruiz@clinic.test").unwrap());
        assert!(email_in_use(&conn, "referrals", "x").is_err());
    }
}
