//! Seeded in-memory database shared by workflow tests.

use std::path::Path;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{self, now_timestamp};
use crate::db::sqlite::{open_database, open_memory_database};
use crate::models::{ClinicalNote, Doctor, Patient, Pharmacy};

pub(crate) struct Fixture {
    pub conn: Connection,
    pub gp: Doctor,
    pub cardiologist: Doctor,
    pub dermatologist: Doctor,
    pub patient: Patient,
    pub other_patient: Patient,
    pub pharmacy: Pharmacy,
}

impl Fixture {
    pub fn new() -> Self {
        Self::seed(open_memory_database().unwrap())
    }

    /// Same seed on a file database, for tests that need a second connection.
    pub fn on_file(path: &Path) -> Self {
        Self::seed(open_database(path).unwrap())
    }

    fn seed(conn: Connection) -> Self {
        let gp = seed_doctor(&conn, "Dr. Grace Hopper", "General Practice");
        let cardiologist = seed_doctor(&conn, "Dr. Carl Ludwig", "Cardiology");
        let dermatologist = seed_doctor(&conn, "Dr. Derya Kaya", "Dermatology");
        let patient = seed_patient(&conn, "Pat Doe");
        let other_patient = seed_patient(&conn, "Sam Roe");
        let pharmacy = Pharmacy {
            id: Uuid::new_v4(),
            name: "Corner Pharmacy".into(),
            address: Some("1 Main St".into()),
            created_at: now_timestamp(),
        };
        repository::insert_pharmacy(&conn, &pharmacy).unwrap();

        Self {
            conn,
            gp,
            cardiologist,
            dermatologist,
            patient,
            other_patient,
            pharmacy,
        }
    }

    /// Writes a SOAP note authored by `doctor_id` straight to the store.
    pub fn note(&self, doctor_id: &Uuid, patient_id: &Uuid) -> ClinicalNote {
        let now = now_timestamp();
        let note = ClinicalNote {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            doctor_id: *doctor_id,
            appointment_id: None,
            title: "Chest pain on exertion".into(),
            subjective: "Intermittent chest tightness for two weeks".into(),
            objective: "BP 142/91, HR 88".into(),
            assessment: "Possible stable angina".into(),
            plan: "Cardiology referral, ECG".into(),
            created_at: now,
            updated_at: now,
        };
        repository::insert_clinical_note(&self.conn, &note).unwrap();
        note
    }
}

fn seed_doctor(conn: &Connection, name: &str, specialty: &str) -> Doctor {
    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: name.into(),
        email: format!("{}@clinic.test", Uuid::new_v4().simple()),
        specialty: specialty.into(),
        license_number: None,
        created_at: now_timestamp(),
    };
    repository::insert_doctor(conn, &doctor).unwrap();
    doctor
}

fn seed_patient(conn: &Connection, name: &str) -> Patient {
    let patient = Patient {
        id: Uuid::new_v4(),
        name: name.into(),
        email: format!("{}@example.test", Uuid::new_v4().simple()),
        date_of_birth: chrono::NaiveDate::from_ymd_opt(1980, 5, 17),
        created_at: now_timestamp(),
    };
    repository::insert_patient(conn, &patient).unwrap();
    patient
}
