//! Registration and lookup of doctors, patients and pharmacies.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{self, Actor};
use crate::db::repository::{self, now_timestamp};
use crate::error::{optional_text, require_text, CareError};
use crate::models::{Doctor, Patient, Pharmacy};

#[derive(Debug, Clone, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub specialty: String,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPharmacy {
    pub name: String,
    pub address: Option<String>,
}

/// A freshly registered party and the bearer token it authenticates with.
#[derive(Debug, Clone, Serialize)]
pub struct Registration<T> {
    pub record: T,
    pub token: String,
}

fn normalize_email(raw: &str) -> Result<String, CareError> {
    let email = require_text("Email", raw)?.to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        })
        .unwrap_or(false);
    if !valid {
        return Err(CareError::validation("Email address is invalid"));
    }
    Ok(email)
}

pub fn register_doctor(
    conn: &Connection,
    new: &NewDoctor,
) -> Result<Registration<Doctor>, CareError> {
    let email = normalize_email(&new.email)?;
    if repository::email_in_use(conn, "doctors", &email)? {
        return Err(CareError::Conflict("A doctor with this email already exists".into()));
    }
    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: require_text("Name", &new.name)?,
        email,
        specialty: require_text("Specialty", &new.specialty)?,
        license_number: optional_text(new.license_number.as_deref()),
        created_at: now_timestamp(),
    };
    repository::insert_doctor(conn, &doctor)?;
    let token = auth::issue_token(conn, &Actor::doctor(doctor.id))?;
    tracing::info!(doctor_id = %doctor.id, specialty = %doctor.specialty, "Doctor registered");
    Ok(Registration {
        record: doctor,
        token,
    })
}

pub fn register_patient(
    conn: &Connection,
    new: &NewPatient,
) -> Result<Registration<Patient>, CareError> {
    let email = normalize_email(&new.email)?;
    if repository::email_in_use(conn, "patients", &email)? {
        return Err(CareError::Conflict("A patient with this email already exists".into()));
    }
    if let Some(dob) = new.date_of_birth {
        if dob > now_timestamp().date() {
            return Err(CareError::validation("Date of birth cannot be in the future"));
        }
    }
    let patient = Patient {
        id: Uuid::new_v4(),
        name: require_text("Name", &new.name)?,
        email,
        date_of_birth: new.date_of_birth,
        created_at: now_timestamp(),
    };
    repository::insert_patient(conn, &patient)?;
    let token = auth::issue_token(conn, &Actor::patient(patient.id))?;
    tracing::info!(patient_id = %patient.id, "Patient registered");
    Ok(Registration {
        record: patient,
        token,
    })
}

pub fn register_pharmacy(
    conn: &Connection,
    new: &NewPharmacy,
) -> Result<Registration<Pharmacy>, CareError> {
    let pharmacy = Pharmacy {
        id: Uuid::new_v4(),
        name: require_text("Name", &new.name)?,
        address: optional_text(new.address.as_deref()),
        created_at: now_timestamp(),
    };
    repository::insert_pharmacy(conn, &pharmacy)?;
    let token = auth::issue_token(conn, &Actor::pharmacy(pharmacy.id))?;
    tracing::info!(pharmacy_id = %pharmacy.id, "Pharmacy registered");
    Ok(Registration {
        record: pharmacy,
        token,
    })
}

pub fn require_doctor(conn: &Connection, id: &Uuid) -> Result<Doctor, CareError> {
    repository::get_doctor(conn, id)?.ok_or_else(|| CareError::not_found("Doctor", id))
}

pub fn require_patient(conn: &Connection, id: &Uuid) -> Result<Patient, CareError> {
    repository::get_patient(conn, id)?.ok_or_else(|| CareError::not_found("Patient", id))
}

pub fn require_pharmacy(conn: &Connection, id: &Uuid) -> Result<Pharmacy, CareError> {
    repository::get_pharmacy(conn, id)?.ok_or_else(|| CareError::not_found("Pharmacy", id))
}

pub fn list_doctors(conn: &Connection, specialty: Option<&str>) -> Result<Vec<Doctor>, CareError> {
    let specialty = specialty.map(str::trim).filter(|s| !s.is_empty());
    Ok(repository::list_doctors(conn, specialty)?)
}
