//! Prescriptions: a doctor issues, the chosen pharmacy dispenses.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::begin_write;
use crate::db::repository::{self, now_timestamp};
use crate::db::DatabaseError;
use crate::directory;
use crate::error::{optional_text, require_text, CareError};
use crate::models::enums::{
    ActorRole, NotificationCategory, NotificationPriority, NotificationType, PrescriptionStatus,
};
use crate::models::filters::PrescriptionFilter;
use crate::models::Prescription;
use crate::notifications::{self, NewNotification};
use crate::relationships;

const NOT_ACTIVE: &str = "Prescription is not in active status";

#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionRequest {
    pub patient_id: Uuid,
    #[serde(default)]
    pub pharmacy_id: Option<Uuid>,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub quantity: u32,
    #[serde(default)]
    pub refills: u32,
    #[serde(default)]
    pub instructions: Option<String>,
}

pub fn issue(
    conn: &Connection,
    doctor_id: &Uuid,
    request: &PrescriptionRequest,
) -> Result<Prescription, CareError> {
    let medication = require_text("Medication", &request.medication)?;
    let dosage = require_text("Dosage", &request.dosage)?;
    let frequency = require_text("Frequency", &request.frequency)?;
    if request.quantity == 0 {
        return Err(CareError::validation("Quantity must be at least 1"));
    }

    let tx = begin_write(conn)?;

    let doctor = directory::require_doctor(&tx, doctor_id)?;
    let patient = directory::require_patient(&tx, &request.patient_id)?;
    if !relationships::has_relationship(&tx, &doctor.id, &patient.id)? {
        return Err(CareError::forbidden(
            "You do not have a care relationship with this patient",
        ));
    }
    let pharmacy = match request.pharmacy_id {
        Some(id) => Some(directory::require_pharmacy(&tx, &id)?),
        None => None,
    };

    let rx = Prescription {
        id: Uuid::new_v4(),
        doctor_id: doctor.id,
        patient_id: patient.id,
        pharmacy_id: pharmacy.as_ref().map(|p| p.id),
        medication,
        dosage,
        frequency,
        quantity: request.quantity,
        refills: request.refills,
        instructions: optional_text(request.instructions.as_deref()),
        status: PrescriptionStatus::Active,
        created_at: now_timestamp(),
        dispensed_at: None,
    };
    repository::insert_prescription(&tx, &rx)?;

    notifications::notify(
        &tx,
        prescription_notice(
            &rx,
            Actor::patient(patient.id),
            NotificationType::PrescriptionIssued,
            "New prescription",
            format!("{} prescribed {} {}", doctor.name, rx.medication, rx.dosage),
        ),
    )?;
    if let Some(pharmacy) = &pharmacy {
        notifications::notify(
            &tx,
            prescription_notice(
                &rx,
                Actor::pharmacy(pharmacy.id),
                NotificationType::PrescriptionIssued,
                "Prescription to fill",
                format!("{} {} for {}", rx.medication, rx.dosage, patient.name),
            ),
        )?;
    }

    tx.commit()?;
    tracing::info!(
        prescription_id = %rx.id,
        doctor_id = %doctor.id,
        patient_id = %patient.id,
        "Prescription issued"
    );
    Ok(rx)
}

/// The assigned pharmacy hands the medication over.
pub fn dispense(
    conn: &Connection,
    pharmacy_id: &Uuid,
    prescription_id: &Uuid,
) -> Result<Prescription, CareError> {
    let tx = begin_write(conn)?;

    let mut rx = load(&tx, prescription_id)?;
    if rx.pharmacy_id != Some(*pharmacy_id) {
        return Err(CareError::forbidden(
            "This prescription is assigned to another pharmacy",
        ));
    }
    close(&tx, &mut rx, PrescriptionStatus::Dispensed)?;

    notifications::notify(
        &tx,
        prescription_notice(
            &rx,
            Actor::patient(rx.patient_id),
            NotificationType::PrescriptionDispensed,
            "Prescription ready",
            format!("Your {} has been dispensed", rx.medication),
        ),
    )?;

    tx.commit()?;
    tracing::info!(prescription_id = %rx.id, %pharmacy_id, "Prescription dispensed");
    Ok(rx)
}

/// The prescribing doctor withdraws an active prescription.
pub fn cancel(
    conn: &Connection,
    doctor_id: &Uuid,
    prescription_id: &Uuid,
) -> Result<Prescription, CareError> {
    let tx = begin_write(conn)?;

    let mut rx = load(&tx, prescription_id)?;
    if rx.doctor_id != *doctor_id {
        return Err(CareError::forbidden(
            "Only the prescribing doctor can cancel this prescription",
        ));
    }
    close(&tx, &mut rx, PrescriptionStatus::Cancelled)?;

    let message = format!("The prescription for {} was cancelled", rx.medication);
    notifications::notify(
        &tx,
        prescription_notice(
            &rx,
            Actor::patient(rx.patient_id),
            NotificationType::PrescriptionCancelled,
            "Prescription cancelled",
            message.clone(),
        ),
    )?;
    if let Some(pharmacy_id) = rx.pharmacy_id {
        notifications::notify(
            &tx,
            prescription_notice(
                &rx,
                Actor::pharmacy(pharmacy_id),
                NotificationType::PrescriptionCancelled,
                "Prescription cancelled",
                message,
            ),
        )?;
    }

    tx.commit()?;
    tracing::info!(prescription_id = %rx.id, %doctor_id, "Prescription cancelled");
    Ok(rx)
}

/// Lists prescriptions visible to the actor. The actor's own id always
/// overrides the matching filter field.
pub fn list_for_actor(
    conn: &Connection,
    actor: &Actor,
    filter: &PrescriptionFilter,
) -> Result<Vec<Prescription>, CareError> {
    let mut scoped = filter.clone();
    match actor.role {
        ActorRole::Doctor => scoped.doctor_id = Some(actor.id),
        ActorRole::Patient => scoped.patient_id = Some(actor.id),
        ActorRole::Pharmacy => scoped.pharmacy_id = Some(actor.id),
    }
    Ok(repository::list_prescriptions(conn, &scoped)?)
}

fn load(conn: &Connection, id: &Uuid) -> Result<Prescription, CareError> {
    repository::get_prescription(conn, id)?.ok_or_else(|| CareError::not_found("Prescription", id))
}

fn close(
    conn: &Connection,
    rx: &mut Prescription,
    to: PrescriptionStatus,
) -> Result<(), CareError> {
    if rx.status != PrescriptionStatus::Active {
        return Err(CareError::InvalidStatus(NOT_ACTIVE.into()));
    }
    let now = now_timestamp();
    match repository::close_prescription(conn, &rx.id, to, &now) {
        Ok(()) => {}
        Err(DatabaseError::ConstraintViolation(_)) => {
            return Err(CareError::InvalidStatus(NOT_ACTIVE.into()));
        }
        Err(e) => return Err(e.into()),
    }
    rx.status = to;
    if to == PrescriptionStatus::Dispensed {
        rx.dispensed_at = Some(now);
    }
    Ok(())
}

fn prescription_notice(
    rx: &Prescription,
    recipient: Actor,
    notification_type: NotificationType,
    title: &str,
    message: String,
) -> NewNotification {
    NewNotification {
        recipient_id: recipient.id,
        recipient_role: recipient.role,
        category: NotificationCategory::Prescription,
        notification_type,
        priority: NotificationPriority::Normal,
        title: title.into(),
        message,
        link: Some(format!("/{}/prescriptions/{}", recipient.role, rx.id)),
        related_id: Some(rx.id),
    }
}
