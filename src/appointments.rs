//! Appointment scheduling between a doctor and a patient.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::begin_write;
use crate::db::repository::{self, now_timestamp};
use crate::db::DatabaseError;
use crate::directory;
use crate::error::{optional_text, CareError};
use crate::models::enums::{
    ActorRole, AppointmentStatus, NotificationCategory, NotificationPriority, NotificationType,
    RelationshipSource,
};
use crate::models::Appointment;
use crate::notifications::{self, NewNotification};
use crate::relationships;

pub const MIN_DURATION_MINUTES: u32 = 5;
pub const MAX_DURATION_MINUTES: u32 = 480;
const DEFAULT_DURATION_MINUTES: u32 = 30;

const NOT_SCHEDULED: &str = "Appointment is not in scheduled status";

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: NaiveDateTime,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_MINUTES
}

/// Books an appointment. Either party may initiate; the other is notified.
pub fn schedule(
    conn: &Connection,
    actor: &Actor,
    request: &AppointmentRequest,
) -> Result<Appointment, CareError> {
    let is_party = match actor.role {
        ActorRole::Doctor => actor.id == request.doctor_id,
        ActorRole::Patient => actor.id == request.patient_id,
        ActorRole::Pharmacy => false,
    };
    if !is_party {
        return Err(CareError::forbidden(
            "You can only schedule appointments you take part in",
        ));
    }
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&request.duration_minutes) {
        return Err(CareError::validation(format!(
            "Duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
        )));
    }
    let now = now_timestamp();
    if request.scheduled_at <= now {
        return Err(CareError::validation("Appointment must be scheduled in the future"));
    }

    let tx = begin_write(conn)?;

    let doctor = directory::require_doctor(&tx, &request.doctor_id)?;
    let patient = directory::require_patient(&tx, &request.patient_id)?;
    if repository::doctor_has_overlap(
        &tx,
        &doctor.id,
        &request.scheduled_at,
        request.duration_minutes,
    )? {
        return Err(CareError::Conflict(
            "The doctor already has an appointment at that time".into(),
        ));
    }

    let appointment = Appointment {
        id: Uuid::new_v4(),
        doctor_id: doctor.id,
        patient_id: patient.id,
        scheduled_at: request.scheduled_at,
        duration_minutes: request.duration_minutes,
        reason: optional_text(request.reason.as_deref()),
        status: AppointmentStatus::Scheduled,
        created_at: now,
        updated_at: now,
    };
    repository::insert_appointment(&tx, &appointment)?;
    relationships::ensure_relationship(
        &tx,
        &doctor.id,
        &patient.id,
        RelationshipSource::Appointment,
        None,
    )?;

    let when = appointment.scheduled_at.format("%Y-%m-%d %H:%M");
    let (recipient, message) = match actor.role {
        ActorRole::Doctor => (
            Actor::patient(patient.id),
            format!("{} booked an appointment with you for {when}", doctor.name),
        ),
        _ => (
            Actor::doctor(doctor.id),
            format!("{} booked an appointment for {when}", patient.name),
        ),
    };
    notifications::notify(
        &tx,
        appointment_notice(
            &appointment,
            recipient,
            NotificationType::AppointmentScheduled,
            "Appointment scheduled",
            message,
        ),
    )?;

    tx.commit()?;
    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %doctor.id,
        patient_id = %patient.id,
        "Appointment scheduled"
    );
    Ok(appointment)
}

/// Either party cancels a scheduled appointment.
pub fn cancel(
    conn: &Connection,
    actor: &Actor,
    appointment_id: &Uuid,
) -> Result<Appointment, CareError> {
    let tx = begin_write(conn)?;

    let mut appointment = load(&tx, appointment_id)?;
    let counterpart = match actor.role {
        ActorRole::Doctor if actor.id == appointment.doctor_id => {
            Actor::patient(appointment.patient_id)
        }
        ActorRole::Patient if actor.id == appointment.patient_id => {
            Actor::doctor(appointment.doctor_id)
        }
        _ => {
            return Err(CareError::forbidden(
                "Only the doctor or patient can cancel this appointment",
            ));
        }
    };
    move_status(&tx, &mut appointment, AppointmentStatus::Cancelled)?;

    let when = appointment.scheduled_at.format("%Y-%m-%d %H:%M");
    notifications::notify(
        &tx,
        appointment_notice(
            &appointment,
            counterpart,
            NotificationType::AppointmentCancelled,
            "Appointment cancelled",
            format!("The appointment on {when} was cancelled"),
        ),
    )?;

    tx.commit()?;
    tracing::info!(
        appointment_id = %appointment.id,
        actor = %actor.audit_label(),
        "Appointment cancelled"
    );
    Ok(appointment)
}

/// The doctor marks a scheduled appointment as held.
pub fn complete(
    conn: &Connection,
    doctor_id: &Uuid,
    appointment_id: &Uuid,
) -> Result<Appointment, CareError> {
    let mut appointment = load(conn, appointment_id)?;
    if appointment.doctor_id != *doctor_id {
        return Err(CareError::forbidden(
            "Only the doctor can complete this appointment",
        ));
    }
    move_status(conn, &mut appointment, AppointmentStatus::Completed)?;
    tracing::info!(appointment_id = %appointment.id, %doctor_id, "Appointment completed");
    Ok(appointment)
}

/// Appointments the actor takes part in, soonest first.
pub fn list_for_actor(conn: &Connection, actor: &Actor) -> Result<Vec<Appointment>, CareError> {
    match actor.role {
        ActorRole::Doctor => Ok(repository::list_appointments_for_doctor(conn, &actor.id)?),
        ActorRole::Patient => Ok(repository::list_appointments_for_patient(conn, &actor.id)?),
        ActorRole::Pharmacy => Err(CareError::forbidden("Pharmacies have no appointments")),
    }
}

fn load(conn: &Connection, id: &Uuid) -> Result<Appointment, CareError> {
    repository::get_appointment(conn, id)?.ok_or_else(|| CareError::not_found("Appointment", id))
}

fn move_status(
    conn: &Connection,
    appointment: &mut Appointment,
    to: AppointmentStatus,
) -> Result<(), CareError> {
    if appointment.status != AppointmentStatus::Scheduled {
        return Err(CareError::InvalidStatus(NOT_SCHEDULED.into()));
    }
    let now = now_timestamp();
    match repository::update_appointment_status(
        conn,
        &appointment.id,
        AppointmentStatus::Scheduled,
        to,
        &now,
    ) {
        Ok(()) => {}
        Err(DatabaseError::ConstraintViolation(_)) => {
            return Err(CareError::InvalidStatus(NOT_SCHEDULED.into()));
        }
        Err(e) => return Err(e.into()),
    }
    appointment.status = to;
    appointment.updated_at = now;
    Ok(())
}

fn appointment_notice(
    appointment: &Appointment,
    recipient: Actor,
    notification_type: NotificationType,
    title: &str,
    message: String,
) -> NewNotification {
    NewNotification {
        recipient_id: recipient.id,
        recipient_role: recipient.role,
        category: NotificationCategory::Appointment,
        notification_type,
        priority: NotificationPriority::Normal,
        title: title.into(),
        message,
        link: Some(format!("/{}/appointments/{}", recipient.role, appointment.id)),
        related_id: Some(appointment.id),
    }
}
