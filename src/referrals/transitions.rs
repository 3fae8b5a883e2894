//! Referral status transitions and their side effects.
//!
//! ```text
//! pending ──► accepted ──► completed
//!    │            │
//!    ├──► declined└──► cancelled
//!    └──► cancelled
//! ```
//!
//! Each handler runs in one transaction: the status patch, the shared note,
//! the relationship and every notification commit together or not at all.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::begin_write;
use crate::db::repository::{self, now_timestamp};
use crate::db::DatabaseError;
use crate::directory;
use crate::error::{optional_text, require_text, CareError};
use crate::models::enums::{
    ActorRole, NotificationCategory, NotificationPriority, NotificationType, ReferralStatus,
    ReferralUrgency, RelationshipSource, ShareType,
};
use crate::models::Referral;
use crate::notifications::{self, NewNotification};
use crate::relationships;
use crate::sharing;

use super::types::NewReferral;

const NOT_PENDING: &str = "Referral is not in pending status";
const NOT_ACCEPTED: &str = "Referral is not in accepted status";

/// A doctor refers a patient, to a named colleague or to a specialty.
pub fn create(
    conn: &Connection,
    referring_doctor_id: &Uuid,
    new: &NewReferral,
) -> Result<Referral, CareError> {
    let specialty = require_text("Specialty", &new.specialty)?;
    let reason = require_text("Reason", &new.reason)?;

    let tx = begin_write(conn)?;

    let referrer = directory::require_doctor(&tx, referring_doctor_id)?;
    let patient = directory::require_patient(&tx, &new.patient_id)?;

    let receiver = match new.receiving_doctor_id {
        Some(id) if id == referrer.id => {
            return Err(CareError::validation("You cannot refer a patient to yourself"));
        }
        Some(id) => Some(directory::require_doctor(&tx, &id)?),
        None => None,
    };

    if let Some(note_id) = new.clinical_note_id {
        let note = repository::get_clinical_note(&tx, &note_id)?
            .ok_or_else(|| CareError::not_found("Clinical note", note_id))?;
        if note.patient_id != patient.id {
            return Err(CareError::validation(
                "Clinical note does not belong to this patient",
            ));
        }
    }

    let now = now_timestamp();
    let referral = Referral {
        id: Uuid::new_v4(),
        referring_doctor_id: referrer.id,
        receiving_doctor_id: receiver.as_ref().map(|d| d.id),
        patient_id: patient.id,
        clinical_note_id: new.clinical_note_id,
        specialty,
        urgency: new.urgency,
        reason,
        status: ReferralStatus::Pending,
        decline_reason: None,
        completion_notes: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
        accepted_at: None,
        declined_at: None,
        completed_at: None,
        cancelled_at: None,
    };
    repository::insert_referral(&tx, &referral)?;

    if let Some(receiver) = &receiver {
        notifications::notify(
            &tx,
            referral_notice(
                &referral,
                receiver.id,
                ActorRole::Doctor,
                NotificationType::ReferralReceived,
                referral.urgency.notification_priority(),
                urgency_title(referral.urgency),
                format!(
                    "{} referred {} to you for {}: {}",
                    referrer.name, patient.name, referral.specialty, referral.reason
                ),
            ),
        )?;
    }

    tx.commit()?;
    tracing::info!(
        referral_id = %referral.id,
        referring_doctor_id = %referrer.id,
        open = referral.is_open(),
        urgency = referral.urgency.as_str(),
        "Referral created"
    );
    Ok(referral)
}

/// The receiving doctor (or, for an open referral, any doctor of the
/// specialty) takes the referral on.
pub fn accept(
    conn: &Connection,
    referral_id: &Uuid,
    doctor_id: &Uuid,
) -> Result<Referral, CareError> {
    let tx = begin_write(conn)?;

    let mut referral = load(&tx, referral_id)?;
    require_status(&referral, ReferralStatus::Pending, NOT_PENDING)?;
    let doctor = directory::require_doctor(&tx, doctor_id)?;

    match referral.receiving_doctor_id {
        Some(receiver) if receiver != doctor.id => {
            return Err(CareError::forbidden(
                "Only the receiving doctor can accept this referral",
            ));
        }
        Some(_) => {}
        None => {
            if doctor.id == referral.referring_doctor_id {
                return Err(CareError::forbidden("You cannot accept your own referral"));
            }
            if !doctor.practices(&referral.specialty) {
                return Err(CareError::forbidden(format!(
                    "This referral is open to {} specialists only",
                    referral.specialty
                )));
            }
            referral.receiving_doctor_id = Some(doctor.id);
        }
    }

    let now = now_timestamp();
    referral.status = ReferralStatus::Accepted;
    referral.accepted_at = Some(now);
    referral.updated_at = now;
    persist(&tx, &referral, ReferralStatus::Pending, NOT_PENDING)?;

    if let Some(note_id) = referral.clinical_note_id {
        // Tolerate a note that disappeared after the referral was written.
        if let Some(note) = repository::get_clinical_note(&tx, &note_id)? {
            sharing::record_share(
                &tx,
                &note,
                &doctor.id,
                &referral.referring_doctor_id,
                ShareType::Referral,
                Some(referral.id),
                Some(format!("Shared with referral: {}", referral.reason)),
            )?;
        }
    }

    relationships::ensure_relationship(
        &tx,
        &doctor.id,
        &referral.patient_id,
        RelationshipSource::Referral,
        Some(referral.id),
    )?;

    notifications::notify(
        &tx,
        referral_notice(
            &referral,
            referral.referring_doctor_id,
            ActorRole::Doctor,
            NotificationType::ReferralAccepted,
            NotificationPriority::Normal,
            "Referral accepted".into(),
            format!("{} accepted your {} referral", doctor.name, referral.specialty),
        ),
    )?;
    notifications::notify(
        &tx,
        referral_notice(
            &referral,
            referral.patient_id,
            ActorRole::Patient,
            NotificationType::ReferralAccepted,
            NotificationPriority::Normal,
            "Your referral was accepted".into(),
            format!(
                "{} ({}) will see you for your referral",
                doctor.name, doctor.specialty
            ),
        ),
    )?;

    tx.commit()?;
    tracing::info!(referral_id = %referral.id, %doctor_id, "Referral accepted");
    Ok(referral)
}

/// The designated receiving doctor turns the referral down.
pub fn decline(
    conn: &Connection,
    referral_id: &Uuid,
    doctor_id: &Uuid,
    reason: Option<&str>,
) -> Result<Referral, CareError> {
    let tx = begin_write(conn)?;

    let mut referral = load(&tx, referral_id)?;
    require_status(&referral, ReferralStatus::Pending, NOT_PENDING)?;
    match referral.receiving_doctor_id {
        None => {
            return Err(CareError::forbidden(
                "Open referrals cannot be declined; the referring doctor may cancel it",
            ));
        }
        Some(receiver) if receiver != *doctor_id => {
            return Err(CareError::forbidden(
                "Only the receiving doctor can decline this referral",
            ));
        }
        Some(_) => {}
    }
    let doctor = directory::require_doctor(&tx, doctor_id)?;

    let now = now_timestamp();
    referral.status = ReferralStatus::Declined;
    referral.decline_reason = optional_text(reason);
    referral.declined_at = Some(now);
    referral.updated_at = now;
    persist(&tx, &referral, ReferralStatus::Pending, NOT_PENDING)?;

    let message = match &referral.decline_reason {
        Some(why) => format!(
            "{} declined your {} referral: {why}",
            doctor.name, referral.specialty
        ),
        None => format!("{} declined your {} referral", doctor.name, referral.specialty),
    };
    notifications::notify(
        &tx,
        referral_notice(
            &referral,
            referral.referring_doctor_id,
            ActorRole::Doctor,
            NotificationType::ReferralDeclined,
            NotificationPriority::High,
            "Referral declined".into(),
            message,
        ),
    )?;

    tx.commit()?;
    tracing::info!(referral_id = %referral.id, %doctor_id, "Referral declined");
    Ok(referral)
}

/// The receiving doctor closes out an accepted referral.
pub fn complete(
    conn: &Connection,
    referral_id: &Uuid,
    doctor_id: &Uuid,
    notes: Option<&str>,
) -> Result<Referral, CareError> {
    let tx = begin_write(conn)?;

    let mut referral = load(&tx, referral_id)?;
    require_status(&referral, ReferralStatus::Accepted, NOT_ACCEPTED)?;
    if referral.receiving_doctor_id != Some(*doctor_id) {
        return Err(CareError::forbidden(
            "Only the receiving doctor can complete this referral",
        ));
    }
    let doctor = directory::require_doctor(&tx, doctor_id)?;

    let now = now_timestamp();
    referral.status = ReferralStatus::Completed;
    referral.completion_notes = optional_text(notes);
    referral.completed_at = Some(now);
    referral.updated_at = now;
    persist(&tx, &referral, ReferralStatus::Accepted, NOT_ACCEPTED)?;

    notifications::notify(
        &tx,
        referral_notice(
            &referral,
            referral.referring_doctor_id,
            ActorRole::Doctor,
            NotificationType::ReferralCompleted,
            NotificationPriority::Normal,
            "Referral completed".into(),
            format!("{} completed your {} referral", doctor.name, referral.specialty),
        ),
    )?;
    notifications::notify(
        &tx,
        referral_notice(
            &referral,
            referral.patient_id,
            ActorRole::Patient,
            NotificationType::ReferralCompleted,
            NotificationPriority::Normal,
            "Referral completed".into(),
            format!("Your {} referral with {} is complete", referral.specialty, doctor.name),
        ),
    )?;

    tx.commit()?;
    tracing::info!(referral_id = %referral.id, %doctor_id, "Referral completed");
    Ok(referral)
}

/// The referring doctor withdraws a pending or accepted referral.
pub fn cancel(
    conn: &Connection,
    referral_id: &Uuid,
    doctor_id: &Uuid,
    reason: Option<&str>,
) -> Result<Referral, CareError> {
    let tx = begin_write(conn)?;

    let mut referral = load(&tx, referral_id)?;
    if referral.referring_doctor_id != *doctor_id {
        return Err(CareError::forbidden(
            "Only the referring doctor can cancel this referral",
        ));
    }
    let from = referral.status;
    if !from.can_transition_to(ReferralStatus::Cancelled) {
        let message = if from == ReferralStatus::Completed {
            "Completed referrals cannot be cancelled".to_string()
        } else {
            format!("Referral cannot be cancelled from {from} status")
        };
        tracing::warn!(referral_id = %referral.id, status = from.as_str(), "Cancel rejected");
        return Err(CareError::InvalidStatus(message));
    }
    let doctor = directory::require_doctor(&tx, doctor_id)?;

    let now = now_timestamp();
    referral.status = ReferralStatus::Cancelled;
    referral.cancellation_reason = optional_text(reason);
    referral.cancelled_at = Some(now);
    referral.updated_at = now;
    persist(
        &tx,
        &referral,
        from,
        &format!("Referral cannot be cancelled from {from} status"),
    )?;

    if let Some(receiver) = referral.receiving_doctor_id {
        notifications::notify(
            &tx,
            referral_notice(
                &referral,
                receiver,
                ActorRole::Doctor,
                NotificationType::ReferralCancelled,
                NotificationPriority::Normal,
                "Referral cancelled".into(),
                format!("{} cancelled the {} referral", doctor.name, referral.specialty),
            ),
        )?;
    }

    tx.commit()?;
    tracing::info!(
        referral_id = %referral.id,
        %doctor_id,
        from = from.as_str(),
        "Referral cancelled"
    );
    Ok(referral)
}

fn load(conn: &Connection, referral_id: &Uuid) -> Result<Referral, CareError> {
    repository::get_referral(conn, referral_id)?
        .ok_or_else(|| CareError::not_found("Referral", referral_id))
}

fn require_status(
    referral: &Referral,
    expected: ReferralStatus,
    message: &str,
) -> Result<(), CareError> {
    if referral.status != expected {
        tracing::warn!(
            referral_id = %referral.id,
            status = referral.status.as_str(),
            expected = expected.as_str(),
            "Referral transition rejected"
        );
        return Err(CareError::InvalidStatus(message.to_string()));
    }
    Ok(())
}

/// Writes the patched referral, guarded on the status it was read in.
fn persist(
    conn: &Connection,
    referral: &Referral,
    from: ReferralStatus,
    stale_message: &str,
) -> Result<(), CareError> {
    match repository::update_referral_transition(conn, referral, from) {
        Ok(()) => Ok(()),
        Err(DatabaseError::ConstraintViolation(_)) => {
            Err(CareError::InvalidStatus(stale_message.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn urgency_title(urgency: ReferralUrgency) -> String {
    match urgency {
        ReferralUrgency::Routine => "New referral".into(),
        ReferralUrgency::Urgent => "Urgent referral".into(),
        ReferralUrgency::Stat => "STAT referral".into(),
    }
}

fn referral_notice(
    referral: &Referral,
    recipient_id: Uuid,
    recipient_role: ActorRole,
    notification_type: NotificationType,
    priority: NotificationPriority,
    title: String,
    message: String,
) -> NewNotification {
    let prefix = match recipient_role {
        ActorRole::Patient => "/patient",
        _ => "/doctor",
    };
    NewNotification {
        recipient_id,
        recipient_role,
        category: NotificationCategory::Referral,
        notification_type,
        priority,
        title,
        message,
        link: Some(format!("{prefix}/referrals/{}", referral.id)),
        related_id: Some(referral.id),
    }
}
