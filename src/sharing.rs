//! Clinical note sharing.
//!
//! A note reaches a doctor other than its author either directly (the
//! patient shares it) or through an accepted referral. Both paths go
//! through [`record_share`], which keeps at most one share per
//! (note, recipient, referral).

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::begin_write;
use crate::db::repository::{self, now_timestamp};
use crate::directory;
use crate::error::{optional_text, CareError};
use crate::models::enums::{
    ActorRole, NotificationCategory, NotificationPriority, NotificationType, ShareType,
};
use crate::models::{ClinicalNote, Patient, SharedClinicalNote};
use crate::notifications::{self, NewNotification};
use crate::relationships;

#[derive(Debug, Clone, Deserialize)]
pub struct DirectShare {
    pub doctor_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

/// A share joined with its note and patient for the doctor's inbox.
#[derive(Debug, Clone, Serialize)]
pub struct SharedNoteEntry {
    #[serde(flatten)]
    pub share: SharedClinicalNote,
    pub note: Option<ClinicalNote>,
    pub patient: Option<Patient>,
}

/// Writes a share unless one already exists for the same tuple.
/// Returns the share and whether it was created by this call.
pub(crate) fn record_share(
    conn: &Connection,
    note: &ClinicalNote,
    doctor_id: &Uuid,
    shared_by: &Uuid,
    share_type: ShareType,
    referral_id: Option<Uuid>,
    message: Option<String>,
) -> Result<(SharedClinicalNote, bool), CareError> {
    if let Some(existing) =
        repository::find_shared_note(conn, &note.id, doctor_id, referral_id.as_ref())?
    {
        tracing::debug!(
            note_id = %note.id,
            %doctor_id,
            "Note already shared with doctor, skipping"
        );
        return Ok((existing, false));
    }

    let share = SharedClinicalNote {
        id: Uuid::new_v4(),
        note_id: note.id,
        patient_id: note.patient_id,
        doctor_id: *doctor_id,
        shared_by: *shared_by,
        share_type,
        referral_id,
        message,
        is_read: false,
        shared_at: now_timestamp(),
        read_at: None,
    };
    repository::insert_shared_note(conn, &share)?;
    tracing::info!(
        share_id = %share.id,
        note_id = %note.id,
        %doctor_id,
        share_type = share_type.as_str(),
        "Clinical note shared"
    );
    Ok((share, true))
}

/// A patient shares one of their own notes with a doctor.
pub fn share_with_doctor(
    conn: &Connection,
    patient_id: &Uuid,
    note_id: &Uuid,
    request: &DirectShare,
) -> Result<SharedClinicalNote, CareError> {
    let tx = begin_write(conn)?;

    let note = repository::get_clinical_note(&tx, note_id)?
        .ok_or_else(|| CareError::not_found("Clinical note", note_id))?;
    if note.patient_id != *patient_id {
        return Err(CareError::forbidden("You can only share your own clinical notes"));
    }
    let doctor = directory::require_doctor(&tx, &request.doctor_id)?;
    let patient = directory::require_patient(&tx, patient_id)?;

    let (share, created) = record_share(
        &tx,
        &note,
        &doctor.id,
        patient_id,
        ShareType::Direct,
        None,
        optional_text(request.message.as_deref()),
    )?;

    if created {
        notifications::notify(
            &tx,
            NewNotification {
                recipient_id: doctor.id,
                recipient_role: ActorRole::Doctor,
                category: NotificationCategory::ClinicalNote,
                notification_type: NotificationType::NoteShared,
                priority: NotificationPriority::Normal,
                title: "Clinical note shared with you".into(),
                message: format!("{} shared \"{}\" with you", patient.name, note.title),
                link: Some(format!("/doctor/shared-notes/{}", share.id)),
                related_id: Some(share.id),
            },
        )?;
    }

    tx.commit()?;
    Ok(share)
}

/// Notes shared with a doctor, newest first.
pub fn inbox(
    conn: &Connection,
    doctor_id: &Uuid,
    unread_only: bool,
) -> Result<Vec<SharedNoteEntry>, CareError> {
    repository::list_shared_with_doctor(conn, doctor_id, unread_only)?
        .into_iter()
        .map(|share| {
            let note = repository::get_clinical_note(conn, &share.note_id)?;
            let patient = repository::get_patient(conn, &share.patient_id)?;
            Ok(SharedNoteEntry {
                share,
                note,
                patient,
            })
        })
        .collect()
}

pub fn mark_read(
    conn: &Connection,
    share_id: &Uuid,
    doctor_id: &Uuid,
) -> Result<SharedClinicalNote, CareError> {
    let share = repository::get_shared_note(conn, share_id)?
        .ok_or_else(|| CareError::not_found("Shared note", share_id))?;
    if share.doctor_id != *doctor_id {
        return Err(CareError::forbidden("This note was shared with another doctor"));
    }
    repository::mark_shared_note_read(conn, share_id, &now_timestamp())?;
    repository::get_shared_note(conn, share_id)?
        .ok_or_else(|| CareError::not_found("Shared note", share_id))
}

/// A doctor may read a note they wrote, one shared with them, or any note
/// of a patient they have a relationship with.
pub fn can_doctor_view_note(
    conn: &Connection,
    doctor_id: &Uuid,
    note: &ClinicalNote,
) -> Result<bool, CareError> {
    if note.doctor_id == *doctor_id {
        return Ok(true);
    }
    if repository::is_note_shared_with(conn, &note.id, doctor_id)? {
        return Ok(true);
    }
    relationships::has_relationship(conn, doctor_id, &note.patient_id)
}
