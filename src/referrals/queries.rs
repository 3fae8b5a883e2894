//! Read side of referrals. Every result is enriched with the records it
//! points at, one lookup per link.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{
    self, ReferralPage, ReferralParty, ReferralViewer, MAX_REFERRAL_PAGE,
};
use crate::directory;
use crate::error::CareError;
use crate::models::filters::ReferralFilter;
use crate::models::Referral;

use super::types::{ReferralDetails, ReferralStats};

pub fn get_referral_details(
    conn: &Connection,
    referral_id: &Uuid,
) -> Result<ReferralDetails, CareError> {
    let referral = repository::get_referral(conn, referral_id)?
        .ok_or_else(|| CareError::not_found("Referral", referral_id))?;
    enrich(conn, referral)
}

/// Referrals the doctor wrote.
pub fn list_sent(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<ReferralDetails>, CareError> {
    list_all(
        conn,
        &ReferralFilter {
            referring_doctor_id: Some(*doctor_id),
            ..Default::default()
        },
    )
}

/// Referrals directed at the doctor, including open ones they accepted.
pub fn list_received(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<ReferralDetails>, CareError> {
    list_all(
        conn,
        &ReferralFilter {
            receiving_doctor_id: Some(*doctor_id),
            ..Default::default()
        },
    )
}

pub fn list_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ReferralDetails>, CareError> {
    list_all(
        conn,
        &ReferralFilter {
            patient_id: Some(*patient_id),
            ..Default::default()
        },
    )
}

/// Pending referrals with no receiver, for a specialty (case-insensitive).
pub fn list_open_for_specialty(
    conn: &Connection,
    specialty: &str,
) -> Result<Vec<ReferralDetails>, CareError> {
    repository::list_open_referrals(conn, specialty)?
        .into_iter()
        .map(|r| enrich(conn, r))
        .collect()
}

/// Filtered search over the referrals `doctor_id` may view, paged by
/// `filter.limit` (capped) and `filter.offset`.
pub fn search(
    conn: &Connection,
    doctor_id: &Uuid,
    filter: &ReferralFilter,
) -> Result<Vec<ReferralDetails>, CareError> {
    let doctor = directory::require_doctor(conn, doctor_id)?;
    let viewer = ReferralViewer {
        doctor_id: &doctor.id,
        specialty: &doctor.specialty,
    };
    let page = ReferralPage {
        limit: filter.limit.unwrap_or(MAX_REFERRAL_PAGE).clamp(1, MAX_REFERRAL_PAGE),
        offset: filter.offset.unwrap_or(0),
    };
    repository::list_referrals(conn, filter, Some(viewer), Some(page))?
        .into_iter()
        .map(|r| enrich(conn, r))
        .collect()
}

/// Party-scoped listings return every match.
fn list_all(conn: &Connection, filter: &ReferralFilter) -> Result<Vec<ReferralDetails>, CareError> {
    repository::list_referrals(conn, filter, None, None)?
        .into_iter()
        .map(|r| enrich(conn, r))
        .collect()
}

pub fn referral_stats(conn: &Connection, doctor_id: &Uuid) -> Result<ReferralStats, CareError> {
    let mut stats = ReferralStats::default();
    for (party, counts) in [
        (ReferralParty::Referring, &mut stats.sent),
        (ReferralParty::Receiving, &mut stats.received),
    ] {
        for (status, count) in repository::count_referrals_by_status(conn, party, doctor_id)? {
            counts.add(status, count);
        }
    }
    Ok(stats)
}

/// True when the doctor is a party to the referral, or could still claim
/// it as an open referral of their specialty.
pub fn doctor_can_view(
    conn: &Connection,
    doctor_id: &Uuid,
    referral: &Referral,
) -> Result<bool, CareError> {
    if referral.referring_doctor_id == *doctor_id
        || referral.receiving_doctor_id == Some(*doctor_id)
    {
        return Ok(true);
    }
    if referral.is_open() {
        if let Some(doctor) = repository::get_doctor(conn, doctor_id)? {
            return Ok(doctor.practices(&referral.specialty));
        }
    }
    Ok(false)
}

fn enrich(conn: &Connection, referral: Referral) -> Result<ReferralDetails, CareError> {
    let patient = repository::get_patient(conn, &referral.patient_id)?;
    let referring_doctor = repository::get_doctor(conn, &referral.referring_doctor_id)?;
    let receiving_doctor = match referral.receiving_doctor_id {
        Some(id) => repository::get_doctor(conn, &id)?,
        None => None,
    };
    let clinical_note = match referral.clinical_note_id {
        Some(id) => repository::get_clinical_note(conn, &id)?,
        None => None,
    };
    Ok(ReferralDetails {
        referral,
        patient,
        referring_doctor,
        receiving_doctor,
        clinical_note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{ReferralStatus, ReferralUrgency};
    use crate::referrals::transitions::{accept, cancel, create, decline};
    use crate::referrals::types::{NewReferral, StatusCounts};
    use crate::testing::Fixture;

    fn new_referral(fx: &Fixture, to: Option<Uuid>, specialty: &str, reason: &str) -> NewReferral {
        NewReferral {
            patient_id: fx.patient.id,
            receiving_doctor_id: to,
            clinical_note_id: None,
            specialty: specialty.into(),
            urgency: ReferralUrgency::Routine,
            reason: reason.into(),
        }
    }

    /// Directed referral from `from` to `to`.
    fn send(fx: &Fixture, from: &Uuid, to: &Uuid, specialty: &str, reason: &str) -> Referral {
        create(&fx.conn, from, &new_referral(fx, Some(*to), specialty, reason)).unwrap()
    }

    fn post_open(fx: &Fixture, specialty: &str, reason: &str) -> Referral {
        create(&fx.conn, &fx.gp.id, &new_referral(fx, None, specialty, reason)).unwrap()
    }

    #[test]
    fn details_resolve_every_link() {
        let fx = Fixture::new();
        let note = fx.note(&fx.gp.id, &fx.patient.id);
        let mut new = new_referral(&fx, Some(fx.cardiologist.id), "Cardiology", "Palpitations");
        new.clinical_note_id = Some(note.id);
        let referral = create(&fx.conn, &fx.gp.id, &new).unwrap();

        let details = get_referral_details(&fx.conn, &referral.id).unwrap();
        assert_eq!(details.patient.unwrap().id, fx.patient.id);
        assert_eq!(details.referring_doctor.unwrap().id, fx.gp.id);
        assert_eq!(details.receiving_doctor.unwrap().id, fx.cardiologist.id);
        assert_eq!(details.clinical_note.unwrap().id, note.id);
    }

    #[test]
    fn details_flatten_referral_fields_in_json() {
        let fx = Fixture::new();
        let referral = post_open(&fx, "Cardiology", "Murmur");
        let details = get_referral_details(&fx.conn, &referral.id).unwrap();
        let json = serde_json::to_value(details).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["receiving_doctor"], serde_json::Value::Null);
        assert_eq!(json["patient"]["name"], "Pat Doe");
    }

    #[test]
    fn sent_received_and_patient_lists() {
        let fx = Fixture::new();
        send(&fx, &fx.gp.id, &fx.cardiologist.id, "Cardiology", "A");
        send(&fx, &fx.gp.id, &fx.dermatologist.id, "Dermatology", "B");
        send(&fx, &fx.cardiologist.id, &fx.gp.id, "General Practice", "C");

        assert_eq!(list_sent(&fx.conn, &fx.gp.id).unwrap().len(), 2);
        assert_eq!(list_received(&fx.conn, &fx.gp.id).unwrap().len(), 1);
        assert_eq!(list_received(&fx.conn, &fx.cardiologist.id).unwrap().len(), 1);
        assert_eq!(list_for_patient(&fx.conn, &fx.patient.id).unwrap().len(), 3);
        assert!(list_for_patient(&fx.conn, &fx.other_patient.id).unwrap().is_empty());
    }

    #[test]
    fn party_lists_are_not_capped_at_a_page() {
        let fx = Fixture::new();
        let total = MAX_REFERRAL_PAGE as usize + 1;
        for i in 0..total {
            send(&fx, &fx.gp.id, &fx.cardiologist.id, "Cardiology", &format!("r{i}"));
        }
        assert_eq!(list_sent(&fx.conn, &fx.gp.id).unwrap().len(), total);
        assert_eq!(list_received(&fx.conn, &fx.cardiologist.id).unwrap().len(), total);
        assert_eq!(list_for_patient(&fx.conn, &fx.patient.id).unwrap().len(), total);
    }

    #[test]
    fn open_list_drops_claimed_referrals() {
        let fx = Fixture::new();
        let first = post_open(&fx, "Cardiology", "A");
        post_open(&fx, "cardiology", "B");
        post_open(&fx, "Dermatology", "C");

        assert_eq!(list_open_for_specialty(&fx.conn, "CARDIOLOGY").unwrap().len(), 2);

        accept(&fx.conn, &first.id, &fx.cardiologist.id).unwrap();
        let open = list_open_for_specialty(&fx.conn, "Cardiology").unwrap();
        assert_eq!(open.len(), 1);
        assert_ne!(open[0].referral.id, first.id);
    }

    #[test]
    fn search_combines_filters() {
        let fx = Fixture::new();
        let a = send(&fx, &fx.gp.id, &fx.cardiologist.id, "Cardiology", "Chest pain");
        send(&fx, &fx.gp.id, &fx.cardiologist.id, "Cardiology", "Syncope");
        decline(&fx.conn, &a.id, &fx.cardiologist.id, None).unwrap();

        let declined = search(
            &fx.conn,
            &fx.gp.id,
            &ReferralFilter {
                status: Some(ReferralStatus::Declined),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(declined.len(), 1);
        assert_eq!(declined[0].referral.id, a.id);

        let text = search(
            &fx.conn,
            &fx.gp.id,
            &ReferralFilter {
                query: Some("syncope".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].referral.reason, "Syncope");
    }

    #[test]
    fn search_only_returns_what_the_doctor_can_view() {
        let fx = Fixture::new();
        let own = send(&fx, &fx.dermatologist.id, &fx.cardiologist.id, "Cardiology", "Mole");
        let open_derm = post_open(&fx, "Dermatology", "Rash");
        post_open(&fx, "Cardiology", "Murmur");
        send(&fx, &fx.gp.id, &fx.cardiologist.id, "Cardiology", "Angina");

        let found = search(&fx.conn, &fx.dermatologist.id, &ReferralFilter::default()).unwrap();
        let mut ids: Vec<Uuid> = found.iter().map(|d| d.referral.id).collect();
        ids.sort();
        let mut expected = vec![own.id, open_derm.id];
        expected.sort();
        assert_eq!(ids, expected);
        for details in &found {
            assert!(doctor_can_view(&fx.conn, &fx.dermatologist.id, &details.referral).unwrap());
        }
    }

    #[test]
    fn search_finds_own_referral_behind_a_full_page_of_others() {
        let fx = Fixture::new();
        let own = send(&fx, &fx.dermatologist.id, &fx.cardiologist.id, "Cardiology", "Mole");
        for i in 0..MAX_REFERRAL_PAGE {
            send(&fx, &fx.gp.id, &fx.cardiologist.id, "Cardiology", &format!("r{i}"));
        }

        let found = search(&fx.conn, &fx.dermatologist.id, &ReferralFilter::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].referral.id, own.id);

        // The cardiologist sees every one of them, a page at a time.
        let page = |offset| ReferralFilter {
            offset: Some(offset),
            ..Default::default()
        };
        let first = search(&fx.conn, &fx.cardiologist.id, &page(0)).unwrap();
        let second = search(&fx.conn, &fx.cardiologist.id, &page(MAX_REFERRAL_PAGE)).unwrap();
        assert_eq!(first.len(), MAX_REFERRAL_PAGE as usize);
        assert_eq!(second.len(), 1);
        assert!(first.iter().chain(&second).any(|d| d.referral.id == own.id));
    }

    #[test]
    fn search_by_unknown_doctor_is_not_found() {
        let fx = Fixture::new();
        let err = search(&fx.conn, &Uuid::new_v4(), &ReferralFilter::default()).unwrap_err();
        assert_eq!(err.to_string(), "Doctor not found");
    }

    #[test]
    fn stats_count_both_sides() {
        let fx = Fixture::new();
        let a = send(&fx, &fx.gp.id, &fx.cardiologist.id, "Cardiology", "A");
        let b = send(&fx, &fx.gp.id, &fx.cardiologist.id, "Cardiology", "B");
        post_open(&fx, "Cardiology", "C");
        accept(&fx.conn, &a.id, &fx.cardiologist.id).unwrap();
        cancel(&fx.conn, &b.id, &fx.gp.id, None).unwrap();

        let gp = referral_stats(&fx.conn, &fx.gp.id).unwrap();
        assert_eq!(gp.sent.total, 3);
        assert_eq!(gp.sent.pending, 1);
        assert_eq!(gp.sent.accepted, 1);
        assert_eq!(gp.sent.cancelled, 1);
        assert_eq!(gp.received, StatusCounts::default());

        let cardio = referral_stats(&fx.conn, &fx.cardiologist.id).unwrap();
        assert_eq!(cardio.received.total, 2);
        assert_eq!(cardio.received.accepted, 1);
    }

    #[test]
    fn view_rules_cover_parties_and_open_specialty() {
        let fx = Fixture::new();
        let open = post_open(&fx, "Cardiology", "A");
        assert!(doctor_can_view(&fx.conn, &fx.gp.id, &open).unwrap());
        assert!(doctor_can_view(&fx.conn, &fx.cardiologist.id, &open).unwrap());
        assert!(!doctor_can_view(&fx.conn, &fx.dermatologist.id, &open).unwrap());
    }
}
