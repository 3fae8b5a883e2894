use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(ActorRole {
    Doctor => "doctor",
    Patient => "patient",
    Pharmacy => "pharmacy",
});

str_enum!(ReferralStatus {
    Pending => "pending",
    Accepted => "accepted",
    Declined => "declined",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl ReferralStatus {
    /// Statuses reachable in one step. Terminal statuses return an empty slice.
    pub fn next_statuses(&self) -> &'static [ReferralStatus] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Declined, Self::Cancelled],
            Self::Accepted => &[Self::Completed, Self::Cancelled],
            Self::Declined | Self::Completed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: ReferralStatus) -> bool {
        self.next_statuses().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_statuses().is_empty()
    }
}

str_enum!(ReferralUrgency {
    Routine => "routine",
    Urgent => "urgent",
    Stat => "stat",
});

impl ReferralUrgency {
    /// Notification priority for messages about a referral of this urgency.
    pub fn notification_priority(&self) -> NotificationPriority {
        match self {
            Self::Routine => NotificationPriority::Normal,
            Self::Urgent => NotificationPriority::High,
            Self::Stat => NotificationPriority::Urgent,
        }
    }
}

str_enum!(ShareType {
    Direct => "direct",
    Referral => "referral",
});

str_enum!(RelationshipSource {
    Referral => "referral",
    Appointment => "appointment",
    Manual => "manual",
});

str_enum!(NotificationCategory {
    Referral => "referral",
    ClinicalNote => "clinical_note",
    Appointment => "appointment",
    Prescription => "prescription",
});

str_enum!(NotificationType {
    ReferralReceived => "referral_received",
    ReferralAccepted => "referral_accepted",
    ReferralDeclined => "referral_declined",
    ReferralCompleted => "referral_completed",
    ReferralCancelled => "referral_cancelled",
    NoteShared => "note_shared",
    AppointmentScheduled => "appointment_scheduled",
    AppointmentCancelled => "appointment_cancelled",
    PrescriptionIssued => "prescription_issued",
    PrescriptionDispensed => "prescription_dispensed",
    PrescriptionCancelled => "prescription_cancelled",
});

str_enum!(NotificationPriority {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(PrescriptionStatus {
    Active => "active",
    Dispensed => "dispensed",
    Cancelled => "cancelled",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn referral_status_round_trip() {
        for (variant, s) in [
            (ReferralStatus::Pending, "pending"),
            (ReferralStatus::Accepted, "accepted"),
            (ReferralStatus::Declined, "declined"),
            (ReferralStatus::Completed, "completed"),
            (ReferralStatus::Cancelled, "cancelled"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(ReferralStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn pending_can_reach_accepted_declined_cancelled() {
        let pending = ReferralStatus::Pending;
        assert!(pending.can_transition_to(ReferralStatus::Accepted));
        assert!(pending.can_transition_to(ReferralStatus::Declined));
        assert!(pending.can_transition_to(ReferralStatus::Cancelled));
        assert!(!pending.can_transition_to(ReferralStatus::Completed));
    }

    #[test]
    fn accepted_can_only_complete_or_cancel() {
        let accepted = ReferralStatus::Accepted;
        assert_eq!(
            accepted.next_statuses(),
            &[ReferralStatus::Completed, ReferralStatus::Cancelled]
        );
        assert!(!accepted.can_transition_to(ReferralStatus::Pending));
    }

    #[test]
    fn completed_is_terminal() {
        let completed = ReferralStatus::Completed;
        assert!(completed.is_terminal());
        for next in [
            ReferralStatus::Pending,
            ReferralStatus::Accepted,
            ReferralStatus::Declined,
            ReferralStatus::Cancelled,
        ] {
            assert!(!completed.can_transition_to(next));
        }
    }

    #[test]
    fn urgency_maps_to_priority() {
        assert_eq!(
            ReferralUrgency::Routine.notification_priority(),
            NotificationPriority::Normal
        );
        assert_eq!(
            ReferralUrgency::Urgent.notification_priority(),
            NotificationPriority::High
        );
        assert_eq!(
            ReferralUrgency::Stat.notification_priority(),
            NotificationPriority::Urgent
        );
    }

    #[test]
    fn serde_uses_storage_strings() {
        let json = serde_json::to_string(&NotificationType::ReferralReceived).unwrap();
        assert_eq!(json, "\"referral_received\"");
        let parsed: ReferralUrgency = serde_json::from_str("\"stat\"").unwrap();
        assert_eq!(parsed, ReferralUrgency::Stat);
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(ReferralStatus::from_str("invalid").is_err());
        assert!(ShareType::from_str("").is_err());
        assert!(ActorRole::from_str("admin").is_err());
    }
}
