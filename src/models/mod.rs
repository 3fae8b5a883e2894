pub mod appointment;
pub mod clinical_note;
pub mod doctor;
pub mod enums;
pub mod filters;
pub mod notification;
pub mod patient;
pub mod pharmacy;
pub mod prescription;
pub mod referral;
pub mod relationship;
pub mod shared_note;

pub use appointment::*;
pub use clinical_note::*;
pub use doctor::*;
pub use filters::*;
pub use notification::*;
pub use patient::*;
pub use pharmacy::*;
pub use prescription::*;
pub use referral::*;
pub use relationship::*;
pub use shared_note::*;
