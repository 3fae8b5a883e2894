//! Route handlers, one module per resource.

pub mod account;
pub mod appointments;
pub mod directory;
pub mod health;
pub mod notes;
pub mod notifications;
pub mod prescriptions;
pub mod referrals;
pub mod registration;
pub mod relationships;
pub mod shared_notes;
