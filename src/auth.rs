//! Bearer-token identity.
//!
//! Tokens are opaque random strings handed out once at registration. Only
//! their SHA-256 hash is stored. Session policy (expiry, OTP, passwords)
//! lives with whatever issues tokens upstream, not here.

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::ActorRole;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn doctor(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Doctor,
        }
    }

    pub fn patient(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Patient,
        }
    }

    pub fn pharmacy(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Pharmacy,
        }
    }

    /// Label used in audit rows, e.g. `doctor:<uuid>`.
    pub fn audit_label(&self) -> String {
        format!("{}:{}", self.role, self.id)
    }
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Issue a fresh token for an actor and persist its hash.
pub fn issue_token(conn: &Connection, actor: &Actor) -> Result<String, DatabaseError> {
    let token = generate_token();
    repository::insert_actor_token(conn, &hash_token(&token), &actor.id, actor.role)?;
    Ok(token)
}

/// Resolve a presented token to its actor.
pub fn resolve_token(conn: &Connection, token: &str) -> Result<Option<Actor>, DatabaseError> {
    let found = repository::find_actor_by_token_hash(conn, &hash_token(token))?;
    Ok(found.map(|(id, role)| Actor { id, role }))
}

/// Revoke every live token of an actor. Returns how many were revoked.
pub fn revoke_tokens(conn: &Connection, actor: &Actor) -> Result<usize, DatabaseError> {
    let revoked = repository::revoke_actor_tokens(conn, &actor.id)?;
    tracing::info!(actor = %actor.audit_label(), revoked, "Bearer tokens revoked");
    Ok(revoked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn issued_token_resolves_to_actor() {
        let conn = open_memory_database().unwrap();
        let actor = Actor::doctor(Uuid::new_v4());
        let token = issue_token(&conn, &actor).unwrap();

        assert_eq!(resolve_token(&conn, &token).unwrap(), Some(actor));
        assert_eq!(resolve_token(&conn, "forged").unwrap(), None);
    }

    #[test]
    fn revoked_tokens_stop_resolving() {
        let conn = open_memory_database().unwrap();
        let actor = Actor::patient(Uuid::new_v4());
        let first = issue_token(&conn, &actor).unwrap();
        let second = issue_token(&conn, &actor).unwrap();

        assert_eq!(revoke_tokens(&conn, &actor).unwrap(), 2);
        assert_eq!(resolve_token(&conn, &first).unwrap(), None);
        assert_eq!(resolve_token(&conn, &second).unwrap(), None);
        assert_eq!(revoke_tokens(&conn, &actor).unwrap(), 0);
    }

    #[test]
    fn audit_label_includes_role() {
        let id = Uuid::nil();
        assert_eq!(
            Actor::patient(id).audit_label(),
            "patient:00000000-0000-0000-0000-000000000000"
        );
    }
}
