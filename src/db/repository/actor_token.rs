use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{col_enum, col_uuid, format_timestamp, now_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::ActorRole;

/// Stores the SHA-256 hash of a bearer token for an actor.
pub fn insert_actor_token(
    conn: &Connection,
    token_hash: &[u8; 32],
    actor_id: &Uuid,
    role: ActorRole,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO actor_tokens (token_hash, actor_id, role, created_at, revoked)
         VALUES (?1, ?2, ?3, ?4, 0)",
        params![
            &token_hash[..],
            actor_id.to_string(),
            role.as_str(),
            format_timestamp(&now_timestamp()),
        ],
    )?;
    Ok(())
}

/// Resolves a token hash to its actor. Revoked tokens resolve to `None`.
pub fn find_actor_by_token_hash(
    conn: &Connection,
    token_hash: &[u8; 32],
) -> Result<Option<(Uuid, ActorRole)>, DatabaseError> {
    let actor = conn
        .query_row(
            "SELECT actor_id, role FROM actor_tokens WHERE token_hash = ?1 AND revoked = 0",
            params![&token_hash[..]],
            |row| Ok((col_uuid(row, 0)?, col_enum(row, 1)?)),
        )
        .optional()?;
    Ok(actor)
}

pub fn revoke_actor_tokens(conn: &Connection, actor_id: &Uuid) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE actor_tokens SET revoked = 1 WHERE actor_id = ?1 AND revoked = 0",
        params![actor_id.to_string()],
    )?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn token_hash_resolves_until_revoked() {
        let conn = open_memory_database().unwrap();
        let actor = Uuid::new_v4();
        let hash = [7u8; 32];
        insert_actor_token(&conn, &hash, &actor, ActorRole::Pharmacy).unwrap();

        assert_eq!(
            find_actor_by_token_hash(&conn, &hash).unwrap(),
            Some((actor, ActorRole::Pharmacy))
        );
        assert!(find_actor_by_token_hash(&conn, &[8u8; 32]).unwrap().is_none());

        assert_eq!(revoke_actor_tokens(&conn, &actor).unwrap(), 1);
        assert!(find_actor_by_token_hash(&conn, &hash).unwrap().is_none());
    }
}
