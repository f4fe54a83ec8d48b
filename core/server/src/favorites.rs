use crate::error::Result;
use relation_memory_schemas::{PersonId, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Added,
    AlreadyExists,
}

pub fn is_favorite(conn: &Connection, user_id: UserId, person_id: PersonId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM favorite_person WHERE user_id = ?1 AND person_id = ?2",
            params![user_id.0, person_id.0],
            |row| row.get(0),
        )
        .optional()?;

    Ok(found.is_some())
}

/// Mark a person as favorite. A second add leaves the single row alone.
pub fn add_favorite(conn: &Connection, user_id: UserId, person_id: PersonId) -> Result<FavoriteOutcome> {
    if is_favorite(conn, user_id, person_id)? {
        debug!("Person {} already a favorite of user {}", person_id, user_id);
        return Ok(FavoriteOutcome::AlreadyExists);
    }

    conn.execute(
        "INSERT INTO favorite_person (user_id, person_id) VALUES (?1, ?2)",
        params![user_id.0, person_id.0],
    )?;

    info!("Added favorite: user {} -> person {}", user_id, person_id);
    Ok(FavoriteOutcome::Added)
}

/// Returns whether a row was removed; removing a missing pair is not an error.
pub fn remove_favorite(conn: &Connection, user_id: UserId, person_id: PersonId) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM favorite_person WHERE user_id = ?1 AND person_id = ?2",
        params![user_id.0, person_id.0],
    )?;

    if removed > 0 {
        info!("Removed favorite: user {} -> person {}", user_id, person_id);
    }
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::fixtures;

    fn seed(db: &Database) -> (UserId, PersonId) {
        let owner = fixtures::user(db, "kim");
        let root = fixtures::category(db, owner, "나", None);
        (owner, fixtures::person(db, root, "아버지"))
    }

    #[test]
    fn test_add_twice_keeps_one_row() {
        let db = Database::open_in_memory().unwrap();
        let (user, person) = seed(&db);

        assert_eq!(add_favorite(db.conn(), user, person).unwrap(), FavoriteOutcome::Added);
        assert_eq!(
            add_favorite(db.conn(), user, person).unwrap(),
            FavoriteOutcome::AlreadyExists
        );
        assert_eq!(fixtures::count(&db, "favorite_person"), 1);
        assert!(is_favorite(db.conn(), user, person).unwrap());
    }

    #[test]
    fn test_remove_missing_pair_is_noop() {
        let db = Database::open_in_memory().unwrap();
        let (user, person) = seed(&db);

        assert!(!remove_favorite(db.conn(), user, person).unwrap());

        add_favorite(db.conn(), user, person).unwrap();
        assert!(remove_favorite(db.conn(), user, person).unwrap());
        assert_eq!(fixtures::count(&db, "favorite_person"), 0);
    }
}
