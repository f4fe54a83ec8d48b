use crate::categories::{self, ROOT_COLOR, ROOT_TITLE};
use crate::database::{now, Database};
use crate::error::Result;
use relation_memory_schemas::{NewUser, User, UserId, UserUpdate};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

const USER_COLUMNS: &str = "id, name, service_id, email, created_at, updated_at";

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        service_id: row.get(2)?,
        email: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn get_user(conn: &Connection, user_id: UserId) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM user WHERE id = ?1", USER_COLUMNS);
    let user = conn
        .query_row(&sql, params![user_id.0], row_to_user)
        .optional()?;

    Ok(user)
}

pub fn find_by_service_id(conn: &Connection, service_id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM user WHERE service_id = ?1", USER_COLUMNS);
    let user = conn
        .query_row(&sql, params![service_id], row_to_user)
        .optional()?;

    Ok(user)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM user WHERE email = ?1", USER_COLUMNS);
    let user = conn
        .query_row(&sql, params![email], row_to_user)
        .optional()?;

    Ok(user)
}

/// Insert the user together with its root category, in one transaction.
pub fn create_user(db: &mut Database, new: &NewUser) -> Result<UserId> {
    let user_id = db.with_transaction(|tx| {
        let ts = now();
        tx.execute(
            "INSERT INTO user (name, service_id, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![new.name, new.service_id, new.email, new.password_hash, ts],
        )?;
        let user_id = UserId(tx.last_insert_rowid());

        categories::insert_category(tx, user_id, ROOT_TITLE, None, Some(ROOT_COLOR))?;
        Ok(user_id)
    })?;

    info!("Created user: {} ({})", new.service_id, user_id);
    Ok(user_id)
}

/// Overwrite the supplied profile fields. Returns the number of rows changed.
pub fn update_user(conn: &Connection, user_id: UserId, update: &UserUpdate) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE user
         SET name = COALESCE(?2, name),
             email = COALESCE(?3, email),
             password_hash = COALESCE(?4, password_hash),
             updated_at = ?5
         WHERE id = ?1",
        params![
            user_id.0,
            update.name,
            update.email,
            update.password_hash,
            now()
        ],
    )?;

    if changed > 0 {
        info!("Updated profile of user {}", user_id);
    }
    Ok(changed)
}
