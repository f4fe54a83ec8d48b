//! Deletion of persons, category subtrees and whole users.
//!
//! Foreign keys carry no ON DELETE action, so every mutator removes child
//! rows before their parents and runs as a single transaction.

use crate::database::{placeholders, Database};
use crate::error::{Error, Result};
use crate::{categories, persons, tree};
use relation_memory_schemas::{CategoryId, PersonId, UserId};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Keeps `IN (...)` lists well under SQLite's bound-variable limit.
const DELETE_CHUNK: usize = 500;

/// Run `DELETE FROM {table} WHERE {column} IN (...)` over `ids` in chunks.
fn delete_where_in(conn: &Connection, table: &str, column: &str, ids: &[i64]) -> Result<usize> {
    let mut removed = 0;
    for chunk in ids.chunks(DELETE_CHUNK) {
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            table,
            column,
            placeholders(chunk.len())
        );
        removed += conn.execute(&sql, params_from_iter(chunk.iter()))?;
    }
    Ok(removed)
}

/// Remove everything that hangs off the given persons, then the persons.
fn delete_persons(conn: &Connection, person_ids: &[i64]) -> Result<()> {
    if person_ids.is_empty() {
        return Ok(());
    }

    let memories = delete_where_in(conn, "memory", "person_id", person_ids)?;
    let extra = delete_where_in(conn, "extra_info", "person_id", person_ids)?;
    let favorites = delete_where_in(conn, "favorite_person", "person_id", person_ids)?;
    let removed = delete_where_in(conn, "person", "id", person_ids)?;

    debug!(
        "Deleted {} persons ({} memories, {} extra info, {} favorites)",
        removed, memories, extra, favorites
    );
    Ok(())
}

fn person_ids_in(conn: &Connection, category_ids: &[CategoryId]) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    let raw: Vec<i64> = category_ids.iter().map(|c| c.0).collect();

    for chunk in raw.chunks(DELETE_CHUNK) {
        let sql = format!(
            "SELECT id FROM person WHERE category_id IN ({}) ORDER BY id",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids.extend(found);
    }
    Ok(ids)
}

fn delete_categories_in_order(conn: &Connection, order: &[CategoryId]) -> Result<()> {
    let mut stmt = conn.prepare("DELETE FROM category WHERE id = ?1")?;
    for id in order {
        stmt.execute(params![id.0])?;
    }
    Ok(())
}

/// Delete one owned person with its memories, extra info and favorite marks.
pub fn delete_person(db: &mut Database, user_id: UserId, person_id: PersonId) -> Result<()> {
    db.with_transaction(|tx| {
        if persons::get_person(tx, user_id, person_id)?.is_none() {
            return Err(Error::not_found(format!("Person {} not found", person_id)));
        }
        delete_persons(tx, &[person_id.0])
    })?;

    info!("Deleted person {} for user {}", person_id, user_id);
    Ok(())
}

/// Delete an owned category, every descendant category and all of their
/// persons. Returns the number of categories removed.
pub fn delete_category(db: &mut Database, user_id: UserId, category_id: CategoryId) -> Result<usize> {
    let removed = db.with_transaction(|tx| {
        let all = categories::list_by_id(tx, user_id)?;
        if !all.iter().any(|c| c.id == category_id) {
            return Err(Error::not_found(format!("Category {} not found", category_id)));
        }

        let mut children: HashMap<CategoryId, Vec<CategoryId>> = HashMap::new();
        for category in &all {
            if let Some(parent) = category.parent_id {
                children.entry(parent).or_default().push(category.id);
            }
        }

        let mut subtree = HashSet::new();
        let mut pending = vec![category_id];
        while let Some(id) = pending.pop() {
            if subtree.insert(id) {
                if let Some(kids) = children.get(&id) {
                    pending.extend(kids.iter().copied());
                }
            }
        }

        let members: Vec<_> = all.into_iter().filter(|c| subtree.contains(&c.id)).collect();
        let order = tree::deletion_order(&members);

        let person_ids = person_ids_in(tx, &order)?;
        delete_persons(tx, &person_ids)?;
        delete_categories_in_order(tx, &order)?;
        Ok(order.len())
    })?;

    info!(
        "Deleted category {} and {} descendant(s) for user {}",
        category_id,
        removed.saturating_sub(1),
        user_id
    );
    Ok(removed)
}

/// Delete a user and everything the user owns, all or nothing.
pub fn delete_user(db: &mut Database, user_id: UserId) -> Result<()> {
    db.with_transaction(|tx| {
        let all = categories::list_by_id(tx, user_id)?;
        let order = tree::deletion_order(&all);

        let person_ids = person_ids_in(tx, &order)?;
        delete_persons(tx, &person_ids)?;
        delete_categories_in_order(tx, &order)?;

        tx.execute(
            "DELETE FROM favorite_person WHERE user_id = ?1",
            params![user_id.0],
        )?;

        let removed = tx.execute("DELETE FROM user WHERE id = ?1", params![user_id.0])?;
        if removed == 0 {
            return Err(Error::not_found(format!("User {} not found", user_id)));
        }
        Ok(())
    })?;

    info!("Deleted user {} with all owned rows", user_id);
    Ok(())
}
