use crate::database::now;
use crate::error::Result;
use relation_memory_schemas::{Memory, MemoryId, PersonId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

fn row_to_memory(row: &Row) -> rusqlite::Result<Memory> {
    Ok(Memory {
        id: MemoryId(row.get(0)?),
        person_id: PersonId(row.get(1)?),
        content: row.get(2)?,
        registered_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn insert_memory(conn: &Connection, person_id: PersonId, content: &str) -> Result<MemoryId> {
    let ts = now();
    conn.execute(
        "INSERT INTO memory (person_id, content, registered_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        params![person_id.0, content, ts],
    )?;

    let id = MemoryId(conn.last_insert_rowid());
    info!("Recorded memory {} for person {}", id, person_id);
    Ok(id)
}

pub fn get_memory(conn: &Connection, memory_id: MemoryId) -> Result<Option<Memory>> {
    let memory = conn
        .query_row(
            "SELECT id, person_id, content, registered_at, updated_at
             FROM memory WHERE id = ?1",
            params![memory_id.0],
            row_to_memory,
        )
        .optional()?;

    Ok(memory)
}

/// Memories of one person, newest first
pub fn list_recent(conn: &Connection, person_id: PersonId) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare(
        "SELECT id, person_id, content, registered_at, updated_at
         FROM memory WHERE person_id = ?1
         ORDER BY registered_at DESC, id DESC",
    )?;
    let memories = stmt
        .query_map(params![person_id.0], row_to_memory)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(memories)
}

/// Memories of one person in registration order
pub fn list_chronological(conn: &Connection, person_id: PersonId) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare(
        "SELECT id, person_id, content, registered_at, updated_at
         FROM memory WHERE person_id = ?1
         ORDER BY registered_at ASC, id ASC",
    )?;
    let memories = stmt
        .query_map(params![person_id.0], row_to_memory)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(memories)
}
