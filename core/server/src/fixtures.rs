//! Row seeding shared by the unit tests.

use crate::database::{now, Database};
use relation_memory_schemas::{CategoryId, PersonId, UserId};
use rusqlite::params;

pub fn user(db: &Database, service_id: &str) -> UserId {
    db.conn()
        .execute(
            "INSERT INTO user (name, service_id, email, password_hash, created_at, updated_at)
             VALUES (?1, ?1, ?2, 'hash', ?3, ?3)",
            params![service_id, format!("{}@example.com", service_id), now()],
        )
        .unwrap();
    UserId(db.conn().last_insert_rowid())
}

pub fn category(db: &Database, user_id: UserId, title: &str, parent: Option<CategoryId>) -> CategoryId {
    db.conn()
        .execute(
            "INSERT INTO category (title, parent_category_id, is_root, user_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![title, parent.map(|p| p.0), parent.is_none(), user_id.0],
        )
        .unwrap();
    CategoryId(db.conn().last_insert_rowid())
}

pub fn person(db: &Database, category_id: CategoryId, name: &str) -> PersonId {
    let ts = now();
    db.conn()
        .execute(
            "INSERT INTO person (name, category_id, likeability, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)",
            params![name, category_id.0, ts],
        )
        .unwrap();
    PersonId(db.conn().last_insert_rowid())
}

pub fn count(db: &Database, table: &str) -> i64 {
    db.conn()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
}
