use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the store at `path` and make sure the schema exists
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        let db = Self { conn };
        db.init_schema()?;

        info!("Database initialized");
        Ok(db)
    }

    /// In-memory store, used by tests and throwaway runs
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside one transaction.
    ///
    /// Commits when `f` returns `Ok`. On `Err` the transaction is dropped
    /// unfinished, which rolls back every statement it ran.
    pub fn with_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        debug!("Transaction committed");
        Ok(value)
    }

    /// Create all tables and indexes
    fn init_schema(&self) -> Result<()> {
        // Deletion order is enforced by the store: no ON DELETE CASCADE anywhere.
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                service_id TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                parent_category_id INTEGER REFERENCES category(id),
                color TEXT,
                is_root INTEGER NOT NULL DEFAULT 0,
                user_id INTEGER NOT NULL REFERENCES user(id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS person (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category_id INTEGER NOT NULL REFERENCES category(id),
                introduction TEXT,
                note TEXT,
                likeability INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS extra_info (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                person_id INTEGER NOT NULL REFERENCES person(id),
                title TEXT NOT NULL,
                info TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                person_id INTEGER NOT NULL REFERENCES person(id),
                content TEXT NOT NULL,
                registered_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS favorite_person (
                user_id INTEGER NOT NULL REFERENCES user(id),
                person_id INTEGER NOT NULL REFERENCES person(id),
                PRIMARY KEY (user_id, person_id)
            )",
            [],
        )?;

        // Indexes for ownership scans and child lookups
        self.conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_category_user ON category(user_id);
             CREATE INDEX IF NOT EXISTS idx_category_parent ON category(parent_category_id);
             CREATE INDEX IF NOT EXISTS idx_person_category ON person(category_id);
             CREATE INDEX IF NOT EXISTS idx_extra_info_person ON extra_info(person_id);
             CREATE INDEX IF NOT EXISTS idx_memory_person ON memory(person_id, registered_at);
             CREATE INDEX IF NOT EXISTS idx_favorite_person ON favorite_person(person_id);",
        )?;

        Ok(())
    }
}

/// Current UTC time as RFC3339 with microseconds, so string order is time order.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `?, ?, ?` for binding `n` values into an `IN (...)` list.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fixtures::count;
    use rusqlite::params;
    use tempfile::NamedTempFile;

    #[test]
    fn test_database_creation() {
        let temp = NamedTempFile::new().unwrap();
        let db = Database::new(temp.path()).unwrap();

        for table in ["user", "category", "person", "extra_info", "memory", "favorite_person"] {
            assert_eq!(count(&db, table), 0);
        }
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp = NamedTempFile::new().unwrap();
        {
            let db = Database::new(temp.path()).unwrap();
            db.conn()
                .execute(
                    "INSERT INTO user (name, service_id, email, password_hash, created_at, updated_at)
                     VALUES ('kim', 'kim01', 'kim@example.com', 'x', ?1, ?1)",
                    params![now()],
                )
                .unwrap();
        }

        let db = Database::new(temp.path()).unwrap();
        assert_eq!(count(&db, "user"), 1);
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let db = Database::open_in_memory().unwrap();

        let result = db.conn().execute(
            "INSERT INTO category (title, user_id) VALUES ('orphan', 999)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO user (name, service_id, email, password_hash, created_at, updated_at)
                 VALUES ('lee', 'lee01', 'lee@example.com', 'x', ?1, ?1)",
                params![now()],
            )?;
            Err(Error::internal("abort after first insert"))
        });

        assert!(result.is_err());
        assert_eq!(count(&db, "user"), 0);
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let mut db = Database::open_in_memory().unwrap();

        let id = db
            .with_transaction(|tx| {
                tx.execute(
                    "INSERT INTO user (name, service_id, email, password_hash, created_at, updated_at)
                     VALUES ('park', 'park01', 'park@example.com', 'x', ?1, ?1)",
                    params![now()],
                )?;
                Ok(tx.last_insert_rowid())
            })
            .unwrap();

        assert!(id > 0);
        assert_eq!(count(&db, "user"), 1);
    }

    #[test]
    fn test_now_sorts_chronologically() {
        let first = now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = now();
        assert!(second > first);
        assert!(first.ends_with('Z'));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
