use crate::error::Result;
use relation_memory_schemas::{Category, CategoryId, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

/// Title of the root category every user gets at signup.
pub const ROOT_TITLE: &str = "나";
pub const ROOT_COLOR: &str = "#FFCC00";

const CATEGORY_COLUMNS: &str = "id, title, parent_category_id, color, is_root, user_id";

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: CategoryId(row.get(0)?),
        title: row.get(1)?,
        parent_id: row.get::<_, Option<i64>>(2)?.map(CategoryId),
        color: row.get(3)?,
        is_root: row.get(4)?,
        user_id: UserId(row.get(5)?),
    })
}

/// All of a user's categories with their direct person counts, title ascending.
pub fn list_with_person_counts(conn: &Connection, user_id: UserId) -> Result<Vec<(Category, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.title, c.parent_category_id, c.color, c.is_root, c.user_id,
                (SELECT COUNT(*) FROM person p WHERE p.category_id = c.id)
         FROM category c
         WHERE c.user_id = ?1
         ORDER BY c.title ASC, c.id ASC",
    )?;

    let rows = stmt
        .query_map(params![user_id.0], |row| {
            Ok((row_to_category(row)?, row.get::<_, i64>(6)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!("Loaded {} categories for user {}", rows.len(), user_id);
    Ok(rows)
}

/// All of a user's categories, id ascending.
pub fn list_by_id(conn: &Connection, user_id: UserId) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM category WHERE user_id = ?1 ORDER BY id ASC",
        CATEGORY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let categories = stmt
        .query_map(params![user_id.0], row_to_category)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(categories)
}

/// A category owned by `user_id`; another user's category reads as absent.
pub fn get_category(
    conn: &Connection,
    user_id: UserId,
    category_id: CategoryId,
) -> Result<Option<Category>> {
    let sql = format!(
        "SELECT {} FROM category WHERE id = ?1 AND user_id = ?2",
        CATEGORY_COLUMNS
    );
    let category = conn
        .query_row(&sql, params![category_id.0, user_id.0], row_to_category)
        .optional()?;

    Ok(category)
}

pub fn insert_category(
    conn: &Connection,
    user_id: UserId,
    title: &str,
    parent_id: Option<CategoryId>,
    color: Option<&str>,
) -> Result<CategoryId> {
    let is_root = parent_id.is_none();

    conn.execute(
        "INSERT INTO category (title, parent_category_id, color, is_root, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, parent_id.map(|p| p.0), color, is_root, user_id.0],
    )?;

    let id = CategoryId(conn.last_insert_rowid());
    info!("Created category: {} ({}) for user {}", title, id, user_id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::fixtures;

    #[test]
    fn test_insert_and_get_category() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "kim");

        let root = insert_category(db.conn(), owner, ROOT_TITLE, None, Some(ROOT_COLOR)).unwrap();
        let family = insert_category(db.conn(), owner, "가족", Some(root), None).unwrap();

        let fetched = get_category(db.conn(), owner, family).unwrap().unwrap();
        assert_eq!(fetched.title, "가족");
        assert_eq!(fetched.parent_id, Some(root));
        assert!(!fetched.is_root);

        let fetched_root = get_category(db.conn(), owner, root).unwrap().unwrap();
        assert!(fetched_root.is_root);
        assert_eq!(fetched_root.color.as_deref(), Some(ROOT_COLOR));
    }

    #[test]
    fn test_other_users_category_is_invisible() {
        let db = Database::open_in_memory().unwrap();
        let kim = fixtures::user(&db, "kim");
        let lee = fixtures::user(&db, "lee");

        let root = insert_category(db.conn(), kim, ROOT_TITLE, None, None).unwrap();

        assert!(get_category(db.conn(), lee, root).unwrap().is_none());
        assert!(list_by_id(db.conn(), lee).unwrap().is_empty());
    }

    #[test]
    fn test_list_with_counts_is_title_ordered() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "kim");

        let root = insert_category(db.conn(), owner, ROOT_TITLE, None, None).unwrap();
        let school = insert_category(db.conn(), owner, "학교", Some(root), None).unwrap();
        insert_category(db.conn(), owner, "가족", Some(root), None).unwrap();

        fixtures::person(&db, school, "민수");

        let rows = list_with_person_counts(db.conn(), owner).unwrap();
        let titles: Vec<&str> = rows.iter().map(|(c, _)| c.title.as_str()).collect();
        assert_eq!(titles, vec!["가족", "나", "학교"]);
        assert_eq!(rows[2].1, 1);
        assert_eq!(rows[0].1, 0);
    }
}
