//! Person reads (list, detail, the "all info" aggregate) and person writes.

use crate::database::{now, Database};
use crate::error::Result;
use crate::{categories, memories, tree};
use relation_memory_schemas::{
    CategoryId, ExtraInfo, ExtraInfoId, ExtraInfoInput, FieldPatch, MemoryView, NewPerson, Person,
    PersonAllInfo, PersonDetail, PersonFilter, PersonId, PersonSummary, PersonUpdate, UserId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::{debug, info};

// ============================================================================
// Row mapping
// ============================================================================

fn row_to_person(row: &Row) -> rusqlite::Result<Person> {
    Ok(Person {
        id: PersonId(row.get(0)?),
        name: row.get(1)?,
        category_id: CategoryId(row.get(2)?),
        introduction: row.get(3)?,
        note: row.get(4)?,
        likeability: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Escape LIKE wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// ============================================================================
// Reads
// ============================================================================

/// A person owned (through its category) by `user_id`
pub fn get_person(conn: &Connection, user_id: UserId, person_id: PersonId) -> Result<Option<Person>> {
    let person = conn
        .query_row(
            "SELECT p.id, p.name, p.category_id, p.introduction, p.note, p.likeability,
                    p.created_at, p.updated_at
             FROM person p
             JOIN category c ON c.id = p.category_id
             WHERE p.id = ?1 AND c.user_id = ?2",
            params![person_id.0, user_id.0],
            row_to_person,
        )
        .optional()?;

    Ok(person)
}

/// List view: favorites first, then name ascending.
pub fn list_persons(
    conn: &Connection,
    user_id: UserId,
    filter: &PersonFilter,
) -> Result<Vec<PersonSummary>> {
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, p.category_id, c.title, p.introduction,
                f.person_id IS NOT NULL AS is_favorite, p.likeability
         FROM person p
         JOIN category c ON c.id = p.category_id
         LEFT JOIN favorite_person f ON f.person_id = p.id AND f.user_id = ?1
         WHERE c.user_id = ?1
           AND (?2 IS NULL OR p.category_id = ?2)
           AND (?3 IS NULL
                OR p.name LIKE ?3 ESCAPE '\\'
                OR p.introduction LIKE ?3 ESCAPE '\\'
                OR p.note LIKE ?3 ESCAPE '\\')
           AND (?4 = 0 OR f.person_id IS NOT NULL)
           AND (?5 IS NULL OR p.likeability >= ?5)
         ORDER BY is_favorite DESC, p.name ASC, p.id ASC",
    )?;

    let persons = stmt
        .query_map(
            params![
                user_id.0,
                filter.category_id.map(|c| c.0),
                search,
                filter.favorites_only,
                filter.min_likeability,
            ],
            |row| {
                Ok(PersonSummary {
                    id: PersonId(row.get(0)?),
                    name: row.get(1)?,
                    category_id: CategoryId(row.get(2)?),
                    category_name: row.get(3)?,
                    introduction: row.get(4)?,
                    is_favorite: row.get(5)?,
                    likeability: row.get(6)?,
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!("Listed {} persons for user {}", persons.len(), user_id);
    Ok(persons)
}

/// Person leaves for the node tree, id ascending
pub fn list_leaves(conn: &Connection, user_id: UserId) -> Result<Vec<(PersonId, String, CategoryId)>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, p.category_id
         FROM person p
         JOIN category c ON c.id = p.category_id
         WHERE c.user_id = ?1
         ORDER BY p.id ASC",
    )?;

    let leaves = stmt
        .query_map(params![user_id.0], |row| {
            Ok((
                PersonId(row.get(0)?),
                row.get::<_, String>(1)?,
                CategoryId(row.get(2)?),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(leaves)
}

/// Extra-info rows of one person in storage order
pub fn list_extra_infos(conn: &Connection, person_id: PersonId) -> Result<Vec<ExtraInfo>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, info FROM extra_info WHERE person_id = ?1 ORDER BY id ASC",
    )?;

    let infos = stmt
        .query_map(params![person_id.0], |row| {
            Ok(ExtraInfo {
                id: ExtraInfoId(row.get(0)?),
                title: row.get(1)?,
                info: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(infos)
}

pub fn get_person_detail(
    conn: &Connection,
    user_id: UserId,
    person_id: PersonId,
) -> Result<Option<PersonDetail>> {
    let detail = conn
        .query_row(
            "SELECT p.id, p.name, p.category_id, c.title, p.introduction, p.note,
                    f.person_id IS NOT NULL, p.likeability, p.created_at, p.updated_at
             FROM person p
             JOIN category c ON c.id = p.category_id
             LEFT JOIN favorite_person f ON f.person_id = p.id AND f.user_id = ?2
             WHERE p.id = ?1 AND c.user_id = ?2",
            params![person_id.0, user_id.0],
            |row| {
                Ok(PersonDetail {
                    id: PersonId(row.get(0)?),
                    name: row.get(1)?,
                    category_id: CategoryId(row.get(2)?),
                    category_name: row.get(3)?,
                    introduction: row.get(4)?,
                    note: row.get(5)?,
                    is_favorite: row.get(6)?,
                    likeability: row.get(7)?,
                    created_at: row.get(8)?,
                    updated_at: row.get(9)?,
                    extra_infos: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut detail) = detail else {
        return Ok(None);
    };
    detail.extra_infos = list_extra_infos(conn, person_id)?;
    Ok(Some(detail))
}

/// Core columns the aggregate starts from
struct AggregateHead {
    name: String,
    introduction: Option<String>,
    note: Option<String>,
    likeability: i64,
    created_at: String,
    is_favorite: bool,
    category_id: CategoryId,
    category_title: String,
}

/// Everything known about one person, merged into a single view.
///
/// Any failing step fails the whole read; `None` means the person does not
/// exist for this user.
pub fn get_person_all_info(
    conn: &Connection,
    user_id: UserId,
    person_id: PersonId,
) -> Result<Option<PersonAllInfo>> {
    let head = conn
        .query_row(
            "SELECT p.name, p.introduction, p.note, p.likeability, p.created_at,
                    f.person_id IS NOT NULL, p.category_id, c.title
             FROM person p
             JOIN category c ON c.id = p.category_id
             LEFT JOIN favorite_person f ON f.person_id = p.id AND f.user_id = ?2
             WHERE p.id = ?1 AND c.user_id = ?2",
            params![person_id.0, user_id.0],
            |row| {
                Ok(AggregateHead {
                    name: row.get(0)?,
                    introduction: row.get(1)?,
                    note: row.get(2)?,
                    likeability: row.get(3)?,
                    created_at: row.get(4)?,
                    is_favorite: row.get(5)?,
                    category_id: CategoryId(row.get(6)?),
                    category_title: row.get(7)?,
                })
            },
        )
        .optional()?;

    let Some(head) = head else {
        return Ok(None);
    };

    let extra_infos = list_extra_infos(conn, person_id)?;
    let memories = memories::list_chronological(conn, person_id)?
        .into_iter()
        .map(MemoryView::from)
        .collect();

    let by_id: HashMap<CategoryId, _> = categories::list_by_id(conn, user_id)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let all_path = tree::breadcrumb(
        &by_id,
        head.category_id,
        &head.category_title,
        &head.name,
    );

    Ok(Some(PersonAllInfo {
        id: person_id,
        name: head.name,
        introduction: head.introduction,
        note: head.note,
        likeability: head.likeability,
        created_at: head.created_at,
        is_favorite: head.is_favorite,
        all_path,
        extra_infos,
        memories,
    }))
}

// ============================================================================
// Writes
// ============================================================================

fn insert_extra_infos(conn: &Connection, person_id: PersonId, infos: &[ExtraInfoInput]) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO extra_info (person_id, title, info) VALUES (?1, ?2, ?3)")?;
    for extra in infos {
        stmt.execute(params![person_id.0, extra.title, extra.info])?;
    }
    Ok(())
}

/// Insert the person and its extra info in one transaction.
pub fn create_person(db: &mut Database, category_id: CategoryId, new: &NewPerson) -> Result<PersonId> {
    let person_id = db.with_transaction(|tx| {
        let ts = now();
        tx.execute(
            "INSERT INTO person (name, category_id, introduction, note, likeability, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                new.name,
                category_id.0,
                new.introduction,
                new.note,
                new.likeability.unwrap_or(0),
                ts
            ],
        )?;
        let person_id = PersonId(tx.last_insert_rowid());

        insert_extra_infos(tx, person_id, &new.extra_infos)?;
        Ok(person_id)
    })?;

    info!("Created person: {} ({}) in category {}", new.name, person_id, category_id);
    Ok(person_id)
}

/// Apply an update in one transaction. Supplied extra-info titles replace
/// the existing rows with the same title.
pub fn update_person(db: &mut Database, person_id: PersonId, update: &PersonUpdate) -> Result<()> {
    db.with_transaction(|tx| {
        tx.execute(
            "UPDATE person
             SET name = COALESCE(?2, name),
                 category_id = COALESCE(?3, category_id),
                 introduction = COALESCE(?4, introduction),
                 note = COALESCE(?5, note),
                 likeability = COALESCE(?6, likeability),
                 updated_at = ?7
             WHERE id = ?1",
            params![
                person_id.0,
                update.name,
                update.category_id.map(|c| c.0),
                update.introduction,
                update.note,
                update.likeability,
                now()
            ],
        )?;

        if let Some(infos) = &update.extra_infos {
            for extra in infos {
                tx.execute(
                    "DELETE FROM extra_info WHERE person_id = ?1 AND title = ?2",
                    params![person_id.0, extra.title],
                )?;
            }
            insert_extra_infos(tx, person_id, infos)?;
        }
        Ok(())
    })?;

    info!("Updated person {}", person_id);
    Ok(())
}

/// Patch individual columns with a single UPDATE and return the re-read row.
///
/// An empty patch set does nothing and returns `None`, as does a person the
/// user does not own. A column patched twice keeps the last value.
pub fn update_person_field(
    conn: &Connection,
    user_id: UserId,
    person_id: PersonId,
    patches: &[FieldPatch],
) -> Result<Option<Person>> {
    if patches.is_empty() {
        return Ok(None);
    }

    let mut columns: Vec<(&'static str, Value)> = Vec::with_capacity(patches.len());
    for patch in patches {
        let value = match patch {
            FieldPatch::Introduction(text) | FieldPatch::Note(text) => Value::Text(text.clone()),
            FieldPatch::Likeability(score) => Value::Integer(*score),
        };
        match columns.iter_mut().find(|(column, _)| *column == patch.column()) {
            Some(slot) => slot.1 = value,
            None => columns.push((patch.column(), value)),
        }
    }

    let mut assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect();
    let n = columns.len();
    assignments.push(format!("updated_at = ?{}", n + 1));

    let sql = format!(
        "UPDATE person SET {}
         WHERE id = ?{} AND category_id IN (SELECT id FROM category WHERE user_id = ?{})",
        assignments.join(", "),
        n + 2,
        n + 3
    );

    let mut values: Vec<Value> = columns.into_iter().map(|(_, value)| value).collect();
    values.push(Value::Text(now()));
    values.push(Value::Integer(person_id.0));
    values.push(Value::Integer(user_id.0));

    let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
    if changed == 0 {
        return Ok(None);
    }

    debug!("Patched {} field(s) of person {}", n, person_id);
    get_person(conn, user_id, person_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::favorites;
    use std::thread::sleep;
    use std::time::Duration;

    struct Family {
        user: UserId,
        root: CategoryId,
        family: CategoryId,
        father: PersonId,
    }

    /// 나(root) > 가족 > 아버지
    fn family(db: &Database) -> Family {
        let user = fixtures::user(db, "kim");
        let root = fixtures::category(db, user, "나", None);
        let family = fixtures::category(db, user, "가족", Some(root));
        let father = fixtures::person(db, family, "아버지");
        Family {
            user,
            root,
            family,
            father,
        }
    }

    #[test]
    fn test_all_info_path_and_parts() {
        let db = Database::open_in_memory().unwrap();
        let f = family(&db);

        insert_extra_infos(
            db.conn(),
            f.father,
            &[ExtraInfoInput {
                title: "생일".to_string(),
                info: "3월 2일".to_string(),
            }],
        )
        .unwrap();
        memories::insert_memory(db.conn(), f.father, "first").unwrap();
        memories::insert_memory(db.conn(), f.father, "second").unwrap();

        let info = get_person_all_info(db.conn(), f.user, f.father)
            .unwrap()
            .unwrap();

        assert_eq!(info.all_path, "나 > 가족 > 아버지");
        assert_eq!(info.extra_infos.len(), 1);
        assert_eq!(info.extra_infos[0].title, "생일");
        let contents: Vec<&str> = info.memories.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert!(!info.is_favorite);
    }

    #[test]
    fn test_all_info_missing_person_is_none() {
        let db = Database::open_in_memory().unwrap();
        let f = family(&db);

        assert!(get_person_all_info(db.conn(), f.user, PersonId(9999))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_reads_are_scoped_to_owner() {
        let db = Database::open_in_memory().unwrap();
        let f = family(&db);
        let other = fixtures::user(&db, "lee");

        assert!(get_person(db.conn(), other, f.father).unwrap().is_none());
        assert!(get_person_detail(db.conn(), other, f.father).unwrap().is_none());
        assert!(get_person_all_info(db.conn(), other, f.father).unwrap().is_none());
        assert!(list_persons(db.conn(), other, &PersonFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_list_puts_favorites_first() {
        let db = Database::open_in_memory().unwrap();
        let f = family(&db);
        fixtures::person(&db, f.root, "가영");
        fixtures::person(&db, f.root, "나래");

        favorites::add_favorite(db.conn(), f.user, f.father).unwrap();

        let persons = list_persons(db.conn(), f.user, &PersonFilter::default()).unwrap();
        let names: Vec<&str> = persons.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["아버지", "가영", "나래"]);
        assert!(persons[0].is_favorite);
        assert_eq!(persons[0].category_name, "가족");
        assert!(!persons[1].is_favorite);
    }

    #[test]
    fn test_list_filters() {
        let db = Database::open_in_memory().unwrap();
        let f = family(&db);
        let friend = fixtures::person(&db, f.root, "친구");
        update_person_field(db.conn(), f.user, friend, &[FieldPatch::Likeability(7)]).unwrap();
        update_person_field(
            db.conn(),
            f.user,
            f.father,
            &[FieldPatch::Note("100%_진심".to_string())],
        )
        .unwrap();

        // Category narrows to exactly that category, no descendants.
        let in_root = PersonFilter {
            category_id: Some(f.root),
            ..Default::default()
        };
        let names: Vec<String> = list_persons(db.conn(), f.user, &in_root)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["친구"]);

        let liked = PersonFilter {
            min_likeability: Some(5),
            ..Default::default()
        };
        assert_eq!(list_persons(db.conn(), f.user, &liked).unwrap()[0].id, friend);

        let search = PersonFilter {
            search: Some("100%_".to_string()),
            ..Default::default()
        };
        let found = list_persons(db.conn(), f.user, &search).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, f.father);

        let favorites_only = PersonFilter {
            favorites_only: true,
            ..Default::default()
        };
        assert!(list_persons(db.conn(), f.user, &favorites_only)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_field_patch_touches_updated_at() {
        let db = Database::open_in_memory().unwrap();
        let f = family(&db);
        let before = get_person(db.conn(), f.user, f.father).unwrap().unwrap();

        sleep(Duration::from_millis(2));
        let after = update_person_field(db.conn(), f.user, f.father, &[FieldPatch::Likeability(5)])
            .unwrap()
            .unwrap();

        assert_eq!(after.likeability, 5);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.name, before.name);
    }

    #[test]
    fn test_field_patch_empty_and_last_wins() {
        let db = Database::open_in_memory().unwrap();
        let f = family(&db);

        assert!(update_person_field(db.conn(), f.user, f.father, &[])
            .unwrap()
            .is_none());

        let patched = update_person_field(
            db.conn(),
            f.user,
            f.father,
            &[
                FieldPatch::Introduction("old".to_string()),
                FieldPatch::Note("memo".to_string()),
                FieldPatch::Introduction("new".to_string()),
            ],
        )
        .unwrap()
        .unwrap();

        assert_eq!(patched.introduction.as_deref(), Some("new"));
        assert_eq!(patched.note.as_deref(), Some("memo"));
    }

    #[test]
    fn test_field_patch_other_owner_is_none() {
        let db = Database::open_in_memory().unwrap();
        let f = family(&db);
        let other = fixtures::user(&db, "lee");

        let result =
            update_person_field(db.conn(), other, f.father, &[FieldPatch::Likeability(1)]).unwrap();
        assert!(result.is_none());

        let unchanged = get_person(db.conn(), f.user, f.father).unwrap().unwrap();
        assert_eq!(unchanged.likeability, 0);
    }

    #[test]
    fn test_create_and_update_with_extra_infos() {
        let mut db = Database::open_in_memory().unwrap();
        let f = family(&db);

        let new = NewPerson {
            name: "어머니".to_string(),
            category_id: Some(f.family),
            introduction: Some("요리 선생님".to_string()),
            note: None,
            likeability: Some(9),
            extra_infos: vec![
                ExtraInfoInput {
                    title: "생일".to_string(),
                    info: "5월 1일".to_string(),
                },
                ExtraInfoInput {
                    title: "취미".to_string(),
                    info: "등산".to_string(),
                },
            ],
        };
        let id = create_person(&mut db, f.family, &new).unwrap();

        let detail = get_person_detail(db.conn(), f.user, id).unwrap().unwrap();
        assert_eq!(detail.likeability, 9);
        assert_eq!(detail.extra_infos.len(), 2);

        let update = PersonUpdate {
            category_id: Some(f.root),
            extra_infos: Some(vec![ExtraInfoInput {
                title: "생일".to_string(),
                info: "5월 2일".to_string(),
            }]),
            ..Default::default()
        };
        update_person(&mut db, id, &update).unwrap();

        let detail = get_person_detail(db.conn(), f.user, id).unwrap().unwrap();
        assert_eq!(detail.category_id, f.root);
        assert_eq!(detail.name, "어머니");
        assert_eq!(detail.introduction.as_deref(), Some("요리 선생님"));
        let infos: Vec<(&str, &str)> = detail
            .extra_infos
            .iter()
            .map(|e| (e.title.as_str(), e.info.as_str()))
            .collect();
        assert_eq!(infos, vec![("취미", "등산"), ("생일", "5월 2일")]);
    }

    #[test]
    fn test_create_rolls_back_when_extra_info_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let f = family(&db);
        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_extra BEFORE INSERT ON extra_info
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let new = NewPerson {
            name: "삼촌".to_string(),
            category_id: Some(f.family),
            extra_infos: vec![ExtraInfoInput {
                title: "직업".to_string(),
                info: "어부".to_string(),
            }],
            ..Default::default()
        };

        assert!(create_person(&mut db, f.family, &new).is_err());
        assert_eq!(fixtures::count(&db, "person"), 1);
    }
}
