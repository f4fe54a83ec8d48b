//! Operations exposed to the HTTP shell.
//!
//! Each takes the authenticated user id explicitly, checks ownership, and turns
//! absent rows into `NotFound`/`AlreadyExists`. Store errors pass through as-is.

use crate::database::Database;
use crate::error::{Error, Result};
use crate::favorites::{self, FavoriteOutcome};
use crate::{cascade, categories, memories, persons, tree, users};
use relation_memory_schemas::{
    Category, CategoryId, CategoryNode, FieldPatch, Memory, NewCategory, NewMemory, NewPerson,
    NewUser, Person, PersonAllInfo, PersonDetail, PersonFilter, PersonId, PersonSummary,
    PersonUpdate, TreeNode, User, UserId, UserUpdate,
};
use serde_json::json;

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::missing_field(format!("{} is required", field)));
    }
    Ok(())
}

fn person_not_found(person_id: PersonId) -> Error {
    Error::NotFound {
        reason: format!("Person {} not found", person_id),
        data: Some(json!({ "personId": person_id })),
    }
}

fn category_not_found(category_id: CategoryId) -> Error {
    Error::NotFound {
        reason: format!("Category {} not found", category_id),
        data: Some(json!({ "categoryId": category_id })),
    }
}

fn owned_person(db: &Database, user_id: UserId, person_id: PersonId) -> Result<Person> {
    persons::get_person(db.conn(), user_id, person_id)?.ok_or_else(|| person_not_found(person_id))
}

fn owned_category(db: &Database, user_id: UserId, category_id: CategoryId) -> Result<Category> {
    categories::get_category(db.conn(), user_id, category_id)?
        .ok_or_else(|| category_not_found(category_id))
}

// ============================================================================
// Users
// ============================================================================

pub fn signup(db: &mut Database, new: &NewUser) -> Result<User> {
    require(&new.name, "name")?;
    require(&new.service_id, "service_id")?;
    require(&new.email, "email")?;
    require(&new.password_hash, "password_hash")?;

    if users::find_by_service_id(db.conn(), &new.service_id)?.is_some() {
        return Err(Error::already_exists(
            "Service id already registered",
            Some(json!({ "serviceId": new.service_id })),
        ));
    }
    if users::find_by_email(db.conn(), &new.email)?.is_some() {
        return Err(Error::already_exists(
            "Email already registered",
            Some(json!({ "email": new.email })),
        ));
    }

    let user_id = users::create_user(db, new)?;
    users::get_user(db.conn(), user_id)?
        .ok_or_else(|| Error::internal("User row missing right after signup"))
}

pub fn get_profile(db: &Database, user_id: UserId) -> Result<User> {
    users::get_user(db.conn(), user_id)?
        .ok_or_else(|| Error::not_found(format!("User {} not found", user_id)))
}

/// An empty update changes nothing and returns the current profile.
pub fn update_profile(db: &Database, user_id: UserId, update: &UserUpdate) -> Result<User> {
    if update.is_empty() {
        return get_profile(db, user_id);
    }
    if let Some(name) = &update.name {
        require(name, "name")?;
    }
    if let Some(email) = &update.email {
        require(email, "email")?;
        if let Some(existing) = users::find_by_email(db.conn(), email)? {
            if existing.id != user_id {
                return Err(Error::already_exists(
                    "Email already registered",
                    Some(json!({ "email": email })),
                ));
            }
        }
    }

    if users::update_user(db.conn(), user_id, update)? == 0 {
        return Err(Error::not_found(format!("User {} not found", user_id)));
    }
    get_profile(db, user_id)
}

pub fn delete_account(db: &mut Database, user_id: UserId) -> Result<()> {
    cascade::delete_user(db, user_id)
}

// ============================================================================
// Categories
// ============================================================================

pub fn build_category_tree(db: &Database, user_id: UserId) -> Result<Vec<CategoryNode>> {
    let rows = categories::list_with_person_counts(db.conn(), user_id)?;
    Ok(tree::build_category_forest(rows))
}

pub fn build_node_tree(db: &Database, user_id: UserId) -> Result<Vec<TreeNode>> {
    let categories = categories::list_by_id(db.conn(), user_id)?;
    let leaves = persons::list_leaves(db.conn(), user_id)?;
    Ok(tree::build_node_tree(categories, leaves))
}

pub fn create_category(db: &Database, user_id: UserId, new: &NewCategory) -> Result<Category> {
    require(&new.name, "name")?;

    if let Some(parent) = new.parent_id {
        owned_category(db, user_id, parent)?;
    } else if users::get_user(db.conn(), user_id)?.is_none() {
        return Err(Error::unauthorized(format!("Unknown user {}", user_id)));
    }

    let id = categories::insert_category(
        db.conn(),
        user_id,
        new.name.trim(),
        new.parent_id,
        new.color.as_deref(),
    )?;
    categories::get_category(db.conn(), user_id, id)?
        .ok_or_else(|| Error::internal("Category row missing right after insert"))
}

pub fn get_category(db: &Database, user_id: UserId, category_id: CategoryId) -> Result<Category> {
    owned_category(db, user_id, category_id)
}

pub fn delete_category(db: &mut Database, user_id: UserId, category_id: CategoryId) -> Result<usize> {
    cascade::delete_category(db, user_id, category_id)
}

// ============================================================================
// Persons
// ============================================================================

pub fn list_persons(db: &Database, user_id: UserId, filter: &PersonFilter) -> Result<Vec<PersonSummary>> {
    persons::list_persons(db.conn(), user_id, filter)
}

pub fn list_favorites(db: &Database, user_id: UserId) -> Result<Vec<PersonSummary>> {
    let filter = PersonFilter {
        favorites_only: true,
        ..Default::default()
    };
    persons::list_persons(db.conn(), user_id, &filter)
}

pub fn get_person(db: &Database, user_id: UserId, person_id: PersonId) -> Result<PersonDetail> {
    persons::get_person_detail(db.conn(), user_id, person_id)?
        .ok_or_else(|| person_not_found(person_id))
}

pub fn get_person_all_info(db: &Database, user_id: UserId, person_id: PersonId) -> Result<PersonAllInfo> {
    persons::get_person_all_info(db.conn(), user_id, person_id)?
        .ok_or_else(|| person_not_found(person_id))
}

pub fn create_person(db: &mut Database, user_id: UserId, new: &NewPerson) -> Result<PersonDetail> {
    require(&new.name, "name")?;
    let category_id = new
        .category_id
        .ok_or_else(|| Error::missing_field("category_id is required"))?;
    owned_category(db, user_id, category_id)?;

    let person_id = persons::create_person(db, category_id, new)?;
    persons::get_person_detail(db.conn(), user_id, person_id)?
        .ok_or_else(|| Error::internal("Person row missing right after insert"))
}

pub fn update_person(
    db: &mut Database,
    user_id: UserId,
    person_id: PersonId,
    update: &PersonUpdate,
) -> Result<PersonDetail> {
    owned_person(db, user_id, person_id)?;
    if let Some(name) = &update.name {
        require(name, "name")?;
    }
    if let Some(category_id) = update.category_id {
        owned_category(db, user_id, category_id)?;
    }

    if update.touches_columns() || update.extra_infos.is_some() {
        persons::update_person(db, person_id, update)?;
    }
    get_person(db, user_id, person_id)
}

pub fn delete_person(db: &mut Database, user_id: UserId, person_id: PersonId) -> Result<()> {
    cascade::delete_person(db, user_id, person_id)
}

/// Apply field patches. An empty set is a no-op and yields `None`.
pub fn update_person_field(
    db: &Database,
    user_id: UserId,
    person_id: PersonId,
    patches: &[FieldPatch],
) -> Result<Option<Person>> {
    if patches.is_empty() {
        return Ok(None);
    }
    match persons::update_person_field(db.conn(), user_id, person_id, patches)? {
        Some(person) => Ok(Some(person)),
        None => Err(person_not_found(person_id)),
    }
}

// ============================================================================
// Memories
// ============================================================================

pub fn create_memory(db: &Database, user_id: UserId, person_id: PersonId, new: &NewMemory) -> Result<Memory> {
    require(&new.content, "content")?;
    owned_person(db, user_id, person_id)?;

    let id = memories::insert_memory(db.conn(), person_id, &new.content)?;
    memories::get_memory(db.conn(), id)?
        .ok_or_else(|| Error::internal("Memory row missing right after insert"))
}

pub fn list_memories(db: &Database, user_id: UserId, person_id: PersonId) -> Result<Vec<Memory>> {
    owned_person(db, user_id, person_id)?;
    memories::list_recent(db.conn(), person_id)
}

// ============================================================================
// Favorites
// ============================================================================

pub fn add_favorite(db: &Database, user_id: UserId, person_id: PersonId) -> Result<PersonDetail> {
    owned_person(db, user_id, person_id)?;

    match favorites::add_favorite(db.conn(), user_id, person_id)? {
        FavoriteOutcome::Added => get_person(db, user_id, person_id),
        FavoriteOutcome::AlreadyExists => Err(Error::already_exists(
            "Person is already a favorite",
            Some(json!({ "personId": person_id })),
        )),
    }
}

/// Removing a favorite that is not set succeeds; returns whether a row went away.
pub fn remove_favorite(db: &Database, user_id: UserId, person_id: PersonId) -> Result<bool> {
    owned_person(db, user_id, person_id)?;
    favorites::remove_favorite(db.conn(), user_id, person_id)
}
