use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ID Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtraInfoId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ExtraInfoId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// User Schema
// ============================================================================

/// Profile row; the credential hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub service_id: String,
    pub email: String,
    pub created_at: String, // RFC3339
    pub updated_at: String, // RFC3339
}

/// Signup payload. `password_hash` is produced by the upstream credential service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}

// ============================================================================
// Category Schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    #[serde(rename = "name", alias = "title")]
    pub title: String,
    pub parent_id: Option<CategoryId>,
    pub color: Option<String>,
    pub is_root: bool,
    pub user_id: UserId,
}

/// One node of a user's category forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub is_root: bool,
    pub color: Option<String>,
    pub person_count: i64,
    pub children: Vec<CategoryNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "CATEGORY")]
    Category,
    #[serde(rename = "PERSON")]
    Person,
}

/// Mixed category/person tree node. Persons are always leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub is_root: bool,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCategory {
    #[serde(default)]
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub color: Option<String>,
}

// ============================================================================
// Person Schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub category_id: CategoryId,
    pub introduction: Option<String>,
    pub note: Option<String>,
    pub likeability: i64,
    pub created_at: String, // RFC3339
    pub updated_at: String, // RFC3339
}

/// Row of the person list view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSummary {
    pub id: PersonId,
    pub name: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub introduction: Option<String>,
    pub is_favorite: bool,
    pub likeability: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetail {
    pub id: PersonId,
    pub name: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub introduction: Option<String>,
    pub note: Option<String>,
    pub is_favorite: bool,
    pub likeability: i64,
    pub created_at: String,
    pub updated_at: String,
    pub extra_infos: Vec<ExtraInfo>,
}

/// Denormalized "all info" aggregate for one person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonAllInfo {
    pub id: PersonId,
    pub name: String,
    pub introduction: Option<String>,
    pub note: Option<String>,
    pub likeability: i64,
    pub created_at: String,
    pub is_favorite: bool,
    pub all_path: String,
    pub extra_infos: Vec<ExtraInfo>,
    pub memories: Vec<MemoryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub id: ExtraInfoId,
    pub title: String,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraInfoInput {
    pub title: String,
    pub info: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPerson {
    #[serde(default)]
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub introduction: Option<String>,
    pub note: Option<String>,
    pub likeability: Option<i64>,
    #[serde(default)]
    pub extra_infos: Vec<ExtraInfoInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonUpdate {
    pub name: Option<String>,
    pub category_id: Option<CategoryId>,
    pub introduction: Option<String>,
    pub note: Option<String>,
    pub likeability: Option<i64>,
    pub extra_infos: Option<Vec<ExtraInfoInput>>,
}

impl PersonUpdate {
    /// True when at least one `person` column would change.
    pub fn touches_columns(&self) -> bool {
        self.name.is_some()
            || self.category_id.is_some()
            || self.introduction.is_some()
            || self.note.is_some()
            || self.likeability.is_some()
    }
}

/// List filter. Query-string names follow the public API (`favorite`, `likeability`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonFilter {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    #[serde(default, rename = "favorite")]
    pub favorites_only: bool,
    #[serde(rename = "likeability")]
    pub min_likeability: Option<i64>,
}

/// Closed set of person columns that may be patched one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPatch {
    Introduction(String),
    Note(String),
    Likeability(i64),
}

impl FieldPatch {
    pub fn column(&self) -> &'static str {
        match self {
            FieldPatch::Introduction(_) => "introduction",
            FieldPatch::Note(_) => "note",
            FieldPatch::Likeability(_) => "likeability",
        }
    }
}

// ============================================================================
// Memory Schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: MemoryId,
    pub person_id: PersonId,
    pub content: String,
    pub registered_at: String, // RFC3339
    pub updated_at: String,    // RFC3339
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryView {
    pub id: MemoryId,
    pub content: String,
    pub registered_at: String,
}

impl From<Memory> for MemoryView {
    fn from(memory: Memory) -> Self {
        Self {
            id: memory.id,
            content: memory.content,
            registered_at: memory.registered_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMemory {
    #[serde(default)]
    pub content: String,
}

// ============================================================================
// Response Envelope
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAIL")]
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_code: String,
    pub reason: String,
    pub data: Option<serde_json::Value>,
}

/// Every endpoint answers with exactly one of `error` or `success` populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub result_type: ResultType,
    pub error: Option<ErrorBody>,
    pub success: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(payload: T) -> Self {
        Self {
            result_type: ResultType::Success,
            error: None,
            success: Some(payload),
        }
    }

    pub fn fail(error: ErrorBody) -> Self {
        Self {
            result_type: ResultType::Fail,
            error: Some(error),
            success: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&PersonId(10)).unwrap();
        assert_eq!(json, "10");

        let id: CategoryId = serde_json::from_str("7").unwrap();
        assert_eq!(id, CategoryId(7));
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn test_category_node_serialization() {
        let node = CategoryNode {
            id: CategoryId(1),
            name: "나".to_string(),
            parent_id: None,
            is_root: true,
            color: Some("#FFCC00".to_string()),
            person_count: 0,
            children: vec![CategoryNode {
                id: CategoryId(2),
                name: "가족".to_string(),
                parent_id: Some(CategoryId(1)),
                is_root: false,
                color: None,
                person_count: 1,
                children: vec![],
            }],
        };

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["isRoot"], true);
        assert_eq!(value["children"][0]["parentId"], 1);
        assert_eq!(value["children"][0]["personCount"], 1);
    }

    #[test]
    fn test_category_title_is_exposed_as_name() {
        let category = Category {
            id: CategoryId(3),
            title: "회사".to_string(),
            parent_id: None,
            color: None,
            is_root: true,
            user_id: UserId(1),
        };

        let value = serde_json::to_value(&category).unwrap();
        assert_eq!(value["name"], "회사");
        assert!(value.get("title").is_none());
    }

    #[test]
    fn test_tree_node_kind_renamed_to_type() {
        let node = TreeNode {
            id: 10,
            name: "아버지".to_string(),
            parent_id: Some(2),
            is_root: false,
            color: None,
            kind: NodeKind::Person,
            children: vec![],
        };

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "PERSON");

        let kind = serde_json::to_value(NodeKind::Category).unwrap();
        assert_eq!(kind, "CATEGORY");
    }

    #[test]
    fn test_envelope_populates_exactly_one_side() {
        let ok = serde_json::to_value(ApiResponse::success(Message::new("done"))).unwrap();
        assert_eq!(ok["resultType"], "SUCCESS");
        assert!(ok["error"].is_null());
        assert_eq!(ok["success"]["message"], "done");

        let failed = serde_json::to_value(ApiResponse::<()>::fail(ErrorBody {
            error_code: "not_found".to_string(),
            reason: "missing".to_string(),
            data: None,
        }))
        .unwrap();
        assert_eq!(failed["resultType"], "FAIL");
        assert_eq!(failed["error"]["errorCode"], "not_found");
        assert!(failed["success"].is_null());
    }

    #[test]
    fn test_person_filter_query_names() {
        let filter: PersonFilter =
            serde_json::from_str(r#"{"category_id": 2, "favorite": true, "likeability": 3}"#)
                .unwrap();
        assert_eq!(filter.category_id, Some(CategoryId(2)));
        assert!(filter.favorites_only);
        assert_eq!(filter.min_likeability, Some(3));
        assert!(filter.search.is_none());
    }

    #[test]
    fn test_field_patch_columns() {
        assert_eq!(FieldPatch::Introduction("hi".into()).column(), "introduction");
        assert_eq!(FieldPatch::Note("n".into()).column(), "note");
        assert_eq!(FieldPatch::Likeability(5).column(), "likeability");
    }
}
