use crate::database::Database;
use crate::error::{Error, Result};
use crate::service;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Json, Path, Query, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use relation_memory_schemas::{
    ApiResponse, Category, CategoryId, CategoryNode, FieldPatch, Memory, Message, NewCategory,
    NewMemory, NewPerson, NewUser, Person, PersonAllInfo, PersonDetail, PersonFilter, PersonId,
    PersonSummary, PersonUpdate, TreeNode, User, UserId, UserUpdate,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Header carrying the user id verified by the upstream token check.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed [{}]: {}", self.code(), self);
        } else {
            warn!("Request rejected [{}]: {}", self.code(), self);
        }

        (status, Json(ApiResponse::<()>::fail(self.to_body()))).into_response()
    }
}

// ========== EXTRACTORS ==========
//
// axum's own extractors reject with plain text. These wrap them so a
// malformed id, body or query string still answers with the FAIL envelope.

/// JSON request body.
struct Body<T>(T);

#[async_trait]
impl<T, S> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| Error::missing_field(rejection.body_text()))?;
        Ok(Body(value))
    }
}

/// Numeric `:id` path segment.
struct Id(i64);

#[async_trait]
impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| Error::missing_field(rejection.body_text()))?;
        Ok(Id(id))
    }
}

/// Query string.
struct Params<T>(T);

#[async_trait]
impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| Error::missing_field(rejection.body_text()))?;
        Ok(Params(value))
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>>;

fn ok<T>(payload: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(payload)))
}

fn current_user(headers: &HeaderMap) -> Result<UserId> {
    let raw = headers
        .get(USER_HEADER)
        .ok_or_else(|| Error::unauthorized("Missing X-User-Id header"))?;

    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(UserId)
        .ok_or_else(|| Error::unauthorized("Malformed X-User-Id header"))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Users
        .route("/api/v1/users", post(signup))
        .route(
            "/api/v1/users/me",
            get(get_profile).patch(update_profile).delete(delete_account),
        )
        // Categories
        .route(
            "/api/v1/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/v1/categories/:id",
            get(get_category).delete(delete_category),
        )
        .route("/api/v1/nodes", get(list_nodes))
        // Persons
        .route("/api/v1/persons", get(list_persons).post(create_person))
        .route(
            "/api/v1/persons/:id",
            get(get_person).put(update_person).delete(delete_person),
        )
        .route("/api/v1/persons/:id/all-info", get(get_person_all_info))
        .route("/api/v1/persons/:id/introduction", patch(patch_introduction))
        .route("/api/v1/persons/:id/note", patch(patch_note))
        .route("/api/v1/persons/:id/likeability", patch(patch_likeability))
        .route(
            "/api/v1/persons/:id/memories",
            get(list_memories).post(create_memory),
        )
        // Favorites
        .route("/api/v1/favorites", get(list_favorites))
        .route(
            "/api/v1/favorites/:id",
            post(add_favorite).delete(remove_favorite),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "relation-memory",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ========== USERS ==========

async fn signup(State(state): State<AppState>, Body(new): Body<NewUser>) -> ApiResult<User> {
    let mut db = state.db.lock().await;
    let user = service::signup(&mut db, &new)?;
    info!("Signed up user {} ({})", user.service_id, user.id);
    ok(user)
}

async fn get_profile(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<User> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::get_profile(&db, user_id)?)
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Body(update): Body<UserUpdate>,
) -> ApiResult<User> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::update_profile(&db, user_id, &update)?)
}

async fn delete_account(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Message> {
    let user_id = current_user(&headers)?;
    let mut db = state.db.lock().await;
    service::delete_account(&mut db, user_id)?;
    ok(Message::new("Account deleted"))
}

// ========== CATEGORIES ==========

async fn list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<CategoryNode>> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::build_category_tree(&db, user_id)?)
}

async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Body(new): Body<NewCategory>,
) -> ApiResult<Category> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::create_category(&db, user_id, &new)?)
}

async fn get_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
) -> ApiResult<Category> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::get_category(&db, user_id, CategoryId(id))?)
}

async fn delete_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
) -> ApiResult<Message> {
    let user_id = current_user(&headers)?;
    let mut db = state.db.lock().await;
    let removed = service::delete_category(&mut db, user_id, CategoryId(id))?;
    ok(Message::new(format!("Deleted {} categories", removed)))
}

async fn list_nodes(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<TreeNode>> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::build_node_tree(&db, user_id)?)
}

// ========== PERSONS ==========

async fn list_persons(
    State(state): State<AppState>,
    headers: HeaderMap,
    Params(filter): Params<PersonFilter>,
) -> ApiResult<Vec<PersonSummary>> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::list_persons(&db, user_id, &filter)?)
}

async fn create_person(
    State(state): State<AppState>,
    headers: HeaderMap,
    Body(new): Body<NewPerson>,
) -> ApiResult<PersonDetail> {
    let user_id = current_user(&headers)?;
    let mut db = state.db.lock().await;
    ok(service::create_person(&mut db, user_id, &new)?)
}

async fn get_person(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
) -> ApiResult<PersonDetail> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::get_person(&db, user_id, PersonId(id))?)
}

async fn update_person(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
    Body(update): Body<PersonUpdate>,
) -> ApiResult<PersonDetail> {
    let user_id = current_user(&headers)?;
    let mut db = state.db.lock().await;
    ok(service::update_person(&mut db, user_id, PersonId(id), &update)?)
}

async fn delete_person(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
) -> ApiResult<Message> {
    let user_id = current_user(&headers)?;
    let mut db = state.db.lock().await;
    service::delete_person(&mut db, user_id, PersonId(id))?;
    ok(Message::new("Person deleted"))
}

async fn get_person_all_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
) -> ApiResult<PersonAllInfo> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::get_person_all_info(&db, user_id, PersonId(id))?)
}

// ========== FIELD PATCHES ==========

#[derive(Debug, Deserialize)]
struct IntroductionBody {
    one_line: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NoteBody {
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LikeabilityBody {
    likeability: Option<i64>,
}

async fn apply_patch(state: &AppState, headers: &HeaderMap, id: i64, patch: FieldPatch) -> ApiResult<Person> {
    let user_id = current_user(headers)?;
    let db = state.db.lock().await;
    let person = service::update_person_field(&db, user_id, PersonId(id), &[patch])?
        .ok_or_else(|| Error::internal("Patch produced no row"))?;
    ok(person)
}

async fn patch_introduction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
    Body(body): Body<IntroductionBody>,
) -> ApiResult<Person> {
    let text = body
        .one_line
        .ok_or_else(|| Error::missing_field("one_line is required"))?;
    apply_patch(&state, &headers, id, FieldPatch::Introduction(text)).await
}

async fn patch_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
    Body(body): Body<NoteBody>,
) -> ApiResult<Person> {
    let text = body
        .note
        .ok_or_else(|| Error::missing_field("note is required"))?;
    apply_patch(&state, &headers, id, FieldPatch::Note(text)).await
}

async fn patch_likeability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
    Body(body): Body<LikeabilityBody>,
) -> ApiResult<Person> {
    let score = body
        .likeability
        .ok_or_else(|| Error::missing_field("likeability is required"))?;
    apply_patch(&state, &headers, id, FieldPatch::Likeability(score)).await
}

// ========== MEMORIES ==========

async fn list_memories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
) -> ApiResult<Vec<Memory>> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::list_memories(&db, user_id, PersonId(id))?)
}

async fn create_memory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
    Body(new): Body<NewMemory>,
) -> ApiResult<Memory> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::create_memory(&db, user_id, PersonId(id), &new)?)
}

// ========== FAVORITES ==========

async fn list_favorites(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<PersonSummary>> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::list_favorites(&db, user_id)?)
}

async fn add_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
) -> ApiResult<PersonDetail> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    ok(service::add_favorite(&db, user_id, PersonId(id))?)
}

async fn remove_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Id(id): Id,
) -> ApiResult<Message> {
    let user_id = current_user(&headers)?;
    let db = state.db.lock().await;
    service::remove_favorite(&db, user_id, PersonId(id))?;
    ok(Message::new("Removed from favorites"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_current_user_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static(" 42 "));
        assert_eq!(current_user(&headers).unwrap(), UserId(42));
    }

    #[test]
    fn test_current_user_missing_or_malformed() {
        let headers = HeaderMap::new();
        assert_eq!(current_user(&headers).unwrap_err().status(), 401);

        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("kim"));
        assert_eq!(current_user(&headers).unwrap_err().code(), "unauthorized");
    }
}
