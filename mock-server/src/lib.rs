//! In-memory stand-in for the Hub HTTP API.
//!
//! Serves the organization-scoped endpoints the client uses, checks the
//! bearer key on every route, and answers failures the way the Hub does:
//! a JSON body with `message`, `timestamp` and `details`.
//! `GET /api/v1/status/broken` always fails with a bodiless 500.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub create_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateProject {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: Uuid,
    pub jdbc_url: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub create_date: DateTime<Utc>,
    pub project: Project,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnection {
    pub jdbc_url: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLog {
    pub id: Uuid,
    pub external_changelog_id: Uuid,
    pub file_name: Option<String>,
    pub name: Option<String>,
    pub project: Project,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChangeLog {
    pub file_name: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: Uuid,
    pub operation_type: Option<String>,
    pub connection: Option<Connection>,
    pub parameters: BTreeMap<String, String>,
    pub create_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct IdRef {
    pub id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOperation {
    pub operation_type: Option<String>,
    pub connection: Option<IdRef>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub number: u32,
    pub size: usize,
    pub total_elements: usize,
}

impl<T> Page<T> {
    fn of(content: Vec<T>) -> Self {
        let len = content.len();
        Self {
            content,
            number: 0,
            size: len,
            total_elements: len,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub timestamp: String,
    pub details: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<T, ApiError>;

fn error(status: StatusCode, message: impl Into<String>, details: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            details: details.into(),
        }),
    )
}

fn not_found(what: &str, id: Uuid) -> ApiError {
    error(
        StatusCode::NOT_FOUND,
        format!("{what} not found"),
        format!("no {what} with id {id}"),
    )
}

pub struct HubState {
    pub api_key: String,
    pub user: User,
    pub organization: Organization,
    pub projects: Vec<Project>,
    pub connections: Vec<Connection>,
    pub change_logs: Vec<ChangeLog>,
    pub operations: Vec<Operation>,
    pub change_sets: HashMap<Uuid, Vec<Value>>,
    pub operation_events: HashMap<Uuid, Vec<Value>>,
    pub operation_changes: HashMap<Uuid, Vec<Value>>,
    pub change_events: HashMap<Uuid, Vec<Value>>,
}

impl HubState {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            user: User {
                id: Uuid::new_v4(),
                username: "mock-user".to_string(),
            },
            organization: Organization {
                id: Uuid::new_v4(),
                name: "Mock organization".to_string(),
            },
            projects: Vec::new(),
            connections: Vec::new(),
            change_logs: Vec::new(),
            operations: Vec::new(),
            change_sets: HashMap::new(),
            operation_events: HashMap::new(),
            operation_changes: HashMap::new(),
            change_events: HashMap::new(),
        }
    }

    fn check_organization(&self, org: Uuid) -> ApiResult<()> {
        if org == self.organization.id {
            Ok(())
        } else {
            Err(not_found("organization", org))
        }
    }

    fn project(&self, org: Uuid, id: Uuid) -> ApiResult<&Project> {
        self.check_organization(org)?;
        self.projects
            .iter()
            .find(|project| project.id == id)
            .ok_or_else(|| not_found("project", id))
    }

    fn check_operation(&self, org: Uuid, prj: Uuid, op: Uuid) -> ApiResult<()> {
        self.project(org, prj)?;
        if self.operations.iter().any(|operation| operation.id == op) {
            Ok(())
        } else {
            Err(not_found("operation", op))
        }
    }
}

pub type Db = Arc<RwLock<HubState>>;

pub fn app(api_key: impl Into<String>) -> Router {
    let db: Db = Arc::new(RwLock::new(HubState::new(api_key)));
    Router::new()
        .route("/api/v1/users/me", get(me))
        .route("/api/v1/organizations", get(list_organizations))
        .route(
            "/api/v1/organizations/{org}/projects",
            get(list_projects).post(create_project),
        )
        .route(
            "/api/v1/organizations/{org}/projects/{prj}",
            get(get_project).delete(delete_project),
        )
        .route(
            "/api/v1/organizations/{org}/projects/{prj}/connections",
            get(list_connections).post(create_connection),
        )
        .route(
            "/api/v1/organizations/{org}/connections/{conn}/changesets",
            put(set_change_sets).get(list_change_sets),
        )
        .route(
            "/api/v1/organizations/{org}/projects/{prj}/changelogs",
            post(create_change_log),
        )
        .route(
            "/api/v1/organizations/{org}/changelogs/{id}",
            get(get_change_log),
        )
        .route(
            "/api/v1/organizations/{org}/projects/{prj}/operations",
            post(create_operation),
        )
        .route(
            "/api/v1/organizations/{org}/projects/{prj}/operations/{op}/operation-events",
            post(create_operation_event),
        )
        .route(
            "/api/v1/organizations/{org}/projects/{prj}/operations/{op}/changes",
            post(add_operation_changes).get(list_operation_changes),
        )
        .route(
            "/api/v1/organizations/{org}/projects/{prj}/operations/{op}/change-events",
            post(add_change_event).get(list_change_events),
        )
        .route("/api/v1/status/broken", get(broken))
        .route_layer(middleware::from_fn_with_state(db.clone(), require_api_key))
        .with_state(db)
}

pub async fn run(listener: TcpListener, api_key: impl Into<String>) -> Result<(), std::io::Error> {
    axum::serve(listener, app(api_key)).await
}

async fn require_api_key(State(db): State<Db>, request: Request, next: Next) -> Response {
    let expected = format!("Bearer {}", db.read().await.api_key);
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if presented != Some(expected.as_str()) {
        return error(
            StatusCode::UNAUTHORIZED,
            "invalid API key",
            "the bearer token does not match a known API key",
        )
        .into_response();
    }
    next.run(request).await
}

async fn me(State(db): State<Db>) -> Json<User> {
    Json(db.read().await.user.clone())
}

async fn list_organizations(State(db): State<Db>) -> Json<Page<Organization>> {
    Json(Page::of(vec![db.read().await.organization.clone()]))
}

async fn list_projects(
    State(db): State<Db>,
    Path(org): Path<Uuid>,
) -> ApiResult<Json<Page<Project>>> {
    let state = db.read().await;
    state.check_organization(org)?;
    Ok(Json(Page::of(state.projects.clone())))
}

async fn create_project(
    State(db): State<Db>,
    Path(org): Path<Uuid>,
    Json(input): Json<CreateProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let mut state = db.write().await;
    state.check_organization(org)?;
    let project = Project {
        id: Uuid::new_v4(),
        name: input.name,
        create_date: Utc::now(),
    };
    state.projects.push(project.clone());
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(db): State<Db>,
    Path((org, prj)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Project>> {
    let state = db.read().await;
    state.project(org, prj).cloned().map(Json)
}

async fn delete_project(
    State(db): State<Db>,
    Path((org, prj)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let mut state = db.write().await;
    state.project(org, prj)?;
    state.projects.retain(|project| project.id != prj);
    state.connections.retain(|connection| connection.project.id != prj);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionSearch {
    jdbc_url: Option<String>,
}

async fn list_connections(
    State(db): State<Db>,
    Path((org, prj)): Path<(Uuid, Uuid)>,
    Query(search): Query<ConnectionSearch>,
) -> ApiResult<Json<Page<Connection>>> {
    let state = db.read().await;
    state.project(org, prj)?;
    let connections = state
        .connections
        .iter()
        .filter(|connection| connection.project.id == prj)
        .filter(|connection| match &search.jdbc_url {
            Some(url) => connection.jdbc_url.as_ref() == Some(url),
            None => true,
        })
        .cloned()
        .collect();
    Ok(Json(Page::of(connections)))
}

async fn create_connection(
    State(db): State<Db>,
    Path((org, prj)): Path<(Uuid, Uuid)>,
    Json(input): Json<CreateConnection>,
) -> ApiResult<(StatusCode, Json<Connection>)> {
    let mut state = db.write().await;
    let project = state.project(org, prj)?.clone();
    let connection = Connection {
        id: Uuid::new_v4(),
        jdbc_url: input.jdbc_url,
        name: input.name,
        description: input.description,
        create_date: Utc::now(),
        project,
    };
    state.connections.push(connection.clone());
    Ok((StatusCode::CREATED, Json(connection)))
}

async fn set_change_sets(
    State(db): State<Db>,
    Path((org, conn)): Path<(Uuid, Uuid)>,
    Json(change_sets): Json<Vec<Value>>,
) -> ApiResult<StatusCode> {
    let mut state = db.write().await;
    state.check_organization(org)?;
    if !state.connections.iter().any(|connection| connection.id == conn) {
        return Err(not_found("connection", conn));
    }
    state.change_sets.insert(conn, change_sets);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_change_sets(
    State(db): State<Db>,
    Path((org, conn)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Page<Value>>> {
    let state = db.read().await;
    state.check_organization(org)?;
    let change_sets = state
        .change_sets
        .get(&conn)
        .cloned()
        .ok_or_else(|| not_found("connection", conn))?;
    Ok(Json(Page::of(change_sets)))
}

async fn create_change_log(
    State(db): State<Db>,
    Path((org, prj)): Path<(Uuid, Uuid)>,
    Json(input): Json<CreateChangeLog>,
) -> ApiResult<(StatusCode, Json<ChangeLog>)> {
    let mut state = db.write().await;
    let project = state.project(org, prj)?.clone();
    let change_log = ChangeLog {
        id: Uuid::new_v4(),
        external_changelog_id: Uuid::new_v4(),
        file_name: input.file_name,
        name: input.name,
        project,
    };
    state.change_logs.push(change_log.clone());
    Ok((StatusCode::CREATED, Json(change_log)))
}

async fn get_change_log(
    State(db): State<Db>,
    Path((org, id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ChangeLog>> {
    let state = db.read().await;
    state.check_organization(org)?;
    state
        .change_logs
        .iter()
        .find(|change_log| change_log.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("changelog", id))
}

async fn create_operation(
    State(db): State<Db>,
    Path((org, prj)): Path<(Uuid, Uuid)>,
    Json(input): Json<CreateOperation>,
) -> ApiResult<(StatusCode, Json<Operation>)> {
    let mut state = db.write().await;
    state.project(org, prj)?;
    let connection = match input.connection.and_then(|connection| connection.id) {
        Some(id) => Some(
            state
                .connections
                .iter()
                .find(|connection| connection.id == id)
                .cloned()
                .ok_or_else(|| not_found("connection", id))?,
        ),
        None => None,
    };
    let operation = Operation {
        id: Uuid::new_v4(),
        operation_type: input.operation_type,
        connection,
        parameters: input.parameters,
        create_date: Utc::now(),
    };
    state.operations.push(operation.clone());
    Ok((StatusCode::CREATED, Json(operation)))
}

async fn create_operation_event(
    State(db): State<Db>,
    Path((org, prj, op)): Path<(Uuid, Uuid, Uuid)>,
    Json(mut event): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut state = db.write().await;
    state.check_operation(org, prj, op)?;
    if let Some(fields) = event.as_object_mut() {
        fields.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    state
        .operation_events
        .entry(op)
        .or_default()
        .push(event.clone());
    Ok((StatusCode::CREATED, Json(event)))
}

async fn add_operation_changes(
    State(db): State<Db>,
    Path((org, prj, op)): Path<(Uuid, Uuid, Uuid)>,
    Json(changes): Json<Vec<Value>>,
) -> ApiResult<(StatusCode, Json<Vec<Value>>)> {
    let mut state = db.write().await;
    state.check_operation(org, prj, op)?;
    state
        .operation_changes
        .entry(op)
        .or_default()
        .extend(changes.iter().cloned());
    Ok((StatusCode::CREATED, Json(changes)))
}

async fn list_operation_changes(
    State(db): State<Db>,
    Path((org, prj, op)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<Page<Value>>> {
    let state = db.read().await;
    state.check_operation(org, prj, op)?;
    let changes = state.operation_changes.get(&op).cloned().unwrap_or_default();
    Ok(Json(Page::of(changes)))
}

async fn add_change_event(
    State(db): State<Db>,
    Path((org, prj, op)): Path<(Uuid, Uuid, Uuid)>,
    Json(event): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut state = db.write().await;
    state.check_operation(org, prj, op)?;
    state.change_events.entry(op).or_default().push(event.clone());
    Ok((StatusCode::CREATED, Json(event)))
}

async fn list_change_events(
    State(db): State<Db>,
    Path((org, prj, op)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<Page<Value>>> {
    let state = db.read().await;
    state.check_operation(org, prj, op)?;
    let events = state.change_events.get(&op).cloned().unwrap_or_default();
    Ok(Json(Page::of(events)))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}
