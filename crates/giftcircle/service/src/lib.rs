#![deny(unsafe_code)]

pub mod config;

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use crate::config::{FixtureConfig, GiftdConfig, StorageConfig};
use giftcircle_core::{
    BroadcastEventSink, ErrorKind, GiftCircle, GiftContext, GiftError, InMemoryCatalog,
    InMemoryDirectory, ItemView,
};
use giftcircle_storage::memory::InMemoryGiftStorage;
use giftcircle_storage::{GiftStorage, QueryWindow};
use giftcircle_types::{
    Celebration, CelebrationId, CelebrationStatus, ClaimId, ClaimSummary, ContributionTotal,
    ItemClaim, ItemId, LeadershipHistoryEntry, LeadershipRecord, MemberId, NewCelebration,
    SplitStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Header carrying the acting member's id.
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage error: {0}")]
    Storage(#[from] giftcircle_storage::StorageError),
    #[error(transparent)]
    Gift(#[from] GiftError),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Clone)]
pub struct ServiceState {
    pub circle: GiftCircle,
    pub events: BroadcastEventSink,
}

impl ServiceState {
    /// Connect storage and seed the in-memory collaborators from fixtures.
    pub async fn bootstrap(config: &GiftdConfig) -> Result<Self, ServiceError> {
        let storage = connect_storage(&config.storage).await?;
        let (directory, catalog) = seed_collaborators(&config.fixtures)?;
        let events = BroadcastEventSink::default();

        let context = GiftContext::new(storage, directory, catalog)
            .with_events(Arc::new(events.clone()));
        let circle = GiftCircle::new(context);
        info!(
            storage = circle.storage_backend(),
            groups = config.fixtures.groups.len(),
            items = config.fixtures.items.len(),
            "gift circle bootstrapped"
        );

        Ok(Self { circle, events })
    }
}

async fn connect_storage(config: &StorageConfig) -> Result<Arc<dyn GiftStorage>, ServiceError> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemoryGiftStorage::new())),
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let storage = giftcircle_storage::postgres::PostgresGiftStorage::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(ServiceError::Config(
            "postgres storage requires the `postgres` feature".to_string(),
        )),
    }
}

fn seed_collaborators(
    fixtures: &FixtureConfig,
) -> Result<(Arc<InMemoryDirectory>, Arc<InMemoryCatalog>), ServiceError> {
    let directory = Arc::new(InMemoryDirectory::new());
    for group in &fixtures.groups {
        for member in &group.members {
            directory.upsert_member(&group.group_id, member.clone())?;
        }
        for admin in &group.admins {
            directory.grant_admin(&group.group_id, admin)?;
        }
    }

    let catalog = Arc::new(InMemoryCatalog::new());
    for listing in &fixtures.items {
        catalog.upsert(listing.clone())?;
    }
    Ok((directory, catalog))
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/celebrations", post(open_celebration))
        .route("/v1/celebrations/:id", get(get_celebration))
        .route(
            "/v1/celebrations/:id/leadership/history",
            get(leadership_history),
        )
        .route("/v1/celebrations/:id/leadership", post(reassign_leader))
        .route("/v1/celebrations/:id/status", post(set_status))
        .route(
            "/v1/celebrations/:id/contributions",
            get(contribution_total).put(upsert_contribution),
        )
        .route("/v1/items/:id", get(item_view))
        .route("/v1/items/:id/claim", post(claim_item))
        .route("/v1/items/:id/split", get(split_status).post(open_split))
        .route("/v1/items/:id/split/pledges", post(pledge))
        .route("/v1/items/:id/split/close", post(close_split))
        .route("/v1/claims/:id", delete(unclaim))
        .route("/v1/claim-summary", get(claim_summary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Acting member, taken from the `x-actor-id` header.
pub struct Actor(pub MemberId);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|raw| raw.to_str().ok())
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| ApiError::Http {
                status: StatusCode::UNAUTHORIZED,
                kind: ErrorKind::Authorization,
                code: "missing_actor",
                message: format!("{ACTOR_HEADER} header is required"),
            })?;
        Ok(Actor(MemberId::new(value)))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http {
        status: StatusCode,
        kind: ErrorKind,
        code: &'static str,
        message: String,
    },
    #[error(transparent)]
    Gift(#[from] GiftError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            kind: ErrorKind::Validation,
            code: "bad_request",
            message: message.into(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Rotation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http {
                status,
                kind,
                code,
                message,
            } => (
                status,
                Json(serde_json::json!({
                    "error": message,
                    "kind": kind.as_str(),
                    "code": code,
                })),
            )
                .into_response(),
            ApiError::Gift(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Internal {
                    error!(error = %err, "request failed");
                }
                let mut body = serde_json::json!({
                    "error": err.to_string(),
                    "kind": kind.as_str(),
                    "code": err.code(),
                });
                if let GiftError::ExceedsRemaining { remaining_minor } = &err {
                    body["remaining_minor"] = serde_json::json!(remaining_minor);
                }
                (status_for(kind), Json(body)).into_response()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    storage_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "giftd",
        storage_backend: state.circle.storage_backend(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenedCelebration {
    pub celebration: Celebration,
    pub leadership: LeadershipRecord,
}

async fn open_celebration(
    State(state): State<ServiceState>,
    Json(request): Json<NewCelebration>,
) -> Result<(StatusCode, Json<OpenedCelebration>), ApiError> {
    let (celebration, leadership) = state.circle.leadership().open_celebration(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(OpenedCelebration {
            celebration,
            leadership,
        }),
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CelebrationResponse {
    pub celebration: Celebration,
    pub current_leader: Option<MemberId>,
}

async fn get_celebration(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<CelebrationResponse>, ApiError> {
    let celebration = state
        .circle
        .leadership()
        .celebration(&CelebrationId::new(id))
        .await?;
    Ok(Json(CelebrationResponse {
        current_leader: celebration.leader_id.clone(),
        celebration,
    }))
}

#[derive(Debug, Clone, Deserialize)]
struct WindowQuery {
    #[serde(default = "default_history_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub entries: Vec<LeadershipHistoryEntry>,
}

async fn leadership_history(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    if query.limit == 0 || query.limit > 1_000 {
        return Err(ApiError::bad_request("limit must be between 1 and 1000"));
    }
    let entries = state
        .circle
        .leadership()
        .leadership_history(
            &CelebrationId::new(id),
            QueryWindow {
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await?;
    Ok(Json(HistoryResponse { entries }))
}

#[derive(Debug, Clone, Deserialize)]
struct ReassignRequest {
    leader_id: MemberId,
}

async fn reassign_leader(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    Json(request): Json<ReassignRequest>,
) -> Result<Json<LeadershipRecord>, ApiError> {
    let record = state
        .circle
        .leadership()
        .reassign_leader(&CelebrationId::new(id), &request.leader_id, &actor)
        .await?;
    Ok(Json(record))
}

#[derive(Debug, Clone, Deserialize)]
struct StatusRequest {
    status: CelebrationStatus,
}

async fn set_status(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Celebration>, ApiError> {
    let celebration = state
        .circle
        .leadership()
        .set_celebration_status(&CelebrationId::new(id), request.status, &actor)
        .await?;
    Ok(Json(celebration))
}

#[derive(Debug, Clone, Deserialize)]
struct AmountRequest {
    amount_minor: i64,
}

async fn upsert_contribution(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    Json(request): Json<AmountRequest>,
) -> Result<Json<ContributionTotal>, ApiError> {
    let total = state
        .circle
        .contributions()
        .add_or_update_contribution(&CelebrationId::new(id), &actor, request.amount_minor)
        .await?;
    Ok(Json(total))
}

async fn contribution_total(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ContributionTotal>, ApiError> {
    let total = state
        .circle
        .contributions()
        .contribution_total(&CelebrationId::new(id))
        .await?;
    Ok(Json(total))
}

async fn item_view(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> Result<Json<ItemView>, ApiError> {
    let view = state
        .circle
        .claims()
        .item_view(&ItemId::new(id), &actor)
        .await?;
    Ok(Json(view))
}

async fn claim_item(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> Result<(StatusCode, Json<ItemClaim>), ApiError> {
    let claim = state.circle.claims().claim(&ItemId::new(id), &actor).await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

async fn unclaim(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> Result<StatusCode, ApiError> {
    state
        .circle
        .claims()
        .unclaim(&ClaimId::new(id), &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryQuery {
    /// Comma-separated item ids.
    items: String,
}

async fn claim_summary(
    State(state): State<ServiceState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ClaimSummary>, ApiError> {
    let items: Vec<ItemId> = query
        .items
        .split(',')
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(ItemId::new)
        .collect();
    if items.is_empty() {
        return Err(ApiError::bad_request("items must list at least one item id"));
    }
    let summary = state.circle.claims().claim_summary(&items).await?;
    Ok(Json(summary))
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OpenSplitRequest {
    #[serde(default)]
    additional_costs_minor: Option<i64>,
}

async fn open_split(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    Json(request): Json<OpenSplitRequest>,
) -> Result<(StatusCode, Json<ItemClaim>), ApiError> {
    let claim = state
        .circle
        .splits()
        .open_split(&ItemId::new(id), &actor, request.additional_costs_minor)
        .await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitStatusResponse {
    #[serde(flatten)]
    pub status: SplitStatus,
    pub suggested_share_minor: i64,
}

async fn split_status(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(viewer): Actor,
) -> Result<Json<SplitStatusResponse>, ApiError> {
    let status = state
        .circle
        .splits()
        .split_status(&ItemId::new(id), &viewer)
        .await?;
    Ok(Json(SplitStatusResponse {
        suggested_share_minor: status.suggested_share_minor(),
        status,
    }))
}

async fn pledge(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    Json(request): Json<AmountRequest>,
) -> Result<Json<SplitStatus>, ApiError> {
    let status = state
        .circle
        .splits()
        .pledge(&ItemId::new(id), &actor, request.amount_minor)
        .await?;
    Ok(Json(status))
}

async fn close_split(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> Result<Json<SplitStatus>, ApiError> {
    let status = state
        .circle
        .splits()
        .close_split(&ItemId::new(id), &actor)
        .await?;
    Ok(Json(status))
}
