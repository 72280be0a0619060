use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    PropertyDraft, PropertyId, PropertyPatch, PropertyStatus, RequestContext, Role, UserId,
};
use super::query::{AccessLogQuery, PropertyQuery};
use super::repository::{AccessLogRepository, PropertyRepository, UserDirectory};
use super::service::{ListingService, ListingServiceError};

/// Header carrying the subject authenticated by the upstream identity gateway.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

type SharedService<S, L> = Arc<ListingService<S, L>>;

/// Router builder exposing the listing review operations over HTTP.
pub fn listing_router<S, L>(service: SharedService<S, L>) -> Router
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/properties",
            post(create_handler::<S, L>).get(list_handler::<S, L>),
        )
        .route(
            "/api/v1/properties/:property_id",
            get(detail_handler::<S, L>)
                .patch(update_handler::<S, L>)
                .delete(delete_handler::<S, L>),
        )
        .route(
            "/api/v1/properties/:property_id/status",
            post(transition_handler::<S, L>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<S, L>))
        .route(
            "/api/v1/admin/properties/pending",
            get(pending_handler::<S, L>),
        )
        .route("/api/v1/admin/users", get(users_handler::<S, L>))
        .route(
            "/api/v1/admin/users/:user_id/role",
            put(role_handler::<S, L>),
        )
        .route(
            "/api/v1/admin/users/:user_id",
            delete(delete_user_handler::<S, L>),
        )
        .route(
            "/api/v1/admin/access-logs",
            get(access_logs_handler::<S, L>),
        )
        .route("/api/v1/session/logout", post(logout_handler::<S, L>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: PropertyStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

impl IntoResponse for ListingServiceError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, payload) = match self {
            ListingServiceError::Authorization(err) => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": message,
                    "action": err.action,
                    "role": err.role,
                    "capability": err.capability,
                }),
            ),
            ListingServiceError::Validation(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message, "field": err.field }),
            ),
            ListingServiceError::InvalidTransition { from, to, role } => (
                StatusCode::CONFLICT,
                json!({ "error": message, "from": from, "to": to, "role": role }),
            ),
            ListingServiceError::NotFound { entity, .. } => (
                StatusCode::NOT_FOUND,
                json!({ "error": message, "entity": entity }),
            ),
            ListingServiceError::Conflict { entity, .. } => (
                StatusCode::CONFLICT,
                json!({ "error": message, "entity": entity }),
            ),
            ListingServiceError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": message }),
            ),
        };
        (status, Json(payload)).into_response()
    }
}

fn unauthenticated(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": reason })),
    )
        .into_response()
}

/// Resolves the caller from request headers.
pub(crate) fn request_context<S, L>(
    service: &ListingService<S, L>,
    headers: &HeaderMap,
) -> Result<RequestContext, Response>
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let subject = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| unauthenticated("missing x-user-id header"))?;

    let actor = match service.resolve_actor(&UserId(subject.to_string())) {
        Ok(actor) => actor,
        Err(ListingServiceError::NotFound { .. }) => {
            return Err(unauthenticated("unknown user"));
        }
        Err(other) => return Err(other.into_response()),
    };

    let origin = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let ctx = RequestContext::new(actor);
    Ok(match origin {
        Some(origin) => ctx.with_origin(origin),
        None => ctx,
    })
}

macro_rules! caller {
    ($service:expr, $headers:expr) => {
        match request_context(&*$service, &$headers) {
            Ok(ctx) => ctx,
            Err(response) => return response,
        }
    };
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, ListingServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Json(draft): Json<PropertyDraft>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(StatusCode::CREATED, service.create_property(&ctx, draft))
}

pub(crate) async fn list_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Query(query): Query<PropertyQuery>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(StatusCode::OK, service.list_properties(&ctx, &query))
}

pub(crate) async fn detail_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(
        StatusCode::OK,
        service.get_property(&ctx, &PropertyId(property_id)),
    )
}

pub(crate) async fn update_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(patch): Json<PropertyPatch>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(
        StatusCode::OK,
        service.update_property(&ctx, &PropertyId(property_id), patch),
    )
}

pub(crate) async fn delete_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    match service.delete_property(&ctx, &PropertyId(property_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn transition_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(
        StatusCode::OK,
        service.transition_property(
            &ctx,
            &PropertyId(property_id),
            request.status,
            request.reason.as_deref(),
        ),
    )
}

pub(crate) async fn dashboard_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(StatusCode::OK, service.dashboard(&ctx))
}

pub(crate) async fn pending_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(StatusCode::OK, service.pending_properties(&ctx))
}

pub(crate) async fn users_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(StatusCode::OK, service.list_users(&ctx))
}

pub(crate) async fn role_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(request): Json<RoleRequest>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    match service.set_user_role(&ctx, &UserId(user_id), request.role) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_user_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    match service.delete_user(&ctx, &UserId(user_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn access_logs_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
    Query(query): Query<AccessLogQuery>,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    respond(StatusCode::OK, service.list_access_logs(&ctx, &query))
}

pub(crate) async fn logout_handler<S, L>(
    State(service): State<SharedService<S, L>>,
    headers: HeaderMap,
) -> Response
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    let ctx = caller!(service, headers);
    service.end_session(&ctx.actor);
    StatusCode::NO_CONTENT.into_response()
}
