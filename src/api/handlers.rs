use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::NetworkError;
use crate::logic::ConnectionManager;
use crate::model::{
    AddConnectionRequest, AppInstance, ConnectionInstance, ConnectionKey, Id, NewOrganization,
    Organization, RemoveConnectionRequest, UpdateConnectionRequest,
};
use crate::store::traits::Store;

pub type AppState<S> = Arc<ConnectionManager<S>>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

/// Map a manager error onto the HTTP status callers act on
pub fn error_response(err: NetworkError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        NetworkError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        NetworkError::NotFound(_) => StatusCode::NOT_FOUND,
        NetworkError::AlreadyExists(_) => StatusCode::CONFLICT,
        NetworkError::Policy(_) => StatusCode::PRECONDITION_FAILED,
        NetworkError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(ErrorResponse::new(&err.to_string())))
}

/// Malformed bodies and query strings are invalid arguments like any other
pub fn rejection_response<R: std::fmt::Display>(rejection: R) -> (StatusCode, Json<ErrorResponse>) {
    error_response(NetworkError::invalid_argument(rejection.to_string()))
}

// Directory registration

pub async fn add_organization<S: Store>(
    State(manager): State<AppState<S>>,
    payload: Result<RequestJson<NewOrganization>, JsonRejection>,
) -> Result<Json<Organization>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(request) = payload.map_err(rejection_response)?;
    manager
        .add_organization(request)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn add_app_instance<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<RequestJson<AppInstance>, JsonRejection>,
) -> Result<Json<AppInstance>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut instance) = payload.map_err(rejection_response)?;
    instance.organization_id = org_id;
    manager
        .add_app_instance(instance)
        .await
        .map(Json)
        .map_err(error_response)
}

// Connection instances

/// POST /organizations/{org_id}/connections
pub async fn add_connection<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<RequestJson<AddConnectionRequest>, JsonRejection>,
) -> Result<Json<ConnectionInstance>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut request) = payload.map_err(rejection_response)?;
    request.organization_id = org_id;
    manager
        .add_connection(request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// PATCH /organizations/{org_id}/connections
pub async fn update_connection<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<RequestJson<UpdateConnectionRequest>, JsonRejection>,
) -> Result<Json<ConnectionInstance>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut request) = payload.map_err(rejection_response)?;
    request.key.organization_id = org_id;
    manager
        .update_connection(request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /organizations/{org_id}/connections/remove
pub async fn remove_connection<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<RequestJson<RemoveConnectionRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut request) = payload.map_err(rejection_response)?;
    request.key.organization_id = org_id;
    manager
        .remove_connection(request)
        .await
        .map_err(error_response)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /organizations/{org_id}/connections/lookup?source_instance_id=..&target_instance_id=..
pub async fn get_connection<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<Query<ConnectionKey>, QueryRejection>,
) -> Result<Json<ConnectionInstance>, (StatusCode, Json<ErrorResponse>)> {
    let Query(mut key) = payload.map_err(rejection_response)?;
    key.organization_id = org_id;
    manager
        .get_connection(&key)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_connection_by_id<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, connection_id)): Path<(Id, Id)>,
) -> Result<Json<ConnectionInstance>, (StatusCode, Json<ErrorResponse>)> {
    manager
        .get_connection_by_id(&org_id, &connection_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /organizations/{org_id}/zt-networks/{zt_network_id}/connection
pub async fn get_connection_by_zt_network<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, zt_network_id)): Path<(Id, Id)>,
) -> Result<Json<ConnectionInstance>, (StatusCode, Json<ErrorResponse>)> {
    manager
        .get_connection_by_zt_network(&org_id, &zt_network_id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn list_connections<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
) -> Result<Json<ListResponse<ConnectionInstance>>, (StatusCode, Json<ErrorResponse>)> {
    match manager.list_connections(&org_id).await {
        Ok(connections) => Ok(Json(connections.into())),
        Err(e) => Err(error_response(e)),
    }
}

/// GET /organizations/{org_id}/instances/{instance_id}/connections/inbound
pub async fn list_inbound_connections<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, instance_id)): Path<(Id, Id)>,
) -> Result<Json<ListResponse<ConnectionInstance>>, (StatusCode, Json<ErrorResponse>)> {
    match manager.list_inbound_connections(&org_id, &instance_id).await {
        Ok(connections) => Ok(Json(connections.into())),
        Err(e) => Err(error_response(e)),
    }
}

/// GET /organizations/{org_id}/instances/{instance_id}/connections/outbound
pub async fn list_outbound_connections<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, instance_id)): Path<(Id, Id)>,
) -> Result<Json<ListResponse<ConnectionInstance>>, (StatusCode, Json<ErrorResponse>)> {
    match manager.list_outbound_connections(&org_id, &instance_id).await {
        Ok(connections) => Ok(Json(connections.into())),
        Err(e) => Err(error_response(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (NetworkError::invalid_argument("x"), StatusCode::BAD_REQUEST),
            (NetworkError::not_found("x"), StatusCode::NOT_FOUND),
            (NetworkError::already_exists("x"), StatusCode::CONFLICT),
            (NetworkError::policy("x"), StatusCode::PRECONDITION_FAILED),
            (NetworkError::unavailable("x"), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, expected) in cases {
            let message = err.to_string();
            let (status, Json(body)) = error_response(err);
            assert_eq!(status, expected);
            assert_eq!(body.error, message);
        }
    }

    #[test]
    fn test_list_response_counts_items() {
        let response: ListResponse<u8> = vec![1, 2, 3].into();
        assert_eq!(response.total, 3);
    }
}
