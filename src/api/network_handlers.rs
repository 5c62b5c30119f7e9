use crate::api::handlers::{
    error_response, rejection_response, AppState, ErrorResponse, ExistsResponse, ListResponse,
    RemovedResponse, SuccessResponse,
};
use crate::model::{
    AddZtMembershipRequest, ConnectionInstanceLink, ConnectionKey, ConnectionLinkKey, Id,
    UpdateZtMembershipRequest, ZtMembershipKey, ZtNetworkConnection,
};
use crate::store::traits::Store;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};

// Cluster-pair links

/// POST /organizations/{org_id}/links
pub async fn add_link<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<RequestJson<ConnectionInstanceLink>, JsonRejection>,
) -> Result<Json<ConnectionInstanceLink>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut link) = payload.map_err(rejection_response)?;
    link.organization_id = org_id;
    manager.add_link(link).await.map(Json).map_err(error_response)
}

/// GET /organizations/{org_id}/links?source_instance_id=..  (all links of one connection)
pub async fn list_links<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<Query<ConnectionKey>, QueryRejection>,
) -> Result<Json<ListResponse<ConnectionInstanceLink>>, (StatusCode, Json<ErrorResponse>)> {
    let Query(mut key) = payload.map_err(rejection_response)?;
    key.organization_id = org_id;
    match manager.list_links(&key).await {
        Ok(links) => Ok(Json(links.into())),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn get_link<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<Query<ConnectionLinkKey>, QueryRejection>,
) -> Result<Json<ConnectionInstanceLink>, (StatusCode, Json<ErrorResponse>)> {
    let Query(mut key) = payload.map_err(rejection_response)?;
    key.connection.organization_id = org_id;
    manager.get_link(&key).await.map(Json).map_err(error_response)
}

pub async fn link_exists<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<Query<ConnectionLinkKey>, QueryRejection>,
) -> Result<Json<ExistsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Query(mut key) = payload.map_err(rejection_response)?;
    key.connection.organization_id = org_id;
    let exists = manager.link_exists(&key).await.map_err(error_response)?;
    Ok(Json(ExistsResponse { exists }))
}

/// POST /organizations/{org_id}/links/remove
/// Remove every cluster-pair link of one connection
pub async fn remove_links<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
    payload: Result<RequestJson<ConnectionKey>, JsonRejection>,
) -> Result<Json<RemovedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut key) = payload.map_err(rejection_response)?;
    key.organization_id = org_id;
    let removed = manager.remove_links(&key).await.map_err(error_response)?;
    Ok(Json(RemovedResponse { removed }))
}

/// POST /organizations/{org_id}/links/prune
pub async fn prune_orphan_links<S: Store>(
    State(manager): State<AppState<S>>,
    Path(org_id): Path<Id>,
) -> Result<Json<RemovedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let removed = manager
        .prune_orphan_links(&org_id)
        .await
        .map_err(error_response)?;
    Ok(Json(RemovedResponse { removed }))
}

// Overlay network membership

/// POST /organizations/{org_id}/zt-networks/{zt_network_id}/members
pub async fn add_zt_membership<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, zt_network_id)): Path<(Id, Id)>,
    payload: Result<RequestJson<AddZtMembershipRequest>, JsonRejection>,
) -> Result<Json<ZtNetworkConnection>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut request) = payload.map_err(rejection_response)?;
    request.key.organization_id = org_id;
    request.key.zt_network_id = zt_network_id;
    manager
        .add_zt_membership(request)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn list_zt_memberships<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, zt_network_id)): Path<(Id, Id)>,
) -> Result<Json<ListResponse<ZtNetworkConnection>>, (StatusCode, Json<ErrorResponse>)> {
    match manager.list_zt_memberships(&org_id, &zt_network_id).await {
        Ok(members) => Ok(Json(members.into())),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn get_zt_membership<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, zt_network_id)): Path<(Id, Id)>,
    payload: Result<Query<ZtMembershipKey>, QueryRejection>,
) -> Result<Json<ZtNetworkConnection>, (StatusCode, Json<ErrorResponse>)> {
    let Query(mut key) = payload.map_err(rejection_response)?;
    key.organization_id = org_id;
    key.zt_network_id = zt_network_id;
    manager
        .get_zt_membership(&key)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn zt_membership_exists<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, zt_network_id)): Path<(Id, Id)>,
    payload: Result<Query<ZtMembershipKey>, QueryRejection>,
) -> Result<Json<ExistsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Query(mut key) = payload.map_err(rejection_response)?;
    key.organization_id = org_id;
    key.zt_network_id = zt_network_id;
    let exists = manager
        .zt_membership_exists(&key)
        .await
        .map_err(error_response)?;
    Ok(Json(ExistsResponse { exists }))
}

/// PATCH /organizations/{org_id}/zt-networks/{zt_network_id}/members
pub async fn update_zt_membership<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, zt_network_id)): Path<(Id, Id)>,
    payload: Result<RequestJson<UpdateZtMembershipRequest>, JsonRejection>,
) -> Result<Json<ZtNetworkConnection>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut request) = payload.map_err(rejection_response)?;
    request.key.organization_id = org_id;
    request.key.zt_network_id = zt_network_id;
    manager
        .update_zt_membership(request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /organizations/{org_id}/zt-networks/{zt_network_id}/members/remove
pub async fn remove_zt_membership<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, zt_network_id)): Path<(Id, Id)>,
    payload: Result<RequestJson<ZtMembershipKey>, JsonRejection>,
) -> Result<Json<SuccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    let RequestJson(mut key) = payload.map_err(rejection_response)?;
    key.organization_id = org_id;
    key.zt_network_id = zt_network_id;
    manager
        .remove_zt_membership(&key)
        .await
        .map_err(error_response)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /organizations/{org_id}/zt-networks/{zt_network_id}
/// Tear down every membership of a decommissioned network
pub async fn remove_zt_network<S: Store>(
    State(manager): State<AppState<S>>,
    Path((org_id, zt_network_id)): Path<(Id, Id)>,
) -> Result<Json<RemovedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let removed = manager
        .remove_zt_network(&org_id, &zt_network_id)
        .await
        .map_err(error_response)?;
    Ok(Json(RemovedResponse { removed }))
}
