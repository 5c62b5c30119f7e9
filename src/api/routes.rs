use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::api::network_handlers;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Directory registration
        .route("/organizations", post(handlers::add_organization::<S>))
        .route(
            "/organizations/:org_id/instances",
            post(handlers::add_app_instance::<S>),
        )
        // Connection instances
        .route(
            "/organizations/:org_id/connections",
            get(handlers::list_connections::<S>)
                .post(handlers::add_connection::<S>)
                .patch(handlers::update_connection::<S>),
        )
        .route(
            "/organizations/:org_id/connections/lookup",
            get(handlers::get_connection::<S>),
        )
        .route(
            "/organizations/:org_id/connections/remove",
            post(handlers::remove_connection::<S>),
        )
        .route(
            "/organizations/:org_id/connections/id/:connection_id",
            get(handlers::get_connection_by_id::<S>),
        )
        .route(
            "/organizations/:org_id/instances/:instance_id/connections/inbound",
            get(handlers::list_inbound_connections::<S>),
        )
        .route(
            "/organizations/:org_id/instances/:instance_id/connections/outbound",
            get(handlers::list_outbound_connections::<S>),
        )
        // Cluster-pair links
        .route(
            "/organizations/:org_id/links",
            get(network_handlers::list_links::<S>).post(network_handlers::add_link::<S>),
        )
        .route(
            "/organizations/:org_id/links/lookup",
            get(network_handlers::get_link::<S>),
        )
        .route(
            "/organizations/:org_id/links/exists",
            get(network_handlers::link_exists::<S>),
        )
        .route(
            "/organizations/:org_id/links/remove",
            post(network_handlers::remove_links::<S>),
        )
        .route(
            "/organizations/:org_id/links/prune",
            post(network_handlers::prune_orphan_links::<S>),
        )
        // Overlay networks
        .route(
            "/organizations/:org_id/zt-networks/:zt_network_id",
            delete(network_handlers::remove_zt_network::<S>),
        )
        .route(
            "/organizations/:org_id/zt-networks/:zt_network_id/connection",
            get(handlers::get_connection_by_zt_network::<S>),
        )
        .route(
            "/organizations/:org_id/zt-networks/:zt_network_id/members",
            get(network_handlers::list_zt_memberships::<S>)
                .post(network_handlers::add_zt_membership::<S>)
                .patch(network_handlers::update_zt_membership::<S>),
        )
        .route(
            "/organizations/:org_id/zt-networks/:zt_network_id/members/lookup",
            get(network_handlers::get_zt_membership::<S>),
        )
        .route(
            "/organizations/:org_id/zt-networks/:zt_network_id/members/exists",
            get(network_handlers::zt_membership_exists::<S>),
        )
        .route(
            "/organizations/:org_id/zt-networks/:zt_network_id/members/remove",
            post(network_handlers::remove_zt_membership::<S>),
        )
}
