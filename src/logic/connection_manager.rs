use log::{debug, info, warn};
use std::sync::Arc;

use crate::error::{NetworkError, Result};
use crate::logic::validate::RequestValidator;
use crate::model::{
    AddConnectionRequest, AddZtMembershipRequest, AppInstance, ConnectionInstance,
    ConnectionInstanceLink, ConnectionKey, ConnectionLinkKey, Id, NewOrganization, Organization,
    RemoveConnectionRequest, UpdateConnectionRequest, UpdateZtMembershipRequest, ZtMembershipKey,
    ZtNetworkConnection,
};
use crate::store::traits::Store;

/// Enforces the connectivity rules before anything reaches the stores.
///
/// Holds no state of its own: every validation step runs sequentially and
/// stops at the first failure, and store errors are passed through untouched.
pub struct ConnectionManager<S> {
    store: Arc<S>,
}

impl<S> Clone for ConnectionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> ConnectionManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn ensure_organization(&self, organization_id: &Id) -> Result<()> {
        if !self.store.organization_exists(organization_id).await? {
            warn!("Rejected request for unknown organization {}", organization_id);
            return Err(NetworkError::not_found(format!("organization {}", organization_id)));
        }
        Ok(())
    }

    async fn resolve_instance(&self, organization_id: &Id, app_instance_id: &Id) -> Result<AppInstance> {
        self.store
            .get_app_instance(organization_id, app_instance_id)
            .await?
            .ok_or_else(|| {
                NetworkError::not_found(format!(
                    "app instance {} in organization {}",
                    app_instance_id, organization_id
                ))
            })
    }

    async fn ensure_instance(&self, organization_id: &Id, app_instance_id: &Id) -> Result<()> {
        if !self
            .store
            .app_instance_exists(organization_id, app_instance_id)
            .await?
        {
            return Err(NetworkError::not_found(format!(
                "app instance {} in organization {}",
                app_instance_id, organization_id
            )));
        }
        Ok(())
    }

    // Directory registration

    pub async fn add_organization(&self, request: NewOrganization) -> Result<Organization> {
        let organization = request.into_organization();
        RequestValidator::validate_organization(&organization)?;
        self.store.upsert_organization(organization.clone()).await?;
        info!("Registered organization {}", organization.organization_id);
        Ok(organization)
    }

    pub async fn add_app_instance(&self, instance: AppInstance) -> Result<AppInstance> {
        RequestValidator::validate_app_instance(&instance)?;
        self.ensure_organization(&instance.organization_id).await?;
        self.store.upsert_app_instance(instance.clone()).await?;
        info!(
            "Registered app instance {} in organization {}",
            instance.app_instance_id, instance.organization_id
        );
        Ok(instance)
    }

    // Connection instances

    pub async fn add_connection(&self, request: AddConnectionRequest) -> Result<ConnectionInstance> {
        RequestValidator::validate_add_connection(&request)?;
        self.ensure_organization(&request.organization_id).await?;

        let source = self
            .resolve_instance(&request.organization_id, &request.source_instance_id)
            .await?;
        let outbound_required = source
            .find_outbound(&request.outbound_name)
            .map(|iface| iface.required)
            .ok_or_else(|| {
                NetworkError::not_found(format!(
                    "outbound interface '{}' in app instance {}",
                    request.outbound_name, request.source_instance_id
                ))
            })?;

        let target = self
            .resolve_instance(&request.organization_id, &request.target_instance_id)
            .await?;
        if target.find_inbound(&request.inbound_name).is_none() {
            return Err(NetworkError::not_found(format!(
                "inbound interface '{}' in app instance {}",
                request.inbound_name, request.target_instance_id
            )));
        }

        let connection = request.into_connection(source.name, target.name, outbound_required);
        self.store.add_connection(connection.clone()).await?;
        info!(
            "Added connection {} ({}), outbound required: {}",
            connection.key(),
            connection.connection_id,
            connection.outbound_required
        );
        Ok(connection)
    }

    /// Endpoint instances are not re-validated; a connection may outlive one
    /// of its endpoints while it is being torn down.
    pub async fn update_connection(&self, request: UpdateConnectionRequest) -> Result<ConnectionInstance> {
        RequestValidator::validate_update_connection(&request)?;
        self.ensure_organization(&request.key.organization_id).await?;

        let connection = self.store.update_connection(&request).await?;
        info!(
            "Updated connection {} (status: {}, zt network: {:?})",
            request.key, connection.status, connection.zt_network_id
        );
        Ok(connection)
    }

    /// Links under the connection are left in place; see `prune_orphan_links`.
    pub async fn remove_connection(&self, request: RemoveConnectionRequest) -> Result<()> {
        RequestValidator::validate_connection_key(&request.key)?;
        self.ensure_organization(&request.key.organization_id).await?;

        let connection = self.store.get_connection(&request.key).await?;
        if connection.outbound_required && !request.user_confirmation {
            warn!(
                "Refused to remove required outbound connection {} without confirmation",
                request.key
            );
            return Err(NetworkError::policy(format!(
                "outbound '{}' of app instance {} is required; removal needs user confirmation",
                connection.outbound_name, connection.source_instance_id
            )));
        }

        self.store.remove_connection(&request.key).await?;
        info!("Removed connection {}", request.key);
        Ok(())
    }

    pub async fn get_connection(&self, key: &ConnectionKey) -> Result<ConnectionInstance> {
        RequestValidator::validate_connection_key(key)?;
        debug!("Fetching connection {}", key);
        self.store.get_connection(key).await
    }

    pub async fn get_connection_by_id(&self, organization_id: &Id, connection_id: &Id) -> Result<ConnectionInstance> {
        RequestValidator::validate_organization_id(organization_id)?;
        self.store
            .get_connection_by_id(connection_id)
            .await?
            .filter(|conn| &conn.organization_id == organization_id)
            .ok_or_else(|| NetworkError::not_found(format!("connection {}", connection_id)))
    }

    /// The overlay network index spans organizations, so matches are narrowed
    /// to the caller's organization here.
    pub async fn get_connection_by_zt_network(
        &self,
        organization_id: &Id,
        zt_network_id: &Id,
    ) -> Result<ConnectionInstance> {
        RequestValidator::validate_zt_network_id(organization_id, zt_network_id)?;
        self.ensure_organization(organization_id).await?;

        let mut matches: Vec<ConnectionInstance> = self
            .store
            .get_connections_by_zt_network(zt_network_id)
            .await?
            .into_iter()
            .filter(|conn| &conn.organization_id == organization_id)
            .collect();

        if matches.len() > 1 {
            warn!(
                "zt network {} backs {} connections in organization {}, returning the first",
                zt_network_id,
                matches.len(),
                organization_id
            );
        }
        if matches.is_empty() {
            return Err(NetworkError::not_found(format!(
                "connection for zt network {}",
                zt_network_id
            )));
        }
        Ok(matches.swap_remove(0))
    }

    pub async fn list_connections(&self, organization_id: &Id) -> Result<Vec<ConnectionInstance>> {
        RequestValidator::validate_organization_id(organization_id)?;
        self.ensure_organization(organization_id).await?;
        self.store.list_connections(organization_id).await
    }

    /// Connections whose target is the given instance
    pub async fn list_inbound_connections(
        &self,
        organization_id: &Id,
        app_instance_id: &Id,
    ) -> Result<Vec<ConnectionInstance>> {
        RequestValidator::validate_instance_id(organization_id, app_instance_id)?;
        self.ensure_organization(organization_id).await?;
        self.ensure_instance(organization_id, app_instance_id).await?;
        self.store
            .list_connections_by_target(organization_id, app_instance_id)
            .await
    }

    /// Connections whose source is the given instance
    pub async fn list_outbound_connections(
        &self,
        organization_id: &Id,
        app_instance_id: &Id,
    ) -> Result<Vec<ConnectionInstance>> {
        RequestValidator::validate_instance_id(organization_id, app_instance_id)?;
        self.ensure_organization(organization_id).await?;
        self.ensure_instance(organization_id, app_instance_id).await?;
        self.store
            .list_connections_by_source(organization_id, app_instance_id)
            .await
    }

    // Cluster-pair links. Written by cluster agents; the parent connection is
    // assumed to exist and is not checked.

    pub async fn add_link(&self, link: ConnectionInstanceLink) -> Result<ConnectionInstanceLink> {
        RequestValidator::validate_link(&link)?;
        self.ensure_organization(&link.organization_id).await?;
        self.store.add_link(link.clone()).await?;
        info!(
            "Added link {} [{} -> {}]",
            link.connection_key(),
            link.source_cluster_id,
            link.target_cluster_id
        );
        Ok(link)
    }

    pub async fn get_link(&self, key: &ConnectionLinkKey) -> Result<ConnectionInstanceLink> {
        RequestValidator::validate_link_key(key)?;
        self.store.get_link(key).await
    }

    pub async fn link_exists(&self, key: &ConnectionLinkKey) -> Result<bool> {
        RequestValidator::validate_link_key(key)?;
        self.store.link_exists(key).await
    }

    pub async fn list_links(&self, connection: &ConnectionKey) -> Result<Vec<ConnectionInstanceLink>> {
        RequestValidator::validate_connection_key(connection)?;
        self.ensure_organization(&connection.organization_id).await?;
        self.store.list_links(connection).await
    }

    pub async fn remove_links(&self, connection: &ConnectionKey) -> Result<usize> {
        RequestValidator::validate_connection_key(connection)?;
        self.ensure_organization(&connection.organization_id).await?;
        let removed = self.store.remove_links(connection).await?;
        info!("Removed {} links of connection {}", removed, connection);
        Ok(removed)
    }

    /// Remove every link whose parent connection no longer exists. Safe to
    /// run repeatedly.
    pub async fn prune_orphan_links(&self, organization_id: &Id) -> Result<usize> {
        RequestValidator::validate_organization_id(organization_id)?;
        self.ensure_organization(organization_id).await?;

        let mut parents: Vec<ConnectionKey> = self
            .store
            .list_links_for_organization(organization_id)
            .await?
            .iter()
            .map(ConnectionInstanceLink::connection_key)
            .collect();
        parents.sort();
        parents.dedup();

        let mut removed = 0;
        for parent in parents {
            if !self.store.connection_exists(&parent).await? {
                removed += self.store.remove_links(&parent).await?;
            }
        }

        if removed > 0 {
            info!(
                "Pruned {} orphaned links in organization {}",
                removed, organization_id
            );
        }
        Ok(removed)
    }

    // Overlay network membership

    pub async fn add_zt_membership(&self, request: AddZtMembershipRequest) -> Result<ZtNetworkConnection> {
        RequestValidator::validate_add_zt_membership(&request)?;
        self.ensure_organization(&request.key.organization_id).await?;

        let instance = self
            .resolve_instance(&request.key.organization_id, &request.key.app_instance_id)
            .await?;
        if !instance.has_service(&request.key.service_id) {
            return Err(NetworkError::not_found(format!(
                "service {} in app instance {}",
                request.key.service_id, request.key.app_instance_id
            )));
        }

        let membership = request.into_membership();
        self.store.add_zt_membership(membership.clone()).await?;
        info!("Added zt membership {} ({})", membership.key(), membership.side);
        Ok(membership)
    }

    pub async fn get_zt_membership(&self, key: &ZtMembershipKey) -> Result<ZtNetworkConnection> {
        RequestValidator::validate_zt_membership_key(key)?;
        self.store.get_zt_membership(key).await
    }

    pub async fn zt_membership_exists(&self, key: &ZtMembershipKey) -> Result<bool> {
        RequestValidator::validate_zt_membership_key(key)?;
        self.store.zt_membership_exists(key).await
    }

    /// Both sides of the network are returned together; callers tell them
    /// apart by `side`.
    pub async fn list_zt_memberships(
        &self,
        organization_id: &Id,
        zt_network_id: &Id,
    ) -> Result<Vec<ZtNetworkConnection>> {
        RequestValidator::validate_zt_network_id(organization_id, zt_network_id)?;
        self.ensure_organization(organization_id).await?;
        self.store
            .list_zt_memberships(organization_id, zt_network_id)
            .await
    }

    pub async fn update_zt_membership(&self, request: UpdateZtMembershipRequest) -> Result<ZtNetworkConnection> {
        RequestValidator::validate_update_zt_membership(&request)?;
        self.ensure_organization(&request.key.organization_id).await?;

        let membership = self.store.update_zt_membership(&request).await?;
        info!("Updated zt membership {}", request.key);
        Ok(membership)
    }

    pub async fn remove_zt_membership(&self, key: &ZtMembershipKey) -> Result<()> {
        RequestValidator::validate_zt_membership_key(key)?;
        self.ensure_organization(&key.organization_id).await?;
        self.store.remove_zt_membership(key).await?;
        info!("Removed zt membership {}", key);
        Ok(())
    }

    pub async fn remove_zt_network(&self, organization_id: &Id, zt_network_id: &Id) -> Result<usize> {
        RequestValidator::validate_zt_network_id(organization_id, zt_network_id)?;
        self.ensure_organization(organization_id).await?;
        let removed = self
            .store
            .remove_zt_network(organization_id, zt_network_id)
            .await?;
        info!(
            "Removed {} members of zt network {} in organization {}",
            removed, zt_network_id, organization_id
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ConnectionSide, ConnectionStatus, InboundNetworkInterface, OutboundNetworkInterface,
        ServiceGroupInstance, ServiceInstance,
    };
    use crate::store::{
        ApplicationDirectory, ConnectionLinkStore, ConnectionStore, MemoryStore,
        OrganizationDirectory, ZtNetworkStore,
    };

    const ORG: &str = "org-1";

    fn org() -> Id {
        ORG.to_string()
    }

    fn app(id: &str, inbound: &[&str], outbound: &[(&str, bool)]) -> AppInstance {
        AppInstance {
            organization_id: org(),
            app_instance_id: id.to_string(),
            name: format!("{}-name", id),
            inbound_net_interfaces: inbound
                .iter()
                .map(|name| InboundNetworkInterface {
                    name: name.to_string(),
                })
                .collect(),
            outbound_net_interfaces: outbound
                .iter()
                .map(|(name, required)| OutboundNetworkInterface {
                    name: name.to_string(),
                    required: *required,
                })
                .collect(),
            groups: vec![ServiceGroupInstance {
                service_group_id: format!("{}-group", id),
                name: "group".to_string(),
                service_instances: vec![ServiceInstance {
                    service_id: format!("{}-svc", id),
                    name: "svc".to_string(),
                }],
            }],
        }
    }

    async fn manager() -> ConnectionManager<MemoryStore> {
        let manager = ConnectionManager::new(Arc::new(MemoryStore::new()));
        manager
            .add_organization(NewOrganization {
                organization_id: org(),
                name: "Acme".to_string(),
            })
            .await
            .unwrap();
        manager
            .add_app_instance(app("a", &["in1"], &[("out1", false), ("db", true)]))
            .await
            .unwrap();
        manager
            .add_app_instance(app("b", &["in1", "in2"], &[("out1", false)]))
            .await
            .unwrap();
        manager
            .add_app_instance(app("c", &["in1"], &[("out1", false)]))
            .await
            .unwrap();
        manager
    }

    fn request(source: &str, target: &str, inbound: &str, outbound: &str) -> AddConnectionRequest {
        AddConnectionRequest {
            organization_id: org(),
            source_instance_id: source.to_string(),
            target_instance_id: target.to_string(),
            inbound_name: inbound.to_string(),
            outbound_name: outbound.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_connection_end_to_end() {
        let manager = manager().await;

        let conn = manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap();
        assert_eq!(conn.status, ConnectionStatus::Waiting);
        assert!(!conn.outbound_required);
        assert_eq!(conn.source_instance_name, "a-name");
        assert_eq!(conn.target_instance_name, "b-name");

        manager
            .remove_connection(RemoveConnectionRequest {
                key: conn.key(),
                user_confirmation: false,
            })
            .await
            .unwrap();
        assert!(manager
            .get_connection(&conn.key())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_connection_fails() {
        let manager = manager().await;
        manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap();

        let err = manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_add_connection_validates_endpoints() {
        let manager = manager().await;

        let mut unknown_org = request("a", "b", "in1", "out1");
        unknown_org.organization_id = "org-x".to_string();
        assert!(manager.add_connection(unknown_org).await.unwrap_err().is_not_found());

        for bad in [
            request("zz", "b", "in1", "out1"),
            request("a", "zz", "in1", "out1"),
            request("a", "b", "in1", "missing"),
            request("a", "b", "missing", "out1"),
            // inbound names are looked up on the target, outbound on the source
            request("b", "a", "in2", "out1"),
        ] {
            let err = manager.add_connection(bad).await.unwrap_err();
            assert!(err.is_not_found(), "unexpected error {:?}", err);
        }

        let err = manager
            .add_connection(request("a", "", "in1", "out1"))
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::InvalidArgument(_)));

        let org_id = org();
        assert!(manager.list_connections(&org_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_required_outbound_needs_confirmation() {
        let manager = manager().await;
        let conn = manager
            .add_connection(request("a", "b", "in1", "db"))
            .await
            .unwrap();
        assert!(conn.outbound_required);

        let err = manager
            .remove_connection(RemoveConnectionRequest {
                key: conn.key(),
                user_confirmation: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::Policy(_)));
        assert!(manager.get_connection(&conn.key()).await.is_ok());

        manager
            .remove_connection(RemoveConnectionRequest {
                key: conn.key(),
                user_confirmation: true,
            })
            .await
            .unwrap();
        assert!(manager.get_connection(&conn.key()).await.is_err());
    }

    #[tokio::test]
    async fn test_update_never_changes_outbound_required() {
        let manager = manager().await;
        let conn = manager
            .add_connection(request("a", "b", "in1", "db"))
            .await
            .unwrap();

        let updated = manager
            .update_connection(UpdateConnectionRequest {
                key: conn.key(),
                update_status: true,
                status: ConnectionStatus::Terminated,
                update_ip_range: true,
                ip_range: Some("10.0.0.0/16".to_string()),
                update_zt_network_id: true,
                zt_network_id: Some("zt-1".to_string()),
            })
            .await
            .unwrap();

        assert!(updated.outbound_required);
        assert_eq!(updated.connection_id, conn.connection_id);
        assert_eq!(updated.status, ConnectionStatus::Terminated);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_unflagged_fields() {
        let manager = manager().await;
        let conn = manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap();

        manager
            .update_connection(UpdateConnectionRequest {
                key: conn.key(),
                update_status: true,
                status: ConnectionStatus::Established,
                update_zt_network_id: true,
                zt_network_id: Some("zt-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = manager
            .update_connection(UpdateConnectionRequest {
                key: conn.key(),
                update_ip_range: true,
                ip_range: Some("192.168.0.0/24".to_string()),
                status: ConnectionStatus::Failed,
                zt_network_id: Some("zt-other".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.status, ConnectionStatus::Established);
        assert_eq!(updated.zt_network_id.as_deref(), Some("zt-1"));
        assert_eq!(updated.ip_range.as_deref(), Some("192.168.0.0/24"));
        assert_eq!(manager.get_connection(&conn.key()).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_does_not_revalidate_endpoints() {
        let store = Arc::new(MemoryStore::new());
        let manager = ConnectionManager::new(store.clone());
        manager
            .add_organization(NewOrganization {
                organization_id: org(),
                name: "Acme".to_string(),
            })
            .await
            .unwrap();
        manager
            .add_app_instance(app("a", &[], &[("out1", false)]))
            .await
            .unwrap();
        manager
            .add_app_instance(app("b", &["in1"], &[]))
            .await
            .unwrap();
        let conn = manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap();

        // Target loses its interface; the connection can still be updated
        manager
            .add_app_instance(app("b", &[], &[]))
            .await
            .unwrap();
        let updated = manager
            .update_connection(UpdateConnectionRequest {
                key: conn.key(),
                update_status: true,
                status: ConnectionStatus::Terminated,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.status, ConnectionStatus::Terminated);
        // Snapshot names are not refreshed
        assert_eq!(updated.target_instance_name, "b-name");
    }

    #[tokio::test]
    async fn test_update_missing_connection_is_not_found() {
        let manager = manager().await;
        let err = manager
            .update_connection(UpdateConnectionRequest {
                key: request("a", "b", "in1", "out1").key(),
                update_status: true,
                status: ConnectionStatus::Established,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_inbound_and_outbound_listing() {
        let manager = manager().await;
        manager.add_connection(request("a", "b", "in1", "out1")).await.unwrap();
        manager.add_connection(request("c", "b", "in1", "out1")).await.unwrap();
        manager.add_connection(request("a", "b", "in2", "db")).await.unwrap();
        manager.add_connection(request("b", "c", "in1", "out1")).await.unwrap();

        let org_id = org();
        let b = "b".to_string();
        let inbound = manager.list_inbound_connections(&org_id, &b).await.unwrap();
        assert_eq!(inbound.len(), 3);
        assert!(inbound.iter().all(|c| c.target_instance_id == "b"));

        let outbound = manager.list_outbound_connections(&org_id, &b).await.unwrap();
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].target_instance_id, "c");

        let err = manager
            .list_inbound_connections(&org_id, &"zz".to_string())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        let err = manager
            .list_outbound_connections(&"org-x".to_string(), &b)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lookup_by_zt_network_round_trip() {
        let manager = manager().await;
        let conn = manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap();

        let updated = manager
            .update_connection(UpdateConnectionRequest {
                key: conn.key(),
                update_zt_network_id: true,
                zt_network_id: Some("zt-42".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let org_id = org();
        let found = manager
            .get_connection_by_zt_network(&org_id, &"zt-42".to_string())
            .await
            .unwrap();
        assert_eq!(found, updated);

        let by_id = manager
            .get_connection_by_id(&org_id, &conn.connection_id)
            .await
            .unwrap();
        assert_eq!(by_id, updated);

        assert!(manager
            .get_connection_by_zt_network(&org_id, &"zt-none".to_string())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_zt_network_lookup_is_scoped_to_organization() {
        let manager = manager().await;
        manager
            .add_organization(NewOrganization {
                organization_id: "org-2".to_string(),
                name: "Other".to_string(),
            })
            .await
            .unwrap();
        let conn = manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap();
        manager
            .update_connection(UpdateConnectionRequest {
                key: conn.key(),
                update_zt_network_id: true,
                zt_network_id: Some("zt-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = manager
            .get_connection_by_zt_network(&"org-2".to_string(), &"zt-1".to_string())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_links_are_not_cascaded_and_can_be_pruned() {
        let manager = manager().await;
        let kept = manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap();
        let dropped = manager
            .add_connection(request("c", "b", "in1", "out1"))
            .await
            .unwrap();

        for (conn, clusters) in [(&kept, ["c1", "c2"]), (&dropped, ["c1", "c3"])] {
            for target_cluster in clusters {
                manager
                    .add_link(ConnectionInstanceLink {
                        organization_id: org(),
                        source_instance_id: conn.source_instance_id.clone(),
                        target_instance_id: conn.target_instance_id.clone(),
                        source_cluster_id: "c0".to_string(),
                        target_cluster_id: target_cluster.to_string(),
                        inbound_name: conn.inbound_name.clone(),
                        outbound_name: conn.outbound_name.clone(),
                        status: ConnectionStatus::Waiting,
                    })
                    .await
                    .unwrap();
            }
        }

        manager
            .remove_connection(RemoveConnectionRequest {
                key: dropped.key(),
                user_confirmation: false,
            })
            .await
            .unwrap();
        assert_eq!(manager.list_links(&dropped.key()).await.unwrap().len(), 2);

        let org_id = org();
        assert_eq!(manager.prune_orphan_links(&org_id).await.unwrap(), 2);
        assert_eq!(manager.prune_orphan_links(&org_id).await.unwrap(), 0);
        assert!(manager.list_links(&dropped.key()).await.unwrap().is_empty());
        assert_eq!(manager.list_links(&kept.key()).await.unwrap().len(), 2);

        assert_eq!(manager.remove_links(&kept.key()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zt_membership_requires_known_service() {
        let manager = manager().await;
        let key = ZtMembershipKey {
            organization_id: org(),
            zt_network_id: "zt-1".to_string(),
            app_instance_id: "a".to_string(),
            service_id: "a-svc".to_string(),
            cluster_id: "c1".to_string(),
        };

        let added = manager
            .add_zt_membership(AddZtMembershipRequest {
                key: key.clone(),
                zt_member: String::new(),
                zt_ip: String::new(),
                side: ConnectionSide::Outbound,
            })
            .await
            .unwrap();
        assert_eq!(added.side, ConnectionSide::Outbound);
        assert!(manager.zt_membership_exists(&key).await.unwrap());

        let mut unknown = key.clone();
        unknown.service_id = "b-svc".to_string();
        let err = manager
            .add_zt_membership(AddZtMembershipRequest {
                key: unknown,
                zt_member: String::new(),
                zt_ip: String::new(),
                side: ConnectionSide::Inbound,
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let updated = manager
            .update_zt_membership(UpdateZtMembershipRequest {
                key: key.clone(),
                update_zt_member: true,
                zt_member: "8056c2e21c".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.zt_member, "8056c2e21c");
        assert_eq!(updated.zt_ip, "");

        let org_id = org();
        let network = "zt-1".to_string();
        assert_eq!(manager.list_zt_memberships(&org_id, &network).await.unwrap().len(), 1);
        assert_eq!(manager.remove_zt_network(&org_id, &network).await.unwrap(), 1);
        assert!(manager.get_zt_membership(&key).await.unwrap_err().is_not_found());
        assert!(manager.remove_zt_membership(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_create_exactly_one_connection() {
        let manager = manager().await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager.add_connection(request("a", "b", "in1", "out1")).await
                })
            })
            .collect();

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(NetworkError::AlreadyExists(_)) => duplicates += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(manager.list_connections(&org()).await.unwrap().len(), 1);
    }

    /// Memory store that yields to the scheduler around every connection and
    /// membership read or write, so concurrent calls interleave the way they
    /// do against a remote database.
    #[derive(Default)]
    struct YieldingStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl OrganizationDirectory for YieldingStore {
        async fn organization_exists(&self, organization_id: &Id) -> Result<bool> {
            self.inner.organization_exists(organization_id).await
        }

        async fn upsert_organization(&self, organization: Organization) -> Result<()> {
            self.inner.upsert_organization(organization).await
        }
    }

    #[async_trait::async_trait]
    impl ApplicationDirectory for YieldingStore {
        async fn get_app_instance(&self, organization_id: &Id, app_instance_id: &Id) -> Result<Option<AppInstance>> {
            self.inner.get_app_instance(organization_id, app_instance_id).await
        }

        async fn app_instance_exists(&self, organization_id: &Id, app_instance_id: &Id) -> Result<bool> {
            self.inner.app_instance_exists(organization_id, app_instance_id).await
        }

        async fn upsert_app_instance(&self, instance: AppInstance) -> Result<()> {
            self.inner.upsert_app_instance(instance).await
        }
    }

    #[async_trait::async_trait]
    impl ConnectionStore for YieldingStore {
        async fn add_connection(&self, connection: ConnectionInstance) -> Result<()> {
            self.inner.add_connection(connection).await
        }

        async fn connection_exists(&self, key: &ConnectionKey) -> Result<bool> {
            self.inner.connection_exists(key).await
        }

        async fn get_connection(&self, key: &ConnectionKey) -> Result<ConnectionInstance> {
            let connection = self.inner.get_connection(key).await;
            tokio::task::yield_now().await;
            connection
        }

        async fn get_connection_by_id(&self, connection_id: &Id) -> Result<Option<ConnectionInstance>> {
            self.inner.get_connection_by_id(connection_id).await
        }

        async fn get_connections_by_zt_network(&self, zt_network_id: &Id) -> Result<Vec<ConnectionInstance>> {
            self.inner.get_connections_by_zt_network(zt_network_id).await
        }

        async fn list_connections(&self, organization_id: &Id) -> Result<Vec<ConnectionInstance>> {
            self.inner.list_connections(organization_id).await
        }

        async fn list_connections_by_source(&self, organization_id: &Id, source_instance_id: &Id) -> Result<Vec<ConnectionInstance>> {
            self.inner.list_connections_by_source(organization_id, source_instance_id).await
        }

        async fn list_connections_by_target(&self, organization_id: &Id, target_instance_id: &Id) -> Result<Vec<ConnectionInstance>> {
            self.inner.list_connections_by_target(organization_id, target_instance_id).await
        }

        async fn update_connection(&self, request: &UpdateConnectionRequest) -> Result<ConnectionInstance> {
            tokio::task::yield_now().await;
            self.inner.update_connection(request).await
        }

        async fn remove_connection(&self, key: &ConnectionKey) -> Result<()> {
            self.inner.remove_connection(key).await
        }
    }

    #[async_trait::async_trait]
    impl ConnectionLinkStore for YieldingStore {
        async fn add_link(&self, link: ConnectionInstanceLink) -> Result<()> {
            self.inner.add_link(link).await
        }

        async fn link_exists(&self, key: &ConnectionLinkKey) -> Result<bool> {
            self.inner.link_exists(key).await
        }

        async fn get_link(&self, key: &ConnectionLinkKey) -> Result<ConnectionInstanceLink> {
            self.inner.get_link(key).await
        }

        async fn list_links(&self, connection: &ConnectionKey) -> Result<Vec<ConnectionInstanceLink>> {
            self.inner.list_links(connection).await
        }

        async fn list_links_for_organization(&self, organization_id: &Id) -> Result<Vec<ConnectionInstanceLink>> {
            self.inner.list_links_for_organization(organization_id).await
        }

        async fn remove_links(&self, connection: &ConnectionKey) -> Result<usize> {
            self.inner.remove_links(connection).await
        }
    }

    #[async_trait::async_trait]
    impl ZtNetworkStore for YieldingStore {
        async fn add_zt_membership(&self, membership: ZtNetworkConnection) -> Result<()> {
            self.inner.add_zt_membership(membership).await
        }

        async fn zt_membership_exists(&self, key: &ZtMembershipKey) -> Result<bool> {
            self.inner.zt_membership_exists(key).await
        }

        async fn get_zt_membership(&self, key: &ZtMembershipKey) -> Result<ZtNetworkConnection> {
            let membership = self.inner.get_zt_membership(key).await;
            tokio::task::yield_now().await;
            membership
        }

        async fn list_zt_memberships(&self, organization_id: &Id, zt_network_id: &Id) -> Result<Vec<ZtNetworkConnection>> {
            self.inner.list_zt_memberships(organization_id, zt_network_id).await
        }

        async fn update_zt_membership(&self, request: &UpdateZtMembershipRequest) -> Result<ZtNetworkConnection> {
            tokio::task::yield_now().await;
            self.inner.update_zt_membership(request).await
        }

        async fn remove_zt_membership(&self, key: &ZtMembershipKey) -> Result<()> {
            self.inner.remove_zt_membership(key).await
        }

        async fn remove_zt_network(&self, organization_id: &Id, zt_network_id: &Id) -> Result<usize> {
            self.inner.remove_zt_network(organization_id, zt_network_id).await
        }
    }

    impl Store for YieldingStore {}

    async fn yielding_manager() -> ConnectionManager<YieldingStore> {
        let manager = ConnectionManager::new(Arc::new(YieldingStore::default()));
        manager
            .add_organization(NewOrganization {
                organization_id: org(),
                name: "Acme".to_string(),
            })
            .await
            .unwrap();
        manager
            .add_app_instance(app("a", &["in1"], &[("out1", false)]))
            .await
            .unwrap();
        manager
            .add_app_instance(app("b", &["in1"], &[]))
            .await
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn test_interleaved_partial_updates_both_apply() {
        let manager = yielding_manager().await;
        let conn = manager
            .add_connection(request("a", "b", "in1", "out1"))
            .await
            .unwrap();

        let status_update = manager.update_connection(UpdateConnectionRequest {
            key: conn.key(),
            update_status: true,
            status: ConnectionStatus::Established,
            ..Default::default()
        });
        let ip_update = manager.update_connection(UpdateConnectionRequest {
            key: conn.key(),
            update_ip_range: true,
            ip_range: Some("10.0.0.0/24".to_string()),
            ..Default::default()
        });
        let (status_result, ip_result) = tokio::join!(status_update, ip_update);
        status_result.unwrap();
        ip_result.unwrap();

        let stored = manager.get_connection(&conn.key()).await.unwrap();
        assert_eq!(stored.status, ConnectionStatus::Established);
        assert_eq!(stored.ip_range.as_deref(), Some("10.0.0.0/24"));
    }

    #[tokio::test]
    async fn test_interleaved_zt_membership_updates_both_apply() {
        let manager = yielding_manager().await;
        let key = ZtMembershipKey {
            organization_id: org(),
            zt_network_id: "zt-1".to_string(),
            app_instance_id: "a".to_string(),
            service_id: "a-svc".to_string(),
            cluster_id: "c1".to_string(),
        };
        manager
            .add_zt_membership(AddZtMembershipRequest {
                key: key.clone(),
                zt_member: String::new(),
                zt_ip: String::new(),
                side: ConnectionSide::Outbound,
            })
            .await
            .unwrap();

        let member_update = manager.update_zt_membership(UpdateZtMembershipRequest {
            key: key.clone(),
            update_zt_member: true,
            zt_member: "8056c2e21c".to_string(),
            ..Default::default()
        });
        let ip_update = manager.update_zt_membership(UpdateZtMembershipRequest {
            key: key.clone(),
            update_zt_ip: true,
            zt_ip: "10.147.20.7".to_string(),
            ..Default::default()
        });
        let (member_result, ip_result) = tokio::join!(member_update, ip_update);
        member_result.unwrap();
        ip_result.unwrap();

        let stored = manager.get_zt_membership(&key).await.unwrap();
        assert_eq!(stored.zt_member, "8056c2e21c");
        assert_eq!(stored.zt_ip, "10.147.20.7");
    }
}
