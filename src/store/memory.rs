use itertools::Itertools;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{NetworkError, Result};
use crate::model::{
    AppInstance, ConnectionInstance, ConnectionInstanceLink, ConnectionKey, ConnectionLinkKey, Id,
    Organization, UpdateConnectionRequest, UpdateZtMembershipRequest, ZtMembershipKey,
    ZtNetworkConnection,
};
use crate::store::traits::{
    ApplicationDirectory, ConnectionLinkStore, ConnectionStore, OrganizationDirectory, Store,
    ZtNetworkStore,
};

/// Connection rows plus the two secondary indexes kept in step with them
#[derive(Debug, Default)]
struct ConnectionTable {
    rows: HashMap<ConnectionKey, ConnectionInstance>,
    /// connection_id -> natural key
    by_connection_id: HashMap<Id, ConnectionKey>,
    /// zt_network_id -> natural keys backed by that network
    by_zt_network: HashMap<Id, Vec<ConnectionKey>>,
}

impl ConnectionTable {
    fn index(&mut self, connection: &ConnectionInstance) {
        let key = connection.key();
        self.by_connection_id
            .insert(connection.connection_id.clone(), key.clone());
        if let Some(ref network_id) = connection.zt_network_id {
            self.by_zt_network
                .entry(network_id.clone())
                .or_default()
                .push(key);
        }
    }

    fn unindex(&mut self, connection: &ConnectionInstance) {
        self.by_connection_id.remove(&connection.connection_id);
        if let Some(ref network_id) = connection.zt_network_id {
            let key = connection.key();
            if let Some(keys) = self.by_zt_network.get_mut(network_id) {
                keys.retain(|k| k != &key);
                if keys.is_empty() {
                    self.by_zt_network.remove(network_id);
                }
            }
        }
    }

    fn filtered<F>(&self, predicate: F) -> Vec<ConnectionInstance>
    where
        F: Fn(&ConnectionInstance) -> bool,
    {
        self.rows
            .iter()
            .filter(|(_, conn)| predicate(conn))
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, conn)| conn.clone())
            .collect()
    }
}

/// In-process store. Each table is guarded by a single lock held for the
/// whole of one operation, so check-then-act sequences are atomic within
/// this process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    organizations: Mutex<HashMap<Id, Organization>>,
    app_instances: Mutex<HashMap<(Id, Id), AppInstance>>,
    connections: Mutex<ConnectionTable>,
    links: Mutex<HashMap<ConnectionLinkKey, ConnectionInstanceLink>>,
    zt_memberships: Mutex<HashMap<ZtMembershipKey, ZtNetworkConnection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OrganizationDirectory for MemoryStore {
    async fn organization_exists(&self, organization_id: &Id) -> Result<bool> {
        Ok(self.organizations.lock().contains_key(organization_id))
    }

    async fn upsert_organization(&self, organization: Organization) -> Result<()> {
        self.organizations
            .lock()
            .insert(organization.organization_id.clone(), organization);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ApplicationDirectory for MemoryStore {
    async fn get_app_instance(
        &self,
        organization_id: &Id,
        app_instance_id: &Id,
    ) -> Result<Option<AppInstance>> {
        let key = (organization_id.clone(), app_instance_id.clone());
        Ok(self.app_instances.lock().get(&key).cloned())
    }

    async fn app_instance_exists(&self, organization_id: &Id, app_instance_id: &Id) -> Result<bool> {
        let key = (organization_id.clone(), app_instance_id.clone());
        Ok(self.app_instances.lock().contains_key(&key))
    }

    async fn upsert_app_instance(&self, instance: AppInstance) -> Result<()> {
        let key = (
            instance.organization_id.clone(),
            instance.app_instance_id.clone(),
        );
        self.app_instances.lock().insert(key, instance);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConnectionStore for MemoryStore {
    async fn add_connection(&self, connection: ConnectionInstance) -> Result<()> {
        let mut table = self.connections.lock();
        let key = connection.key();
        if table.rows.contains_key(&key) {
            return Err(NetworkError::already_exists(format!(
                "connection instance {}",
                key
            )));
        }
        table.index(&connection);
        table.rows.insert(key, connection);
        Ok(())
    }

    async fn connection_exists(&self, key: &ConnectionKey) -> Result<bool> {
        Ok(self.connections.lock().rows.contains_key(key))
    }

    async fn get_connection(&self, key: &ConnectionKey) -> Result<ConnectionInstance> {
        self.connections
            .lock()
            .rows
            .get(key)
            .cloned()
            .ok_or_else(|| NetworkError::not_found(format!("connection instance {}", key)))
    }

    async fn get_connection_by_id(&self, connection_id: &Id) -> Result<Option<ConnectionInstance>> {
        let table = self.connections.lock();
        Ok(table
            .by_connection_id
            .get(connection_id)
            .and_then(|key| table.rows.get(key))
            .cloned())
    }

    async fn get_connections_by_zt_network(&self, zt_network_id: &Id) -> Result<Vec<ConnectionInstance>> {
        let table = self.connections.lock();
        let Some(keys) = table.by_zt_network.get(zt_network_id) else {
            return Ok(Vec::new());
        };

        Ok(keys
            .iter()
            .sorted()
            .filter_map(|key| table.rows.get(key))
            .cloned()
            .collect())
    }

    async fn list_connections(&self, organization_id: &Id) -> Result<Vec<ConnectionInstance>> {
        Ok(self
            .connections
            .lock()
            .filtered(|conn| &conn.organization_id == organization_id))
    }

    async fn list_connections_by_source(
        &self,
        organization_id: &Id,
        source_instance_id: &Id,
    ) -> Result<Vec<ConnectionInstance>> {
        Ok(self.connections.lock().filtered(|conn| {
            &conn.organization_id == organization_id && &conn.source_instance_id == source_instance_id
        }))
    }

    async fn list_connections_by_target(
        &self,
        organization_id: &Id,
        target_instance_id: &Id,
    ) -> Result<Vec<ConnectionInstance>> {
        Ok(self.connections.lock().filtered(|conn| {
            &conn.organization_id == organization_id && &conn.target_instance_id == target_instance_id
        }))
    }

    async fn update_connection(&self, request: &UpdateConnectionRequest) -> Result<ConnectionInstance> {
        let mut table = self.connections.lock();
        let Some(mut connection) = table.rows.remove(&request.key) else {
            return Err(NetworkError::not_found(format!(
                "connection instance {}",
                request.key
            )));
        };
        table.unindex(&connection);
        request.apply_to(&mut connection);
        table.index(&connection);
        table.rows.insert(request.key.clone(), connection.clone());
        Ok(connection)
    }

    async fn remove_connection(&self, key: &ConnectionKey) -> Result<()> {
        let mut table = self.connections.lock();
        let Some(previous) = table.rows.remove(key) else {
            return Err(NetworkError::not_found(format!("connection instance {}", key)));
        };
        table.unindex(&previous);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConnectionLinkStore for MemoryStore {
    async fn add_link(&self, link: ConnectionInstanceLink) -> Result<()> {
        let mut links = self.links.lock();
        let key = link.key();
        if links.contains_key(&key) {
            return Err(NetworkError::already_exists(format!(
                "connection link {} [{} -> {}]",
                key.connection, key.source_cluster_id, key.target_cluster_id
            )));
        }
        links.insert(key, link);
        Ok(())
    }

    async fn link_exists(&self, key: &ConnectionLinkKey) -> Result<bool> {
        Ok(self.links.lock().contains_key(key))
    }

    async fn get_link(&self, key: &ConnectionLinkKey) -> Result<ConnectionInstanceLink> {
        self.links.lock().get(key).cloned().ok_or_else(|| {
            NetworkError::not_found(format!(
                "connection link {} [{} -> {}]",
                key.connection, key.source_cluster_id, key.target_cluster_id
            ))
        })
    }

    async fn list_links(&self, connection: &ConnectionKey) -> Result<Vec<ConnectionInstanceLink>> {
        Ok(self
            .links
            .lock()
            .iter()
            .filter(|(key, _)| &key.connection == connection)
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, link)| link.clone())
            .collect())
    }

    async fn list_links_for_organization(&self, organization_id: &Id) -> Result<Vec<ConnectionInstanceLink>> {
        Ok(self
            .links
            .lock()
            .iter()
            .filter(|(key, _)| &key.connection.organization_id == organization_id)
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, link)| link.clone())
            .collect())
    }

    async fn remove_links(&self, connection: &ConnectionKey) -> Result<usize> {
        let mut links = self.links.lock();
        let before = links.len();
        links.retain(|key, _| &key.connection != connection);
        Ok(before - links.len())
    }
}

#[async_trait::async_trait]
impl ZtNetworkStore for MemoryStore {
    async fn add_zt_membership(&self, membership: ZtNetworkConnection) -> Result<()> {
        let mut members = self.zt_memberships.lock();
        let key = membership.key();
        if members.contains_key(&key) {
            return Err(NetworkError::already_exists(format!("zt membership {}", key)));
        }
        members.insert(key, membership);
        Ok(())
    }

    async fn zt_membership_exists(&self, key: &ZtMembershipKey) -> Result<bool> {
        Ok(self.zt_memberships.lock().contains_key(key))
    }

    async fn get_zt_membership(&self, key: &ZtMembershipKey) -> Result<ZtNetworkConnection> {
        self.zt_memberships
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| NetworkError::not_found(format!("zt membership {}", key)))
    }

    async fn list_zt_memberships(&self, organization_id: &Id, zt_network_id: &Id) -> Result<Vec<ZtNetworkConnection>> {
        Ok(self
            .zt_memberships
            .lock()
            .iter()
            .filter(|(key, _)| {
                &key.organization_id == organization_id && &key.zt_network_id == zt_network_id
            })
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn update_zt_membership(&self, request: &UpdateZtMembershipRequest) -> Result<ZtNetworkConnection> {
        let mut members = self.zt_memberships.lock();
        let Some(stored) = members.get_mut(&request.key) else {
            return Err(NetworkError::not_found(format!("zt membership {}", request.key)));
        };
        request.apply_to(stored);
        Ok(stored.clone())
    }

    async fn remove_zt_membership(&self, key: &ZtMembershipKey) -> Result<()> {
        match self.zt_memberships.lock().remove(key) {
            Some(_) => Ok(()),
            None => Err(NetworkError::not_found(format!("zt membership {}", key))),
        }
    }

    async fn remove_zt_network(&self, organization_id: &Id, zt_network_id: &Id) -> Result<usize> {
        let mut members = self.zt_memberships.lock();
        let before = members.len();
        members.retain(|key, _| {
            !(&key.organization_id == organization_id && &key.zt_network_id == zt_network_id)
        });
        Ok(before - members.len())
    }
}

impl Store for MemoryStore {}
