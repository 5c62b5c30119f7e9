use crate::error::Result;
use crate::model::{
    AppInstance, ConnectionInstance, ConnectionInstanceLink, ConnectionKey, ConnectionLinkKey, Id,
    Organization, UpdateConnectionRequest, UpdateZtMembershipRequest, ZtMembershipKey,
    ZtNetworkConnection,
};

/// Organization directory port. The connectivity core only asks whether an
/// organization exists.
#[async_trait::async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn organization_exists(&self, organization_id: &Id) -> Result<bool>;
    async fn upsert_organization(&self, organization: Organization) -> Result<()>;
}

/// Application directory port
#[async_trait::async_trait]
pub trait ApplicationDirectory: Send + Sync {
    /// Get an instance with its declared network interfaces and service groups
    async fn get_app_instance(
        &self,
        organization_id: &Id,
        app_instance_id: &Id,
    ) -> Result<Option<AppInstance>>;
    async fn app_instance_exists(&self, organization_id: &Id, app_instance_id: &Id) -> Result<bool>;
    async fn upsert_app_instance(&self, instance: AppInstance) -> Result<()>;
}

/// Connection registry keyed by the natural key of a connection instance
#[async_trait::async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Fails with `AlreadyExists` if the natural key is already present
    async fn add_connection(&self, connection: ConnectionInstance) -> Result<()>;
    async fn connection_exists(&self, key: &ConnectionKey) -> Result<bool>;
    /// Fails with `NotFound` if absent
    async fn get_connection(&self, key: &ConnectionKey) -> Result<ConnectionInstance>;
    /// Lookup through the surrogate connection id index
    async fn get_connection_by_id(&self, connection_id: &Id) -> Result<Option<ConnectionInstance>>;
    /// The overlay network index is not partitioned by organization
    async fn get_connections_by_zt_network(&self, zt_network_id: &Id) -> Result<Vec<ConnectionInstance>>;
    async fn list_connections(&self, organization_id: &Id) -> Result<Vec<ConnectionInstance>>;
    async fn list_connections_by_source(
        &self,
        organization_id: &Id,
        source_instance_id: &Id,
    ) -> Result<Vec<ConnectionInstance>>;
    async fn list_connections_by_target(
        &self,
        organization_id: &Id,
        target_instance_id: &Id,
    ) -> Result<Vec<ConnectionInstance>>;
    /// Writes only the flagged non-key fields in one atomic step and returns
    /// the stored record; fails with `NotFound` if absent
    async fn update_connection(&self, request: &UpdateConnectionRequest) -> Result<ConnectionInstance>;
    /// Fails with `NotFound` if absent
    async fn remove_connection(&self, key: &ConnectionKey) -> Result<()>;
}

/// Cluster-pair links fanned out under a connection's natural key
#[async_trait::async_trait]
pub trait ConnectionLinkStore: Send + Sync {
    async fn add_link(&self, link: ConnectionInstanceLink) -> Result<()>;
    async fn link_exists(&self, key: &ConnectionLinkKey) -> Result<bool>;
    async fn get_link(&self, key: &ConnectionLinkKey) -> Result<ConnectionInstanceLink>;
    async fn list_links(&self, connection: &ConnectionKey) -> Result<Vec<ConnectionInstanceLink>>;
    /// Every link of an organization, used by the orphan sweep
    async fn list_links_for_organization(&self, organization_id: &Id) -> Result<Vec<ConnectionInstanceLink>>;
    /// Removes every cluster-pair link of a connection, returning how many went
    async fn remove_links(&self, connection: &ConnectionKey) -> Result<usize>;
}

/// Overlay network membership rows
#[async_trait::async_trait]
pub trait ZtNetworkStore: Send + Sync {
    async fn add_zt_membership(&self, membership: ZtNetworkConnection) -> Result<()>;
    async fn zt_membership_exists(&self, key: &ZtMembershipKey) -> Result<bool>;
    async fn get_zt_membership(&self, key: &ZtMembershipKey) -> Result<ZtNetworkConnection>;
    async fn list_zt_memberships(&self, organization_id: &Id, zt_network_id: &Id) -> Result<Vec<ZtNetworkConnection>>;
    /// Writes the flagged `zt_member` / `zt_ip` fields in one atomic step
    async fn update_zt_membership(&self, request: &UpdateZtMembershipRequest) -> Result<ZtNetworkConnection>;
    async fn remove_zt_membership(&self, key: &ZtMembershipKey) -> Result<()>;
    async fn remove_zt_network(&self, organization_id: &Id, zt_network_id: &Id) -> Result<usize>;
}

pub trait Store:
    OrganizationDirectory
    + ApplicationDirectory
    + ConnectionStore
    + ConnectionLinkStore
    + ZtNetworkStore
    + Send
    + Sync
{
}
