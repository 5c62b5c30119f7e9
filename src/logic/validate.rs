use crate::error::{NetworkError, Result};
use crate::model::{
    AddConnectionRequest, AddZtMembershipRequest, AppInstance, ConnectionInstanceLink, ConnectionKey,
    ConnectionLinkKey, Organization, UpdateConnectionRequest, UpdateZtMembershipRequest, ZtMembershipKey,
};

/// Required-field checks run before any store access.
pub struct RequestValidator;

impl RequestValidator {
    fn require(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(NetworkError::invalid_argument(format!("{} cannot be empty", field)));
        }
        Ok(())
    }

    pub fn validate_organization_id(organization_id: &str) -> Result<()> {
        Self::require("organization_id", organization_id)
    }

    pub fn validate_instance_id(organization_id: &str, app_instance_id: &str) -> Result<()> {
        Self::require("organization_id", organization_id)?;
        Self::require("app_instance_id", app_instance_id)
    }

    pub fn validate_connection_key(key: &ConnectionKey) -> Result<()> {
        Self::require("organization_id", &key.organization_id)?;
        Self::require("source_instance_id", &key.source_instance_id)?;
        Self::require("target_instance_id", &key.target_instance_id)?;
        Self::require("inbound_name", &key.inbound_name)?;
        Self::require("outbound_name", &key.outbound_name)
    }

    pub fn validate_add_connection(request: &AddConnectionRequest) -> Result<()> {
        Self::validate_connection_key(&request.key())
    }

    pub fn validate_update_connection(request: &UpdateConnectionRequest) -> Result<()> {
        Self::validate_connection_key(&request.key)?;
        if request.update_zt_network_id {
            if let Some(ref network_id) = request.zt_network_id {
                Self::require("zt_network_id", network_id)?;
            }
        }
        Ok(())
    }

    pub fn validate_zt_network_id(organization_id: &str, zt_network_id: &str) -> Result<()> {
        Self::require("organization_id", organization_id)?;
        Self::require("zt_network_id", zt_network_id)
    }

    pub fn validate_link_key(key: &ConnectionLinkKey) -> Result<()> {
        Self::validate_connection_key(&key.connection)?;
        Self::require("source_cluster_id", &key.source_cluster_id)?;
        Self::require("target_cluster_id", &key.target_cluster_id)
    }

    pub fn validate_link(link: &ConnectionInstanceLink) -> Result<()> {
        Self::validate_link_key(&link.key())
    }

    pub fn validate_zt_membership_key(key: &ZtMembershipKey) -> Result<()> {
        Self::validate_zt_network_id(&key.organization_id, &key.zt_network_id)?;
        Self::require("app_instance_id", &key.app_instance_id)?;
        Self::require("service_id", &key.service_id)?;
        Self::require("cluster_id", &key.cluster_id)
    }

    pub fn validate_add_zt_membership(request: &AddZtMembershipRequest) -> Result<()> {
        Self::validate_zt_membership_key(&request.key)
    }

    pub fn validate_update_zt_membership(request: &UpdateZtMembershipRequest) -> Result<()> {
        Self::validate_zt_membership_key(&request.key)
    }

    pub fn validate_organization(organization: &Organization) -> Result<()> {
        Self::require("organization_id", &organization.organization_id)?;
        Self::require("name", &organization.name)
    }

    pub fn validate_app_instance(instance: &AppInstance) -> Result<()> {
        Self::validate_instance_id(&instance.organization_id, &instance.app_instance_id)?;
        Self::require("name", &instance.name)?;
        for iface in &instance.inbound_net_interfaces {
            Self::require("inbound interface name", &iface.name)?;
        }
        for iface in &instance.outbound_net_interfaces {
            Self::require("outbound interface name", &iface.name)?;
        }
        Ok(())
    }
}
