use crate::model::Id;
use serde::{Deserialize, Serialize};

/// Tenant boundary. Only its existence matters to the connectivity core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub organization_id: Id,
    pub name: String,
    pub created_at: String, // ISO 8601 timestamp
}

impl Organization {
    pub fn new(organization_id: Id, name: String) -> Self {
        Self {
            organization_id,
            name,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Input model for registering an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub organization_id: Id,
    pub name: String,
}

impl NewOrganization {
    pub fn into_organization(self) -> Organization {
        Organization::new(self.organization_id, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundNetworkInterface {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundNetworkInterface {
    pub name: String,
    /// A required outbound must stay connected for the instance to work.
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service_id: Id,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceGroupInstance {
    pub service_group_id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_instances: Vec<ServiceInstance>,
}

/// A deployed application instance as seen through the application directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInstance {
    #[serde(default)]
    pub organization_id: Id,
    pub app_instance_id: Id,
    pub name: String,
    #[serde(default)]
    pub inbound_net_interfaces: Vec<InboundNetworkInterface>,
    #[serde(default)]
    pub outbound_net_interfaces: Vec<OutboundNetworkInterface>,
    #[serde(default)]
    pub groups: Vec<ServiceGroupInstance>,
}

impl AppInstance {
    pub fn find_inbound(&self, name: &str) -> Option<&InboundNetworkInterface> {
        self.inbound_net_interfaces.iter().find(|iface| iface.name == name)
    }

    pub fn find_outbound(&self, name: &str) -> Option<&OutboundNetworkInterface> {
        self.outbound_net_interfaces.iter().find(|iface| iface.name == name)
    }

    /// Linear scan over every service group.
    pub fn has_service(&self, service_id: &str) -> bool {
        self.groups
            .iter()
            .flat_map(|group| group.service_instances.iter())
            .any(|service| service.service_id == service_id)
    }
}
