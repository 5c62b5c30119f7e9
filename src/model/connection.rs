use crate::model::{generate_id, Id};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Waiting,
    Established,
    Terminated,
    Failed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Waiting => "waiting",
            ConnectionStatus::Established => "established",
            ConnectionStatus::Terminated => "terminated",
            ConnectionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(ConnectionStatus::Waiting),
            "established" => Some(ConnectionStatus::Established),
            "terminated" => Some(ConnectionStatus::Terminated),
            "failed" => Some(ConnectionStatus::Failed),
            _ => None,
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Waiting
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural key of a connection instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionKey {
    #[serde(default)]
    pub organization_id: Id,
    pub source_instance_id: Id,
    pub target_instance_id: Id,
    pub inbound_name: String,
    pub outbound_name: String,
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{} -> {}:{}",
            self.organization_id,
            self.source_instance_id,
            self.outbound_name,
            self.target_instance_id,
            self.inbound_name
        )
    }
}

/// Logical edge between a source instance's outbound interface and a target
/// instance's inbound interface.
///
/// `source_instance_name` and `target_instance_name` are snapshots taken at
/// creation; renames of the instances are not reflected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInstance {
    pub organization_id: Id,
    pub connection_id: Id,
    pub source_instance_id: Id,
    pub source_instance_name: String,
    pub target_instance_id: Id,
    pub target_instance_name: String,
    pub inbound_name: String,
    pub outbound_name: String,
    pub outbound_required: bool,
    pub status: ConnectionStatus,
    pub ip_range: Option<String>,
    pub zt_network_id: Option<Id>,
}

impl ConnectionInstance {
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            organization_id: self.organization_id.clone(),
            source_instance_id: self.source_instance_id.clone(),
            target_instance_id: self.target_instance_id.clone(),
            inbound_name: self.inbound_name.clone(),
            outbound_name: self.outbound_name.clone(),
        }
    }
}

/// Input model for creating a connection between two instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddConnectionRequest {
    #[serde(default)]
    pub organization_id: Id,
    pub source_instance_id: Id,
    pub target_instance_id: Id,
    pub inbound_name: String,
    pub outbound_name: String,
}

impl AddConnectionRequest {
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            organization_id: self.organization_id.clone(),
            source_instance_id: self.source_instance_id.clone(),
            target_instance_id: self.target_instance_id.clone(),
            inbound_name: self.inbound_name.clone(),
            outbound_name: self.outbound_name.clone(),
        }
    }

    /// Build the stored record once both endpoints have been resolved.
    pub fn into_connection(
        self,
        source_instance_name: String,
        target_instance_name: String,
        outbound_required: bool,
    ) -> ConnectionInstance {
        ConnectionInstance {
            organization_id: self.organization_id,
            connection_id: generate_id(),
            source_instance_id: self.source_instance_id,
            source_instance_name,
            target_instance_id: self.target_instance_id,
            target_instance_name,
            inbound_name: self.inbound_name,
            outbound_name: self.outbound_name,
            outbound_required,
            status: ConnectionStatus::Waiting,
            ip_range: None,
            zt_network_id: None,
        }
    }
}

/// Flag-gated partial update. A value is applied only when its flag is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateConnectionRequest {
    #[serde(flatten)]
    pub key: ConnectionKey,
    #[serde(default)]
    pub update_status: bool,
    #[serde(default)]
    pub status: ConnectionStatus,
    #[serde(default)]
    pub update_ip_range: bool,
    #[serde(default)]
    pub ip_range: Option<String>,
    #[serde(default)]
    pub update_zt_network_id: bool,
    #[serde(default)]
    pub zt_network_id: Option<Id>,
}

impl UpdateConnectionRequest {
    /// `outbound_required` and the key fields are never touched.
    pub fn apply_to(&self, connection: &mut ConnectionInstance) {
        if self.update_status {
            connection.status = self.status;
        }
        if self.update_ip_range {
            connection.ip_range = self.ip_range.clone();
        }
        if self.update_zt_network_id {
            connection.zt_network_id = self.zt_network_id.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveConnectionRequest {
    #[serde(flatten)]
    pub key: ConnectionKey,
    #[serde(default)]
    pub user_confirmation: bool,
}
