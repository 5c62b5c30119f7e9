use crate::model::{ConnectionKey, ConnectionStatus, Id};
use serde::{Deserialize, Serialize};

/// Key of one cluster-pair realization of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionLinkKey {
    #[serde(flatten)]
    pub connection: ConnectionKey,
    pub source_cluster_id: Id,
    pub target_cluster_id: Id,
}

/// Physical realization of a connection between two clusters.
///
/// Its status is tracked independently from the parent connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInstanceLink {
    #[serde(default)]
    pub organization_id: Id,
    pub source_instance_id: Id,
    pub target_instance_id: Id,
    pub source_cluster_id: Id,
    pub target_cluster_id: Id,
    pub inbound_name: String,
    pub outbound_name: String,
    #[serde(default)]
    pub status: ConnectionStatus,
}

impl ConnectionInstanceLink {
    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey {
            organization_id: self.organization_id.clone(),
            source_instance_id: self.source_instance_id.clone(),
            target_instance_id: self.target_instance_id.clone(),
            inbound_name: self.inbound_name.clone(),
            outbound_name: self.outbound_name.clone(),
        }
    }

    pub fn key(&self) -> ConnectionLinkKey {
        ConnectionLinkKey {
            connection: self.connection_key(),
            source_cluster_id: self.source_cluster_id.clone(),
            target_cluster_id: self.target_cluster_id.clone(),
        }
    }
}
