use crate::model::Id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a membership plays in the connection the overlay network backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionSide {
    Inbound,
    Outbound,
}

impl ConnectionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionSide::Inbound => "inbound",
            ConnectionSide::Outbound => "outbound",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inbound" => Some(ConnectionSide::Inbound),
            "outbound" => Some(ConnectionSide::Outbound),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZtMembershipKey {
    #[serde(default)]
    pub organization_id: Id,
    #[serde(default)]
    pub zt_network_id: Id,
    pub app_instance_id: Id,
    pub service_id: Id,
    pub cluster_id: Id,
}

impl fmt::Display for ZtMembershipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}@{}",
            self.organization_id,
            self.zt_network_id,
            self.app_instance_id,
            self.service_id,
            self.cluster_id
        )
    }
}

/// Overlay network membership of one service instance on one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZtNetworkConnection {
    pub organization_id: Id,
    pub zt_network_id: Id,
    pub app_instance_id: Id,
    pub service_id: Id,
    pub cluster_id: Id,
    pub zt_member: String,
    pub zt_ip: String,
    pub side: ConnectionSide,
}

impl ZtNetworkConnection {
    pub fn key(&self) -> ZtMembershipKey {
        ZtMembershipKey {
            organization_id: self.organization_id.clone(),
            zt_network_id: self.zt_network_id.clone(),
            app_instance_id: self.app_instance_id.clone(),
            service_id: self.service_id.clone(),
            cluster_id: self.cluster_id.clone(),
        }
    }
}

/// Input model for registering a membership; network and organization come
/// from the request path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddZtMembershipRequest {
    #[serde(flatten)]
    pub key: ZtMembershipKey,
    #[serde(default)]
    pub zt_member: String,
    #[serde(default)]
    pub zt_ip: String,
    pub side: ConnectionSide,
}

impl AddZtMembershipRequest {
    pub fn into_membership(self) -> ZtNetworkConnection {
        ZtNetworkConnection {
            organization_id: self.key.organization_id,
            zt_network_id: self.key.zt_network_id,
            app_instance_id: self.key.app_instance_id,
            service_id: self.key.service_id,
            cluster_id: self.key.cluster_id,
            zt_member: self.zt_member,
            zt_ip: self.zt_ip,
            side: self.side,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateZtMembershipRequest {
    #[serde(flatten)]
    pub key: ZtMembershipKey,
    #[serde(default)]
    pub update_zt_member: bool,
    #[serde(default)]
    pub zt_member: String,
    #[serde(default)]
    pub update_zt_ip: bool,
    #[serde(default)]
    pub zt_ip: String,
}

impl UpdateZtMembershipRequest {
    pub fn apply_to(&self, membership: &mut ZtNetworkConnection) {
        if self.update_zt_member {
            membership.zt_member = self.zt_member.clone();
        }
        if self.update_zt_ip {
            membership.zt_ip = self.zt_ip.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_zt_update_respects_flags() {
        let mut member = ZtNetworkConnection {
            organization_id: "org-1".to_string(),
            zt_network_id: "zt-1".to_string(),
            app_instance_id: "app-1".to_string(),
            service_id: "svc-1".to_string(),
            cluster_id: "c1".to_string(),
            zt_member: "".to_string(),
            zt_ip: "".to_string(),
            side: ConnectionSide::Outbound,
        };

        let update = UpdateZtMembershipRequest {
            key: member.key(),
            update_zt_ip: true,
            zt_ip: "172.28.0.5".to_string(),
            zt_member: "ignored".to_string(),
            ..Default::default()
        };
        update.apply_to(&mut member);

        assert_eq!(member.zt_ip, "172.28.0.5");
        assert_eq!(member.zt_member, "");
        assert_eq!(member.side, ConnectionSide::Outbound);
    }

    #[test]
    fn test_side_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionSide::Inbound).unwrap();
        assert_eq!(json, "\"inbound\"");
        assert_eq!(ConnectionSide::parse("outbound"), Some(ConnectionSide::Outbound));
    }
}
