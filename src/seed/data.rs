use crate::error::Result;
use crate::model::{
    AppInstance, Id, InboundNetworkInterface, Organization, OutboundNetworkInterface,
    ServiceGroupInstance, ServiceInstance,
};
use crate::store::traits::Store;

pub const DEMO_ORGANIZATION_ID: &str = "demo-org";

/// Helper function to create a single-group app instance
fn create_demo_instance(
    app_instance_id: &str,
    name: &str,
    inbound: &[&str],
    outbound: &[(&str, bool)],
    services: &[&str],
) -> AppInstance {
    AppInstance {
        organization_id: DEMO_ORGANIZATION_ID.to_string(),
        app_instance_id: app_instance_id.to_string(),
        name: name.to_string(),
        inbound_net_interfaces: inbound
            .iter()
            .map(|iface| InboundNetworkInterface {
                name: iface.to_string(),
            })
            .collect(),
        outbound_net_interfaces: outbound
            .iter()
            .map(|(iface, required)| OutboundNetworkInterface {
                name: iface.to_string(),
                required: *required,
            })
            .collect(),
        groups: vec![ServiceGroupInstance {
            service_group_id: format!("{}-group", app_instance_id),
            name: format!("{} services", name),
            service_instances: services
                .iter()
                .map(|service| ServiceInstance {
                    service_id: format!("{}-{}", app_instance_id, service),
                    name: service.to_string(),
                })
                .collect(),
        }],
    }
}

/// Demo organization with a web shop whose frontend depends on an API and,
/// optionally, a metrics sink
pub fn demo_instances() -> Vec<AppInstance> {
    vec![
        create_demo_instance(
            "shop-frontend",
            "Shop Frontend",
            &["http"],
            &[("api", true), ("metrics", false)],
            &["nginx", "web"],
        ),
        create_demo_instance("shop-api", "Shop API", &["api"], &[("db", true)], &["api"]),
        create_demo_instance("shop-db", "Shop Database", &["db"], &[], &["postgres"]),
        create_demo_instance("metrics", "Metrics Sink", &["metrics"], &[], &["collector"]),
    ]
}

pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let organization_id: Id = DEMO_ORGANIZATION_ID.to_string();
    store
        .upsert_organization(Organization::new(organization_id, "Demo Organization".to_string()))
        .await?;

    for instance in demo_instances() {
        store.upsert_app_instance(instance).await?;
    }

    log::info!("Loaded seed data for organization {}", DEMO_ORGANIZATION_ID);
    Ok(())
}
