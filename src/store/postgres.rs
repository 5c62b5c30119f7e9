use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

use crate::error::{NetworkError, Result, StorageContext};
use crate::model::{
    AppInstance, ConnectionInstance, ConnectionInstanceLink, ConnectionKey, ConnectionLinkKey,
    ConnectionSide, ConnectionStatus, Id, Organization, UpdateConnectionRequest,
    UpdateZtMembershipRequest, ZtMembershipKey, ZtNetworkConnection,
};
use crate::store::traits::{
    ApplicationDirectory, ConnectionLinkStore, ConnectionStore, OrganizationDirectory, Store,
    ZtNetworkStore,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        organization_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_instances (
        organization_id TEXT NOT NULL,
        app_instance_id TEXT NOT NULL,
        data JSONB NOT NULL,
        PRIMARY KEY (organization_id, app_instance_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS connection_instances (
        organization_id TEXT NOT NULL,
        source_instance_id TEXT NOT NULL,
        target_instance_id TEXT NOT NULL,
        inbound_name TEXT NOT NULL,
        outbound_name TEXT NOT NULL,
        connection_id TEXT NOT NULL,
        source_instance_name TEXT NOT NULL,
        target_instance_name TEXT NOT NULL,
        outbound_required BOOLEAN NOT NULL,
        status TEXT NOT NULL,
        ip_range TEXT,
        zt_network_id TEXT,
        PRIMARY KEY (organization_id, source_instance_id, target_instance_id, inbound_name, outbound_name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS connection_instances_connection_id ON connection_instances (connection_id)",
    "CREATE INDEX IF NOT EXISTS connection_instances_zt_network_id ON connection_instances (zt_network_id)",
    r#"
    CREATE TABLE IF NOT EXISTS connection_instance_links (
        organization_id TEXT NOT NULL,
        source_instance_id TEXT NOT NULL,
        target_instance_id TEXT NOT NULL,
        inbound_name TEXT NOT NULL,
        outbound_name TEXT NOT NULL,
        source_cluster_id TEXT NOT NULL,
        target_cluster_id TEXT NOT NULL,
        status TEXT NOT NULL,
        PRIMARY KEY (organization_id, source_instance_id, target_instance_id, inbound_name, outbound_name,
                     source_cluster_id, target_cluster_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS zt_network_connections (
        organization_id TEXT NOT NULL,
        zt_network_id TEXT NOT NULL,
        app_instance_id TEXT NOT NULL,
        service_id TEXT NOT NULL,
        cluster_id TEXT NOT NULL,
        zt_member TEXT NOT NULL,
        zt_ip TEXT NOT NULL,
        side TEXT NOT NULL,
        PRIMARY KEY (organization_id, zt_network_id, app_instance_id, service_id, cluster_id)
    )
    "#,
];

const CONNECTION_COLUMNS: &str = "organization_id, source_instance_id, target_instance_id, inbound_name, outbound_name, \
     connection_id, source_instance_name, target_instance_name, outbound_required, status, ip_range, zt_network_id";

const LINK_COLUMNS: &str = "organization_id, source_instance_id, target_instance_id, inbound_name, outbound_name, \
     source_cluster_id, target_cluster_id, status";

const ZT_COLUMNS: &str =
    "organization_id, zt_network_id, app_instance_id, service_id, cluster_id, zt_member, zt_ip, side";

const CONNECTION_ORDER: &str =
    "ORDER BY organization_id, source_instance_id, target_instance_id, inbound_name, outbound_name";

const LINK_ORDER: &str = "ORDER BY organization_id, source_instance_id, target_instance_id, inbound_name, \
     outbound_name, source_cluster_id, target_cluster_id";

const ZT_ORDER: &str = "ORDER BY organization_id, zt_network_id, app_instance_id, service_id, cluster_id";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .storage_context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the tables if they are missing
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .storage_context("Failed to run schema migration")?;
        }
        Ok(())
    }
}

fn parse_status(value: &str) -> Result<ConnectionStatus> {
    ConnectionStatus::parse(value)
        .ok_or_else(|| NetworkError::unavailable(format!("Unknown connection status '{}'", value)))
}

fn parse_side(value: &str) -> Result<ConnectionSide> {
    ConnectionSide::parse(value)
        .ok_or_else(|| NetworkError::unavailable(format!("Unknown membership side '{}'", value)))
}

fn connection_from_row(row: &PgRow) -> Result<ConnectionInstance> {
    let status: String = row.try_get("status").storage_context("Failed to read status")?;

    Ok(ConnectionInstance {
        organization_id: row.try_get("organization_id").storage_context("Failed to read organization_id")?,
        connection_id: row.try_get("connection_id").storage_context("Failed to read connection_id")?,
        source_instance_id: row
            .try_get("source_instance_id")
            .storage_context("Failed to read source_instance_id")?,
        source_instance_name: row
            .try_get("source_instance_name")
            .storage_context("Failed to read source_instance_name")?,
        target_instance_id: row
            .try_get("target_instance_id")
            .storage_context("Failed to read target_instance_id")?,
        target_instance_name: row
            .try_get("target_instance_name")
            .storage_context("Failed to read target_instance_name")?,
        inbound_name: row.try_get("inbound_name").storage_context("Failed to read inbound_name")?,
        outbound_name: row.try_get("outbound_name").storage_context("Failed to read outbound_name")?,
        outbound_required: row
            .try_get("outbound_required")
            .storage_context("Failed to read outbound_required")?,
        status: parse_status(&status)?,
        ip_range: row.try_get("ip_range").storage_context("Failed to read ip_range")?,
        zt_network_id: row.try_get("zt_network_id").storage_context("Failed to read zt_network_id")?,
    })
}

fn link_from_row(row: &PgRow) -> Result<ConnectionInstanceLink> {
    let status: String = row.try_get("status").storage_context("Failed to read status")?;

    Ok(ConnectionInstanceLink {
        organization_id: row.try_get("organization_id").storage_context("Failed to read organization_id")?,
        source_instance_id: row
            .try_get("source_instance_id")
            .storage_context("Failed to read source_instance_id")?,
        target_instance_id: row
            .try_get("target_instance_id")
            .storage_context("Failed to read target_instance_id")?,
        source_cluster_id: row
            .try_get("source_cluster_id")
            .storage_context("Failed to read source_cluster_id")?,
        target_cluster_id: row
            .try_get("target_cluster_id")
            .storage_context("Failed to read target_cluster_id")?,
        inbound_name: row.try_get("inbound_name").storage_context("Failed to read inbound_name")?,
        outbound_name: row.try_get("outbound_name").storage_context("Failed to read outbound_name")?,
        status: parse_status(&status)?,
    })
}

fn zt_membership_from_row(row: &PgRow) -> Result<ZtNetworkConnection> {
    let side: String = row.try_get("side").storage_context("Failed to read side")?;
    let side = parse_side(&side)?;

    Ok(ZtNetworkConnection {
        organization_id: row.try_get("organization_id").storage_context("Failed to read organization_id")?,
        zt_network_id: row.try_get("zt_network_id").storage_context("Failed to read zt_network_id")?,
        app_instance_id: row
            .try_get("app_instance_id")
            .storage_context("Failed to read app_instance_id")?,
        service_id: row.try_get("service_id").storage_context("Failed to read service_id")?,
        cluster_id: row.try_get("cluster_id").storage_context("Failed to read cluster_id")?,
        zt_member: row.try_get("zt_member").storage_context("Failed to read zt_member")?,
        zt_ip: row.try_get("zt_ip").storage_context("Failed to read zt_ip")?,
        side,
    })
}

#[async_trait::async_trait]
impl OrganizationDirectory for PostgresStore {
    async fn organization_exists(&self, organization_id: &Id) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM organizations WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await
            .storage_context("Failed to fetch organization")?;

        Ok(row.is_some())
    }

    async fn upsert_organization(&self, organization: Organization) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations (organization_id, name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id) DO UPDATE SET
                name = EXCLUDED.name
            "#,
        )
        .bind(&organization.organization_id)
        .bind(&organization.name)
        .bind(&organization.created_at)
        .execute(&self.pool)
        .await
        .storage_context("Failed to upsert organization")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ApplicationDirectory for PostgresStore {
    async fn get_app_instance(
        &self,
        organization_id: &Id,
        app_instance_id: &Id,
    ) -> Result<Option<AppInstance>> {
        let row = sqlx::query(
            "SELECT data FROM app_instances WHERE organization_id = $1 AND app_instance_id = $2",
        )
        .bind(organization_id)
        .bind(app_instance_id)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to fetch app instance")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let data: serde_json::Value = row.try_get("data").storage_context("Failed to read app instance")?;
        let instance: AppInstance =
            serde_json::from_value(data).storage_context("Failed to deserialize app instance")?;
        Ok(Some(instance))
    }

    async fn app_instance_exists(&self, organization_id: &Id, app_instance_id: &Id) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM app_instances WHERE organization_id = $1 AND app_instance_id = $2",
        )
        .bind(organization_id)
        .bind(app_instance_id)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to check app instance existence")?;

        Ok(row.is_some())
    }

    async fn upsert_app_instance(&self, instance: AppInstance) -> Result<()> {
        let data = serde_json::to_value(&instance).storage_context("Failed to serialize app instance")?;

        sqlx::query(
            r#"
            INSERT INTO app_instances (organization_id, app_instance_id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, app_instance_id) DO UPDATE SET
                data = EXCLUDED.data
            "#,
        )
        .bind(&instance.organization_id)
        .bind(&instance.app_instance_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .storage_context("Failed to upsert app instance")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ConnectionStore for PostgresStore {
    async fn add_connection(&self, connection: ConnectionInstance) -> Result<()> {
        // The primary key is the uniqueness guard across processes
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO connection_instances ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT DO NOTHING
            "#,
            CONNECTION_COLUMNS
        ))
        .bind(&connection.organization_id)
        .bind(&connection.source_instance_id)
        .bind(&connection.target_instance_id)
        .bind(&connection.inbound_name)
        .bind(&connection.outbound_name)
        .bind(&connection.connection_id)
        .bind(&connection.source_instance_name)
        .bind(&connection.target_instance_name)
        .bind(connection.outbound_required)
        .bind(connection.status.as_str())
        .bind(&connection.ip_range)
        .bind(&connection.zt_network_id)
        .execute(&self.pool)
        .await
        .storage_context("Failed to insert connection")?;

        if result.rows_affected() == 0 {
            return Err(NetworkError::already_exists(format!(
                "connection instance {}",
                connection.key()
            )));
        }
        Ok(())
    }

    async fn connection_exists(&self, key: &ConnectionKey) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM connection_instances
            WHERE organization_id = $1 AND source_instance_id = $2 AND target_instance_id = $3
              AND inbound_name = $4 AND outbound_name = $5
            "#,
        )
        .bind(&key.organization_id)
        .bind(&key.source_instance_id)
        .bind(&key.target_instance_id)
        .bind(&key.inbound_name)
        .bind(&key.outbound_name)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to check connection existence")?;

        Ok(row.is_some())
    }

    async fn get_connection(&self, key: &ConnectionKey) -> Result<ConnectionInstance> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM connection_instances
            WHERE organization_id = $1 AND source_instance_id = $2 AND target_instance_id = $3
              AND inbound_name = $4 AND outbound_name = $5
            "#,
            CONNECTION_COLUMNS
        ))
        .bind(&key.organization_id)
        .bind(&key.source_instance_id)
        .bind(&key.target_instance_id)
        .bind(&key.inbound_name)
        .bind(&key.outbound_name)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to fetch connection")?;

        let Some(row) = row else {
            return Err(NetworkError::not_found(format!("connection instance {}", key)));
        };

        connection_from_row(&row)
    }

    async fn get_connection_by_id(&self, connection_id: &Id) -> Result<Option<ConnectionInstance>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM connection_instances WHERE connection_id = $1",
            CONNECTION_COLUMNS
        ))
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to fetch connection by id")?;

        row.as_ref().map(connection_from_row).transpose()
    }

    async fn get_connections_by_zt_network(&self, zt_network_id: &Id) -> Result<Vec<ConnectionInstance>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM connection_instances WHERE zt_network_id = $1 {}",
            CONNECTION_COLUMNS, CONNECTION_ORDER
        ))
        .bind(zt_network_id)
        .fetch_all(&self.pool)
        .await
        .storage_context("Failed to fetch connections by zt network")?;

        rows.iter().map(connection_from_row).collect()
    }

    async fn list_connections(&self, organization_id: &Id) -> Result<Vec<ConnectionInstance>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM connection_instances WHERE organization_id = $1 {}",
            CONNECTION_COLUMNS, CONNECTION_ORDER
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .storage_context("Failed to list connections")?;

        rows.iter().map(connection_from_row).collect()
    }

    async fn list_connections_by_source(
        &self,
        organization_id: &Id,
        source_instance_id: &Id,
    ) -> Result<Vec<ConnectionInstance>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM connection_instances WHERE organization_id = $1 AND source_instance_id = $2 {}",
            CONNECTION_COLUMNS, CONNECTION_ORDER
        ))
        .bind(organization_id)
        .bind(source_instance_id)
        .fetch_all(&self.pool)
        .await
        .storage_context("Failed to list outbound connections")?;

        rows.iter().map(connection_from_row).collect()
    }

    async fn list_connections_by_target(
        &self,
        organization_id: &Id,
        target_instance_id: &Id,
    ) -> Result<Vec<ConnectionInstance>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM connection_instances WHERE organization_id = $1 AND target_instance_id = $2 {}",
            CONNECTION_COLUMNS, CONNECTION_ORDER
        ))
        .bind(organization_id)
        .bind(target_instance_id)
        .fetch_all(&self.pool)
        .await
        .storage_context("Failed to list inbound connections")?;

        rows.iter().map(connection_from_row).collect()
    }

    async fn update_connection(&self, request: &UpdateConnectionRequest) -> Result<ConnectionInstance> {
        let key = &request.key;
        let row = sqlx::query(&format!(
            r#"
            UPDATE connection_instances
            SET status = CASE WHEN $6 THEN $7 ELSE status END,
                ip_range = CASE WHEN $8 THEN $9 ELSE ip_range END,
                zt_network_id = CASE WHEN $10 THEN $11 ELSE zt_network_id END
            WHERE organization_id = $1 AND source_instance_id = $2 AND target_instance_id = $3
              AND inbound_name = $4 AND outbound_name = $5
            RETURNING {}
            "#,
            CONNECTION_COLUMNS
        ))
        .bind(&key.organization_id)
        .bind(&key.source_instance_id)
        .bind(&key.target_instance_id)
        .bind(&key.inbound_name)
        .bind(&key.outbound_name)
        .bind(request.update_status)
        .bind(request.status.as_str())
        .bind(request.update_ip_range)
        .bind(&request.ip_range)
        .bind(request.update_zt_network_id)
        .bind(&request.zt_network_id)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to update connection")?;

        let Some(row) = row else {
            return Err(NetworkError::not_found(format!("connection instance {}", key)));
        };

        connection_from_row(&row)
    }

    async fn remove_connection(&self, key: &ConnectionKey) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM connection_instances
            WHERE organization_id = $1 AND source_instance_id = $2 AND target_instance_id = $3
              AND inbound_name = $4 AND outbound_name = $5
            "#,
        )
        .bind(&key.organization_id)
        .bind(&key.source_instance_id)
        .bind(&key.target_instance_id)
        .bind(&key.inbound_name)
        .bind(&key.outbound_name)
        .execute(&self.pool)
        .await
        .storage_context("Failed to delete connection")?;

        if result.rows_affected() == 0 {
            return Err(NetworkError::not_found(format!("connection instance {}", key)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConnectionLinkStore for PostgresStore {
    async fn add_link(&self, link: ConnectionInstanceLink) -> Result<()> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO connection_instance_links ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            "#,
            LINK_COLUMNS
        ))
        .bind(&link.organization_id)
        .bind(&link.source_instance_id)
        .bind(&link.target_instance_id)
        .bind(&link.inbound_name)
        .bind(&link.outbound_name)
        .bind(&link.source_cluster_id)
        .bind(&link.target_cluster_id)
        .bind(link.status.as_str())
        .execute(&self.pool)
        .await
        .storage_context("Failed to insert connection link")?;

        if result.rows_affected() == 0 {
            return Err(NetworkError::already_exists(format!(
                "connection link {} [{} -> {}]",
                link.connection_key(),
                link.source_cluster_id,
                link.target_cluster_id
            )));
        }
        Ok(())
    }

    async fn link_exists(&self, key: &ConnectionLinkKey) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM connection_instance_links
            WHERE organization_id = $1 AND source_instance_id = $2 AND target_instance_id = $3
              AND inbound_name = $4 AND outbound_name = $5
              AND source_cluster_id = $6 AND target_cluster_id = $7
            "#,
        )
        .bind(&key.connection.organization_id)
        .bind(&key.connection.source_instance_id)
        .bind(&key.connection.target_instance_id)
        .bind(&key.connection.inbound_name)
        .bind(&key.connection.outbound_name)
        .bind(&key.source_cluster_id)
        .bind(&key.target_cluster_id)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to check connection link existence")?;

        Ok(row.is_some())
    }

    async fn get_link(&self, key: &ConnectionLinkKey) -> Result<ConnectionInstanceLink> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM connection_instance_links
            WHERE organization_id = $1 AND source_instance_id = $2 AND target_instance_id = $3
              AND inbound_name = $4 AND outbound_name = $5
              AND source_cluster_id = $6 AND target_cluster_id = $7
            "#,
            LINK_COLUMNS
        ))
        .bind(&key.connection.organization_id)
        .bind(&key.connection.source_instance_id)
        .bind(&key.connection.target_instance_id)
        .bind(&key.connection.inbound_name)
        .bind(&key.connection.outbound_name)
        .bind(&key.source_cluster_id)
        .bind(&key.target_cluster_id)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to fetch connection link")?;

        let Some(row) = row else {
            return Err(NetworkError::not_found(format!(
                "connection link {} [{} -> {}]",
                key.connection, key.source_cluster_id, key.target_cluster_id
            )));
        };

        link_from_row(&row)
    }

    async fn list_links(&self, connection: &ConnectionKey) -> Result<Vec<ConnectionInstanceLink>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM connection_instance_links
            WHERE organization_id = $1 AND source_instance_id = $2 AND target_instance_id = $3
              AND inbound_name = $4 AND outbound_name = $5
            {}
            "#,
            LINK_COLUMNS, LINK_ORDER
        ))
        .bind(&connection.organization_id)
        .bind(&connection.source_instance_id)
        .bind(&connection.target_instance_id)
        .bind(&connection.inbound_name)
        .bind(&connection.outbound_name)
        .fetch_all(&self.pool)
        .await
        .storage_context("Failed to list connection links")?;

        rows.iter().map(link_from_row).collect()
    }

    async fn list_links_for_organization(&self, organization_id: &Id) -> Result<Vec<ConnectionInstanceLink>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM connection_instance_links WHERE organization_id = $1 {}",
            LINK_COLUMNS, LINK_ORDER
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .storage_context("Failed to list organization links")?;

        rows.iter().map(link_from_row).collect()
    }

    async fn remove_links(&self, connection: &ConnectionKey) -> Result<usize> {
        let result = sqlx::query(
            r#"
            DELETE FROM connection_instance_links
            WHERE organization_id = $1 AND source_instance_id = $2 AND target_instance_id = $3
              AND inbound_name = $4 AND outbound_name = $5
            "#,
        )
        .bind(&connection.organization_id)
        .bind(&connection.source_instance_id)
        .bind(&connection.target_instance_id)
        .bind(&connection.inbound_name)
        .bind(&connection.outbound_name)
        .execute(&self.pool)
        .await
        .storage_context("Failed to delete connection links")?;

        Ok(result.rows_affected() as usize)
    }
}

#[async_trait::async_trait]
impl ZtNetworkStore for PostgresStore {
    async fn add_zt_membership(&self, membership: ZtNetworkConnection) -> Result<()> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO zt_network_connections ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            "#,
            ZT_COLUMNS
        ))
        .bind(&membership.organization_id)
        .bind(&membership.zt_network_id)
        .bind(&membership.app_instance_id)
        .bind(&membership.service_id)
        .bind(&membership.cluster_id)
        .bind(&membership.zt_member)
        .bind(&membership.zt_ip)
        .bind(membership.side.as_str())
        .execute(&self.pool)
        .await
        .storage_context("Failed to insert zt membership")?;

        if result.rows_affected() == 0 {
            return Err(NetworkError::already_exists(format!(
                "zt membership {}",
                membership.key()
            )));
        }
        Ok(())
    }

    async fn zt_membership_exists(&self, key: &ZtMembershipKey) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM zt_network_connections
            WHERE organization_id = $1 AND zt_network_id = $2 AND app_instance_id = $3
              AND service_id = $4 AND cluster_id = $5
            "#,
        )
        .bind(&key.organization_id)
        .bind(&key.zt_network_id)
        .bind(&key.app_instance_id)
        .bind(&key.service_id)
        .bind(&key.cluster_id)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to check zt membership existence")?;

        Ok(row.is_some())
    }

    async fn get_zt_membership(&self, key: &ZtMembershipKey) -> Result<ZtNetworkConnection> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM zt_network_connections
            WHERE organization_id = $1 AND zt_network_id = $2 AND app_instance_id = $3
              AND service_id = $4 AND cluster_id = $5
            "#,
            ZT_COLUMNS
        ))
        .bind(&key.organization_id)
        .bind(&key.zt_network_id)
        .bind(&key.app_instance_id)
        .bind(&key.service_id)
        .bind(&key.cluster_id)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to fetch zt membership")?;

        let Some(row) = row else {
            return Err(NetworkError::not_found(format!("zt membership {}", key)));
        };

        zt_membership_from_row(&row)
    }

    async fn list_zt_memberships(&self, organization_id: &Id, zt_network_id: &Id) -> Result<Vec<ZtNetworkConnection>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM zt_network_connections WHERE organization_id = $1 AND zt_network_id = $2 {}",
            ZT_COLUMNS, ZT_ORDER
        ))
        .bind(organization_id)
        .bind(zt_network_id)
        .fetch_all(&self.pool)
        .await
        .storage_context("Failed to list zt memberships")?;

        rows.iter().map(zt_membership_from_row).collect()
    }

    async fn update_zt_membership(&self, request: &UpdateZtMembershipRequest) -> Result<ZtNetworkConnection> {
        let key = &request.key;
        let row = sqlx::query(&format!(
            r#"
            UPDATE zt_network_connections
            SET zt_member = CASE WHEN $6 THEN $7 ELSE zt_member END,
                zt_ip = CASE WHEN $8 THEN $9 ELSE zt_ip END
            WHERE organization_id = $1 AND zt_network_id = $2 AND app_instance_id = $3
              AND service_id = $4 AND cluster_id = $5
            RETURNING {}
            "#,
            ZT_COLUMNS
        ))
        .bind(&key.organization_id)
        .bind(&key.zt_network_id)
        .bind(&key.app_instance_id)
        .bind(&key.service_id)
        .bind(&key.cluster_id)
        .bind(request.update_zt_member)
        .bind(&request.zt_member)
        .bind(request.update_zt_ip)
        .bind(&request.zt_ip)
        .fetch_optional(&self.pool)
        .await
        .storage_context("Failed to update zt membership")?;

        let Some(row) = row else {
            return Err(NetworkError::not_found(format!("zt membership {}", key)));
        };

        zt_membership_from_row(&row)
    }

    async fn remove_zt_membership(&self, key: &ZtMembershipKey) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM zt_network_connections
            WHERE organization_id = $1 AND zt_network_id = $2 AND app_instance_id = $3
              AND service_id = $4 AND cluster_id = $5
            "#,
        )
        .bind(&key.organization_id)
        .bind(&key.zt_network_id)
        .bind(&key.app_instance_id)
        .bind(&key.service_id)
        .bind(&key.cluster_id)
        .execute(&self.pool)
        .await
        .storage_context("Failed to delete zt membership")?;

        if result.rows_affected() == 0 {
            return Err(NetworkError::not_found(format!("zt membership {}", key)));
        }
        Ok(())
    }

    async fn remove_zt_network(&self, organization_id: &Id, zt_network_id: &Id) -> Result<usize> {
        let result = sqlx::query(
            "DELETE FROM zt_network_connections WHERE organization_id = $1 AND zt_network_id = $2",
        )
        .bind(organization_id)
        .bind(zt_network_id)
        .execute(&self.pool)
        .await
        .storage_context("Failed to delete zt network memberships")?;

        Ok(result.rows_affected() as usize)
    }
}

impl Store for PostgresStore {}
