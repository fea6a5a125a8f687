//! Relational request store on SQLite.
//!
//! All statements run on the blocking pool against a single shared
//! connection. Row-level atomicity comes from SQLite itself: every write is
//! a single `UPDATE`/`INSERT` statement.

use crate::error::StorageError;
use crate::filters::*;
use crate::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kfm_models::{KafkaRequest, KafkaRequestPatch, KafkaStatus, KafkaStatusCount};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kafka_requests (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    owner TEXT NOT NULL,
    organisation_id TEXT NOT NULL DEFAULT '',
    placement_id TEXT NOT NULL DEFAULT '',
    region TEXT NOT NULL DEFAULT '',
    cloud_provider TEXT NOT NULL DEFAULT '',
    multi_az INTEGER NOT NULL DEFAULT 0,
    version TEXT NOT NULL DEFAULT '',
    instance_type TEXT NOT NULL DEFAULT '',
    kafka_storage_size TEXT NOT NULL DEFAULT '',
    ingress_throughput_per_sec TEXT NOT NULL DEFAULT '',
    egress_throughput_per_sec TEXT NOT NULL DEFAULT '',
    total_max_connections INTEGER NOT NULL DEFAULT 0,
    max_partitions INTEGER NOT NULL DEFAULT 0,
    max_data_retention_period TEXT NOT NULL DEFAULT '',
    max_connection_attempts_per_sec INTEGER NOT NULL DEFAULT 0,
    reauthentication_enabled INTEGER NOT NULL DEFAULT 0,
    bootstrap_server_host TEXT NOT NULL DEFAULT '',
    admin_api_server_url TEXT NOT NULL DEFAULT '',
    cluster_id TEXT NOT NULL DEFAULT '',
    sso_client_id TEXT NOT NULL DEFAULT '',
    sso_client_secret TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    failed_reason TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    expires_at INTEGER,
    deleted_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_kafka_requests_owner ON kafka_requests(owner);
CREATE INDEX IF NOT EXISTS idx_kafka_requests_org ON kafka_requests(organisation_id);
CREATE INDEX IF NOT EXISTS idx_kafka_requests_status ON kafka_requests(status);
CREATE INDEX IF NOT EXISTS idx_kafka_requests_cluster ON kafka_requests(cluster_id);
PRAGMA case_sensitive_like = ON;
"#;

const COLUMNS: &str = "id, name, owner, organisation_id, placement_id, region, \
    cloud_provider, multi_az, version, instance_type, kafka_storage_size, \
    ingress_throughput_per_sec, egress_throughput_per_sec, \
    total_max_connections, max_partitions, max_data_retention_period, \
    max_connection_attempts_per_sec, reauthentication_enabled, \
    bootstrap_server_host, admin_api_server_url, cluster_id, sso_client_id, \
    sso_client_secret, status, failed_reason, created_at, updated_at, \
    expires_at, deleted_at";

#[derive(Clone)]
pub struct SqliteKafkaStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKafkaStorage {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| {
                StorageError::Internal("sqlite connection poisoned".into())
            })?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("sqlite task failed: {e}")))?
    }
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_request(row: &Row<'_>) -> rusqlite::Result<KafkaRequest> {
    let status: String = row.get("status")?;
    let status = status.parse::<KafkaStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(23, Type::Text, Box::new(e))
    })?;
    Ok(KafkaRequest {
        id: row.get("id")?,
        name: row.get("name")?,
        owner: row.get("owner")?,
        organisation_id: row.get("organisation_id")?,
        placement_id: row.get("placement_id")?,
        region: row.get("region")?,
        cloud_provider: row.get("cloud_provider")?,
        multi_az: row.get("multi_az")?,
        version: row.get("version")?,
        instance_type: row.get("instance_type")?,
        kafka_storage_size: row.get("kafka_storage_size")?,
        ingress_throughput_per_sec: row.get("ingress_throughput_per_sec")?,
        egress_throughput_per_sec: row.get("egress_throughput_per_sec")?,
        total_max_connections: row.get("total_max_connections")?,
        max_partitions: row.get("max_partitions")?,
        max_data_retention_period: row.get("max_data_retention_period")?,
        max_connection_attempts_per_sec: row
            .get("max_connection_attempts_per_sec")?,
        reauthentication_enabled: row.get("reauthentication_enabled")?,
        bootstrap_server_host: row.get("bootstrap_server_host")?,
        admin_api_server_url: row.get("admin_api_server_url")?,
        cluster_id: row.get("cluster_id")?,
        sso_client_id: row.get("sso_client_id")?,
        sso_client_secret: row.get("sso_client_secret")?,
        status,
        failed_reason: row.get("failed_reason")?,
        created_at: from_millis(row.get("created_at")?),
        updated_at: from_millis(row.get("updated_at")?),
        expires_at: row.get::<_, Option<i64>>("expires_at")?.map(from_millis),
        deleted_at: row.get::<_, Option<i64>>("deleted_at")?.map(from_millis),
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn status_values(statuses: &[KafkaStatus]) -> Vec<Value> {
    statuses
        .iter()
        .map(|s| Value::Text(s.as_str().to_string()))
        .collect()
}

/// `WHERE` clause (without the keyword) and bound values for a filter.
fn filter_clause(filter: &RequestFilter) -> (String, Vec<Value>) {
    let mut clauses = vec!["deleted_at IS NULL".to_string()];
    let mut values = Vec::new();
    match &filter.scope {
        Some(OwnerScope::Organisation(org)) => {
            clauses.push("organisation_id = ?".into());
            values.push(Value::Text(org.clone()));
        }
        Some(OwnerScope::Owner(owner)) => {
            clauses.push("owner = ?".into());
            values.push(Value::Text(owner.clone()));
        }
        None => {}
    }
    if let Some(ref search) = filter.search {
        let (sql, bound) = search.to_sql();
        clauses.push(format!("({sql})"));
        values.extend(bound.into_iter().map(Value::Text));
    }
    (clauses.join(" AND "), values)
}

fn order_clause(order_by: &[OrderBy]) -> String {
    let mut parts: Vec<String> = order_by
        .iter()
        .map(|o| {
            format!(
                "{} {}",
                o.column.column_name(),
                if o.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();
    parts.push("id ASC".into());
    parts.join(", ")
}

fn query_requests(
    conn: &Connection,
    sql: &str,
    values: Vec<Value>,
) -> StorageResult<Vec<KafkaRequest>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), row_to_request)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[async_trait]
impl StorageHealth for SqliteKafkaStorage {
    async fn health(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl KafkaRequestStorage for SqliteKafkaStorage {
    async fn insert_request(&self, request: &KafkaRequest) -> StorageResult<()> {
        let r = request.clone();
        self.with_conn(move |conn| {
            let sql = format!(
                "INSERT INTO kafka_requests ({COLUMNS}) VALUES ({})",
                placeholders(29)
            );
            let result = conn.execute(
                &sql,
                params![
                    r.id,
                    r.name,
                    r.owner,
                    r.organisation_id,
                    r.placement_id,
                    r.region,
                    r.cloud_provider,
                    r.multi_az,
                    r.version,
                    r.instance_type,
                    r.kafka_storage_size,
                    r.ingress_throughput_per_sec,
                    r.egress_throughput_per_sec,
                    r.total_max_connections,
                    r.max_partitions,
                    r.max_data_retention_period,
                    r.max_connection_attempts_per_sec,
                    r.reauthentication_enabled,
                    r.bootstrap_server_host,
                    r.admin_api_server_url,
                    r.cluster_id,
                    r.sso_client_id,
                    r.sso_client_secret,
                    r.status.as_str(),
                    r.failed_reason,
                    millis(r.created_at),
                    millis(r.updated_at),
                    r.expires_at.map(millis),
                    r.deleted_at.map(millis),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StorageError::AlreadyExists(r.id.clone()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_request(
        &self,
        id: &str,
        scope: Option<&OwnerScope>,
    ) -> StorageResult<Option<KafkaRequest>> {
        let mut filter = RequestFilter::default();
        filter.scope = scope.cloned();
        let id = id.to_string();
        self.with_conn(move |conn| {
            let (clause, mut values) = filter_clause(&filter);
            values.insert(0, Value::Text(id));
            let sql = format!(
                "SELECT {COLUMNS} FROM kafka_requests WHERE id = ? AND {clause}"
            );
            let found = conn
                .query_row(&sql, params_from_iter(values.iter()), row_to_request)
                .optional()?;
            Ok(found)
        })
        .await
    }

    async fn count_requests(&self, filter: &RequestFilter) -> StorageResult<u64> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let (clause, values) = filter_clause(&filter);
            let sql = format!("SELECT COUNT(*) FROM kafka_requests WHERE {clause}");
            let count: i64 = conn.query_row(
                &sql,
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
        order_by: &[OrderBy],
        paging: Paging,
    ) -> StorageResult<Vec<KafkaRequest>> {
        let filter = filter.clone();
        let order = order_clause(order_by);
        self.with_conn(move |conn| {
            let (clause, mut values) = filter_clause(&filter);
            values.push(Value::Integer(paging.limit as i64));
            values.push(Value::Integer(paging.offset as i64));
            let sql = format!(
                "SELECT {COLUMNS} FROM kafka_requests WHERE {clause} \
                 ORDER BY {order} LIMIT ? OFFSET ?"
            );
            debug!(%sql, "listing kafka requests");
            query_requests(conn, &sql, values)
        })
        .await
    }

    async fn list_by_status(
        &self,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaRequest>> {
        let values = status_values(statuses);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM kafka_requests \
                 WHERE deleted_at IS NULL AND status IN ({})",
                placeholders(values.len())
            );
            query_requests(conn, &sql, values)
        })
        .await
    }

    async fn list_by_cluster(
        &self,
        cluster_id: &str,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaRequest>> {
        let mut values = vec![Value::Text(cluster_id.to_string())];
        values.extend(status_values(statuses));
        let n = statuses.len();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM kafka_requests \
                 WHERE deleted_at IS NULL AND cluster_id = ? AND status IN ({})",
                placeholders(n)
            );
            query_requests(conn, &sql, values)
        })
        .await
    }

    async fn count_by_status(
        &self,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaStatusCount>> {
        let values = status_values(statuses);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT status, COUNT(1) FROM kafka_requests \
                 WHERE deleted_at IS NULL AND status IN ({}) GROUP BY status",
                placeholders(values.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count))
            })?;
            let mut counts = Vec::new();
            for row in rows {
                let (status, count) = row?;
                let status = status
                    .parse::<KafkaStatus>()
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                counts.push(KafkaStatusCount {
                    status,
                    count: count as u64,
                });
            }
            Ok(counts)
        })
        .await
    }

    async fn update_request(&self, patch: &KafkaRequestPatch) -> StorageResult<u64> {
        if patch.is_empty() {
            return Ok(0);
        }
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            let text_fields = [
                ("bootstrap_server_host = ?", &patch.bootstrap_server_host),
                ("admin_api_server_url = ?", &patch.admin_api_server_url),
                ("cluster_id = ?", &patch.cluster_id),
                ("sso_client_id = ?", &patch.sso_client_id),
                ("sso_client_secret = ?", &patch.sso_client_secret),
                ("failed_reason = ?", &patch.failed_reason),
            ];
            for (set, field) in text_fields {
                if let Some(v) = field {
                    sets.push(set);
                    values.push(Value::Text(v.clone()));
                }
            }
            if let Some(status) = patch.status {
                sets.push("status = ?");
                values.push(Value::Text(status.as_str().to_string()));
            }
            sets.push("updated_at = ?");
            values.push(Value::Integer(millis(Utc::now())));
            values.push(Value::Text(patch.id.clone()));
            values.extend(status_values(&kfm_models::DELETION_STATUSES));
            let mut sql = format!(
                "UPDATE kafka_requests SET {} WHERE id = ? \
                 AND deleted_at IS NULL AND status NOT IN (?, ?)",
                sets.join(", ")
            );
            if !patch.expected_statuses.is_empty() {
                sql.push_str(&format!(
                    " AND status IN ({})",
                    placeholders(patch.expected_statuses.len())
                ));
                values.extend(status_values(&patch.expected_statuses));
            }
            let n = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(n as u64)
        })
        .await
    }

    async fn update_status(&self, id: &str, status: KafkaStatus) -> StorageResult<u64> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let n = conn.execute(
                "UPDATE kafka_requests SET status = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND deleted_at IS NULL",
                params![status.as_str(), millis(Utc::now()), id],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn deprovision_requests(
        &self,
        filter: &DeprovisionFilter,
    ) -> StorageResult<u64> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut clauses =
                vec!["deleted_at IS NULL AND status NOT IN (?, ?)".to_string()];
            let mut values = vec![
                Value::Text(KafkaStatus::Deprovision.as_str().to_string()),
                Value::Integer(millis(Utc::now())),
            ];
            values.extend(status_values(&kfm_models::DELETION_STATUSES));
            if let Some(ref owners) = filter.owners {
                if owners.is_empty() {
                    return Ok(0);
                }
                clauses.push(format!("owner IN ({})", placeholders(owners.len())));
                values.extend(owners.iter().cloned().map(Value::Text));
            }
            if let Some(cutoff) = filter.created_before {
                clauses.push("created_at <= ?".into());
                values.push(Value::Integer(millis(cutoff)));
            }
            if !filter.exclude_ids.is_empty() {
                clauses.push(format!(
                    "id NOT IN ({})",
                    placeholders(filter.exclude_ids.len())
                ));
                values.extend(filter.exclude_ids.iter().cloned().map(Value::Text));
            }
            let sql = format!(
                "UPDATE kafka_requests SET status = ?, updated_at = ? WHERE {}",
                clauses.join(" AND ")
            );
            let n = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(n as u64)
        })
        .await
    }

    async fn soft_delete_request(&self, id: &str) -> StorageResult<u64> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let now = millis(Utc::now());
            let n = conn.execute(
                "UPDATE kafka_requests SET deleted_at = ?1, updated_at = ?1 \
                 WHERE id = ?2 AND deleted_at IS NULL",
                params![now, id],
            )?;
            Ok(n as u64)
        })
        .await
    }
}
