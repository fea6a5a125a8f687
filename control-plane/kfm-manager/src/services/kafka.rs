use crate::{
    auth::{CallerIdentity, authenticated},
    clients::{
        ChangeAction, ClusterPlacement, DnsAuthority, IdentityRegistry,
        QueryParser, QuotaAuthority, QuotaReservation,
        quota::{KAFKA_QUOTA_PRODUCT, KAFKA_QUOTA_TIER},
    },
    config::KafkaConfig,
    errors::{ServiceError, StatusUpdateError},
    models::{ListArguments, PagingMeta},
    services::{DnsRecordManager, identifiers},
};
use chrono::{TimeDelta, Utc};
use kfm_cp_storage::{
    DeprovisionFilter, KafkaRequestStorage, OrderBy, OwnerScope, Paging,
    RequestFilter, SortColumn, StorageHealth,
};
use kfm_models::{
    Capacity, EndpointSpec, KafkaRequest, KafkaRequestPatch, KafkaStatus,
    KafkaStatusCount, MANAGED_CR_STATUSES, MANAGED_KAFKA_API_VERSION,
    MANAGED_KAFKA_KIND, ManagedKafka, ManagedKafkaSpec, OAuthSpec, ObjectMeta,
    TlsSpec, VersionsSpec,
};
use kfm_observability::{KafkaMetrics, KafkaOperation, init_kafka_metrics};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const STRIMZI_VERSION: &str = "0.22.1";

// statuses whose next step may be `provisioning`
const PREPARABLE_STATUSES: [KafkaStatus; 2] =
    [KafkaStatus::Accepted, KafkaStatus::Preparing];

/// External systems the lifecycle service keeps consistent with the store.
pub struct Collaborators {
    pub placement: Arc<dyn ClusterPlacement>,
    pub quota: Arc<dyn QuotaAuthority>,
    pub identity: Arc<dyn IdentityRegistry>,
    pub dns: Arc<dyn DnsAuthority>,
    pub query_parser: Arc<dyn QueryParser>,
}

/// Lifecycle controller for Kafka requests.
pub struct KafkaService {
    storage: Arc<dyn KafkaRequestStorage>,
    placement: Arc<dyn ClusterPlacement>,
    quota: Arc<dyn QuotaAuthority>,
    identity: Arc<dyn IdentityRegistry>,
    dns: DnsRecordManager,
    query_parser: Arc<dyn QueryParser>,
    config: KafkaConfig,
    metrics: KafkaMetrics,
    // serializes capacity check, quota check and insert
    admission: Mutex<()>,
}

impl KafkaService {
    pub fn new(
        storage: Arc<dyn KafkaRequestStorage>,
        collaborators: Collaborators,
        config: KafkaConfig,
    ) -> Self {
        let dns = DnsRecordManager::new(
            collaborators.dns,
            config.domain_name.clone(),
            config.num_of_brokers,
        );
        Self {
            storage,
            placement: collaborators.placement,
            quota: collaborators.quota,
            identity: collaborators.identity,
            dns,
            query_parser: collaborators.query_parser,
            config,
            metrics: init_kafka_metrics(),
            admission: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &KafkaConfig {
        &self.config
    }

    pub fn dns_records(&self) -> &DnsRecordManager {
        &self.dns
    }

    pub async fn health(&self) -> Result<(), ServiceError> {
        self.storage
            .health()
            .await
            .map_err(|e| ServiceError::general("storage is unavailable", e))
    }

    /// Whether one more instance fits under the configured ceiling. Every
    /// live record counts, whatever its status.
    pub async fn has_available_capacity(&self) -> Result<bool, ServiceError> {
        let count = self
            .storage
            .count_requests(&RequestFilter::default())
            .await
            .map_err(|e| ServiceError::general("failed to count kafka request", e))?;
        info!(
            "{} of {} kafka clusters currently instantiated",
            count, self.config.max_capacity
        );
        Ok(count < self.config.max_capacity)
    }

    /// Admit a new request: capacity, then quota, then persist as
    /// `accepted`. Concurrent admissions in this process are serialized.
    pub async fn register_kafka_job(
        &self,
        mut request: KafkaRequest,
    ) -> Result<KafkaRequest, ServiceError> {
        if request.owner.is_empty() {
            return Err(ServiceError::Validation("owner is undefined".to_string()));
        }
        if request.id.is_empty() {
            request.id = kfm_models::generate_id();
        }
        self.metrics.record_operations(KafkaOperation::Create, 1);

        let _guard = self.admission.lock().await;

        if !self.has_available_capacity().await? {
            warn!(
                max_capacity = self.config.max_capacity,
                "Cluster capacity exhausted"
            );
            return Err(ServiceError::TooManyInstances(
                "cluster capacity exhausted".to_string(),
            ));
        }

        if self.config.enable_quota_service {
            // check only; a placeholder reservation id is required by the authority
            let reservation_id = uuid::Uuid::new_v4().to_string();
            let decision = self
                .quota
                .reserve(&QuotaReservation {
                    product: KAFKA_QUOTA_PRODUCT,
                    cluster_id: &request.cluster_id,
                    reservation_id: &reservation_id,
                    owner: &request.owner,
                    organisation_id: &request.organisation_id,
                    reserve: false,
                    tier: KAFKA_QUOTA_TIER,
                })
                .await
                .map_err(|e| {
                    ServiceError::failed_to_check_quota(
                        "failed to create kafka request",
                        e,
                    )
                })?;
            if !decision.allowed {
                info!(owner = %request.owner, "quota denied for kafka request");
                return Err(ServiceError::InsufficientQuota(
                    "Insufficient Quota".to_string(),
                ));
            }
        }

        request.version = self.config.default_version.clone();
        request.status = KafkaStatus::Accepted;
        self.storage.insert_request(&request).await.map_err(|e| {
            ServiceError::general("failed to create kafka request", e)
        })?;

        self.metrics.record_success(KafkaOperation::Create, 1);
        self.record_status_age(&request, KafkaStatus::Accepted);
        info!(id = %request.id, owner = %request.owner, "kafka request accepted");
        Ok(request)
    }

    /// Assign the public host, provision DNS and the SSO client, then move
    /// the request to `provisioning`. Nothing is persisted unless every
    /// external step succeeded, and only while the stored record can still
    /// move to `provisioning`.
    pub async fn prepare_kafka_request(
        &self,
        request: &KafkaRequest,
    ) -> Result<KafkaRequest, ServiceError> {
        if request.cluster_id.is_empty() {
            return Err(ServiceError::Validation(
                "cluster id is undefined".to_string(),
            ));
        }
        let identifier = identifiers::truncated_identifier(request).map_err(|e| {
            ServiceError::general("generated host is not valid", e)
        })?;
        let current = self.find(&request.id, None).await?;
        if !current.status.can_transition_to(KafkaStatus::Provisioning) {
            return Err(ServiceError::InvalidTransition(format!(
                "failed to prepare kafka {}: cluster is already {}",
                request.id, current.status
            )));
        }
        let ingress = self.managed_ingress(&request.cluster_id).await?;

        let mut prepared = request.clone();
        prepared.bootstrap_server_host = format!("{identifier}.{ingress}");

        if self.config.enable_external_certificate {
            prepared.bootstrap_server_host =
                format!("{identifier}.{}", self.config.domain_name);
            self.dns
                .change_records(&prepared, &ingress, ChangeAction::Create)
                .await?;
        }

        if self.identity.config().auth_enabled {
            let client_id = identifiers::sso_client_name(&prepared.id);
            let secret = self
                .identity
                .create_client(&client_id, &prepared.organisation_id)
                .await
                .map_err(|e| {
                    ServiceError::sso_client_creation(
                        format!("failed to create sso client {client_id}"),
                        e,
                    )
                })?;
            prepared.sso_client_id = client_id;
            prepared.sso_client_secret = secret;
        }

        let patch = KafkaRequestPatch {
            bootstrap_server_host: Some(prepared.bootstrap_server_host.clone()),
            sso_client_id: Some(prepared.sso_client_id.clone()),
            sso_client_secret: Some(prepared.sso_client_secret.clone()),
            status: Some(KafkaStatus::Provisioning),
            expected_statuses: PREPARABLE_STATUSES.to_vec(),
            ..KafkaRequestPatch::for_id(&prepared.id)
        };
        let affected = self.storage.update_request(&patch).await.map_err(|e| {
            ServiceError::general("failed to update kafka request", e)
        })?;
        if affected == 0 {
            warn!(id = %prepared.id, "kafka request moved on during preparation, not persisted");
            return Err(ServiceError::InvalidTransition(format!(
                "failed to prepare kafka {}: cluster status changed",
                prepared.id
            )));
        }
        prepared.status = KafkaStatus::Provisioning;
        info!(
            id = %prepared.id,
            host = %prepared.bootstrap_server_host,
            "kafka request prepared"
        );
        Ok(prepared)
    }

    /// Fetch a request visible to the caller.
    pub async fn get(
        &self,
        caller: Option<&CallerIdentity>,
        id: &str,
    ) -> Result<KafkaRequest, ServiceError> {
        if id.is_empty() {
            return Err(ServiceError::Validation("id is undefined".to_string()));
        }
        let caller = authenticated(caller)?;
        self.find(id, Some(&caller.scope())).await
    }

    /// Fetch without any visibility check, for callers that already
    /// authorized access.
    pub async fn get_by_id(&self, id: &str) -> Result<KafkaRequest, ServiceError> {
        if id.is_empty() {
            return Err(ServiceError::Validation("id is undefined".to_string()));
        }
        self.find(id, None).await
    }

    async fn find(
        &self,
        id: &str,
        scope: Option<&OwnerScope>,
    ) -> Result<KafkaRequest, ServiceError> {
        self.storage
            .get_request(id, scope)
            .await
            .map_err(|e| ServiceError::general("unable to find kafka request", e))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "KafkaResource with id='{id}' not found"
                ))
            })
    }

    /// Page through the requests visible to the caller.
    pub async fn list(
        &self,
        caller: Option<&CallerIdentity>,
        args: &ListArguments,
    ) -> Result<(Vec<KafkaRequest>, PagingMeta), ServiceError> {
        let caller = authenticated(caller)?;

        let search = if args.search.trim().is_empty() {
            None
        } else {
            Some(self.query_parser.parse(&args.search).map_err(|e| {
                ServiceError::failed_to_parse_search(
                    format!("Unable to list kafka requests for {}", caller.username),
                    e,
                )
            })?)
        };
        let order_by = if args.order_by.is_empty() {
            vec![OrderBy::asc(SortColumn::Name)]
        } else {
            args.order_by
                .iter()
                .map(|o| {
                    o.parse::<OrderBy>()
                        .map_err(|e| ServiceError::Validation(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        let filter = RequestFilter::scoped(caller.scope()).with_search(search);

        let total = self
            .storage
            .count_requests(&filter)
            .await
            .map_err(|e| ServiceError::general("Unable to list kafka requests", e))?;
        let page = args.page.max(1);
        let size = args.size.min(total);
        let paging = Paging {
            offset: (page - 1).saturating_mul(size),
            limit: size,
        };
        let items = self
            .storage
            .list_requests(&filter, &order_by, paging)
            .await
            .map_err(|e| ServiceError::general("Unable to list kafka requests", e))?;

        debug!(
            user = %caller.username,
            total = total,
            returned = items.len(),
            "listed kafka requests"
        );
        Ok((items, PagingMeta { page, size, total }))
    }

    /// Field-scoped update. Requests under deletion are left alone.
    pub async fn update(&self, patch: &KafkaRequestPatch) -> Result<(), ServiceError> {
        if patch.id.is_empty() {
            return Err(ServiceError::Validation("id is undefined".to_string()));
        }
        let affected = self
            .storage
            .update_request(patch)
            .await
            .map_err(|e| ServiceError::general("Failed to update kafka", e))?;
        if affected == 0 {
            debug!(id = %patch.id, "kafka update skipped");
        }
        Ok(())
    }

    /// Guarded status change. A deprovisioning request only moves on to
    /// `deleting`, a same-status write is refused, and any other edge must be
    /// in the transition table. Refusals report `attempted = false`.
    pub async fn update_status(
        &self,
        id: &str,
        status: KafkaStatus,
    ) -> Result<(), StatusUpdateError> {
        let current = self.get_by_id(id).await.map_err(StatusUpdateError::failed)?;

        if current.status == KafkaStatus::Deprovision
            && status != KafkaStatus::Deleting
        {
            return Err(StatusUpdateError::rejected(
                ServiceError::InvalidTransition(
                    "failed to update status: cluster is deprovisioning".to_string(),
                ),
            ));
        }
        if current.status == status {
            return Err(StatusUpdateError::rejected(
                ServiceError::InvalidTransition(format!(
                    "failed to update status: the cluster {id} is already in {status} state"
                )),
            ));
        }
        if !current.status.can_transition_to(status) {
            return Err(StatusUpdateError::rejected(
                ServiceError::InvalidTransition(format!(
                    "failed to update status: cannot move cluster {id} from {} to {status}",
                    current.status
                )),
            ));
        }

        let affected = self
            .storage
            .update_status(id, status)
            .await
            .map_err(|e| {
                StatusUpdateError::failed(ServiceError::general(
                    "Failed to update kafka status",
                    e,
                ))
            })?;
        if affected == 0 {
            return Err(StatusUpdateError::failed(ServiceError::NotFound(
                format!("KafkaResource with id='{id}' not found"),
            )));
        }

        self.record_status_age(&current, status);
        info!(id = %id, from = %current.status, to = %status, "kafka status updated");
        Ok(())
    }

    /// Move one of the caller's own requests to `deprovision`. Requests
    /// already deprovisioning are left as they are.
    pub async fn register_deprovision_job(
        &self,
        caller: Option<&CallerIdentity>,
        id: &str,
    ) -> Result<(), ServiceError> {
        if id.is_empty() {
            return Err(ServiceError::Validation("id is undefined".to_string()));
        }
        let caller = authenticated(caller)?;
        self.find(id, Some(&OwnerScope::Owner(caller.username.clone())))
            .await?;

        self.metrics.record_operations(KafkaOperation::Deprovision, 1);
        match self.update_status(id, KafkaStatus::Deprovision).await {
            Ok(()) => {
                self.metrics.record_success(KafkaOperation::Deprovision, 1);
                Ok(())
            }
            Err(e) if e.attempted => Err(e.into()),
            Err(e) => {
                debug!(id = %id, reason = %e, "deprovision not attempted");
                Ok(())
            }
        }
    }

    /// Deprovision every live request owned by any of `owners`.
    pub async fn deprovision_for_owners(
        &self,
        owners: &[String],
    ) -> Result<u64, ServiceError> {
        if owners.is_empty() {
            return Ok(0);
        }
        let affected = self
            .storage
            .deprovision_requests(&DeprovisionFilter::for_owners(owners))
            .await
            .map_err(|e| {
                ServiceError::general(
                    "Unable to deprovision kafka requests for users",
                    e,
                )
            })?;
        if affected > 0 {
            info!(
                affected = affected,
                owners = ?owners,
                "kafkas are now deprovisioning for users"
            );
            self.metrics
                .record_completed(KafkaOperation::Deprovision, affected);
        }
        Ok(affected)
    }

    /// Deprovision requests older than `max_age_hours`, except the
    /// configured long-lived ones. The age must be positive and small enough
    /// to yield a representable cutoff.
    pub async fn deprovision_expired(
        &self,
        max_age_hours: i64,
    ) -> Result<u64, ServiceError> {
        if max_age_hours <= 0 {
            return Err(ServiceError::Validation(format!(
                "kafka lifespan must be positive, got {max_age_hours} hours"
            )));
        }
        let cutoff = TimeDelta::try_hours(max_age_hours)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| {
                ServiceError::Validation(format!(
                    "kafka lifespan of {max_age_hours} hours is out of range"
                ))
            })?;
        let filter = DeprovisionFilter::created_before(
            cutoff,
            self.config.lifespan.long_lived_kafkas.clone(),
        );
        let affected = self
            .storage
            .deprovision_requests(&filter)
            .await
            .map_err(|e| {
                ServiceError::general("unable to deprovision expired kafkas", e)
            })?;
        if affected > 0 {
            info!(
                affected = affected,
                max_age_hours = max_age_hours,
                "kafka requests outlived their lifespan and are now deprovisioning"
            );
            self.metrics
                .record_completed(KafkaOperation::Deprovision, affected);
        }
        Ok(affected)
    }

    /// Release the SSO client and DNS records, then soft delete. The record
    /// stays if any cleanup step fails.
    pub async fn delete(&self, request: &KafkaRequest) -> Result<(), ServiceError> {
        if request.has_cluster() {
            if self.identity.config().auth_enabled {
                let client_id = identifiers::sso_client_name(&request.id);
                self.identity.delete_client(&client_id).await.map_err(|e| {
                    ServiceError::external_provisioning("error deleting sso client", e)
                })?;
            }

            // no host means preparation never published any record
            if self.config.enable_external_certificate
                && !request.bootstrap_server_host.is_empty()
            {
                let ingress = self.managed_ingress(&request.cluster_id).await?;
                self.dns
                    .change_records(request, &ingress, ChangeAction::Delete)
                    .await?;
            }
        }

        let affected = self
            .storage
            .soft_delete_request(&request.id)
            .await
            .map_err(|e| {
                ServiceError::general(
                    format!("unable to delete kafka request with id {}", request.id),
                    e,
                )
            })?;
        if affected == 0 {
            debug!(id = %request.id, "kafka request was already deleted");
        }

        self.metrics.record_completed(KafkaOperation::Delete, 1);
        info!(id = %request.id, "kafka request deleted");
        Ok(())
    }

    pub async fn list_by_status(
        &self,
        statuses: &[KafkaStatus],
    ) -> Result<Vec<KafkaRequest>, ServiceError> {
        if statuses.is_empty() {
            return Err(ServiceError::Validation("no status provided".to_string()));
        }
        self.storage
            .list_by_status(statuses)
            .await
            .map_err(|e| ServiceError::general("failed to list by status", e))
    }

    /// One count per requested status, zero when nothing is in it.
    pub async fn count_by_status(
        &self,
        statuses: &[KafkaStatus],
    ) -> Result<Vec<KafkaStatusCount>, ServiceError> {
        let found = self
            .storage
            .count_by_status(statuses)
            .await
            .map_err(|e| ServiceError::general("Failed to count kafkas", e))?;
        Ok(statuses
            .iter()
            .map(|s| KafkaStatusCount {
                status: *s,
                count: found
                    .iter()
                    .find(|c| c.status == *s)
                    .map_or(0, |c| c.count),
            })
            .collect())
    }

    /// Descriptors of every prepared instance placed on `cluster_id`, for
    /// the data-plane reconciler.
    pub async fn get_managed_kafkas_by_cluster_id(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<ManagedKafka>, ServiceError> {
        let requests = self
            .storage
            .list_by_cluster(cluster_id, &MANAGED_CR_STATUSES)
            .await
            .map_err(|e| ServiceError::general("unable to list kafka requests", e))?;

        let auth_enabled = self.identity.config().auth_enabled;
        requests
            .iter()
            .filter(|r| !r.bootstrap_server_host.is_empty())
            .filter(|r| {
                !auth_enabled
                    || (!r.sso_client_id.is_empty() && !r.sso_client_secret.is_empty())
            })
            .map(|r| self.build_managed_kafka(r))
            .collect()
    }

    fn build_managed_kafka(
        &self,
        request: &KafkaRequest,
    ) -> Result<ManagedKafka, ServiceError> {
        let namespace = identifiers::namespace_name(request)
            .map_err(|e| ServiceError::general("invalid namespace name", e))?;
        let capacity = &self.config.capacity;
        let identity = self.identity.config();

        let tls = (!self.config.tls_cert.is_empty() && !self.config.tls_key.is_empty())
            .then(|| TlsSpec {
                cert: self.config.tls_cert.clone(),
                key: self.config.tls_key.clone(),
            });
        let oauth = identity.auth_enabled.then(|| OAuthSpec {
            client_id: request.sso_client_id.clone(),
            client_secret: request.sso_client_secret.clone(),
            token_endpoint_uri: identity.token_endpoint_uri.clone(),
            jwks_endpoint_uri: identity.jwks_endpoint_uri.clone(),
            valid_issuer_endpoint_uri: identity.valid_issuer_uri.clone(),
            user_name_claim: identity.user_name_claim.clone(),
            custom_claim_check: identifiers::custom_claim_check(
                &request.organisation_id,
            ),
            tls_trusted_certificate: identity.tls_trusted_certificate.clone(),
        });

        Ok(ManagedKafka {
            id: request.id.clone(),
            kind: MANAGED_KAFKA_KIND.to_string(),
            api_version: MANAGED_KAFKA_API_VERSION.to_string(),
            metadata: ObjectMeta {
                name: request.name.clone(),
                namespace,
                annotations: BTreeMap::from([
                    ("bf2.org/id".to_string(), request.id.clone()),
                    (
                        "bf2.org/placementId".to_string(),
                        request.placement_id.clone(),
                    ),
                ]),
            },
            spec: ManagedKafkaSpec {
                capacity: Capacity {
                    ingress_egress_throughput_per_sec: capacity
                        .ingress_egress_throughput_per_sec
                        .clone(),
                    total_max_connections: capacity.total_max_connections,
                    max_data_retention_size: capacity.max_data_retention_size.clone(),
                    max_partitions: capacity.max_partitions,
                    max_data_retention_period: capacity
                        .max_data_retention_period
                        .clone(),
                    max_connection_attempts_per_sec: capacity
                        .max_connection_attempts_per_sec,
                },
                endpoint: EndpointSpec {
                    bootstrap_server_host: request.bootstrap_server_host.clone(),
                    tls,
                },
                oauth,
                versions: VersionsSpec {
                    kafka: request.version.clone(),
                    strimzi: STRIMZI_VERSION.to_string(),
                },
                deleted: request.status == KafkaStatus::Deprovision,
            },
        })
    }

    async fn managed_ingress(&self, cluster_id: &str) -> Result<String, ServiceError> {
        let dns = self
            .placement
            .cluster_dns(cluster_id)
            .await
            .map_err(|e| ServiceError::general("error retrieving cluster DNS", e))?;
        Ok(identifiers::managed_ingress(&dns))
    }

    fn record_status_age(&self, request: &KafkaRequest, status: KafkaStatus) {
        let age = Utc::now().signed_duration_since(request.created_at);
        self.metrics.record_status_since_created(
            status.as_str(),
            &request.cluster_id,
            age.num_milliseconds().max(0) as f64 / 1000.0,
        );
    }
}
