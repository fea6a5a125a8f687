mod common;

use common::*;
use kfm_manager::{CallerIdentity, ListArguments, ServiceError};
use kfm_models::{KafkaStatus, MANAGED_KAFKA_KIND};

async fn seed_org_a(h: &Harness) {
    for (name, owner) in [
        ("echo", "alice"),
        ("delta", "carol"),
        ("charlie", "alice"),
        ("bravo", "carol"),
        ("alpha", "alice"),
    ] {
        h.seed(&make_request(name, owner, "org-a")).await;
    }
}

fn names(items: &[kfm_models::KafkaRequest]) -> Vec<&str> {
    items.iter().map(|r| r.name.as_str()).collect()
}

#[tokio::test]
async fn get_is_scoped_to_the_callers_organisation() {
    let h = HarnessBuilder::default().build();
    let request = make_request("orders", "alice", "org-a");
    h.seed(&request).await;

    let found = h.service.get(Some(&alice()), &request.id).await.unwrap();
    assert_eq!(found.id, request.id);

    let org_mate = CallerIdentity::new("carol", "org-a");
    assert!(h.service.get(Some(&org_mate), &request.id).await.is_ok());

    let err = h.service.get(Some(&bob()), &request.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn service_accounts_only_see_their_own_records() {
    let h = HarnessBuilder::default().build();
    let own = make_request("own", "svc-robot", "org-a");
    let other = make_request("other", "alice", "org-a");
    h.seed(&own).await;
    h.seed(&other).await;
    let robot = CallerIdentity::service_account("svc-robot");

    assert!(h.service.get(Some(&robot), &own.id).await.is_ok());
    assert!(h.service.get(Some(&robot), &other.id).await.is_err());

    let (items, meta) = h
        .service
        .list(Some(&robot), &ListArguments::default())
        .await
        .unwrap();
    assert_eq!(names(&items), vec!["own"]);
    assert_eq!(meta.total, 1);
}

#[tokio::test]
async fn scoped_reads_require_a_caller() {
    let h = HarnessBuilder::default().build();
    let request = make_request("orders", "alice", "org-a");
    h.seed(&request).await;

    let err = h.service.get(None, &request.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthenticated(_)));

    let anonymous = CallerIdentity::default();
    let err = h
        .service
        .list(Some(&anonymous), &ListArguments::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthenticated(_)));

    let err = h.service.get(Some(&alice()), "").await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn get_by_id_ignores_ownership_but_not_deletion() {
    let h = HarnessBuilder::default().build();
    let request = make_request("orders", "alice", "org-a");
    h.seed(&request).await;

    assert!(h.service.get_by_id(&request.id).await.is_ok());

    h.service.delete(&request).await.unwrap();
    let err = h.service.get_by_id(&request.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn list_defaults_to_name_order_and_pages() {
    let h = HarnessBuilder::default().build();
    seed_org_a(&h).await;
    h.seed(&make_request("zulu", "bob", "org-b")).await;

    let (items, meta) = h
        .service
        .list(
            Some(&alice()),
            &ListArguments {
                page: 1,
                size: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(names(&items), vec!["alpha", "bravo"]);
    assert_eq!((meta.page, meta.size, meta.total), (1, 2, 5));

    let (items, _) = h
        .service
        .list(
            Some(&alice()),
            &ListArguments {
                page: 3,
                size: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(names(&items), vec!["echo"]);
}

#[tokio::test]
async fn list_clamps_size_to_total() {
    let h = HarnessBuilder::default().build();
    seed_org_a(&h).await;

    let (items, meta) = h
        .service
        .list(Some(&alice()), &ListArguments::default())
        .await
        .unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(meta.size, 5);

    let (items, meta) = h
        .service
        .list(Some(&bob()), &ListArguments::default())
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!((meta.size, meta.total), (0, 0));
}

#[tokio::test]
async fn list_orders_and_searches() {
    let h = HarnessBuilder::default().build();
    seed_org_a(&h).await;

    let (items, _) = h
        .service
        .list(
            Some(&alice()),
            &ListArguments {
                order_by: vec!["name desc".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(names(&items)[0], "echo");

    let (items, meta) = h
        .service
        .list(
            Some(&alice()),
            &ListArguments {
                search: "owner = carol".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(names(&items), vec!["bravo", "delta"]);
    assert_eq!(meta.total, 2);
}

#[tokio::test]
async fn list_reports_bad_arguments() {
    let h = HarnessBuilder::default().build();
    seed_org_a(&h).await;

    let err = h
        .service
        .list(
            Some(&alice()),
            &ListArguments {
                search: "nonsense = 1".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::FailedToParseSearch { .. }));
    assert_eq!(err.code_str(), "KAFKAS-MGMT-23");

    let err = h
        .service
        .list(
            Some(&alice()),
            &ListArguments {
                order_by: vec!["colour asc".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn status_queries() {
    let h = HarnessBuilder::default().build();
    let mut ready = make_request("ready", "alice", "org-a");
    ready.status = KafkaStatus::Ready;
    h.seed(&ready).await;
    h.seed(&make_request("new-1", "alice", "org-a")).await;
    h.seed(&make_request("new-2", "bob", "org-b")).await;

    let counts = h
        .service
        .count_by_status(&[
            KafkaStatus::Failed,
            KafkaStatus::Accepted,
            KafkaStatus::Ready,
        ])
        .await
        .unwrap();
    let pairs: Vec<_> = counts.iter().map(|c| (c.status, c.count)).collect();
    assert_eq!(
        pairs,
        vec![
            (KafkaStatus::Failed, 0),
            (KafkaStatus::Accepted, 2),
            (KafkaStatus::Ready, 1),
        ]
    );

    let listed = h
        .service
        .list_by_status(&[KafkaStatus::Ready])
        .await
        .unwrap();
    assert_eq!(names(&listed), vec!["ready"]);

    let err = h.service.list_by_status(&[]).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn managed_kafkas_describe_prepared_instances() {
    let h = HarnessBuilder::default()
        .auth(true)
        .config(|c| {
            c.tls_cert = "CERT".to_string();
            c.tls_key = "KEY".to_string();
        })
        .build();

    let mut ready = make_request("orders", "alice", "org-a");
    ready.id = "abc123".to_string();
    ready.cluster_id = CLUSTER_ID.to_string();
    ready.placement_id = "placement-1".to_string();
    ready.version = "2.7.0".to_string();
    h.seed(&ready).await;
    h.service.prepare_kafka_request(&ready).await.unwrap();

    // not prepared yet
    let mut accepted = make_request("queued", "alice", "org-a");
    accepted.cluster_id = CLUSTER_ID.to_string();
    h.seed(&accepted).await;
    // provisioning but without sso credentials
    let mut bare = make_request("bare", "alice", "org-a");
    bare.cluster_id = CLUSTER_ID.to_string();
    bare.status = KafkaStatus::Provisioning;
    bare.bootstrap_server_host = "bare.example.com".to_string();
    h.seed(&bare).await;
    // another cluster
    let mut elsewhere = bare.clone();
    elsewhere.id = "elsewhere1".to_string();
    elsewhere.cluster_id = "cluster-2".to_string();
    elsewhere.sso_client_id = "kafka-elsewhere1".to_string();
    elsewhere.sso_client_secret = "s".to_string();
    h.seed(&elsewhere).await;

    let managed = h
        .service
        .get_managed_kafkas_by_cluster_id(CLUSTER_ID)
        .await
        .unwrap();
    assert_eq!(managed.len(), 1);
    let mk = &managed[0];
    assert_eq!(mk.id, "abc123");
    assert_eq!(mk.kind, MANAGED_KAFKA_KIND);
    assert_eq!(mk.metadata.name, "orders");
    assert_eq!(mk.metadata.namespace, "kafka-abc123");
    assert_eq!(mk.metadata.annotations["bf2.org/id"], "abc123");
    assert_eq!(mk.metadata.annotations["bf2.org/placementId"], "placement-1");
    assert_eq!(
        mk.spec.endpoint.bootstrap_server_host,
        format!("orders-abc123.{MANAGED_INGRESS}")
    );
    let tls = mk.spec.endpoint.tls.as_ref().unwrap();
    assert_eq!((tls.cert.as_str(), tls.key.as_str()), ("CERT", "KEY"));
    let oauth = mk.spec.oauth.as_ref().unwrap();
    assert_eq!(oauth.client_id, "kafka-abc123");
    assert_eq!(oauth.client_secret, "secret-kafka-abc123");
    assert_eq!(oauth.user_name_claim, "clientId");
    assert_eq!(
        oauth.custom_claim_check,
        "@.rh-org-id == 'org-a'|| @.org_id == 'org-a'"
    );
    assert_eq!(mk.spec.versions.kafka, "2.7.0");
    assert_eq!(mk.spec.versions.strimzi, "0.22.1");
    assert_eq!(mk.spec.capacity.max_partitions, 1000);
    assert!(!mk.spec.deleted);

    h.service
        .register_deprovision_job(Some(&alice()), "abc123")
        .await
        .unwrap();
    let managed = h
        .service
        .get_managed_kafkas_by_cluster_id(CLUSTER_ID)
        .await
        .unwrap();
    assert!(managed[0].spec.deleted);
}

#[tokio::test]
async fn managed_kafkas_without_auth_or_tls() {
    let h = HarnessBuilder::default().build();
    let mut request = make_request("orders", "alice", "org-a");
    request.cluster_id = CLUSTER_ID.to_string();
    h.seed(&request).await;
    h.service.prepare_kafka_request(&request).await.unwrap();

    let managed = h
        .service
        .get_managed_kafkas_by_cluster_id(CLUSTER_ID)
        .await
        .unwrap();

    assert_eq!(managed.len(), 1);
    assert!(managed[0].spec.oauth.is_none());
    assert!(managed[0].spec.endpoint.tls.is_none());
}
