#![allow(dead_code)]

use chrono::{Duration, Utc};
use kfm_cp_storage::*;
use kfm_models::{KafkaRequest, KafkaRequestPatch, KafkaStatus};

pub fn make_request(name: &str, owner: &str, org: &str) -> KafkaRequest {
    KafkaRequest::new(name, owner, org).with_placement("aws", "us-east-1", false)
}

async fn status_of(storage: &dyn KafkaRequestStorage, id: &str) -> KafkaStatus {
    storage.get_request(id, None).await.unwrap().unwrap().status
}

pub async fn insert_and_scoped_get(storage: &dyn KafkaRequestStorage) {
    let req = make_request("alpha", "alice", "org-a");
    storage.insert_request(&req).await.unwrap();

    let err = storage.insert_request(&req).await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));

    let found = storage.get_request(&req.id, None).await.unwrap().unwrap();
    assert_eq!(found.name, "alpha");
    assert_eq!(found.status, KafkaStatus::Accepted);

    let org_a = OwnerScope::Organisation("org-a".into());
    let org_b = OwnerScope::Organisation("org-b".into());
    assert!(storage.get_request(&req.id, Some(&org_a)).await.unwrap().is_some());
    assert!(storage.get_request(&req.id, Some(&org_b)).await.unwrap().is_none());
    let bob = OwnerScope::Owner("bob".into());
    assert!(storage.get_request(&req.id, Some(&bob)).await.unwrap().is_none());
}

pub async fn soft_delete_hides_records(storage: &dyn KafkaRequestStorage) {
    let req = make_request("gone", "alice", "org-a");
    storage.insert_request(&req).await.unwrap();
    assert_eq!(storage.count_requests(&RequestFilter::default()).await.unwrap(), 1);

    assert_eq!(storage.soft_delete_request(&req.id).await.unwrap(), 1);
    assert_eq!(storage.soft_delete_request(&req.id).await.unwrap(), 0);
    assert!(storage.get_request(&req.id, None).await.unwrap().is_none());
    assert_eq!(storage.count_requests(&RequestFilter::default()).await.unwrap(), 0);
    assert_eq!(
        storage.update_status(&req.id, KafkaStatus::Ready).await.unwrap(),
        0
    );
}

pub async fn patch_is_field_scoped(storage: &dyn KafkaRequestStorage) {
    let mut req = make_request("patchy", "alice", "org-a");
    req.failed_reason = "untouched".into();
    storage.insert_request(&req).await.unwrap();

    // a concurrent status write lands first
    storage.update_status(&req.id, KafkaStatus::Preparing).await.unwrap();

    let mut patch = KafkaRequestPatch::for_id(&req.id);
    patch.bootstrap_server_host = Some("patchy-x.kas.example.com".into());
    assert_eq!(storage.update_request(&patch).await.unwrap(), 1);

    let found = storage.get_request(&req.id, None).await.unwrap().unwrap();
    assert_eq!(found.bootstrap_server_host, "patchy-x.kas.example.com");
    assert_eq!(found.status, KafkaStatus::Preparing);
    assert_eq!(found.failed_reason, "untouched");

    // status preconditions
    let mut patch = KafkaRequestPatch::for_id(&req.id);
    patch.status = Some(KafkaStatus::Provisioning);
    patch.expected_statuses = vec![KafkaStatus::Accepted];
    assert_eq!(storage.update_request(&patch).await.unwrap(), 0);
    assert_eq!(status_of(storage, &req.id).await, KafkaStatus::Preparing);

    patch.expected_statuses = vec![KafkaStatus::Accepted, KafkaStatus::Preparing];
    assert_eq!(storage.update_request(&patch).await.unwrap(), 1);
    assert_eq!(status_of(storage, &req.id).await, KafkaStatus::Provisioning);

    // records under deletion ignore patches
    storage.update_status(&req.id, KafkaStatus::Deprovision).await.unwrap();
    let mut patch = KafkaRequestPatch::for_id(&req.id);
    patch.status = Some(KafkaStatus::Provisioning);
    assert_eq!(storage.update_request(&patch).await.unwrap(), 0);
    let found = storage.get_request(&req.id, None).await.unwrap().unwrap();
    assert_eq!(found.status, KafkaStatus::Deprovision);
}

pub async fn list_search_order_and_page(storage: &dyn KafkaRequestStorage) {
    for (name, owner, region) in [
        ("charlie", "alice", "us-east-1"),
        ("alpha", "alice", "eu-west-1"),
        ("bravo", "alice", "us-east-1"),
        ("delta", "bob", "us-east-1"),
    ] {
        let mut r = make_request(name, owner, "org-a");
        r.region = region.into();
        storage.insert_request(&r).await.unwrap();
    }

    let alice = RequestFilter::scoped(OwnerScope::Owner("alice".into()));
    assert_eq!(storage.count_requests(&alice).await.unwrap(), 3);

    let by_name = [OrderBy::asc(SortColumn::Name)];
    let page = storage
        .list_requests(&alice, &by_name, Paging { offset: 0, limit: 2 })
        .await
        .unwrap();
    let names: Vec<_> = page.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "bravo"]);

    let page = storage
        .list_requests(&alice, &by_name, Paging { offset: 2, limit: 2 })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "charlie");

    let desc = [OrderBy::desc(SortColumn::Name)];
    let page = storage
        .list_requests(&alice, &desc, Paging { offset: 0, limit: 10 })
        .await
        .unwrap();
    assert_eq!(page[0].name, "charlie");

    let searched = alice.clone().with_search(Some(
        SearchQuery::parse("region = us-east-1 and name like b%").unwrap(),
    ));
    assert_eq!(storage.count_requests(&searched).await.unwrap(), 1);
    let page = storage
        .list_requests(&searched, &by_name, Paging { offset: 0, limit: 10 })
        .await
        .unwrap();
    assert_eq!(page[0].name, "bravo");

    let org = RequestFilter::scoped(OwnerScope::Organisation("org-a".into()))
        .with_search(Some(SearchQuery::parse("owner in (bob, carol)").unwrap()));
    assert_eq!(storage.count_requests(&org).await.unwrap(), 1);

    let none = storage
        .list_requests(&alice, &by_name, Paging { offset: 0, limit: 0 })
        .await
        .unwrap();
    assert!(none.is_empty());
}

pub async fn bulk_deprovision(storage: &dyn KafkaRequestStorage) {
    let mut old = make_request("old", "alice", "org-a");
    old.created_at = Utc::now() - Duration::hours(72);
    let mut old_exempt = make_request("exempt", "alice", "org-a");
    old_exempt.created_at = Utc::now() - Duration::hours(72);
    let mut old_deleting = make_request("leaving", "bob", "org-a");
    old_deleting.created_at = Utc::now() - Duration::hours(72);
    old_deleting.status = KafkaStatus::Deleting;
    let young = make_request("young", "bob", "org-a");
    for r in [&old, &old_exempt, &old_deleting, &young] {
        storage.insert_request(r).await.unwrap();
    }

    let filter = DeprovisionFilter::created_before(
        Utc::now() - Duration::hours(48),
        vec![old_exempt.id.clone()],
    );
    assert_eq!(storage.deprovision_requests(&filter).await.unwrap(), 1);

    assert_eq!(status_of(storage, &old.id).await, KafkaStatus::Deprovision);
    assert_eq!(status_of(storage, &old_exempt.id).await, KafkaStatus::Accepted);
    assert_eq!(status_of(storage, &old_deleting.id).await, KafkaStatus::Deleting);
    assert_eq!(status_of(storage, &young.id).await, KafkaStatus::Accepted);

    // already deprovisioning rows are not counted again
    let owners = vec!["alice".to_string(), "bob".to_string()];
    assert_eq!(
        storage
            .deprovision_requests(&DeprovisionFilter::for_owners(&owners))
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        storage
            .deprovision_requests(&DeprovisionFilter::for_owners(&[]))
            .await
            .unwrap(),
        0
    );
}

pub async fn status_and_cluster_queries(storage: &dyn KafkaRequestStorage) {
    let mut a = make_request("a", "alice", "org-a");
    a.cluster_id = "c1".into();
    a.status = KafkaStatus::Ready;
    let mut b = make_request("b", "alice", "org-a");
    b.cluster_id = "c1".into();
    b.status = KafkaStatus::Accepted;
    let mut c = make_request("c", "alice", "org-a");
    c.cluster_id = "c2".into();
    c.status = KafkaStatus::Ready;
    for r in [&a, &b, &c] {
        storage.insert_request(r).await.unwrap();
    }

    let ready = storage.list_by_status(&[KafkaStatus::Ready]).await.unwrap();
    assert_eq!(ready.len(), 2);

    let on_c1 = storage
        .list_by_cluster("c1", &[KafkaStatus::Ready, KafkaStatus::Provisioning])
        .await
        .unwrap();
    assert_eq!(on_c1.len(), 1);
    assert_eq!(on_c1[0].id, a.id);

    let mut counts = storage
        .count_by_status(&[KafkaStatus::Ready, KafkaStatus::Accepted, KafkaStatus::Failed])
        .await
        .unwrap();
    counts.sort_by_key(|c| c.status.as_str());
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].status, KafkaStatus::Accepted);
    assert_eq!(counts[0].count, 1);
    assert_eq!(counts[1].status, KafkaStatus::Ready);
    assert_eq!(counts[1].count, 2);
}
