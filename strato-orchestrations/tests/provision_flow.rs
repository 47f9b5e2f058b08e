//! End-to-end orchestration flows against the in-memory control plane.

use std::sync::Arc;

use strato_models::{ResourceKind, ResourceSpec};
use strato_orchestrations::allowlist::AllowListBinder;
use strato_orchestrations::client::{NetworkApi, ProviderRegistry};
use strato_orchestrations::mock::MockProvider;
use strato_orchestrations::provision::Provisioner;
use strato_orchestrations::teardown::{Decommissioner, TeardownTarget};

fn registry_for(mock: &Arc<MockProvider>) -> ProviderRegistry {
    ProviderRegistry::new(mock.clone(), mock.clone()).register(mock.clone())
}

fn spec(yaml: &str) -> ResourceSpec {
    serde_yaml::from_str(yaml).expect("test spec should parse")
}

#[tokio::test(start_paused = true)]
async fn provisioning_walks_the_dependency_chain() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cache).with_readiness_after(2));
    let provisioner = Provisioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));

    let handle = provisioner
        .provision(&spec("kind: cache\nname: c1\nzone: z1\n"))
        .await
        .unwrap();

    assert_eq!(handle.kind, ResourceKind::Cache);
    assert_eq!(handle.name, "c1");
    assert_eq!(mock.calls("create_vpc"), 1);
    assert_eq!(mock.calls("create_subnet"), 1);
    assert_eq!(mock.calls("create_instance"), 1);

    let vpcs = NetworkApi::list_vpcs(mock.as_ref()).await.unwrap();
    assert!(vpcs.iter().any(|v| v.vpc_name == "net-c1"));
}

#[tokio::test(start_paused = true)]
async fn second_provision_reuses_the_existing_handle() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cache).with_readiness_after(2));
    let provisioner = Provisioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));
    let cache = spec("kind: cache\nname: c1\nzone: z1\n");

    let first = provisioner.provision(&cache).await.unwrap();
    let second = provisioner.provision(&cache).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.calls("create_vpc"), 1);
    assert_eq!(mock.calls("create_subnet"), 1);
    assert_eq!(mock.calls("create_instance"), 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_network_refs_skip_network_creation() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cache));
    let provisioner = Provisioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));

    let cache = spec("kind: cache\nname: c2\nzone: z1\nvpc_id: vpc-77\nsubnet_id: subnet-88\n");
    provisioner.provision(&cache).await.unwrap();

    assert_eq!(mock.calls("create_vpc"), 0);
    assert_eq!(mock.calls("create_subnet"), 0);
    assert_eq!(mock.calls("create_instance"), 1);
}

#[tokio::test(start_paused = true)]
async fn public_endpoint_is_created_once() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Database));
    let provisioner = Provisioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));

    let database = spec(
        "kind: database\nname: pg1\nzone: z1\npublic_address:\n  name: eip-pg1\n  bandwidth_mbps: 10\n",
    );
    provisioner.provision(&database).await.unwrap();
    assert_eq!(mock.calls("allocate_address"), 1);
    assert_eq!(mock.calls("create_public_endpoint"), 1);

    provisioner.provision(&database).await.unwrap();
    assert_eq!(mock.calls("allocate_address"), 1);
    assert_eq!(mock.calls("create_public_endpoint"), 1);
}

#[tokio::test(start_paused = true)]
async fn post_configuration_is_idempotent() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Database));
    let provisioner = Provisioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));

    let database = spec(
        "kind: database\n\
         name: pg1\n\
         zone: z1\n\
         accounts:\n  \
         - username: admin\n    \
         password: secret\n    \
         account_type: Super\n  \
         - username: reader\n    \
         password: secret2\n    \
         account_type: Normal\n\
         databases:\n  \
         - name: app\n    \
         owner: admin\n    \
         schemas:\n      \
         - name: core\n        \
         owner: admin\n      \
         - name: audit\n        \
         owner: admin\n\
         backup:\n  \
         retention_days: 7\n  \
         full_backup_time: \"02:00-03:00\"\n\
         parameters:\n  \
         statement_timeout: \"30s\"\n",
    );

    provisioner.provision(&database).await.unwrap();
    assert_eq!(mock.calls("create_account"), 2);
    assert_eq!(mock.calls("create_database"), 1);
    assert_eq!(mock.calls("create_schema"), 2);
    assert_eq!(mock.calls("modify_backup_policy"), 1);

    provisioner.provision(&database).await.unwrap();
    // the list-then-create sub-steps add nothing on the second run
    assert_eq!(mock.calls("create_account"), 2);
    assert_eq!(mock.calls("create_database"), 1);
    assert_eq!(mock.calls("create_schema"), 2);
    // policy and parameter modifications re-apply; they are idempotent calls
    assert_eq!(mock.calls("modify_backup_policy"), 2);
    assert_eq!(mock.calls("modify_instance_parameters"), 2);
}

#[tokio::test(start_paused = true)]
async fn cluster_provisioning_creates_node_pools() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cluster));
    let provisioner = Provisioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));

    let cluster = spec(
        "kind: cluster\n\
         name: k1\n\
         zone: z1\n\
         node_pools:\n  \
         - name: workers\n    \
         node_count: 3\n  \
         - name: ingest\n    \
         node_count: 2\n",
    );

    provisioner.provision(&cluster).await.unwrap();
    assert_eq!(mock.calls("create_node_pool"), 2);

    provisioner.provision(&cluster).await.unwrap();
    assert_eq!(mock.calls("create_node_pool"), 2);
    // clusters never touch endpoints or allow-lists
    assert_eq!(mock.calls("create_public_endpoint"), 0);
    assert_eq!(mock.calls("associate_allow_lists"), 0);
}

#[tokio::test(start_paused = true)]
async fn batch_provisioning_continues_past_failures() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cache));
    let provisioner = Provisioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));

    // the broker kind has no registered client, so its spec fails
    let specs = vec![
        spec("kind: broker\nname: kfk1\nzone: z1\n"),
        spec("kind: cache\nname: c1\nzone: z1\n"),
    ];
    let report = provisioner.provision_batch(&specs).await;

    assert!(!report.fully_succeeded());
    assert_eq!(report.outcomes.len(), 2);
    assert!(!report.outcomes[0].succeeded());
    assert!(report.outcomes[1].succeeded());
    assert_eq!(report.failed_subjects(), vec!["kfk1"]);
}

#[tokio::test(start_paused = true)]
async fn teardown_continues_past_a_failing_delete() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cache));
    let first = mock.seed_instance("a");
    let second = mock.seed_instance("b");
    let third = mock.seed_instance("c");
    mock.fail_delete_of(&second);

    let decommissioner =
        Decommissioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));
    let targets: Vec<TeardownTarget> = [&first, &second, &third]
        .into_iter()
        .map(|id| TeardownTarget {
            kind: ResourceKind::Cache,
            instance_id: id.clone(),
            eip_address: None,
        })
        .collect();

    let report = decommissioner.decommission(&targets).await;

    assert!(!report.fully_succeeded());
    assert!(report.outcomes[0].succeeded());
    assert!(!report.outcomes[1].succeeded());
    assert_eq!(report.outcomes[1].failures[0].operation, "delete instance");
    assert!(report.outcomes[2].succeeded());

    assert!(!mock.has_instance(&first));
    assert!(mock.has_instance(&second));
    assert!(!mock.has_instance(&third));
}

#[tokio::test(start_paused = true)]
async fn teardown_detaches_and_releases_the_companion_address() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cache));
    let instance = mock.seed_instance("a");
    mock.seed_address("eip-a", "203.0.113.9", Some(&instance));

    let decommissioner =
        Decommissioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));
    let report = decommissioner
        .decommission(&[TeardownTarget {
            kind: ResourceKind::Cache,
            instance_id: instance.clone(),
            eip_address: Some("203.0.113.9".to_string()),
        }])
        .await;

    assert!(report.fully_succeeded());
    assert_eq!(mock.calls("disassociate_address"), 1);
    assert_eq!(mock.calls("release_address"), 1);
    assert!(!mock.has_address("203.0.113.9"));
    assert!(!mock.has_instance(&instance));
}

#[tokio::test(start_paused = true)]
async fn teardown_unbinds_allow_lists_before_deleting() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cache));
    let instance = mock.seed_instance("a");
    let office = mock.seed_allow_list("office");
    mock.seed_binding(&instance, &office);

    let decommissioner =
        Decommissioner::new(registry_for(&mock), AllowListBinder::new(Vec::new()));
    let report = decommissioner
        .decommission(&[TeardownTarget {
            kind: ResourceKind::Cache,
            instance_id: instance.clone(),
            eip_address: None,
        }])
        .await;

    assert!(report.fully_succeeded());
    assert_eq!(mock.last_disassociated(), Some(vec![office]));
    assert!(!mock.has_instance(&instance));
}

#[tokio::test(start_paused = true)]
async fn provisioning_binds_requested_allow_lists() {
    let mock = Arc::new(MockProvider::new(ResourceKind::Cache));
    let catalog = vec![strato_models::AllowListSpec {
        name: "office".to_string(),
        description: None,
        entries: vec!["10.1.0.0/24".to_string()],
    }];
    let provisioner = Provisioner::new(registry_for(&mock), AllowListBinder::new(catalog));

    let cache = spec("kind: cache\nname: c1\nzone: z1\nallow_lists:\n  - office\n");
    provisioner.provision(&cache).await.unwrap();

    assert_eq!(mock.calls("create_allow_list"), 1);
    assert_eq!(mock.calls("associate_allow_lists"), 1);

    provisioner.provision(&cache).await.unwrap();
    // already created and bound: both counts unchanged
    assert_eq!(mock.calls("create_allow_list"), 1);
    assert_eq!(mock.calls("associate_allow_lists"), 1);
}
