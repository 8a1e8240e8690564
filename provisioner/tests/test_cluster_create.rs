// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tests the cluster creation sequence against the simulated provider.

mod common;

use common::{
    cluster_spec, create_cluster, test_app, test_app_with, test_config,
    wait_for_job, REGION,
};
use nimbus_common::api::JobStatus;
use nimbus_provisioner::sim::SimEvent;

#[tokio::test]
async fn test_create_provisions_everything() {
    let (app, provider) = test_app("test_create_provisions_everything");
    create_cluster(&app, cluster_spec("db1", 3, "db1-tpl")).await;

    // key ring and one fresh key
    assert!(provider.key_ring_exists(REGION, "key-ring-db1").await);
    assert_eq!(provider.key_count().await, 1);

    // credentials stored as one secret version
    assert_eq!(provider.secret_version_count("db1-admin-creds").await, 1);
    assert_eq!(
        provider.secret_latest_payload("db1-admin-creds").await.as_deref(),
        Some("admin:hunter2")
    );

    // bucket bound to the fresh key, scripts uploaded into it
    let bucket = provider.bucket("db1-bucket").await.unwrap();
    let bound_key = bucket.default_encryption_key.unwrap();
    assert!(bound_key.contains("key-ring-db1"), "bound to {}", bound_key);
    let startup = provider.object("db1-bucket", "scripts/startup.sh").await;
    assert!(startup.unwrap().contains("db1-admin-creds"));
    assert!(provider
        .object("db1-bucket", "scripts/shutdown.sh")
        .await
        .is_some());

    // template references the scripts and the requested machine shape
    let template = provider.template("db1-tpl").await.unwrap();
    assert_eq!(template.description.machine_type, "n2-standard-4");
    assert!(template
        .description
        .startup_script_url
        .contains("scripts/startup.sh"));

    // group at size, members in ordinal order
    let group = provider.group(REGION, "db1").await.unwrap();
    assert_eq!(group.target_size, 3);
    assert_eq!(group.version.template, "db1-tpl");
    assert_eq!(
        provider.group_member_names(REGION, "db1").await,
        vec!["db1-000", "db1-001", "db1-002"]
    );

    // non-seed members point at the seed; the seed points at nobody
    let metadata =
        provider.instance_metadata(REGION, "db1", "db1-001").await.unwrap();
    assert_eq!(
        metadata.get("seed-node-hostname").map(String::as_str),
        Some("db1-000.us-central1-a.c.sim-project.internal")
    );
    let seed_metadata =
        provider.instance_metadata(REGION, "db1", "db1-000").await.unwrap();
    assert!(seed_metadata.is_empty());

    assert!(provider.firewall("db1-firewall").await.is_some());
}

#[tokio::test]
async fn test_create_seed_before_other_members() {
    let (app, provider) = test_app("test_create_seed_before_other_members");
    create_cluster(&app, cluster_spec("db1", 3, "db1-tpl")).await;

    let events = provider.events().await;
    let creations: Vec<&SimEvent> = events
        .iter()
        .filter(|event| matches!(event, SimEvent::InstancesCreated { .. }))
        .collect();
    assert_eq!(
        creations,
        vec![
            &SimEvent::InstancesCreated {
                group: String::from("db1"),
                names: vec![String::from("db1-000")],
            },
            &SimEvent::InstancesCreated {
                group: String::from("db1"),
                names: vec![
                    String::from("db1-001"),
                    String::from("db1-002"),
                ],
            },
        ]
    );
}

#[tokio::test]
async fn test_create_size_one_is_just_the_seed() {
    let (app, provider) = test_app("test_create_size_one_is_just_the_seed");
    create_cluster(&app, cluster_spec("solo", 1, "solo-tpl")).await;
    assert_eq!(
        provider.group_member_names(REGION, "solo").await,
        vec!["solo-000"]
    );
}

#[tokio::test]
async fn test_create_twice_fails_on_existing_group() {
    let (app, provider) = test_app("test_create_twice_fails_on_existing_group");
    create_cluster(&app, cluster_spec("db1", 2, "db1-tpl")).await;

    let job = app.start_create(cluster_spec("db1", 2, "db1-tpl")).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    let message = job.message.unwrap();
    assert!(message.contains("already exists"), "message: {}", message);
    assert!(message.contains("instance group"), "message: {}", message);

    // the failed run got as far as the group gate: upstream resources
    // were re-converged (fresh key, new credentials version), and the
    // existing members were untouched
    assert_eq!(provider.key_count().await, 2);
    assert_eq!(provider.secret_version_count("db1-admin-creds").await, 2);
    assert_eq!(
        provider.group_member_names(REGION, "db1").await,
        vec!["db1-000", "db1-001"]
    );
}

#[tokio::test]
async fn test_create_waits_for_group_stability() {
    let (app, provider) = test_app("test_create_waits_for_group_stability");
    // the first few polls after creation report the group unstable
    provider.set_unstable_polls(REGION, "db1", 3).await;
    create_cluster(&app, cluster_spec("db1", 2, "db1-tpl")).await;
    assert_eq!(
        provider.group_member_names(REGION, "db1").await,
        vec!["db1-000", "db1-001"]
    );
}

#[tokio::test]
async fn test_create_fails_when_group_never_stabilizes() {
    let mut config = test_config();
    config.stabilize_timeout_ms = 300;
    let (app, provider) =
        test_app_with("test_create_fails_when_group_never_stabilizes", config);
    provider.set_unstable_polls(REGION, "db1", u32::MAX).await;

    let job = app.start_create(cluster_spec("db1", 2, "db1-tpl")).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    let message = job.message.unwrap();
    assert!(message.contains("did not stabilize"), "message: {}", message);
}
