// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tests the cluster update sequence: group gating, template supersede,
//! and scaling in both directions.

mod common;

use common::{
    cluster_spec, create_cluster, test_app, wait_for_job, REGION,
};
use nimbus_common::api::{EncryptionKeyRef, JobStatus};
use nimbus_provisioner::provider::{
    CloudProvider, ReplacementMethod, TemplateDescription, UpdateAction,
    UpdateMode, UpdatePolicy,
};
use nimbus_provisioner::sim::SimEvent;
use std::collections::BTreeMap;

#[tokio::test]
async fn test_update_missing_group_has_no_side_effects() {
    let (app, provider) = test_app("test_update_missing_group");
    let job =
        app.start_update(cluster_spec("ghost", 3, "ghost-tpl"), false).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    let message = job.message.unwrap();
    assert!(message.contains("not found"), "message: {}", message);

    // nothing upstream of the group gate was touched
    assert_eq!(provider.key_count().await, 0);
    assert_eq!(provider.secret_version_count("ghost-admin-creds").await, 0);
    assert!(provider.bucket("ghost-bucket").await.is_none());
    assert!(provider.template("ghost-tpl").await.is_none());
}

#[tokio::test]
async fn test_update_scale_up_points_new_members_at_seed() {
    let (app, provider) = test_app("test_update_scale_up");
    create_cluster(&app, cluster_spec("db1", 1, "tpl-a")).await;

    let job = app.start_update(cluster_spec("db1", 3, "tpl-b"), false).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.message);

    assert_eq!(
        provider.group_member_names(REGION, "db1").await,
        vec!["db1-000", "db1-001", "db1-002"]
    );
    let metadata =
        provider.instance_metadata(REGION, "db1", "db1-002").await.unwrap();
    assert_eq!(
        metadata.get("seed-node-hostname").map(String::as_str),
        Some("db1-000.us-central1-a.c.sim-project.internal")
    );

    // the group now targets the new template; without `migrate` no
    // running instance was replaced
    let group = provider.group(REGION, "db1").await.unwrap();
    assert_eq!(group.version.template, "tpl-b");
    let events = provider.events().await;
    assert!(!events
        .iter()
        .any(|e| matches!(e, SimEvent::InstanceUpdateApplied { .. })));
}

#[tokio::test]
async fn test_update_scale_down_removes_highest_ordinals_first() {
    let (app, provider) = test_app("test_update_scale_down");
    create_cluster(&app, cluster_spec("db1", 4, "tpl-a")).await;

    let job = app.start_update(cluster_spec("db1", 2, "tpl-b"), false).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.message);

    assert_eq!(
        provider.group_member_names(REGION, "db1").await,
        vec!["db1-000", "db1-001"]
    );
    let events = provider.events().await;
    assert!(events.contains(&SimEvent::InstancesDeleted {
        group: String::from("db1"),
        names: vec![String::from("db1-003"), String::from("db1-002")],
    }));
}

#[tokio::test]
async fn test_update_same_template_name_fails_in_use() {
    let (app, provider) = test_app("test_update_same_template_in_use");
    create_cluster(&app, cluster_spec("db1", 2, "db1-tpl")).await;

    // superseding "db1-tpl" requires deleting it, but the live group
    // still references it
    let job =
        app.start_update(cluster_spec("db1", 2, "db1-tpl"), false).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    let message = job.message.unwrap();
    assert!(message.contains("in use"), "message: {}", message);

    // the template and the members survived the refused supersede
    assert!(provider.template("db1-tpl").await.is_some());
    assert_eq!(
        provider.group_member_names(REGION, "db1").await,
        vec!["db1-000", "db1-001"]
    );
}

#[tokio::test]
async fn test_update_ensures_firewall_rule() {
    let (app, provider) = test_app("test_update_firewall");

    // Stand up a bare group directly, as if an earlier create run died
    // before reaching its firewall step.
    let description = TemplateDescription {
        machine_type: String::from("n2-standard-4"),
        source_image: String::from(
            "projects/couchbase-public/global/images/family/couchbase-7",
        ),
        disks: Vec::new(),
        encryption_key: EncryptionKeyRef {
            region: String::from(REGION),
            key_ring_id: String::from("key-ring-db1"),
            key_id: String::from("key-db1-0"),
        },
        startup_script_url: String::from("gs://db1-bucket/scripts/startup.sh"),
        shutdown_script_url: String::from(
            "gs://db1-bucket/scripts/shutdown.sh",
        ),
        labels: BTreeMap::new(),
    };
    let operation =
        provider.template_create("tpl-a", &description).await.unwrap();
    provider.wait_operation(operation).await.unwrap();
    let policy = UpdatePolicy {
        minimal_action: UpdateAction::Replace,
        replacement_method: ReplacementMethod::Recreate,
        mode: UpdateMode::Opportunistic,
        max_surge: 0,
    };
    let operation = provider
        .group_create(REGION, "db1", "tpl-a", 0, &policy)
        .await
        .unwrap();
    provider.wait_operation(operation).await.unwrap();
    assert!(provider.firewall("db1-firewall").await.is_none());

    let job = app.start_update(cluster_spec("db1", 2, "tpl-b"), false).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.message);

    let rule = provider
        .firewall("db1-firewall")
        .await
        .expect("update ensures the firewall rule");
    assert!(rule.target_tags.contains(&String::from("db1")));
}

#[tokio::test]
async fn test_update_scale_up_without_seed_fails() {
    let (app, provider) = test_app("test_update_no_seed");
    create_cluster(&app, cluster_spec("db1", 2, "tpl-a")).await;

    // lose the seed out from under the group
    let operation = provider
        .group_delete_instances(REGION, "db1", &[String::from("db1-000")])
        .await
        .unwrap();
    provider.wait_operation(operation).await.unwrap();

    // scaling up needs the seed hostname for member metadata
    let job = app.start_update(cluster_spec("db1", 3, "tpl-b"), false).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    let message = job.message.unwrap();
    assert!(message.contains("no seed instance"), "message: {}", message);
}

#[tokio::test]
async fn test_update_without_credentials_reuses_stored_ones() {
    let (app, provider) = test_app("test_update_reuses_credentials");
    create_cluster(&app, cluster_spec("db1", 1, "tpl-a")).await;
    assert_eq!(provider.secret_version_count("db1-admin-creds").await, 1);

    let mut spec = cluster_spec("db1", 2, "tpl-b");
    spec.credentials = None;
    let job = app.start_update(spec, false).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.message);

    // no new version was written
    assert_eq!(provider.secret_version_count("db1-admin-creds").await, 1);
}
