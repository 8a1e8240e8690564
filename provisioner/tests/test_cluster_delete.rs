// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tests cluster teardown.

mod common;

use common::{cluster_spec, create_cluster, test_app, wait_for_job, REGION};
use nimbus_common::api::JobStatus;
use nimbus_provisioner::sim::SimEvent;

#[tokio::test]
async fn test_delete_removes_group_then_template() {
    let (app, provider) = test_app("test_delete_removes_group_then_template");
    create_cluster(&app, cluster_spec("db1", 2, "db1-tpl")).await;

    let job = app
        .start_delete("db1".parse().unwrap(), REGION.to_string())
        .unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.message);

    assert!(provider.group(REGION, "db1").await.is_none());
    assert!(provider.template("db1-tpl").await.is_none());

    // durable state survives: bucket, secret, keys
    assert!(provider.bucket("db1-bucket").await.is_some());
    assert_eq!(provider.secret_version_count("db1-admin-creds").await, 1);
    assert_eq!(provider.key_count().await, 1);

    // group first, template second (the other order would hit InUse)
    let events = provider.events().await;
    let group_deleted = events
        .iter()
        .position(|e| matches!(e, SimEvent::GroupDeleted { .. }))
        .unwrap();
    let template_deleted = events
        .iter()
        .position(|e| matches!(e, SimEvent::TemplateDeleted { .. }))
        .unwrap();
    assert!(group_deleted < template_deleted);
}

#[tokio::test]
async fn test_delete_missing_cluster_fails() {
    let (app, _provider) = test_app("test_delete_missing_cluster_fails");
    let job = app
        .start_delete("ghost".parse().unwrap(), REGION.to_string())
        .unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.message.unwrap().contains("not found"));
}
