// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tests disk creation and attachment.

mod common;

use common::{cluster_spec, create_cluster, test_app, wait_for_job};
use nimbus_common::api::{DiskAttachParams, JobStatus};

fn attach_params() -> DiskAttachParams {
    DiskAttachParams {
        zone: String::from("us-central1-a"),
        instance_name: String::from("db1-000"),
        disk_name: "db1-data".parse().unwrap(),
        disk_type: String::from("pd-ssd"),
        size_gb: 200,
        image_family: String::from("couchbase-data"),
        image_project: String::from("couchbase-public"),
    }
}

#[tokio::test]
async fn test_attach_disk() {
    let (app, provider) = test_app("test_attach_disk");
    create_cluster(&app, cluster_spec("db1", 1, "db1-tpl")).await;

    let job = app.start_attach_disk(attach_params()).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.message);
    assert_eq!(job.cluster_name, "db1-000");

    let disk = provider.disk("us-central1-a", "db1-data").await.unwrap();
    assert_eq!(disk.size_gb, 200);
    assert!(disk.source_image.contains("couchbase-data"));
    assert!(provider.disk_attached("db1-000", "db1-data").await);
}

#[tokio::test]
async fn test_attach_disk_twice_fails() {
    let (app, provider) = test_app("test_attach_disk_twice_fails");
    create_cluster(&app, cluster_spec("db1", 1, "db1-tpl")).await;

    let job = app.start_attach_disk(attach_params()).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.message);

    // the disk name is taken now
    let job = app.start_attach_disk(attach_params()).unwrap();
    let job = wait_for_job(&app, job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.message.unwrap().contains("already exists"));
    assert!(provider.disk("us-central1-a", "db1-data").await.is_some());
}
