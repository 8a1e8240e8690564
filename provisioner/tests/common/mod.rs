// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared test facilities: a provisioner wired to the simulated provider,
//! cluster spec builders, and job polling.

// not every test binary uses every helper
#![allow(dead_code)]

use dropshot::{ConfigLogging, ConfigLoggingLevel};
use nimbus_common::api::{
    AdminCredentials, ClusterSpec, DiskParams, JobRecord, JobStatus, Name,
    StorageParams, TemplateParams,
};
use nimbus_provisioner::app::Provisioner;
use nimbus_provisioner::config::ProvisionerConfig;
use nimbus_provisioner::provider::CloudProvider;
use nimbus_provisioner::sim::SimProvider;
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const PROJECT_ID: &str = "sim-project";
pub const REGION: &str = "us-central1";

pub fn test_logger(test_name: &str) -> Logger {
    let config =
        ConfigLogging::StderrTerminal { level: ConfigLoggingLevel::Info };
    config.to_logger(test_name).expect("failed to create logger")
}

/// Config with tight timing so tests that poll or time out finish fast.
pub fn test_config() -> ProvisionerConfig {
    ProvisionerConfig {
        project_id: PROJECT_ID.to_string(),
        max_concurrent_jobs: 4,
        boot_poll_interval_ms: 5,
        boot_poll_timeout_ms: 1_000,
        stabilize_timeout_ms: 5_000,
    }
}

pub fn test_app(test_name: &str) -> (Arc<Provisioner>, Arc<SimProvider>) {
    test_app_with(test_name, test_config())
}

pub fn test_app_with(
    test_name: &str,
    config: ProvisionerConfig,
) -> (Arc<Provisioner>, Arc<SimProvider>) {
    let log = test_logger(test_name);
    let provider = Arc::new(SimProvider::new(
        log.new(slog::o!("component" => "SimProvider")),
    ));
    let app = Arc::new(Provisioner::new(
        log,
        &config,
        Arc::clone(&provider) as Arc<dyn CloudProvider>,
    ));
    (app, provider)
}

pub fn cluster_spec(name: &str, size: u32, template: &str) -> ClusterSpec {
    ClusterSpec {
        name: name.parse::<Name>().unwrap(),
        size,
        region: REGION.to_string(),
        storage: StorageParams { bucket: format!("{}-bucket", name) },
        template: TemplateParams {
            name: template.parse::<Name>().unwrap(),
            machine_type: String::from("n2-standard-4"),
            image_family: String::from("couchbase-7"),
            image_project: String::from("couchbase-public"),
            disks: vec![DiskParams {
                device_name: String::from("boot"),
                disk_type: String::from("pd-ssd"),
                size_gb: 100,
                boot: true,
            }],
            labels: Default::default(),
        },
        credentials: Some(AdminCredentials {
            username: String::from("admin"),
            password: String::from("hunter2"),
        }),
    }
}

/// Polls until the job reaches a terminal state.
pub async fn wait_for_job(app: &Arc<Provisioner>, job_id: Uuid) -> JobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let job = app.job_lookup(job_id).expect("job was registered");
        if job.status != JobStatus::Pending {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} still pending after 30s",
            job_id
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Starts a cluster creation and waits for it to complete.
pub async fn create_cluster(
    app: &Arc<Provisioner>,
    spec: ClusterSpec,
) -> JobRecord {
    let job = app.start_create(spec).unwrap();
    let finished = wait_for_job(app, job.id).await;
    assert_eq!(
        finished.status,
        JobStatus::Completed,
        "cluster creation failed: {:?}",
        finished.message
    );
    finished
}
