// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orchestration layer
//!
//! [`Provisioner`] is the application backing the HTTP server.  Each
//! `start_*` method registers a job, spawns the corresponding
//! orchestration sequence onto the worker pool, and returns the pending
//! job record immediately; clients poll the job for the outcome.
//!
//! Two things bound the concurrency here: a semaphore caps how many jobs
//! converge at once, and a per-cluster-name mutex serializes jobs that
//! target the same cluster so two convergence runs can never interleave
//! their provider writes.

mod cluster;
mod disk;
mod migrate;
mod scale;

use crate::config::ProvisionerConfig;
use crate::jobs::JobRegistry;
use crate::provider::CloudProvider;
use nimbus_common::api::{
    ClusterSpec, CreateResult, DiskAttachParams, Error, JobFilter, JobRecord,
    JobStatus, JobType, LookupResult, Name,
};
use slog::{error, o, Logger};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Timing knobs for the orchestration sequences, from the config file
#[derive(Clone, Copy, Debug)]
pub(crate) struct Tuning {
    pub boot_poll_interval: Duration,
    pub boot_poll_timeout: Duration,
    pub stabilize_timeout: Duration,
}

impl From<&ProvisionerConfig> for Tuning {
    fn from(config: &ProvisionerConfig) -> Tuning {
        Tuning {
            boot_poll_interval: Duration::from_millis(
                config.boot_poll_interval_ms,
            ),
            boot_poll_timeout: Duration::from_millis(
                config.boot_poll_timeout_ms,
            ),
            stabilize_timeout: Duration::from_millis(
                config.stabilize_timeout_ms,
            ),
        }
    }
}

/// The provisioner application
pub struct Provisioner {
    log: Logger,
    project_id: String,
    provider: Arc<dyn CloudProvider>,
    jobs: JobRegistry,
    tuning: Tuning,
    /// caps the number of concurrently-running jobs
    job_slots: Arc<Semaphore>,
    /// One lock per cluster name, serializing jobs for that cluster.
    /// Entries are never reclaimed; the map holds one small entry per
    /// cluster name ever seen, like the job registry does per job.
    cluster_locks: Mutex<BTreeMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Provisioner {
    pub fn new(
        log: Logger,
        config: &ProvisionerConfig,
        provider: Arc<dyn CloudProvider>,
    ) -> Provisioner {
        Provisioner {
            jobs: JobRegistry::new(log.clone()),
            log,
            project_id: config.project_id.clone(),
            provider,
            tuning: Tuning::from(config),
            job_slots: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            cluster_locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Starts creating the cluster described by `spec` in the background.
    pub fn start_create(
        self: &Arc<Self>,
        spec: ClusterSpec,
    ) -> CreateResult<JobRecord> {
        let job = self.jobs.job_create(
            spec.name.to_string(),
            JobType::ClusterCreate,
            self.project_id.clone(),
        );
        let app = Arc::clone(self);
        let log = self.job_log(&job);
        self.spawn_job(job.id, spec.name.to_string(), async move {
            cluster::create_cluster(
                &log,
                &*app.provider,
                &app.project_id,
                &spec,
                &app.tuning,
            )
            .await
        });
        Ok(job)
    }

    /// Starts converging an existing cluster onto `spec`.  When `migrate`
    /// is set, running instances are also replaced onto the new template.
    pub fn start_update(
        self: &Arc<Self>,
        spec: ClusterSpec,
        migrate: bool,
    ) -> CreateResult<JobRecord> {
        let job = self.jobs.job_create(
            spec.name.to_string(),
            JobType::ClusterUpdate,
            self.project_id.clone(),
        );
        let app = Arc::clone(self);
        let log = self.job_log(&job);
        self.spawn_job(job.id, spec.name.to_string(), async move {
            cluster::update_cluster(
                &log,
                &*app.provider,
                &app.project_id,
                &spec,
                migrate,
                &app.tuning,
            )
            .await
        });
        Ok(job)
    }

    /// Starts replacing every instance of the cluster onto the group's
    /// current target version.
    pub fn start_migrate(
        self: &Arc<Self>,
        cluster_name: Name,
        region: String,
    ) -> CreateResult<JobRecord> {
        let job = self.jobs.job_create(
            cluster_name.to_string(),
            JobType::ClusterMigrate,
            self.project_id.clone(),
        );
        let app = Arc::clone(self);
        let log = self.job_log(&job);
        self.spawn_job(job.id, cluster_name.to_string(), async move {
            migrate::migrate_cluster(
                &log,
                &*app.provider,
                &region,
                &cluster_name,
                &app.tuning,
            )
            .await
        });
        Ok(job)
    }

    /// Starts tearing down a cluster's instance group and template.
    pub fn start_delete(
        self: &Arc<Self>,
        cluster_name: Name,
        region: String,
    ) -> CreateResult<JobRecord> {
        let job = self.jobs.job_create(
            cluster_name.to_string(),
            JobType::ClusterDelete,
            self.project_id.clone(),
        );
        let app = Arc::clone(self);
        let log = self.job_log(&job);
        self.spawn_job(job.id, cluster_name.to_string(), async move {
            cluster::delete_cluster(&log, &*app.provider, &region, &cluster_name)
                .await
        });
        Ok(job)
    }

    /// Starts creating a disk and attaching it to a running instance.
    pub fn start_attach_disk(
        self: &Arc<Self>,
        params: DiskAttachParams,
    ) -> CreateResult<JobRecord> {
        let job = self.jobs.job_create(
            params.instance_name.clone(),
            JobType::DiskAttach,
            self.project_id.clone(),
        );
        let app = Arc::clone(self);
        let log = self.job_log(&job);
        self.spawn_job(job.id, params.instance_name.clone(), async move {
            disk::attach_disk(&log, &*app.provider, &params).await
        });
        Ok(job)
    }

    pub fn job_lookup(&self, id: Uuid) -> LookupResult<JobRecord> {
        self.jobs.job_lookup(id)
    }

    pub fn jobs_list(&self, filter: &JobFilter) -> Vec<JobRecord> {
        self.jobs.jobs_list(filter)
    }

    fn job_log(&self, job: &JobRecord) -> Logger {
        self.log.new(o!(
            "job_id" => job.id.to_string(),
            "job_type" => job.job_type.to_string(),
            "cluster" => job.cluster_name.clone(),
        ))
    }

    fn cluster_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.cluster_locks.lock().unwrap();
        Arc::clone(locks.entry(name.to_owned()).or_default())
    }

    /// Runs `work` as the body of job `job_id` and records its outcome.
    ///
    /// The job is finished exactly once, here and nowhere else.
    fn spawn_job<F>(self: &Arc<Self>, job_id: Uuid, cluster_name: String, work: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let app = Arc::clone(self);
        tokio::spawn(async move {
            let _slot = app
                .job_slots
                .clone()
                .acquire_owned()
                .await
                .expect("job semaphore is never closed");
            let _serialized =
                app.cluster_lock(&cluster_name).lock_owned().await;

            let (status, message) = match work.await {
                Ok(()) => (JobStatus::Completed, None),
                Err(error) => {
                    error!(app.log, "job failed";
                        "job_id" => %job_id, "error" => %error);
                    (JobStatus::Failed, Some(error.to_string()))
                }
            };
            if let Err(error) = app.jobs.job_finish(job_id, status, message) {
                error!(app.log, "failed to record job outcome";
                    "job_id" => %job_id, "error" => %error);
            }
        });
    }
}
