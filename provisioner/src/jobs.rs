// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory registry of background jobs
//!
//! Every long-running request spawns a job; clients poll the registry to
//! learn how it went.  The registry is process-local and not persistent:
//! restarting the server forgets all job history (the clusters themselves
//! are unaffected).

use chrono::Utc;
use nimbus_common::api::{
    Error, JobFilter, JobRecord, JobStatus, JobType, LookupResult,
    ResourceType,
};
use slog::{info, o, Logger};
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

pub struct JobRegistry {
    log: Logger,
    jobs: Mutex<BTreeMap<Uuid, JobRecord>>,
}

impl JobRegistry {
    pub fn new(log: Logger) -> JobRegistry {
        JobRegistry {
            log: log.new(o!("component" => "JobRegistry")),
            jobs: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers a new pending job and returns its record.
    pub fn job_create(
        &self,
        cluster_name: String,
        job_type: JobType,
        project_id: String,
    ) -> JobRecord {
        let record = JobRecord {
            id: Uuid::new_v4(),
            cluster_name,
            job_type,
            status: JobStatus::Pending,
            message: None,
            project_id,
            time_created: Utc::now(),
        };
        info!(self.log, "job created";
            "job_id" => %record.id,
            "job_type" => %record.job_type,
            "cluster" => &record.cluster_name);
        let mut jobs = self.jobs.lock().unwrap();
        jobs.insert(record.id, record.clone());
        record
    }

    /// Moves a pending job to a terminal state.  Each job is finished
    /// exactly once; a second call is a caller bug and fails.
    pub fn job_finish(
        &self,
        id: Uuid,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<(), Error> {
        let mut jobs = self.jobs.lock().unwrap();
        let record = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::not_found_by_id(ResourceType::Job, &id))?;
        if record.status != JobStatus::Pending {
            return Err(Error::internal_error(&format!(
                "job {} finished twice (was {:?})",
                id, record.status
            )));
        }
        record.status = status;
        record.message = message;
        info!(self.log, "job finished";
            "job_id" => %id, "status" => ?status);
        Ok(())
    }

    pub fn job_lookup(&self, id: Uuid) -> LookupResult<JobRecord> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found_by_id(ResourceType::Job, &id))
    }

    /// Lists jobs matching every field present in `filter`, oldest first.
    pub fn jobs_list(&self, filter: &JobFilter) -> Vec<JobRecord> {
        let jobs = self.jobs.lock().unwrap();
        let mut matched: Vec<JobRecord> = jobs
            .values()
            .filter(|job| {
                filter.status.map_or(true, |status| job.status == status)
                    && filter
                        .job_type
                        .map_or(true, |job_type| job.job_type == job_type)
                    && filter
                        .cluster_name
                        .as_ref()
                        .map_or(true, |name| &job.cluster_name == name)
                    && filter
                        .project_id
                        .as_ref()
                        .map_or(true, |project| &job.project_id == project)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|job| job.time_created);
        matched
    }
}

#[cfg(test)]
mod test {
    use super::JobRegistry;
    use nimbus_common::api::{Error, JobFilter, JobStatus, JobType};
    use uuid::Uuid;

    fn registry() -> JobRegistry {
        JobRegistry::new(slog::Logger::root(slog::Discard, slog::o!()))
    }

    #[test]
    fn test_job_lifecycle() {
        let registry = registry();
        let job = registry.job_create(
            String::from("db1"),
            JobType::ClusterCreate,
            String::from("proj"),
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.message.is_none());

        registry
            .job_finish(job.id, JobStatus::Failed, Some(String::from("boom")))
            .unwrap();
        let found = registry.job_lookup(job.id).unwrap();
        assert_eq!(found.status, JobStatus::Failed);
        assert_eq!(found.message.as_deref(), Some("boom"));

        // terminal means terminal
        let error = registry
            .job_finish(job.id, JobStatus::Completed, None)
            .unwrap_err();
        assert!(matches!(error, Error::InternalError { .. }));
    }

    #[test]
    fn test_job_lookup_missing() {
        let registry = registry();
        assert!(matches!(
            registry.job_lookup(Uuid::new_v4()).unwrap_err(),
            Error::ObjectNotFound { .. }
        ));
    }

    #[test]
    fn test_jobs_list_filters_conjunctively() {
        let registry = registry();
        let create_db1 = registry.job_create(
            String::from("db1"),
            JobType::ClusterCreate,
            String::from("proj"),
        );
        let update_db1 = registry.job_create(
            String::from("db1"),
            JobType::ClusterUpdate,
            String::from("proj"),
        );
        let create_db2 = registry.job_create(
            String::from("db2"),
            JobType::ClusterCreate,
            String::from("other-proj"),
        );
        registry
            .job_finish(create_db1.id, JobStatus::Completed, None)
            .unwrap();

        // no filter: everything
        assert_eq!(registry.jobs_list(&JobFilter::default()).len(), 3);

        // single fields
        let filter = JobFilter {
            status: Some(JobStatus::Pending),
            ..Default::default()
        };
        let pending = registry.jobs_list(&filter);
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|j| j.status == JobStatus::Pending));

        let filter = JobFilter {
            cluster_name: Some(String::from("db2")),
            ..Default::default()
        };
        assert_eq!(registry.jobs_list(&filter)[0].id, create_db2.id);

        // conjunction: each field narrows further
        let filter = JobFilter {
            status: Some(JobStatus::Pending),
            job_type: Some(JobType::ClusterUpdate),
            cluster_name: Some(String::from("db1")),
            project_id: Some(String::from("proj")),
        };
        let matched = registry.jobs_list(&filter);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, update_db1.id);

        // a conjunct that matches nothing empties the result
        let filter = JobFilter {
            status: Some(JobStatus::Completed),
            cluster_name: Some(String::from("db2")),
            ..Default::default()
        };
        assert!(registry.jobs_list(&filter).is_empty());
    }
}
