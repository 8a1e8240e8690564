// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP entrypoint functions for the provisioner server

use crate::app::Provisioner;
use dropshot::{
    endpoint, ApiDescription, HttpError, HttpResponseCreated, HttpResponseOk,
    Path, Query, RequestContext, TypedBody,
};
use nimbus_common::api::{
    ClusterSpec, DiskAttachParams, Error, JobFilter, JobRecord, Name,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

type ProvisionerApiDescription = ApiDescription<Arc<Provisioner>>;

/// Returns a description of the provisioner API.
pub fn api() -> ProvisionerApiDescription {
    fn register_endpoints(
        api: &mut ProvisionerApiDescription,
    ) -> Result<(), String> {
        api.register(cluster_create)?;
        api.register(cluster_update)?;
        api.register(cluster_migrate)?;
        api.register(cluster_delete)?;
        api.register(disk_attach)?;
        api.register(job_list)?;
        api.register(job_get)?;
        Ok(())
    }

    let mut api = ProvisionerApiDescription::new();
    if let Err(err) = register_endpoints(&mut api) {
        panic!("failed to register entrypoints: {}", err);
    }
    api
}

#[derive(Deserialize, JsonSchema)]
struct ClusterPathParam {
    cluster_name: Name,
}

#[derive(Deserialize, JsonSchema)]
struct ClusterUpdateQuery {
    /// also replace running instances onto the updated template
    #[serde(default)]
    migrate: bool,
}

#[derive(Deserialize, JsonSchema)]
struct ClusterRegionQuery {
    region: String,
}

#[derive(Deserialize, JsonSchema)]
struct JobPathParam {
    job_id: Uuid,
}

/// Create a cluster.  Provisioning happens in the background; the
/// returned job tracks its outcome.
#[endpoint {
    method = POST,
    path = "/clusters",
}]
async fn cluster_create(
    rqctx: RequestContext<Arc<Provisioner>>,
    body: TypedBody<ClusterSpec>,
) -> Result<HttpResponseCreated<JobRecord>, HttpError> {
    let app = rqctx.context();
    let job = app.start_create(body.into_inner())?;
    Ok(HttpResponseCreated(job))
}

/// Update a cluster to a new definition.  With `migrate=true`, running
/// instances are also replaced onto the updated template.
#[endpoint {
    method = PUT,
    path = "/clusters/{cluster_name}",
}]
async fn cluster_update(
    rqctx: RequestContext<Arc<Provisioner>>,
    path_params: Path<ClusterPathParam>,
    query_params: Query<ClusterUpdateQuery>,
    body: TypedBody<ClusterSpec>,
) -> Result<HttpResponseCreated<JobRecord>, HttpError> {
    let app = rqctx.context();
    let path = path_params.into_inner();
    let spec = body.into_inner();
    if spec.name != path.cluster_name {
        return Err(Error::invalid_request(
            "cluster name in the path does not match the body",
        )
        .into());
    }
    let job = app.start_update(spec, query_params.into_inner().migrate)?;
    Ok(HttpResponseCreated(job))
}

/// Replace a cluster's instances onto the latest registered update.
#[endpoint {
    method = POST,
    path = "/clusters/{cluster_name}/migrate",
}]
async fn cluster_migrate(
    rqctx: RequestContext<Arc<Provisioner>>,
    path_params: Path<ClusterPathParam>,
    query_params: Query<ClusterRegionQuery>,
) -> Result<HttpResponseCreated<JobRecord>, HttpError> {
    let app = rqctx.context();
    let path = path_params.into_inner();
    let query = query_params.into_inner();
    let job = app.start_migrate(path.cluster_name, query.region)?;
    Ok(HttpResponseCreated(job))
}

/// Delete a cluster's instance group and template.
#[endpoint {
    method = DELETE,
    path = "/clusters/{cluster_name}",
}]
async fn cluster_delete(
    rqctx: RequestContext<Arc<Provisioner>>,
    path_params: Path<ClusterPathParam>,
    query_params: Query<ClusterRegionQuery>,
) -> Result<HttpResponseCreated<JobRecord>, HttpError> {
    let app = rqctx.context();
    let path = path_params.into_inner();
    let query = query_params.into_inner();
    let job = app.start_delete(path.cluster_name, query.region)?;
    Ok(HttpResponseCreated(job))
}

/// Create a disk and attach it to a running instance.
#[endpoint {
    method = POST,
    path = "/disks/attach",
}]
async fn disk_attach(
    rqctx: RequestContext<Arc<Provisioner>>,
    body: TypedBody<DiskAttachParams>,
) -> Result<HttpResponseCreated<JobRecord>, HttpError> {
    let app = rqctx.context();
    let job = app.start_attach_disk(body.into_inner())?;
    Ok(HttpResponseCreated(job))
}

/// List jobs.  Query parameters filter conjunctively.
#[endpoint {
    method = GET,
    path = "/jobs",
}]
async fn job_list(
    rqctx: RequestContext<Arc<Provisioner>>,
    query_params: Query<JobFilter>,
) -> Result<HttpResponseOk<Vec<JobRecord>>, HttpError> {
    let app = rqctx.context();
    Ok(HttpResponseOk(app.jobs_list(&query_params.into_inner())))
}

/// Fetch one job by id.
#[endpoint {
    method = GET,
    path = "/jobs/{job_id}",
}]
async fn job_get(
    rqctx: RequestContext<Arc<Provisioner>>,
    path_params: Path<JobPathParam>,
) -> Result<HttpResponseOk<JobRecord>, HttpError> {
    let app = rqctx.context();
    let job = app.job_lookup(path_params.into_inner().job_id)?;
    Ok(HttpResponseOk(job))
}
