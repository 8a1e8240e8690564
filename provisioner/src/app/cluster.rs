// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cluster-level orchestration sequences
//!
//! Each sequence converges resources in dependency order and stops at the
//! first error.  There is no rollback: a failed run leaves whatever it
//! already converged in place, and re-running the sequence is the
//! recovery mechanism.

use super::{migrate, scale, Tuning};
use crate::converge;
use crate::converge::template::TemplateEnsure;
use crate::provider::{CloudProvider, TemplateDescription, TemplateDisk};
use crate::scripts;
use crate::scripts::BootScripts;
use nimbus_common::api::{
    ClusterSpec, EncryptionKeyRef, Error, Name, ResourceType,
};
use slog::{info, warn, Logger};

/// Creates every resource a new cluster needs, in dependency order:
/// encryption key, credentials secret, bucket, boot scripts, instance
/// template, instance group, members (seed first), firewall rule.
///
/// The sequence is idempotent up to the group: resources that survived an
/// earlier partial run are reused.  A cluster whose group already exists
/// is not recreated; that fails with `ObjectAlreadyExists`.
pub(crate) async fn create_cluster(
    log: &Logger,
    provider: &dyn CloudProvider,
    project_id: &str,
    spec: &ClusterSpec,
    tuning: &Tuning,
) -> Result<(), Error> {
    info!(log, "creating cluster";
        "size" => spec.size, "region" => &spec.region);

    let encryption_key = converge::kms::ensure_encryption_key(
        log,
        provider,
        &spec.name,
        &spec.region,
    )
    .await?;
    let secret_name = converge::secret::ensure_admin_secret(
        log,
        provider,
        &spec.name,
        spec.credentials.as_ref(),
    )
    .await?;
    let bucket = converge::storage::ensure_bucket(
        log,
        provider,
        &spec.storage.bucket,
        &spec.region,
        &encryption_key,
    )
    .await?;
    let boot_scripts = scripts::upload_boot_scripts(
        log,
        provider,
        &bucket.name,
        spec,
        &secret_name,
    )
    .await?;

    let desired =
        template_description(provider, spec, &encryption_key, &boot_scripts)
            .await?;
    let template = match converge::template::ensure_template(
        log,
        provider,
        spec.template.name.as_str(),
        &desired,
    )
    .await?
    {
        TemplateEnsure::Created(template) => template,
        TemplateEnsure::AlreadyExists(template) => {
            warn!(log, "reusing existing instance template";
                "template" => &template.name);
            template
        }
    };

    if provider.group_get(&spec.region, spec.name.as_str()).await?.is_some() {
        return Err(Error::already_exists(
            ResourceType::InstanceGroup,
            spec.name.as_str(),
        ));
    }
    let group = converge::group::create_group(
        log,
        provider,
        &spec.region,
        spec.name.as_str(),
        &template.name,
        tuning.stabilize_timeout,
    )
    .await?;

    scale::scale_to(log, provider, project_id, &group, spec.size).await?;
    converge::firewall::ensure_firewall(log, provider, &spec.name).await?;
    info!(log, "cluster created");
    Ok(())
}

/// Converges an existing cluster onto `spec`.
///
/// The cluster's instance group must already exist; everything upstream
/// of it (secret, key, bucket, scripts, template) is re-converged, the
/// group is repointed at the resulting template, instances are optionally
/// replaced onto it, the group is scaled to the desired size, and the
/// firewall rule is re-ensured.
pub(crate) async fn update_cluster(
    log: &Logger,
    provider: &dyn CloudProvider,
    project_id: &str,
    spec: &ClusterSpec,
    migrate_instances: bool,
    tuning: &Tuning,
) -> Result<(), Error> {
    info!(log, "updating cluster";
        "size" => spec.size, "migrate" => migrate_instances);

    // Gate on the group before touching anything: updating a cluster that
    // was never created must have no side effects.
    let group = provider
        .group_get(&spec.region, spec.name.as_str())
        .await?
        .ok_or_else(|| {
            Error::not_found_by_name(
                ResourceType::InstanceGroup,
                spec.name.as_str(),
            )
        })?;

    let secret_name = converge::secret::ensure_admin_secret(
        log,
        provider,
        &spec.name,
        spec.credentials.as_ref(),
    )
    .await?;
    let encryption_key = converge::kms::ensure_encryption_key(
        log,
        provider,
        &spec.name,
        &spec.region,
    )
    .await?;
    let bucket = converge::storage::ensure_bucket(
        log,
        provider,
        &spec.storage.bucket,
        &spec.region,
        &encryption_key,
    )
    .await?;
    let boot_scripts = scripts::upload_boot_scripts(
        log,
        provider,
        &bucket.name,
        spec,
        &secret_name,
    )
    .await?;

    let desired =
        template_description(provider, spec, &encryption_key, &boot_scripts)
            .await?;
    let template = match converge::template::ensure_template(
        log,
        provider,
        spec.template.name.as_str(),
        &desired,
    )
    .await?
    {
        TemplateEnsure::Created(template) => template,
        // An update means new template contents, so an existing template
        // under this name is stale and gets superseded.  `InUse` aborts
        // the run: the group must be migrated off of it (or the request
        // must pick a fresh template name) first.
        TemplateEnsure::AlreadyExists(_) => {
            converge::template::supersede_template(
                log,
                provider,
                spec.template.name.as_str(),
                &desired,
            )
            .await?
        }
    };

    let group =
        migrate::register_template_version(log, provider, &group, &template)
            .await?;
    if migrate_instances {
        migrate::rolling_replace(log, provider, &group, tuning).await?;
    }

    scale::scale_to(log, provider, project_id, &group, spec.size).await?;
    converge::firewall::ensure_firewall(log, provider, &spec.name).await?;
    info!(log, "cluster updated");
    Ok(())
}

/// Tears down a cluster: deletes its instance group (and with it every
/// member), then the now-unreferenced instance template.
///
/// The bucket, secret, and keys survive deletion on purpose: they hold
/// backups, credentials, and material that encrypted them.
pub(crate) async fn delete_cluster(
    log: &Logger,
    provider: &dyn CloudProvider,
    region: &str,
    cluster_name: &Name,
) -> Result<(), Error> {
    let group = provider
        .group_get(region, cluster_name.as_str())
        .await?
        .ok_or_else(|| {
            Error::not_found_by_name(
                ResourceType::InstanceGroup,
                cluster_name.as_str(),
            )
        })?;
    let template = group.version.template.clone();

    info!(log, "deleting cluster"; "group" => &group.name);
    let operation =
        provider.group_delete(region, cluster_name.as_str()).await?;
    provider.wait_operation(operation).await?;

    let operation = provider.template_delete(&template).await?;
    provider.wait_operation(operation).await?;
    info!(log, "cluster deleted");
    Ok(())
}

/// Renders the template contents for `spec`, resolving the image family
/// to a concrete source image.
async fn template_description(
    provider: &dyn CloudProvider,
    spec: &ClusterSpec,
    encryption_key: &EncryptionKeyRef,
    boot_scripts: &BootScripts,
) -> Result<TemplateDescription, Error> {
    let source_image = provider
        .image_from_family(
            &spec.template.image_project,
            &spec.template.image_family,
        )
        .await?;
    Ok(TemplateDescription {
        machine_type: spec.template.machine_type.clone(),
        source_image,
        disks: spec
            .template
            .disks
            .iter()
            .map(|disk| TemplateDisk {
                device_name: disk.device_name.clone(),
                disk_type: disk.disk_type.clone(),
                size_gb: disk.size_gb,
                boot: disk.boot,
            })
            .collect(),
        encryption_key: encryption_key.clone(),
        startup_script_url: boot_scripts.startup_script_url.clone(),
        shutdown_script_url: boot_scripts.shutdown_script_url.clone(),
        labels: spec.template.labels.clone(),
    })
}
