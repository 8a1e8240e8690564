// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rolling migration engine
//!
//! Replacing a database node loses its local state, so migrations go one
//! instance at a time, lowest ordinal first (the seed before its
//! dependents), and each replacement must prove it booted before the next
//! begins.  Proof is the startup script's exit status, scraped from the
//! instance's serial console output; a non-zero status or a missing
//! report within the deadline aborts the migration and leaves the
//! remaining instances untouched.

use super::Tuning;
use crate::converge;
use crate::provider::{
    missing_after_write, CloudProvider, GroupVersion, InstanceGroup,
    InstanceTemplate, ManagedInstance,
};
use chrono::Utc;
use nimbus_common::api::{Error, Name, ResourceType};
use regex::Regex;
use slog::{debug, info, Logger};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::Instant;

/// Line the provider's guest agent writes to the serial console when the
/// startup script finishes.
static STARTUP_EXIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"startup-script-url exit status (\d+)")
        .expect("startup status pattern is valid")
});

/// Repoints `group` at `template` under a fresh version name and waits
/// for the patch to land.  With the opportunistic replacement policy this
/// changes no running instance; it only sets the target that
/// [`rolling_replace`] (or a later migration) converges members onto.
pub(crate) async fn register_template_version(
    log: &Logger,
    provider: &dyn CloudProvider,
    group: &InstanceGroup,
    template: &InstanceTemplate,
) -> Result<InstanceGroup, Error> {
    let version = GroupVersion {
        template: template.name.clone(),
        name: format!("0-{}", Utc::now().timestamp()),
    };
    info!(log, "registering group target version";
        "group" => &group.name,
        "template" => &version.template,
        "version" => &version.name);
    let operation = provider
        .group_patch_version(
            &group.region,
            &group.name,
            &version,
            &converge::group::replacement_policy(),
        )
        .await?;
    provider.wait_operation(operation).await?;
    provider.group_get(&group.region, &group.name).await?.ok_or_else(|| {
        missing_after_write(ResourceType::InstanceGroup, &group.name)
    })
}

/// Replaces every member of `group` onto the group's target version, one
/// at a time in ordinal order, verifying each replacement's boot.
pub(crate) async fn rolling_replace(
    log: &Logger,
    provider: &dyn CloudProvider,
    group: &InstanceGroup,
    tuning: &Tuning,
) -> Result<(), Error> {
    let members =
        provider.group_list_instances(&group.region, &group.name).await?;
    let mut ordered = members
        .into_iter()
        .map(|member| Ok((member.index()?, member)))
        .collect::<Result<Vec<(u32, ManagedInstance)>, Error>>()?;
    ordered.sort_by_key(|(index, _)| *index);

    info!(log, "starting rolling replacement";
        "group" => &group.name,
        "template" => &group.version.template,
        "instances" => ordered.len());
    for (_, instance) in ordered {
        info!(log, "replacing instance"; "instance" => &instance.name);
        let operation = provider
            .group_apply_update(&group.region, &group.name, &instance.name)
            .await?;
        provider.wait_operation(operation).await?;
        wait_for_startup(log, provider, &instance, tuning).await?;
    }
    info!(log, "rolling replacement finished"; "group" => &group.name);
    Ok(())
}

/// Replaces every member of the named cluster onto the group's current
/// target version (registered by an earlier update).
pub(crate) async fn migrate_cluster(
    log: &Logger,
    provider: &dyn CloudProvider,
    region: &str,
    cluster_name: &Name,
    tuning: &Tuning,
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
    rolling_replace(log, provider, &group, tuning).await
}

/// Polls the instance's serial output until the startup script reports a
/// result.  Status 0 means the node is up; anything else fails the
/// migration.  No report within `tuning.boot_poll_timeout` is a timeout.
async fn wait_for_startup(
    log: &Logger,
    provider: &dyn CloudProvider,
    instance: &ManagedInstance,
    tuning: &Tuning,
) -> Result<(), Error> {
    let deadline = Instant::now() + tuning.boot_poll_timeout;
    loop {
        tokio::time::sleep(tuning.boot_poll_interval).await;
        let output = provider
            .instance_serial_output(&instance.zone, &instance.name)
            .await?;
        match last_startup_exit_status(&output) {
            Some(0) => {
                debug!(log, "startup script succeeded";
                    "instance" => &instance.name);
                return Ok(());
            }
            Some(status) => {
                return Err(Error::operation_failed(format!(
                    "startup script on instance {:?} exited with status {}",
                    instance.name, status
                )));
            }
            None => (),
        }
        if Instant::now() >= deadline {
            return Err(timeout_error(&instance.name, tuning.boot_poll_timeout));
        }
    }
}

fn timeout_error(instance_name: &str, timeout: Duration) -> Error {
    Error::timeout(format!(
        "no startup script result from instance {:?} within {:?}",
        instance_name, timeout
    ))
}

/// Latest startup script exit status reported in `output`, if any.  The
/// console accumulates output across boots, so only the last report
/// counts.
fn last_startup_exit_status(output: &str) -> Option<u32> {
    STARTUP_EXIT_RE
        .captures_iter(output)
        .filter_map(|captures| captures[1].parse().ok())
        .last()
}
