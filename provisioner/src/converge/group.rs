// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Converger for managed instance groups

use crate::provider::{
    CloudProvider, InstanceGroup, ReplacementMethod, UpdateAction, UpdateMode,
    UpdatePolicy,
};
use nimbus_common::api::Error;
use nimbus_common::backoff::{self, BackoffError};
use slog::{info, warn, Logger};
use std::time::Duration;

/// The one update policy we ever give an instance group
///
/// Opportunistic mode keeps the group from replacing members on its own;
/// the migration engine replaces them one at a time.  Recreate keeps
/// instance names (and so ordinals) stable across replacement, and a max
/// surge of zero means a member is torn down before its replacement
/// appears, which is what a database node with node-local state needs.
pub fn replacement_policy() -> UpdatePolicy {
    UpdatePolicy {
        minimal_action: UpdateAction::Replace,
        replacement_method: ReplacementMethod::Recreate,
        mode: UpdateMode::Opportunistic,
        max_surge: 0,
    }
}

/// Creates an instance group with no members and waits for it to
/// stabilize.
///
/// The group starts empty on purpose: members are added one seed first,
/// then the rest, by the scaler.  Letting the group itself create members
/// would race the seed-discovery metadata.
pub async fn create_group(
    log: &Logger,
    provider: &dyn CloudProvider,
    region: &str,
    name: &str,
    template: &str,
    stabilize_timeout: Duration,
) -> Result<InstanceGroup, Error> {
    info!(log, "creating instance group";
        "group" => name, "template" => template);
    let operation = provider
        .group_create(region, name, template, 0, &replacement_policy())
        .await?;
    provider.wait_operation(operation).await?;
    wait_for_stable(log, provider, region, name, stabilize_timeout).await
}

/// Polls the group until the provider reports it stable, giving up after
/// `timeout`.
pub async fn wait_for_stable(
    log: &Logger,
    provider: &dyn CloudProvider,
    region: &str,
    name: &str,
    timeout: Duration,
) -> Result<InstanceGroup, Error> {
    let result = backoff::retry_notify(
        backoff::provider_poll_policy_bounded(timeout),
        || async {
            match provider.group_get(region, name).await {
                Ok(Some(group)) if group.stable => Ok(group),
                Ok(_) => Err(BackoffError::transient(Error::unavail(
                    "instance group not yet stable",
                ))),
                Err(error) => Err(BackoffError::permanent(error)),
            }
        },
        |error: Error, delay| {
            warn!(log, "instance group not yet stable, will retry";
                "group" => name,
                "retry_after" => ?delay,
                "error" => %error);
        },
    )
    .await;

    match result {
        Ok(group) => Ok(group),
        // backoff exhaustion surfaces the last transient error
        Err(Error::ServiceUnavailable { .. }) => Err(Error::timeout(format!(
            "instance group {:?} did not stabilize within {:?}",
            name, timeout
        ))),
        Err(error) => Err(error),
    }
}
