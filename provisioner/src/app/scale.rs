// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instance group scaler
//!
//! Cluster membership is explicit: we create and delete named members
//! ourselves rather than adjusting the group's target size and letting
//! the provider pick.  That keeps ordinals meaningful: the seed is
//! always instance 0, and scale-down removes the newest members first.

use crate::provider::{
    instance_name, CloudProvider, InstanceCreate, InstanceGroup,
    ManagedInstance,
};
use crate::scripts::SEED_HOSTNAME_METADATA_KEY;
use nimbus_common::api::Error;
use slog::{debug, info, Logger};
use std::collections::BTreeMap;

/// Brings `group` to `wanted` members.
pub(crate) async fn scale_to(
    log: &Logger,
    provider: &dyn CloudProvider,
    project_id: &str,
    group: &InstanceGroup,
    wanted: u32,
) -> Result<(), Error> {
    let members =
        provider.group_list_instances(&group.region, &group.name).await?;
    let current = members.len() as u32;
    if current == wanted {
        debug!(log, "group already at desired size";
            "group" => &group.name, "size" => wanted);
        return Ok(());
    }
    info!(log, "scaling group";
        "group" => &group.name, "from" => current, "to" => wanted);
    if wanted > current {
        scale_up(log, provider, project_id, group, &members, wanted).await
    } else {
        scale_down(log, provider, group, members, wanted).await
    }
}

/// Adds members up to `wanted`.
///
/// The seed (instance 0) is created alone and awaited before anything
/// else: every other member needs its hostname in metadata to find the
/// cluster.  The rest are created in one batch.
async fn scale_up(
    log: &Logger,
    provider: &dyn CloudProvider,
    project_id: &str,
    group: &InstanceGroup,
    members: &[ManagedInstance],
    wanted: u32,
) -> Result<(), Error> {
    let indices = members
        .iter()
        .map(ManagedInstance::index)
        .collect::<Result<Vec<u32>, Error>>()?;
    let mut next_index =
        indices.iter().max().map(|index| index + 1).unwrap_or(0);
    let mut remaining = wanted - members.len() as u32;

    if members.is_empty() {
        let seed = InstanceCreate {
            name: instance_name(&group.name, 0),
            metadata: BTreeMap::new(),
        };
        info!(log, "creating seed instance"; "instance" => &seed.name);
        let operation = provider
            .group_create_instances(&group.region, &group.name, &[seed])
            .await?;
        provider.wait_operation(operation).await?;
        next_index = 1;
        remaining -= 1;
    }

    if remaining > 0 {
        let seed_hostname = seed_hostname(provider, project_id, group).await?;
        let creates: Vec<InstanceCreate> = (0..remaining)
            .map(|offset| InstanceCreate {
                name: instance_name(&group.name, next_index + offset),
                metadata: BTreeMap::from([(
                    SEED_HOSTNAME_METADATA_KEY.to_owned(),
                    seed_hostname.clone(),
                )]),
            })
            .collect();
        info!(log, "creating instances";
            "group" => &group.name,
            "count" => creates.len(),
            "seed_hostname" => &seed_hostname);
        let operation = provider
            .group_create_instances(&group.region, &group.name, &creates)
            .await?;
        provider.wait_operation(operation).await?;
    }
    Ok(())
}

/// Looks up the seed member's internal hostname, handed to every other
/// member through instance metadata.
async fn seed_hostname(
    provider: &dyn CloudProvider,
    project_id: &str,
    group: &InstanceGroup,
) -> Result<String, Error> {
    let members =
        provider.group_list_instances(&group.region, &group.name).await?;
    for member in &members {
        if member.index()? == 0 {
            return Ok(member.internal_hostname(project_id));
        }
    }
    Err(Error::internal_error(&format!(
        "instance group {:?} has no seed instance",
        group.name
    )))
}

/// Removes members down to `wanted`, highest ordinal first.  The seed is
/// only ever removed when the group scales all the way to zero.
async fn scale_down(
    log: &Logger,
    provider: &dyn CloudProvider,
    group: &InstanceGroup,
    members: Vec<ManagedInstance>,
    wanted: u32,
) -> Result<(), Error> {
    let mut ordered = members
        .into_iter()
        .map(|member| Ok((member.index()?, member)))
        .collect::<Result<Vec<(u32, ManagedInstance)>, Error>>()?;
    ordered.sort_by_key(|(index, _)| std::cmp::Reverse(*index));

    let excess = ordered.len() - wanted as usize;
    let doomed: Vec<String> = ordered
        .into_iter()
        .take(excess)
        .map(|(_, member)| member.name)
        .collect();
    info!(log, "deleting instances";
        "group" => &group.name, "instances" => ?doomed);
    let operation = provider
        .group_delete_instances(&group.region, &group.name, &doomed)
        .await?;
    provider.wait_operation(operation).await
}
