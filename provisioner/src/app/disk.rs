// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk creation and attachment

use crate::provider::{CloudProvider, DiskCreate};
use nimbus_common::api::{DiskAttachParams, Error};
use slog::{info, Logger};

/// Creates a disk from the requested image and attaches it to the named
/// instance.
pub(crate) async fn attach_disk(
    log: &Logger,
    provider: &dyn CloudProvider,
    params: &DiskAttachParams,
) -> Result<(), Error> {
    let source_image = provider
        .image_from_family(&params.image_project, &params.image_family)
        .await?;
    let disk = DiskCreate {
        name: params.disk_name.to_string(),
        disk_type: params.disk_type.clone(),
        size_gb: params.size_gb,
        source_image,
    };

    info!(log, "creating disk";
        "disk" => &disk.name, "zone" => &params.zone);
    let operation = provider.disk_create(&params.zone, &disk).await?;
    provider.wait_operation(operation).await?;

    info!(log, "attaching disk";
        "disk" => &disk.name, "instance" => &params.instance_name);
    let operation = provider
        .instance_attach_disk(&params.zone, &params.instance_name, &disk.name)
        .await?;
    provider.wait_operation(operation).await
}
