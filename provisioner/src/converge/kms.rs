// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Converger for the cluster's encryption key

use crate::provider::CloudProvider;
use nimbus_common::api::{EncryptionKeyRef, Error, Name};
use slog::{debug, info, Logger};
use uuid::Uuid;

/// Ensures the cluster's key ring exists and mints a new encryption key
/// on it.
///
/// Key ids are never reused: every convergence run creates a fresh key,
/// so a retry cannot collide with a key minted by an earlier partial run.
/// Old keys stay behind on the ring; resources encrypted with them keep
/// working.
pub async fn ensure_encryption_key(
    log: &Logger,
    provider: &dyn CloudProvider,
    cluster_name: &Name,
    region: &str,
) -> Result<EncryptionKeyRef, Error> {
    let ring_id = format!("key-ring-{}", cluster_name);
    let ring = match provider.key_ring_get(region, &ring_id).await? {
        Some(ring) => {
            debug!(log, "key ring exists"; "ring_id" => &ring.id);
            ring
        }
        None => {
            info!(log, "creating key ring"; "ring_id" => &ring_id);
            provider.key_ring_create(region, &ring_id).await?
        }
    };

    let key_id =
        format!("key-{}-{}", cluster_name, Uuid::new_v4().simple());
    info!(log, "creating encryption key"; "key_id" => &key_id);
    provider.key_create(region, &ring.id, &key_id).await
}
