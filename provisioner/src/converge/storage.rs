// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Converger for the cluster's storage bucket

use crate::provider::{Bucket, CloudProvider};
use nimbus_common::api::{EncryptionKeyRef, Error};
use slog::{debug, info, Logger};

/// Ensures the bucket exists and that its default encryption key is
/// `encryption_key`.
///
/// Buckets are mutable in place: an existing bucket bound to a stale key
/// is rebound rather than recreated.  Since each convergence run mints a
/// fresh key, an existing bucket is always rebound here.
pub async fn ensure_bucket(
    log: &Logger,
    provider: &dyn CloudProvider,
    bucket_name: &str,
    region: &str,
    encryption_key: &EncryptionKeyRef,
) -> Result<Bucket, Error> {
    let desired_key = encryption_key.resource_id();
    match provider.bucket_get(bucket_name).await? {
        None => {
            info!(log, "creating bucket"; "bucket" => bucket_name);
            provider.bucket_create(bucket_name, region, encryption_key).await
        }
        Some(bucket)
            if bucket.default_encryption_key.as_deref()
                == Some(desired_key.as_str()) =>
        {
            debug!(log, "bucket already converged"; "bucket" => bucket_name);
            Ok(bucket)
        }
        Some(_) => {
            info!(log, "rebinding bucket encryption key";
                "bucket" => bucket_name, "key" => &desired_key);
            provider
                .bucket_set_encryption_key(bucket_name, encryption_key)
                .await
        }
    }
}
