// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Converger for the cluster's administrator credentials secret

use crate::provider::CloudProvider;
use nimbus_common::api::{
    AdminCredentials, Error, Name, ResourceType,
};
use slog::{debug, info, Logger};

/// Name of the secret holding a cluster's administrator credentials.
pub fn secret_name(cluster_name: &Name) -> String {
    format!("{}-admin-creds", cluster_name)
}

/// Ensures the cluster's credentials secret exists and holds the desired
/// credentials, returning the secret's name.
///
/// When `credentials` is `None` the caller intends to reuse whatever the
/// latest stored version says; the secret must then already exist, and a
/// missing one fails the run with `ObjectNotFound`.
pub async fn ensure_admin_secret(
    log: &Logger,
    provider: &dyn CloudProvider,
    cluster_name: &Name,
    credentials: Option<&AdminCredentials>,
) -> Result<String, Error> {
    let name = secret_name(cluster_name);
    let existing = provider.secret_get(&name).await?;

    let Some(credentials) = credentials else {
        return match existing {
            Some(secret) => {
                debug!(log, "reusing stored credentials";
                    "secret" => &secret.name,
                    "versions" => secret.version_count);
                Ok(name)
            }
            None => {
                Err(Error::not_found_by_name(ResourceType::Secret, &name))
            }
        };
    };

    if existing.is_none() {
        info!(log, "creating secret"; "secret" => &name);
        provider.secret_create(&name).await?;
    }
    let payload =
        format!("{}:{}", credentials.username, credentials.password);
    let secret = provider.secret_add_version(&name, &payload).await?;
    info!(log, "stored credentials version";
        "secret" => &name, "versions" => secret.version_count);
    Ok(name)
}
