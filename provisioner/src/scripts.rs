// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot scripts for cluster instances
//!
//! Instances run a startup script on every boot that installs and
//! configures the database, then either initializes a new cluster (on the
//! seed node) or joins the cluster through the seed.  Scripts are rendered
//! with the cluster's parameters bound in and uploaded to the cluster's
//! bucket; instance templates reference them by URL.
//!
//! The migration engine depends on the final line of the startup script
//! output: the provider's guest agent prints
//! `startup-script-url exit status N` to the serial console when the
//! script finishes.

use crate::provider::CloudProvider;
use nimbus_common::api::{ClusterSpec, Error};
use slog::{info, Logger};

/// Metadata key through which non-seed instances learn the seed's
/// hostname.
pub const SEED_HOSTNAME_METADATA_KEY: &str = "seed-node-hostname";

/// URLs of the uploaded boot scripts
#[derive(Clone, Debug)]
pub struct BootScripts {
    pub startup_script_url: String,
    pub shutdown_script_url: String,
}

const STARTUP_OBJECT: &str = "scripts/startup.sh";
const SHUTDOWN_OBJECT: &str = "scripts/shutdown.sh";

pub fn render_startup_script(
    cluster: &ClusterSpec,
    secret_name: &str,
) -> String {
    format!(
        r#"#!/usr/bin/env bash
set -o errexit
set -o pipefail

CLUSTER_NAME="{cluster_name}"
CLUSTER_SIZE="{cluster_size}"
ADMIN_SECRET="{secret_name}"
SEED_HOSTNAME="$(curl -sf -H 'Metadata-Flavor: Google' \
    'http://metadata/computeMetadata/v1/instance/attributes/{seed_key}' \
    || true)"

ADMIN_CREDS="$(gcloud secrets versions access latest \
    --secret="${{ADMIN_SECRET}}")"
ADMIN_USER="${{ADMIN_CREDS%%:*}}"
ADMIN_PASSWORD="${{ADMIN_CREDS#*:}}"

systemctl start couchbase-server
until curl -sf http://127.0.0.1:8091/ui/index.html >/dev/null; do
    sleep 5
done

if [[ -z "${{SEED_HOSTNAME}}" ]]; then
    # Seed node: initialize a new cluster.
    couchbase-cli cluster-init \
        --cluster-name "${{CLUSTER_NAME}}" \
        --cluster-username "${{ADMIN_USER}}" \
        --cluster-password "${{ADMIN_PASSWORD}}" \
        --services data,index,query
else
    # Joining node: add ourselves through the seed and rebalance.
    couchbase-cli server-add \
        --cluster "${{SEED_HOSTNAME}}:8091" \
        --username "${{ADMIN_USER}}" \
        --password "${{ADMIN_PASSWORD}}" \
        --server-add "$(hostname -f):8091" \
        --server-add-username "${{ADMIN_USER}}" \
        --server-add-password "${{ADMIN_PASSWORD}}"
    couchbase-cli rebalance \
        --cluster "${{SEED_HOSTNAME}}:8091" \
        --username "${{ADMIN_USER}}" \
        --password "${{ADMIN_PASSWORD}}" \
        --no-progress-bar
fi
"#,
        cluster_name = cluster.name,
        cluster_size = cluster.size,
        secret_name = secret_name,
        seed_key = SEED_HOSTNAME_METADATA_KEY,
    )
}

pub fn render_shutdown_script() -> String {
    String::from(
        r#"#!/usr/bin/env bash
# Flush and stop the database cleanly before the instance goes away.
systemctl stop couchbase-server
"#,
    )
}

/// Renders both boot scripts for `cluster` and uploads them to `bucket`,
/// returning their URLs for use in an instance template.
pub async fn upload_boot_scripts(
    log: &Logger,
    provider: &dyn CloudProvider,
    bucket: &str,
    cluster: &ClusterSpec,
    secret_name: &str,
) -> Result<BootScripts, Error> {
    let startup_script_url = provider
        .object_upload(
            bucket,
            STARTUP_OBJECT,
            &render_startup_script(cluster, secret_name),
        )
        .await?;
    let shutdown_script_url = provider
        .object_upload(bucket, SHUTDOWN_OBJECT, &render_shutdown_script())
        .await?;
    info!(log, "uploaded boot scripts";
        "bucket" => bucket,
        "startup_script_url" => &startup_script_url);
    Ok(BootScripts { startup_script_url, shutdown_script_url })
}
