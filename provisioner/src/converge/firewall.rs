// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Converger for the cluster's firewall rule

use crate::provider::{CloudProvider, FirewallRule};
use nimbus_common::api::{Error, Name};
use slog::{debug, info, Logger};

/// TCP ports Couchbase nodes use to talk to each other (and to clients on
/// the internal network): cluster administration, data service, XDCR, and
/// the Erlang node-to-node range.
const COUCHBASE_PORTS: &[&str] =
    &["4369", "8091-8096", "11207", "11209-11211", "18091-18096", "21100-21299"];

/// Source range covering the provider's internal network.
const INTERNAL_SOURCE_RANGE: &str = "10.128.0.0/9";

/// Ensures the cluster's firewall rule exists.
///
/// The rule is existence-checked only: once created it is never compared
/// against the desired definition or updated.
pub async fn ensure_firewall(
    log: &Logger,
    provider: &dyn CloudProvider,
    cluster_name: &Name,
) -> Result<FirewallRule, Error> {
    let name = format!("{}-firewall", cluster_name);
    if let Some(rule) = provider.firewall_get(&name).await? {
        debug!(log, "firewall rule exists"; "rule" => &name);
        return Ok(rule);
    }

    info!(log, "creating firewall rule"; "rule" => &name);
    let rule = FirewallRule {
        name,
        allowed_ports: COUCHBASE_PORTS
            .iter()
            .map(|port| String::from(*port))
            .collect(),
        source_ranges: vec![String::from(INTERNAL_SOURCE_RANGE)],
        target_tags: vec![cluster_name.to_string()],
    };
    let operation = provider.firewall_create(&rule).await?;
    provider.wait_operation(operation).await?;
    Ok(rule)
}
