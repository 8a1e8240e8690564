// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Converger for instance templates
//!
//! Templates are immutable in the provider: once created, their contents
//! never change.  Ensuring one therefore has two outcomes, and the caller
//! picks what to do with a pre-existing template: the creation sequence
//! reuses it, while the update sequence supersedes it (delete then
//! recreate).  Superseding a template that a live instance group still
//! references fails with `InUse`.

use crate::provider::{
    missing_after_write, CloudProvider, InstanceTemplate, TemplateDescription,
};
use nimbus_common::api::{Error, ResourceType};
use slog::{info, warn, Logger};

/// Outcome of [`ensure_template`]
pub enum TemplateEnsure {
    Created(InstanceTemplate),
    /// a template with this name already existed; its contents may differ
    /// from the desired description
    AlreadyExists(InstanceTemplate),
}

/// Ensures a template with this name exists.  Does not touch an existing
/// template, even a divergent one; see the module documentation.
pub async fn ensure_template(
    log: &Logger,
    provider: &dyn CloudProvider,
    name: &str,
    desired: &TemplateDescription,
) -> Result<TemplateEnsure, Error> {
    if let Some(existing) = provider.template_get(name).await? {
        if existing.description != *desired {
            warn!(log, "existing template diverges from desired contents";
                "template" => name);
        }
        return Ok(TemplateEnsure::AlreadyExists(existing));
    }

    info!(log, "creating instance template"; "template" => name);
    let operation = provider.template_create(name, desired).await?;
    provider.wait_operation(operation).await?;
    provider.template_get(name).await?.map(TemplateEnsure::Created).ok_or_else(
        || missing_after_write(ResourceType::InstanceTemplate, name),
    )
}

/// Replaces an existing template with one built from `desired`: deletes
/// the old binding, then creates a new template under the same name.
///
/// Propagates `InUse` when the template still backs an instance group; the
/// caller must either migrate the group off of it first or pick a new
/// template name.
pub async fn supersede_template(
    log: &Logger,
    provider: &dyn CloudProvider,
    name: &str,
    desired: &TemplateDescription,
) -> Result<InstanceTemplate, Error> {
    info!(log, "superseding instance template"; "template" => name);
    let operation = provider.template_delete(name).await?;
    provider.wait_operation(operation).await?;

    let operation = provider.template_create(name, desired).await?;
    provider.wait_operation(operation).await?;
    provider.template_get(name).await?.ok_or_else(|| {
        missing_after_write(ResourceType::InstanceTemplate, name)
    })
}
