// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the cloud infrastructure provider
//!
//! Everything the provisioner does to the outside world goes through
//! [`CloudProvider`].  The trait deliberately mirrors the shape of the
//! underlying cloud APIs: cheap reads return handles directly, while
//! mutations of compute resources return an [`Operation`] that the caller
//! waits on with [`CloudProvider::wait_operation`].
//!
//! Lookups return `Ok(None)` when the resource does not exist.  Absence is
//! an ordinary branch for the convergers, not a failure; only lookups
//! whose target must already exist (e.g. resolving an image family) report
//! absence as an error.

use async_trait::async_trait;
use nimbus_common::api::{
    CreateResult, EncryptionKeyRef, Error, ListResult, LookupResult,
    ResourceType, UpdateResult,
};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Opaque handle to a long-running provider operation
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Operation {
    pub id: Uuid,
}

/// Handle to a key ring in the provider's key management service
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRing {
    pub id: String,
    pub region: String,
}

/// Handle to a secret (a named container for versioned payloads)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Secret {
    pub name: String,
    /// number of payload versions stored so far
    pub version_count: u64,
}

/// Handle to an object storage bucket
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bucket {
    pub name: String,
    pub region: String,
    /// fully-qualified id of the bucket's default encryption key, if set
    pub default_encryption_key: Option<String>,
}

/// Full description of an instance template's contents
///
/// Two templates with equal descriptions are interchangeable; inequality
/// against the desired description is what makes an existing template
/// divergent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TemplateDescription {
    pub machine_type: String,
    pub source_image: String,
    pub disks: Vec<TemplateDisk>,
    pub encryption_key: EncryptionKeyRef,
    pub startup_script_url: String,
    pub shutdown_script_url: String,
    pub labels: BTreeMap<String, String>,
}

/// One disk within a [`TemplateDescription`]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TemplateDisk {
    pub device_name: String,
    pub disk_type: String,
    pub size_gb: u64,
    pub boot: bool,
}

/// Handle to an instance template
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceTemplate {
    pub name: String,
    pub description: TemplateDescription,
}

/// The template version an instance group is converging its members onto
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupVersion {
    /// name of the instance template
    pub template: String,
    /// provider-visible label for this version
    pub name: String,
}

/// How an instance group replaces members when its version changes
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpdatePolicy {
    pub minimal_action: UpdateAction,
    pub replacement_method: ReplacementMethod,
    pub mode: UpdateMode,
    /// number of instances the group may create above its target size
    /// while replacing members
    pub max_surge: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateAction {
    Replace,
    Restart,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplacementMethod {
    /// replacement instances keep the name of the instance they replace
    Recreate,
    /// replacement instances get fresh names
    Substitute,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateMode {
    /// members are only replaced when explicitly selected
    Opportunistic,
    /// the group replaces members on its own
    Proactive,
}

/// Handle to a managed instance group
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceGroup {
    pub name: String,
    pub region: String,
    pub version: GroupVersion,
    pub target_size: u32,
    /// whether all members match the target version and none are mid-change
    pub stable: bool,
    pub update_policy: UpdatePolicy,
}

/// Handle to one member of a managed instance group
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManagedInstance {
    pub name: String,
    pub zone: String,
}

impl ManagedInstance {
    /// Ordinal of this instance within its group, parsed from the trailing
    /// component of its name (e.g. 4 for "db1-004").
    pub fn index(&self) -> Result<u32, Error> {
        instance_index(&self.name)
    }

    /// Provider-internal DNS name for this instance.
    pub fn internal_hostname(&self, project_id: &str) -> String {
        format!("{}.{}.c.{}.internal", self.name, self.zone, project_id)
    }
}

/// Parameters for creating one specific member of an instance group
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceCreate {
    pub name: String,
    pub metadata: BTreeMap<String, String>,
}

/// Handle to (and full definition of) a firewall rule
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FirewallRule {
    pub name: String,
    /// TCP ports or port ranges ("4369", "8091-8096")
    pub allowed_ports: Vec<String>,
    pub source_ranges: Vec<String>,
    pub target_tags: Vec<String>,
}

/// Parameters for creating a standalone disk from an image
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskCreate {
    pub name: String,
    pub disk_type: String,
    pub size_gb: u64,
    pub source_image: String,
}

/// Name of the `index`th member of instance group `group`.
///
/// Member names carry a three-digit ordinal suffix.  Index 0 is the seed
/// node: it is created first and the rest of the cluster is pointed at it.
pub fn instance_name(group: &str, index: u32) -> String {
    format!("{}-{:03}", group, index)
}

/// Inverse of [`instance_name`].
pub fn instance_index(name: &str) -> Result<u32, Error> {
    let (_, ordinal) = name.rsplit_once('-').ok_or_else(|| {
        Error::internal_error(&format!(
            "instance name has no ordinal suffix: {:?}",
            name
        ))
    })?;
    ordinal.parse().map_err(|_| {
        Error::internal_error(&format!(
            "instance name has a non-numeric ordinal suffix: {:?}",
            name
        ))
    })
}

/// Interface to the cloud provider hosting the clusters we manage
///
/// The production implementation speaks to real cloud APIs; the
/// implementation in [`crate::sim`] keeps everything in memory.  Callers
/// hold a `&dyn CloudProvider` and must not assume anything about latency
/// or ordering beyond what each method documents.
#[async_trait]
pub trait CloudProvider: Send + Sync + 'static {
    /// Waits for a previously-submitted operation to finish and reports
    /// its outcome.
    async fn wait_operation(&self, operation: Operation) -> Result<(), Error>;

    // Key management service

    async fn key_ring_get(
        &self,
        region: &str,
        ring_id: &str,
    ) -> Result<Option<KeyRing>, Error>;

    async fn key_ring_create(
        &self,
        region: &str,
        ring_id: &str,
    ) -> CreateResult<KeyRing>;

    async fn key_create(
        &self,
        region: &str,
        ring_id: &str,
        key_id: &str,
    ) -> CreateResult<EncryptionKeyRef>;

    // Secret manager

    async fn secret_get(&self, name: &str) -> Result<Option<Secret>, Error>;

    async fn secret_create(&self, name: &str) -> CreateResult<Secret>;

    /// Adds a new payload version to an existing secret.
    async fn secret_add_version(
        &self,
        name: &str,
        payload: &str,
    ) -> UpdateResult<Secret>;

    // Object storage

    async fn bucket_get(&self, name: &str) -> Result<Option<Bucket>, Error>;

    async fn bucket_create(
        &self,
        name: &str,
        region: &str,
        encryption_key: &EncryptionKeyRef,
    ) -> CreateResult<Bucket>;

    async fn bucket_set_encryption_key(
        &self,
        name: &str,
        encryption_key: &EncryptionKeyRef,
    ) -> UpdateResult<Bucket>;

    /// Uploads an object and returns its URL.
    async fn object_upload(
        &self,
        bucket: &str,
        object_name: &str,
        contents: &str,
    ) -> CreateResult<String>;

    // Images

    /// Resolves an image family to the self-link of its latest image.
    /// Unlike resource lookups, a missing family is an error: nothing can
    /// be built without the image.
    async fn image_from_family(
        &self,
        image_project: &str,
        image_family: &str,
    ) -> LookupResult<String>;

    // Instance templates

    async fn template_get(
        &self,
        name: &str,
    ) -> Result<Option<InstanceTemplate>, Error>;

    async fn template_create(
        &self,
        name: &str,
        description: &TemplateDescription,
    ) -> Result<Operation, Error>;

    /// Deletes a template.  The operation fails with
    /// [`Error::InUse`] if any instance group still references it.
    async fn template_delete(&self, name: &str) -> Result<Operation, Error>;

    // Managed instance groups

    async fn group_get(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<InstanceGroup>, Error>;

    async fn group_create(
        &self,
        region: &str,
        name: &str,
        template: &str,
        target_size: u32,
        update_policy: &UpdatePolicy,
    ) -> Result<Operation, Error>;

    /// Repoints the group at a new target version.  With an opportunistic
    /// update policy this changes no running instance by itself.
    async fn group_patch_version(
        &self,
        region: &str,
        name: &str,
        version: &GroupVersion,
        update_policy: &UpdatePolicy,
    ) -> Result<Operation, Error>;

    async fn group_delete(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Operation, Error>;

    async fn group_list_instances(
        &self,
        region: &str,
        name: &str,
    ) -> ListResult<ManagedInstance>;

    async fn group_create_instances(
        &self,
        region: &str,
        name: &str,
        instances: &[InstanceCreate],
    ) -> Result<Operation, Error>;

    async fn group_delete_instances(
        &self,
        region: &str,
        name: &str,
        instance_names: &[String],
    ) -> Result<Operation, Error>;

    /// Applies the group's target version to one named member, replacing
    /// it per the group's update policy.
    async fn group_apply_update(
        &self,
        region: &str,
        name: &str,
        instance_name: &str,
    ) -> Result<Operation, Error>;

    // Instances

    /// Returns the accumulated serial port output of an instance.
    async fn instance_serial_output(
        &self,
        zone: &str,
        instance_name: &str,
    ) -> LookupResult<String>;

    async fn instance_attach_disk(
        &self,
        zone: &str,
        instance_name: &str,
        disk_name: &str,
    ) -> Result<Operation, Error>;

    // Disks

    async fn disk_create(
        &self,
        zone: &str,
        disk: &DiskCreate,
    ) -> Result<Operation, Error>;

    // Firewall

    async fn firewall_get(
        &self,
        name: &str,
    ) -> Result<Option<FirewallRule>, Error>;

    async fn firewall_create(
        &self,
        rule: &FirewallRule,
    ) -> Result<Operation, Error>;
}

/// Convenience for reporting that a resource that was just created (or
/// must exist for the operation to make sense) could not be read back.
pub fn missing_after_write(type_name: ResourceType, name: &str) -> Error {
    Error::internal_error(&format!(
        "{} {:?} missing immediately after a successful write",
        type_name, name
    ))
}

#[cfg(test)]
mod test {
    use super::{instance_index, instance_name, ManagedInstance};

    #[test]
    fn test_instance_names() {
        assert_eq!(instance_name("db1", 0), "db1-000");
        assert_eq!(instance_name("db1", 42), "db1-042");
        assert_eq!(instance_name("db1", 1000), "db1-1000");

        assert_eq!(instance_index("db1-000").unwrap(), 0);
        assert_eq!(instance_index("db1-042").unwrap(), 42);
        // group names may themselves contain dashes
        assert_eq!(instance_index("my-db-007").unwrap(), 7);
        assert!(instance_index("db1").is_err());
        assert!(instance_index("db1-abc").is_err());
    }

    #[test]
    fn test_internal_hostname() {
        let instance = ManagedInstance {
            name: String::from("db1-000"),
            zone: String::from("us-central1-a"),
        };
        assert_eq!(
            instance.internal_hostname("acme-prod"),
            "db1-000.us-central1-a.c.acme-prod.internal"
        );
    }
}
