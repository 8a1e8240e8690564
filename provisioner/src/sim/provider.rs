// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory implementation of the cloud provider interface

use crate::provider::{
    instance_index, Bucket, CloudProvider, DiskCreate, FirewallRule,
    GroupVersion, InstanceCreate, InstanceGroup, InstanceTemplate, KeyRing,
    ManagedInstance, Operation, Secret, TemplateDescription, UpdatePolicy,
};
use async_trait::async_trait;
use futures::lock::Mutex;
use nimbus_common::api::{
    CreateResult, EncryptionKeyRef, Error, ListResult, LookupResult,
    ResourceType, UpdateResult,
};
use slog::{debug, info, Logger};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Mutations recorded by the simulated provider, in submission order
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SimEvent {
    GroupCreated { group: String },
    GroupDeleted { group: String },
    GroupVersionPatched { group: String, template: String },
    InstancesCreated { group: String, names: Vec<String> },
    InstancesDeleted { group: String, names: Vec<String> },
    InstanceUpdateApplied { group: String, instance: String },
    TemplateCreated { template: String },
    TemplateDeleted { template: String },
}

struct SimInstance {
    instance: ManagedInstance,
    metadata: BTreeMap<String, String>,
    serial_output: String,
}

struct SimGroup {
    group: InstanceGroup,
    instances: BTreeMap<u32, SimInstance>,
}

#[derive(Default)]
struct SimState {
    /// key rings by (region, ring id)
    key_rings: BTreeMap<(String, String), KeyRing>,
    keys: Vec<EncryptionKeyRef>,
    /// secret payload versions by secret name
    secrets: BTreeMap<String, Vec<String>>,
    buckets: BTreeMap<String, Bucket>,
    /// object contents by (bucket, object name)
    objects: BTreeMap<(String, String), String>,
    templates: BTreeMap<String, InstanceTemplate>,
    /// groups by (region, group name)
    groups: BTreeMap<(String, String), SimGroup>,
    /// disks by (zone, disk name)
    disks: BTreeMap<(String, String), DiskCreate>,
    /// (instance name, disk name)
    attachments: Vec<(String, String)>,
    firewalls: BTreeMap<String, FirewallRule>,
    operations: BTreeMap<Uuid, Result<(), Error>>,
    /// injected serial output, consulted before the generated output
    serial_overrides: BTreeMap<String, String>,
    /// injected startup script exit status by instance name
    boot_exit_overrides: BTreeMap<String, u32>,
    /// number of `group_get` calls that will still report "not stable",
    /// by (region, group name)
    unstable_polls: BTreeMap<(String, String), u32>,
    events: Vec<SimEvent>,
}

impl SimState {
    /// Records a finished operation and hands back its handle.  Callers
    /// observe `result` through `wait_operation`.
    fn submit(&mut self, result: Result<(), Error>) -> Operation {
        let id = Uuid::new_v4();
        self.operations.insert(id, result);
        Operation { id }
    }

    fn group_mut(
        &mut self,
        region: &str,
        name: &str,
    ) -> Result<&mut SimGroup, Error> {
        self.groups
            .get_mut(&(region.to_owned(), name.to_owned()))
            .ok_or_else(|| {
                Error::not_found_by_name(ResourceType::InstanceGroup, name)
            })
    }

    fn boot_serial_output(&self, instance_name: &str) -> String {
        let exit_status =
            self.boot_exit_overrides.get(instance_name).copied().unwrap_or(0);
        format!(
            "{name}: Finished running startup scripts.\n\
             {name}: startup-script-url exit status {status}\n",
            name = instance_name,
            status = exit_status,
        )
    }
}

/// Simulated cloud provider; see the module documentation.
pub struct SimProvider {
    log: Logger,
    state: Mutex<SimState>,
}

impl SimProvider {
    pub fn new(log: Logger) -> SimProvider {
        info!(&log, "created simulated cloud provider");
        SimProvider { log, state: Mutex::new(SimState::default()) }
    }

    // Fault injection

    /// Makes the startup script of `instance_name` report `exit_status`
    /// whenever the instance boots (or reboots) from now on.
    pub async fn set_boot_exit_status(
        &self,
        instance_name: &str,
        exit_status: u32,
    ) {
        let mut state = self.state.lock().await;
        state
            .boot_exit_overrides
            .insert(instance_name.to_owned(), exit_status);
    }

    /// Pins the serial output of `instance_name` to `output`, regardless
    /// of what the instance would otherwise report.
    pub async fn set_serial_output(&self, instance_name: &str, output: &str) {
        let mut state = self.state.lock().await;
        state
            .serial_overrides
            .insert(instance_name.to_owned(), output.to_owned());
    }

    /// Makes the next `polls` lookups of the group report it unstable.
    pub async fn set_unstable_polls(
        &self,
        region: &str,
        group: &str,
        polls: u32,
    ) {
        let mut state = self.state.lock().await;
        state
            .unstable_polls
            .insert((region.to_owned(), group.to_owned()), polls);
    }

    // Inspection

    pub async fn events(&self) -> Vec<SimEvent> {
        self.state.lock().await.events.clone()
    }

    pub async fn key_ring_exists(&self, region: &str, ring_id: &str) -> bool {
        let state = self.state.lock().await;
        state
            .key_rings
            .contains_key(&(region.to_owned(), ring_id.to_owned()))
    }

    pub async fn key_count(&self) -> usize {
        self.state.lock().await.keys.len()
    }

    pub async fn secret_version_count(&self, name: &str) -> usize {
        let state = self.state.lock().await;
        state.secrets.get(name).map(Vec::len).unwrap_or(0)
    }

    pub async fn secret_latest_payload(&self, name: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.secrets.get(name).and_then(|versions| versions.last().cloned())
    }

    pub async fn bucket(&self, name: &str) -> Option<Bucket> {
        self.state.lock().await.buckets.get(name).cloned()
    }

    pub async fn object(&self, bucket: &str, name: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.objects.get(&(bucket.to_owned(), name.to_owned())).cloned()
    }

    pub async fn template(&self, name: &str) -> Option<InstanceTemplate> {
        self.state.lock().await.templates.get(name).cloned()
    }

    pub async fn group(
        &self,
        region: &str,
        name: &str,
    ) -> Option<InstanceGroup> {
        let state = self.state.lock().await;
        state
            .groups
            .get(&(region.to_owned(), name.to_owned()))
            .map(|sim_group| sim_group.group.clone())
    }

    pub async fn group_member_names(
        &self,
        region: &str,
        name: &str,
    ) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .groups
            .get(&(region.to_owned(), name.to_owned()))
            .map(|sim_group| {
                sim_group
                    .instances
                    .values()
                    .map(|i| i.instance.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn instance_metadata(
        &self,
        region: &str,
        group: &str,
        instance_name: &str,
    ) -> Option<BTreeMap<String, String>> {
        let state = self.state.lock().await;
        let sim_group =
            state.groups.get(&(region.to_owned(), group.to_owned()))?;
        sim_group
            .instances
            .values()
            .find(|i| i.instance.name == instance_name)
            .map(|i| i.metadata.clone())
    }

    pub async fn firewall(&self, name: &str) -> Option<FirewallRule> {
        self.state.lock().await.firewalls.get(name).cloned()
    }

    pub async fn disk(&self, zone: &str, name: &str) -> Option<DiskCreate> {
        let state = self.state.lock().await;
        state.disks.get(&(zone.to_owned(), name.to_owned())).cloned()
    }

    pub async fn disk_attached(&self, instance_name: &str, disk_name: &str) -> bool {
        let state = self.state.lock().await;
        state
            .attachments
            .iter()
            .any(|(i, d)| i == instance_name && d == disk_name)
    }

    fn zone_for(region: &str, index: u32) -> String {
        // spread members over three zones, deterministically
        let letter = ['a', 'b', 'c'][(index % 3) as usize];
        format!("{}-{}", region, letter)
    }
}

#[async_trait]
impl CloudProvider for SimProvider {
    async fn wait_operation(&self, operation: Operation) -> Result<(), Error> {
        let state = self.state.lock().await;
        match state.operations.get(&operation.id) {
            Some(result) => result.clone(),
            None => Err(Error::not_found_by_id(
                ResourceType::ProviderOperation,
                &operation.id,
            )),
        }
    }

    async fn key_ring_get(
        &self,
        region: &str,
        ring_id: &str,
    ) -> Result<Option<KeyRing>, Error> {
        let state = self.state.lock().await;
        Ok(state
            .key_rings
            .get(&(region.to_owned(), ring_id.to_owned()))
            .cloned())
    }

    async fn key_ring_create(
        &self,
        region: &str,
        ring_id: &str,
    ) -> CreateResult<KeyRing> {
        let mut state = self.state.lock().await;
        let key = (region.to_owned(), ring_id.to_owned());
        if state.key_rings.contains_key(&key) {
            return Err(Error::already_exists(ResourceType::KeyRing, ring_id));
        }
        debug!(self.log, "key ring create"; "ring_id" => ring_id);
        let ring =
            KeyRing { id: ring_id.to_owned(), region: region.to_owned() };
        state.key_rings.insert(key, ring.clone());
        Ok(ring)
    }

    async fn key_create(
        &self,
        region: &str,
        ring_id: &str,
        key_id: &str,
    ) -> CreateResult<EncryptionKeyRef> {
        let mut state = self.state.lock().await;
        if !state
            .key_rings
            .contains_key(&(region.to_owned(), ring_id.to_owned()))
        {
            return Err(Error::not_found_by_name(
                ResourceType::KeyRing,
                ring_id,
            ));
        }
        debug!(self.log, "key create"; "key_id" => key_id);
        let key = EncryptionKeyRef {
            region: region.to_owned(),
            key_ring_id: ring_id.to_owned(),
            key_id: key_id.to_owned(),
        };
        state.keys.push(key.clone());
        Ok(key)
    }

    async fn secret_get(&self, name: &str) -> Result<Option<Secret>, Error> {
        let state = self.state.lock().await;
        Ok(state.secrets.get(name).map(|versions| Secret {
            name: name.to_owned(),
            version_count: versions.len() as u64,
        }))
    }

    async fn secret_create(&self, name: &str) -> CreateResult<Secret> {
        let mut state = self.state.lock().await;
        if state.secrets.contains_key(name) {
            return Err(Error::already_exists(ResourceType::Secret, name));
        }
        debug!(self.log, "secret create"; "secret" => name);
        state.secrets.insert(name.to_owned(), Vec::new());
        Ok(Secret { name: name.to_owned(), version_count: 0 })
    }

    async fn secret_add_version(
        &self,
        name: &str,
        payload: &str,
    ) -> UpdateResult<Secret> {
        let mut state = self.state.lock().await;
        let versions = state.secrets.get_mut(name).ok_or_else(|| {
            Error::not_found_by_name(ResourceType::Secret, name)
        })?;
        versions.push(payload.to_owned());
        Ok(Secret {
            name: name.to_owned(),
            version_count: versions.len() as u64,
        })
    }

    async fn bucket_get(&self, name: &str) -> Result<Option<Bucket>, Error> {
        Ok(self.state.lock().await.buckets.get(name).cloned())
    }

    async fn bucket_create(
        &self,
        name: &str,
        region: &str,
        encryption_key: &EncryptionKeyRef,
    ) -> CreateResult<Bucket> {
        let mut state = self.state.lock().await;
        if state.buckets.contains_key(name) {
            return Err(Error::already_exists(
                ResourceType::StorageBucket,
                name,
            ));
        }
        debug!(self.log, "bucket create"; "bucket" => name);
        let bucket = Bucket {
            name: name.to_owned(),
            region: region.to_owned(),
            default_encryption_key: Some(encryption_key.resource_id()),
        };
        state.buckets.insert(name.to_owned(), bucket.clone());
        Ok(bucket)
    }

    async fn bucket_set_encryption_key(
        &self,
        name: &str,
        encryption_key: &EncryptionKeyRef,
    ) -> UpdateResult<Bucket> {
        let mut state = self.state.lock().await;
        let bucket = state.buckets.get_mut(name).ok_or_else(|| {
            Error::not_found_by_name(ResourceType::StorageBucket, name)
        })?;
        bucket.default_encryption_key = Some(encryption_key.resource_id());
        Ok(bucket.clone())
    }

    async fn object_upload(
        &self,
        bucket: &str,
        object_name: &str,
        contents: &str,
    ) -> CreateResult<String> {
        let mut state = self.state.lock().await;
        if !state.buckets.contains_key(bucket) {
            return Err(Error::not_found_by_name(
                ResourceType::StorageBucket,
                bucket,
            ));
        }
        state.objects.insert(
            (bucket.to_owned(), object_name.to_owned()),
            contents.to_owned(),
        );
        Ok(format!("gs://{}/{}", bucket, object_name))
    }

    async fn image_from_family(
        &self,
        image_project: &str,
        image_family: &str,
    ) -> LookupResult<String> {
        // every family resolves in the simulation
        Ok(format!(
            "projects/{}/global/images/family/{}",
            image_project, image_family
        ))
    }

    async fn template_get(
        &self,
        name: &str,
    ) -> Result<Option<InstanceTemplate>, Error> {
        Ok(self.state.lock().await.templates.get(name).cloned())
    }

    async fn template_create(
        &self,
        name: &str,
        description: &TemplateDescription,
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        if state.templates.contains_key(name) {
            let error =
                Error::already_exists(ResourceType::InstanceTemplate, name);
            return Ok(state.submit(Err(error)));
        }
        debug!(self.log, "template create"; "template" => name);
        state.templates.insert(
            name.to_owned(),
            InstanceTemplate {
                name: name.to_owned(),
                description: description.clone(),
            },
        );
        state
            .events
            .push(SimEvent::TemplateCreated { template: name.to_owned() });
        Ok(state.submit(Ok(())))
    }

    async fn template_delete(&self, name: &str) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        if !state.templates.contains_key(name) {
            let error =
                Error::not_found_by_name(ResourceType::InstanceTemplate, name);
            return Ok(state.submit(Err(error)));
        }
        let referenced = state
            .groups
            .values()
            .any(|sim_group| sim_group.group.version.template == name);
        if referenced {
            let error = Error::in_use(ResourceType::InstanceTemplate, name);
            return Ok(state.submit(Err(error)));
        }
        debug!(self.log, "template delete"; "template" => name);
        state.templates.remove(name);
        state
            .events
            .push(SimEvent::TemplateDeleted { template: name.to_owned() });
        Ok(state.submit(Ok(())))
    }

    async fn group_get(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<InstanceGroup>, Error> {
        let mut state = self.state.lock().await;
        let key = (region.to_owned(), name.to_owned());
        let Some(sim_group) = state.groups.get(&key) else {
            return Ok(None);
        };
        let mut group = sim_group.group.clone();
        if let Some(polls) = state.unstable_polls.get_mut(&key) {
            if *polls > 0 {
                *polls -= 1;
                group.stable = false;
            }
        }
        Ok(Some(group))
    }

    async fn group_create(
        &self,
        region: &str,
        name: &str,
        template: &str,
        target_size: u32,
        update_policy: &UpdatePolicy,
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        let key = (region.to_owned(), name.to_owned());
        if state.groups.contains_key(&key) {
            let error =
                Error::already_exists(ResourceType::InstanceGroup, name);
            return Ok(state.submit(Err(error)));
        }
        if !state.templates.contains_key(template) {
            let error = Error::not_found_by_name(
                ResourceType::InstanceTemplate,
                template,
            );
            return Ok(state.submit(Err(error)));
        }
        debug!(self.log, "group create"; "group" => name);
        state.groups.insert(
            key,
            SimGroup {
                group: InstanceGroup {
                    name: name.to_owned(),
                    region: region.to_owned(),
                    version: GroupVersion {
                        template: template.to_owned(),
                        name: String::from("initial"),
                    },
                    target_size,
                    stable: true,
                    update_policy: update_policy.clone(),
                },
                instances: BTreeMap::new(),
            },
        );
        state.events.push(SimEvent::GroupCreated { group: name.to_owned() });
        Ok(state.submit(Ok(())))
    }

    async fn group_patch_version(
        &self,
        region: &str,
        name: &str,
        version: &GroupVersion,
        update_policy: &UpdatePolicy,
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        let key = (region.to_owned(), name.to_owned());
        if !state.groups.contains_key(&key) {
            let error =
                Error::not_found_by_name(ResourceType::InstanceGroup, name);
            return Ok(state.submit(Err(error)));
        }
        let sim_group = state.groups.get_mut(&key).expect("checked above");
        sim_group.group.version = version.clone();
        sim_group.group.update_policy = update_policy.clone();
        state.events.push(SimEvent::GroupVersionPatched {
            group: name.to_owned(),
            template: version.template.clone(),
        });
        Ok(state.submit(Ok(())))
    }

    async fn group_delete(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        let key = (region.to_owned(), name.to_owned());
        if state.groups.remove(&key).is_none() {
            let error =
                Error::not_found_by_name(ResourceType::InstanceGroup, name);
            return Ok(state.submit(Err(error)));
        }
        debug!(self.log, "group delete"; "group" => name);
        state.events.push(SimEvent::GroupDeleted { group: name.to_owned() });
        Ok(state.submit(Ok(())))
    }

    async fn group_list_instances(
        &self,
        region: &str,
        name: &str,
    ) -> ListResult<ManagedInstance> {
        let mut state = self.state.lock().await;
        let sim_group = state.group_mut(region, name)?;
        Ok(sim_group
            .instances
            .values()
            .map(|i| i.instance.clone())
            .collect())
    }

    async fn group_create_instances(
        &self,
        region: &str,
        name: &str,
        instances: &[InstanceCreate],
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        if !state.groups.contains_key(&(region.to_owned(), name.to_owned())) {
            let error =
                Error::not_found_by_name(ResourceType::InstanceGroup, name);
            return Ok(state.submit(Err(error)));
        }

        let mut created = Vec::with_capacity(instances.len());
        for create in instances {
            let index = match instance_index(&create.name) {
                Ok(index) => index,
                Err(error) => return Ok(state.submit(Err(error))),
            };
            let exists = state
                .groups
                .get(&(region.to_owned(), name.to_owned()))
                .map(|g| g.instances.contains_key(&index))
                .unwrap_or(false);
            if exists {
                let error = Error::already_exists(
                    ResourceType::Instance,
                    &create.name,
                );
                return Ok(state.submit(Err(error)));
            }
            created.push((index, create.clone()));
        }

        let names: Vec<String> =
            created.iter().map(|(_, c)| c.name.clone()).collect();
        debug!(self.log, "group create instances";
            "group" => name, "instances" => ?names);
        for (index, create) in created {
            let zone = SimProvider::zone_for(region, index);
            let serial_output = state.boot_serial_output(&create.name);
            let sim_group = state
                .groups
                .get_mut(&(region.to_owned(), name.to_owned()))
                .expect("group checked above");
            sim_group.instances.insert(
                index,
                SimInstance {
                    instance: ManagedInstance { name: create.name, zone },
                    metadata: create.metadata,
                    serial_output,
                },
            );
            sim_group.group.target_size = sim_group.instances.len() as u32;
        }
        state.events.push(SimEvent::InstancesCreated {
            group: name.to_owned(),
            names,
        });
        Ok(state.submit(Ok(())))
    }

    async fn group_delete_instances(
        &self,
        region: &str,
        name: &str,
        instance_names: &[String],
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        let key = (region.to_owned(), name.to_owned());
        if !state.groups.contains_key(&key) {
            let error =
                Error::not_found_by_name(ResourceType::InstanceGroup, name);
            return Ok(state.submit(Err(error)));
        }
        for instance_name in instance_names {
            let index = match instance_index(instance_name) {
                Ok(index) => index,
                Err(error) => return Ok(state.submit(Err(error))),
            };
            let sim_group =
                state.groups.get_mut(&key).expect("group checked above");
            if sim_group.instances.remove(&index).is_none() {
                let error = Error::not_found_by_name(
                    ResourceType::Instance,
                    instance_name,
                );
                return Ok(state.submit(Err(error)));
            }
            sim_group.group.target_size = sim_group.instances.len() as u32;
        }
        debug!(self.log, "group delete instances";
            "group" => name, "instances" => ?instance_names);
        state.events.push(SimEvent::InstancesDeleted {
            group: name.to_owned(),
            names: instance_names.to_vec(),
        });
        Ok(state.submit(Ok(())))
    }

    async fn group_apply_update(
        &self,
        region: &str,
        name: &str,
        instance_name: &str,
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        let index = match instance_index(instance_name) {
            Ok(index) => index,
            Err(error) => return Ok(state.submit(Err(error))),
        };
        let key = (region.to_owned(), name.to_owned());
        let exists = state
            .groups
            .get(&key)
            .map(|g| g.instances.contains_key(&index))
            .unwrap_or(false);
        if !exists {
            let error =
                Error::not_found_by_name(ResourceType::Instance, instance_name);
            return Ok(state.submit(Err(error)));
        }
        debug!(self.log, "group apply update";
            "group" => name, "instance" => instance_name);
        // the replacement instance boots fresh
        let serial_output = state.boot_serial_output(instance_name);
        let sim_group = state.groups.get_mut(&key).expect("checked above");
        if let Some(sim_instance) = sim_group.instances.get_mut(&index) {
            sim_instance.serial_output = serial_output;
        }
        state.events.push(SimEvent::InstanceUpdateApplied {
            group: name.to_owned(),
            instance: instance_name.to_owned(),
        });
        Ok(state.submit(Ok(())))
    }

    async fn instance_serial_output(
        &self,
        zone: &str,
        instance_name: &str,
    ) -> LookupResult<String> {
        let state = self.state.lock().await;
        if let Some(output) = state.serial_overrides.get(instance_name) {
            return Ok(output.clone());
        }
        state
            .groups
            .values()
            .flat_map(|g| g.instances.values())
            .find(|i| {
                i.instance.name == instance_name && i.instance.zone == zone
            })
            .map(|i| i.serial_output.clone())
            .ok_or_else(|| {
                Error::not_found_by_name(ResourceType::Instance, instance_name)
            })
    }

    async fn instance_attach_disk(
        &self,
        zone: &str,
        instance_name: &str,
        disk_name: &str,
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        if !state
            .disks
            .contains_key(&(zone.to_owned(), disk_name.to_owned()))
        {
            let error =
                Error::not_found_by_name(ResourceType::Disk, disk_name);
            return Ok(state.submit(Err(error)));
        }
        debug!(self.log, "attach disk";
            "instance" => instance_name, "disk" => disk_name);
        state
            .attachments
            .push((instance_name.to_owned(), disk_name.to_owned()));
        Ok(state.submit(Ok(())))
    }

    async fn disk_create(
        &self,
        zone: &str,
        disk: &DiskCreate,
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        let key = (zone.to_owned(), disk.name.clone());
        if state.disks.contains_key(&key) {
            let error = Error::already_exists(ResourceType::Disk, &disk.name);
            return Ok(state.submit(Err(error)));
        }
        debug!(self.log, "disk create"; "disk" => &disk.name);
        state.disks.insert(key, disk.clone());
        Ok(state.submit(Ok(())))
    }

    async fn firewall_get(
        &self,
        name: &str,
    ) -> Result<Option<FirewallRule>, Error> {
        Ok(self.state.lock().await.firewalls.get(name).cloned())
    }

    async fn firewall_create(
        &self,
        rule: &FirewallRule,
    ) -> Result<Operation, Error> {
        let mut state = self.state.lock().await;
        if state.firewalls.contains_key(&rule.name) {
            let error =
                Error::already_exists(ResourceType::FirewallRule, &rule.name);
            return Ok(state.submit(Err(error)));
        }
        debug!(self.log, "firewall create"; "rule" => &rule.name);
        state.firewalls.insert(rule.name.clone(), rule.clone());
        Ok(state.submit(Ok(())))
    }
}
