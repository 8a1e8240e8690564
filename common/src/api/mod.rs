// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data model for the provisioner API
//!
//! These are the types that cross the HTTP boundary: cluster definitions
//! submitted by clients and the job records handed back to them.  Handle
//! types for individual cloud resources live with the provider interface
//! in `nimbus-provisioner`, not here.

mod error;

pub use error::Error;
pub use error::InternalContext;
pub use error::LookupType;
pub use error::ResourceType;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Result of a create operation for the specified type
pub type CreateResult<T> = Result<T, Error>;
/// Result of a delete operation for the specified type
pub type DeleteResult = Result<(), Error>;
/// Result of a list operation that returns an ObjectStream
pub type ListResult<T> = Result<Vec<T>, Error>;
/// Result of a lookup operation for the specified type
pub type LookupResult<T> = Result<T, Error>;
/// Result of an update operation for the specified type
pub type UpdateResult<T> = Result<T, Error>;

/// A name used in the API
///
/// Names are DNS-compatible: at most 63 characters, beginning with a
/// lowercase ASCII letter, containing only lowercase ASCII letters, digits,
/// and "-", and not ending with a "-".  Cloud providers impose these rules
/// on most of the resources we create, and cluster names become part of
/// instance hostnames, so we enforce them at the API boundary.
#[derive(
    Clone,
    Debug,
    Deserialize,
    Eq,
    JsonSchema,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "String")]
pub struct Name(String);

impl TryFrom<String> for Name {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() > 63 {
            return Err(String::from("name may contain at most 63 characters"));
        }

        let mut iter = value.chars();

        let first = iter.next().ok_or_else(|| {
            String::from("name requires at least one character")
        })?;
        if !first.is_ascii_lowercase() {
            return Err(String::from(
                "name must begin with an ASCII lowercase character",
            ));
        }

        let mut last = first;
        for c in iter {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(format!(
                    "name contains invalid character: \"{}\" (allowed \
                     characters are lowercase ASCII, digits, and \"-\")",
                    c
                ));
            }
            last = c;
        }

        if last == '-' {
            return Err(String::from("name cannot end with \"-\""));
        }

        Ok(Name(value))
    }
}

impl std::str::FromStr for Name {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Name::try_from(String::from(value))
    }
}

impl From<Name> for String {
    fn from(name: Name) -> String {
        name.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Client-provided definition of a cluster: both the request body for
/// cluster creation and the desired state for a cluster update.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct ClusterSpec {
    pub name: Name,
    /// number of database nodes in the cluster
    pub size: u32,
    pub region: String,
    pub storage: StorageParams,
    pub template: TemplateParams,
    /// administrator credentials to store for the cluster
    ///
    /// Optional on update: when omitted, the latest stored credentials are
    /// reused.  Required on initial creation.
    pub credentials: Option<AdminCredentials>,
}

/// Object storage configuration for a cluster
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct StorageParams {
    /// bucket holding boot scripts and backups for the cluster
    pub bucket: String,
}

/// Client-provided parameters for the cluster's instance template
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct TemplateParams {
    pub name: Name,
    pub machine_type: String,
    pub image_family: String,
    pub image_project: String,
    pub disks: Vec<DiskParams>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Client-provided parameters for one disk in an instance template
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct DiskParams {
    pub device_name: String,
    pub disk_type: String,
    pub size_gb: u64,
    pub boot: bool,
}

/// Administrator credentials for the database running on a cluster
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Client-provided parameters for creating a disk and attaching it to a
/// running instance
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct DiskAttachParams {
    pub zone: String,
    pub instance_name: String,
    pub disk_name: Name,
    pub disk_type: String,
    pub size_gb: u64,
    pub image_family: String,
    pub image_project: String,
}

/// Identifies an encryption key within a provider's key management service
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct EncryptionKeyRef {
    pub region: String,
    pub key_ring_id: String,
    pub key_id: String,
}

impl EncryptionKeyRef {
    /// Fully-qualified identifier used when binding the key to another
    /// resource (e.g. a bucket's default encryption key).
    pub fn resource_id(&self) -> String {
        format!("{}/{}/{}", self.region, self.key_ring_id, self.key_id)
    }
}

/// Kinds of background work tracked by the job registry
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ClusterCreate,
    ClusterUpdate,
    ClusterMigrate,
    ClusterDelete,
    DiskAttach,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobType::ClusterCreate => "cluster_create",
            JobType::ClusterUpdate => "cluster_update",
            JobType::ClusterMigrate => "cluster_migrate",
            JobType::ClusterDelete => "cluster_delete",
            JobType::DiskAttach => "disk_attach",
        })
    }
}

/// Lifecycle state of a job
///
/// Jobs move from `Pending` to exactly one of the terminal states and are
/// never updated again.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

/// One background operation and its outcome
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    /// name of the cluster (or instance) the job operates on
    pub cluster_name: String,
    pub job_type: JobType,
    pub status: JobStatus,
    /// failure message, present only when `status` is `Failed`
    pub message: Option<String>,
    pub project_id: String,
    pub time_created: DateTime<Utc>,
}

/// Filter for listing jobs; all present fields must match (conjunction).
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    pub cluster_name: Option<String>,
    pub project_id: Option<String>,
}

#[cfg(test)]
mod test {
    use super::Name;

    #[test]
    fn test_name_parse() {
        // Error cases
        let long_name =
            "a234567890123456789012345678901234567890123456789012345678901234";
        assert!(long_name.len() > 63);
        let error_cases: Vec<(&str, &str)> = vec![
            ("", "name requires at least one character"),
            (long_name, "name may contain at most 63 characters"),
            ("123", "name must begin with an ASCII lowercase character"),
            ("-abc", "name must begin with an ASCII lowercase character"),
            ("abc-", "name cannot end with \"-\""),
            (
                "aBc",
                "name contains invalid character: \"B\" (allowed characters \
                 are lowercase ASCII, digits, and \"-\")",
            ),
            (
                "a_c",
                "name contains invalid character: \"_\" (allowed characters \
                 are lowercase ASCII, digits, and \"-\")",
            ),
        ];

        for (input, expected_message) in error_cases {
            eprintln!("check name \"{}\" (expecting error)", input);
            assert_eq!(
                input.parse::<Name>().unwrap_err(),
                expected_message.to_string()
            );
        }

        // Success cases
        let valid_names: Vec<&str> =
            vec!["abc", "abc-123", "a123", "ab-c-1-d-e"];
        for name in valid_names {
            eprintln!("check name \"{}\" (expecting success)", name);
            assert_eq!(name.parse::<Name>().unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_name_serde() {
        let name: Name = serde_json::from_str("\"db1\"").unwrap();
        assert_eq!(name.as_str(), "db1");
        assert!(serde_json::from_str::<Name>("\"Db1\"").is_err());
    }
}
