// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling facilities for the nimbus provisioner
//!
//! All fallible operations in the provisioner, from HTTP request handling
//! down to individual cloud provider calls, report failures with [`Error`].

use dropshot::HttpError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// An error accessing or converging a cloud resource, or performing an
/// operation on one
///
/// This is a generic error that's used throughout the provisioner: in the
/// convergers, the orchestration sequences, and the HTTP layer.  Like most
/// error taxonomies, this one mixes classes of failure (resource missing,
/// resource conflict, provider misbehavior) with dispositions (retryable
/// or not); see [`Error::retryable`].
#[derive(Clone, Debug, Deserialize, thiserror::Error, PartialEq, Serialize)]
pub enum Error {
    /// An object needed as part of this operation was not found.
    #[error("Object (of type {type_name}) not found: {lookup_type:?}")]
    ObjectNotFound { type_name: ResourceType, lookup_type: LookupType },
    /// An object already exists with the specified name or identifier.
    #[error("Object (of type {type_name}) already exists: {object_name}")]
    ObjectAlreadyExists { type_name: ResourceType, object_name: String },
    /// An object cannot be removed or replaced because something else
    /// still references it.
    #[error("Object (of type {type_name}) is in use: {object_name}")]
    InUse { type_name: ResourceType, object_name: String },
    /// The request was well-formed, but the operation cannot be completed
    /// given the current state of the system.
    #[error("Invalid Request: {message}")]
    InvalidRequest { message: String },
    /// Credentials for the cloud provider were missing or not valid.
    #[error("Missing or invalid credentials")]
    Unauthenticated { internal_message: String },
    /// The provider accepted an operation and later reported it failed.
    #[error("Provider operation failed: {internal_message}")]
    OperationFailed { internal_message: String },
    /// A bounded wait for a resource to converge ran out of time.
    #[error("Timeout: {internal_message}")]
    Timeout { internal_message: String },
    /// The system (or part of it) is unavailable.
    #[error("Service Unavailable: {internal_message}")]
    ServiceUnavailable { internal_message: String },
    /// The system encountered an unhandled operational error.
    #[error("Internal Error: {internal_message}")]
    InternalError { internal_message: String },
}

/// Indicates how an object was looked up (for an `ObjectNotFound` error)
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum LookupType {
    /// a specific name was requested
    ByName(String),
    /// a specific id was requested
    ById(Uuid),
}

impl LookupType {
    /// Returns an ObjectNotFound error appropriate for the case where this
    /// lookup failed
    pub fn into_not_found(self, type_name: ResourceType) -> Error {
        Error::ObjectNotFound { type_name, lookup_type: self }
    }
}

/// The kind of resource to which an [`Error`] applies
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ResourceType {
    Cluster,
    KeyRing,
    EncryptionKey,
    Secret,
    StorageBucket,
    StorageObject,
    Image,
    InstanceTemplate,
    InstanceGroup,
    Instance,
    Disk,
    FirewallRule,
    Job,
    ProviderOperation,
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResourceType::Cluster => "cluster",
                ResourceType::KeyRing => "key ring",
                ResourceType::EncryptionKey => "encryption key",
                ResourceType::Secret => "secret",
                ResourceType::StorageBucket => "storage bucket",
                ResourceType::StorageObject => "storage object",
                ResourceType::Image => "image",
                ResourceType::InstanceTemplate => "instance template",
                ResourceType::InstanceGroup => "instance group",
                ResourceType::Instance => "instance",
                ResourceType::Disk => "disk",
                ResourceType::FirewallRule => "firewall rule",
                ResourceType::Job => "job",
                ResourceType::ProviderOperation => "provider operation",
            }
        )
    }
}

impl Error {
    /// Returns whether the error is likely transient
    ///
    /// Operations that fail this way may succeed if simply re-run, without
    /// any operator intervention in between.
    pub fn retryable(&self) -> bool {
        match self {
            Error::ServiceUnavailable { .. } => true,

            Error::ObjectNotFound { .. }
            | Error::ObjectAlreadyExists { .. }
            | Error::InUse { .. }
            | Error::InvalidRequest { .. }
            | Error::Unauthenticated { .. }
            | Error::OperationFailed { .. }
            | Error::Timeout { .. }
            | Error::InternalError { .. } => false,
        }
    }

    /// Generates an [`Error::ObjectNotFound`] for a lookup by name.
    pub fn not_found_by_name(type_name: ResourceType, name: &str) -> Error {
        LookupType::ByName(name.to_owned()).into_not_found(type_name)
    }

    /// Generates an [`Error::ObjectNotFound`] for a lookup by id.
    pub fn not_found_by_id(type_name: ResourceType, id: &Uuid) -> Error {
        LookupType::ById(*id).into_not_found(type_name)
    }

    /// Generates an [`Error::ObjectAlreadyExists`].
    pub fn already_exists(type_name: ResourceType, object_name: &str) -> Error {
        Error::ObjectAlreadyExists {
            type_name,
            object_name: object_name.to_owned(),
        }
    }

    /// Generates an [`Error::InUse`].
    pub fn in_use(type_name: ResourceType, object_name: &str) -> Error {
        Error::InUse { type_name, object_name: object_name.to_owned() }
    }

    /// Generates an [`Error::InvalidRequest`].
    pub fn invalid_request(message: &str) -> Error {
        Error::InvalidRequest { message: message.to_owned() }
    }

    /// Generates an [`Error::OperationFailed`] with the given
    /// provider-reported message.
    pub fn operation_failed<S: AsRef<str>>(message: S) -> Error {
        Error::OperationFailed {
            internal_message: message.as_ref().to_owned(),
        }
    }

    /// Generates an [`Error::Timeout`] error with the specific message.
    pub fn timeout<S: AsRef<str>>(message: S) -> Error {
        Error::Timeout { internal_message: message.as_ref().to_owned() }
    }

    /// Generates an [`Error::InternalError`] error with the specific
    /// message
    ///
    /// InternalError should be used for operational conditions that should
    /// not happen but that we cannot reasonably prevent at compile time
    /// (e.g. a provider response missing a field it always has).
    pub fn internal_error(internal_message: &str) -> Error {
        Error::InternalError { internal_message: internal_message.to_owned() }
    }

    /// Generates an [`Error::ServiceUnavailable`] error with the specific
    /// message
    ///
    /// This should be used for transient failures where the caller might be
    /// expected to retry.  Logic errors or other problems indicating that a
    /// retry would not work should probably be an InternalError instead.
    pub fn unavail(message: &str) -> Error {
        Error::ServiceUnavailable { internal_message: message.to_owned() }
    }

    fn internal_context<C>(self, context: C) -> Error
    where
        C: Display + Send + Sync + 'static,
    {
        match self {
            Error::ObjectNotFound { .. }
            | Error::ObjectAlreadyExists { .. }
            | Error::InUse { .. }
            | Error::InvalidRequest { .. } => self,
            Error::Unauthenticated { internal_message } => {
                Error::Unauthenticated {
                    internal_message: format!(
                        "{}: {}",
                        context, internal_message
                    ),
                }
            }
            Error::OperationFailed { internal_message } => {
                Error::OperationFailed {
                    internal_message: format!(
                        "{}: {}",
                        context, internal_message
                    ),
                }
            }
            Error::Timeout { internal_message } => Error::Timeout {
                internal_message: format!("{}: {}", context, internal_message),
            },
            Error::ServiceUnavailable { internal_message } => {
                Error::ServiceUnavailable {
                    internal_message: format!(
                        "{}: {}",
                        context, internal_message
                    ),
                }
            }
            Error::InternalError { internal_message } => Error::InternalError {
                internal_message: format!("{}: {}", context, internal_message),
            },
        }
    }
}

impl From<Error> for HttpError {
    /// Converts an `Error` error into an `HttpError`.  This defines how
    /// errors that are represented internally using `Error` are ultimately
    /// translated into an HTTP response.
    fn from(error: Error) -> HttpError {
        match error {
            Error::ObjectNotFound { .. } => {
                let message = format!("not found: {}", error);
                HttpError::for_client_error(
                    Some(String::from("ObjectNotFound")),
                    http::StatusCode::NOT_FOUND,
                    message,
                )
            }

            Error::ObjectAlreadyExists { .. } => {
                let message = format!("already exists: {}", error);
                HttpError::for_bad_request(
                    Some(String::from("ObjectAlreadyExists")),
                    message,
                )
            }

            Error::InUse { .. } => HttpError::for_client_error(
                Some(String::from("InUse")),
                http::StatusCode::CONFLICT,
                format!("{}", error),
            ),

            Error::InvalidRequest { message } => HttpError::for_bad_request(
                Some(String::from("InvalidRequest")),
                message,
            ),

            Error::Unauthenticated { internal_message } => HttpError {
                status_code: http::StatusCode::UNAUTHORIZED,
                error_code: Some(String::from("Unauthenticated")),
                external_message: String::from(
                    "credentials missing or invalid",
                ),
                internal_message,
            },

            Error::OperationFailed { internal_message }
            | Error::Timeout { internal_message }
            | Error::InternalError { internal_message } => {
                HttpError::for_internal_error(internal_message)
            }

            Error::ServiceUnavailable { internal_message } => {
                HttpError::for_unavail(
                    Some(String::from("ServiceNotAvailable")),
                    internal_message,
                )
            }
        }
    }
}

/// Like `anyhow`'s `Context`, but applies the context to the
/// `internal_message` of an [`Error`] while leaving client-facing variants
/// untouched.
pub trait InternalContext<T> {
    fn internal_context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static;

    fn with_internal_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> InternalContext<T> for Result<T, Error> {
    fn internal_context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|error| error.internal_context(context))
    }

    fn with_internal_context<C, F>(self, make_context: F) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| error.internal_context(make_context()))
    }
}

#[cfg(test)]
mod test {
    use super::{Error, InternalContext, ResourceType};

    #[test]
    fn test_internal_context() {
        let error: Result<(), Error> =
            Err(Error::internal_error("boom")).internal_context("deep stack");
        match error.unwrap_err() {
            Error::InternalError { internal_message } => {
                assert_eq!(internal_message, "deep stack: boom");
            }
            other => panic!("unexpected error variant: {:?}", other),
        }

        let error: Result<(), Error> =
            Err(Error::timeout("gave up")).with_internal_context(|| {
                format!("waiting for {}", "stability")
            });
        match error.unwrap_err() {
            Error::Timeout { internal_message } => {
                assert_eq!(internal_message, "waiting for stability: gave up");
            }
            other => panic!("unexpected error variant: {:?}", other),
        }
    }

    #[test]
    fn test_context_on_client_errors() {
        // Context must not rewrite messages that are shown to clients.
        let error: Result<(), Error> =
            Err(Error::not_found_by_name(ResourceType::Secret, "db1-creds"))
                .internal_context("converging secret");
        assert_eq!(
            error.unwrap_err(),
            Error::not_found_by_name(ResourceType::Secret, "db1-creds")
        );
    }

    #[test]
    fn test_retryable() {
        assert!(Error::unavail("not yet stable").retryable());
        assert!(!Error::timeout("took too long").retryable());
        assert!(!Error::already_exists(ResourceType::InstanceGroup, "db1")
            .retryable());
    }
}
