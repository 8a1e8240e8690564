// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facilities shared by the nimbus provisioner and its clients
//!
//! This crate is a dumping ground for the API data model ([`api`]) and a
//! handful of low-level facilities (retry policies in [`backoff`]) that
//! every other nimbus crate needs.  It should not grow behavior of its
//! own: anything that talks to a cloud provider or keeps state belongs
//! in `nimbus-provisioner`.

pub mod api;
pub mod backoff;
