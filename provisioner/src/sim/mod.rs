// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated cloud provider
//!
//! [`SimProvider`] implements [`crate::provider::CloudProvider`] entirely
//! in memory.  It backs the test suite and lets the server run without
//! cloud credentials.  Beyond the provider interface it exposes
//! inspection accessors, fault-injection hooks (per-instance boot exit
//! status, serial output overrides, delayed group stabilization), and an
//! event log that tests use to assert ordering.

mod provider;

pub use provider::SimEvent;
pub use provider::SimProvider;
