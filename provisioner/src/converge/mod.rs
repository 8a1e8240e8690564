// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-resource convergers
//!
//! Each module here makes one kind of cloud resource match its desired
//! state: look it up, create it if absent, and (for mutable kinds) update
//! it in place when it diverges.  Immutable kinds (instance templates)
//! cannot be updated in place; callers choose between reusing the
//! existing resource and superseding it.
//!
//! Convergers never catch provider errors: any failure propagates to the
//! orchestration sequence, which stops at the first error and relies on
//! idempotent re-runs for recovery.

pub mod firewall;
pub mod group;
pub mod kms;
pub mod secret;
pub mod storage;
pub mod template;
