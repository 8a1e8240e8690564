// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Module providing utilities for retrying operations with exponential
//! backoff.
//!
//! These policies are used when polling a cloud resource that is expected
//! to converge on its own (e.g. an instance group reaching a stable
//! state).  Callers that need a hard deadline use the bounded variant and
//! translate exhaustion into a timeout error.

use std::time::Duration;

pub use ::backoff::future::{retry, retry_notify};
pub use ::backoff::Error as BackoffError;
pub use ::backoff::{backoff::Backoff, ExponentialBackoff, Notify};

/// Return a policy for polling a provider resource that normally settles
/// within seconds.  Retries forever.
pub fn provider_poll_policy() -> ExponentialBackoff {
    policy_with_options(
        Duration::from_millis(50),
        Duration::from_secs(1),
        None,
    )
}

/// Like [`provider_poll_policy`], but gives up once `max_elapsed` has
/// passed.
pub fn provider_poll_policy_bounded(
    max_elapsed: Duration,
) -> ExponentialBackoff {
    policy_with_options(
        Duration::from_millis(50),
        Duration::from_secs(1),
        Some(max_elapsed),
    )
}

fn policy_with_options(
    initial_interval: Duration,
    max_interval: Duration,
    max_elapsed_time: Option<Duration>,
) -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: initial_interval,
        initial_interval,
        multiplier: 2.0,
        max_interval,
        max_elapsed_time,
        ..ExponentialBackoff::default()
    }
}
