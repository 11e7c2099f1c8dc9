// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Configuration knobs for the bus, the module worker, and the allocators.
//!
//! Spec §4.2/§4.3.1 leave several values as "the configured timeout" /
//! "default capacity 10"; [`BusConfig`] is where those live. `from_env`
//! follows the same environment-variable-with-fallback idiom used for
//! `NAUTILUS_WORKER_THREADS` in the original Tokio runtime bootstrap.

use std::time::Duration;

/// Environment variable overriding [`BusConfig::thread_timeout`].
pub const ENV_THREAD_TIMEOUT_MS: &str = "COREBUS_THREAD_TIMEOUT_MS";

/// Environment variable overriding [`BusConfig::queue_capacity`].
pub const ENV_QUEUE_CAPACITY: &str = "COREBUS_QUEUE_CAPACITY";

const DEFAULT_QUEUE_CAPACITY: usize = 10;
const DEFAULT_THREAD_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REGULAR_WORKERS: usize = 1;
const DEFAULT_PRIORITIZED_WORKERS: usize = 1;

/// Process-wide defaults for every module worker the bus spawns (spec §4.2,
/// §4.3.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Bounded FIFO capacity per inbound channel (spec §4.2, default 10).
    pub queue_capacity: usize,
    /// Timeout for `thread_start`/`thread_stop` (spec §4.2, §4.3.2 step 5,
    /// §4.3.4 step 4).
    pub thread_timeout: Duration,
    /// Number of regular-priority worker threads per module.
    pub regular_workers: usize,
    /// Number of prioritized worker threads per module.
    pub prioritized_workers: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_timeout: Duration::from_millis(DEFAULT_THREAD_TIMEOUT_MS),
            regular_workers: DEFAULT_REGULAR_WORKERS,
            prioritized_workers: DEFAULT_PRIORITIZED_WORKERS,
        }
    }
}

impl BusConfig {
    /// Builds a config from defaults overridden by `COREBUS_THREAD_TIMEOUT_MS`
    /// and `COREBUS_QUEUE_CAPACITY`, mirroring the `NAUTILUS_WORKER_THREADS`
    /// env-var-with-fallback pattern. An unparsable or missing value
    /// silently falls back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_env_u64(ENV_THREAD_TIMEOUT_MS) {
            config.thread_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = read_env_u64(ENV_QUEUE_CAPACITY) {
            config.queue_capacity = capacity as usize;
        }

        config
    }
}

fn read_env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|val| val.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_default_config_matches_spec_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.regular_workers, 1);
        assert_eq!(config.prioritized_workers, 1);
    }

    #[rstest]
    fn test_from_env_falls_back_when_unset() {
        // SAFETY: test-only; no other test in this process touches these vars.
        unsafe {
            std::env::remove_var(ENV_THREAD_TIMEOUT_MS);
            std::env::remove_var(ENV_QUEUE_CAPACITY);
        }
        let config = BusConfig::from_env();
        assert_eq!(config, BusConfig::default());
    }

    #[rstest]
    fn test_from_env_reads_overrides() {
        // SAFETY: test-only; no other test in this process touches these vars.
        unsafe {
            std::env::set_var(ENV_QUEUE_CAPACITY, "25");
        }
        let config = BusConfig::from_env();
        assert_eq!(config.queue_capacity, 25);
        unsafe {
            std::env::remove_var(ENV_QUEUE_CAPACITY);
        }
    }
}
