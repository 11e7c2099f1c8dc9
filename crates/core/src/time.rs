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

//! Nanosecond timestamps.
//!
//! Every message header is stamped with a nanosecond timestamp by the facade
//! at send time. `AtomicClock` gives a process-wide, lock-free source for
//! that timestamp.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

/// Nanoseconds since the Unix epoch.
pub type UnixNanos = u64;

/// Returns the current wall-clock time as nanoseconds since the Unix epoch.
#[must_use]
pub fn nanos_since_epoch() -> UnixNanos {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// A monotonically non-decreasing, lock-free clock backed by an `AtomicU64`.
///
/// Used anywhere a cheap, shareable `&'static` clock is preferable to calling
/// [`SystemTime::now`] directly (e.g. from a hot `send_*` path).
#[derive(Debug, Default)]
pub struct AtomicClock {
    last_ns: AtomicU64,
}

impl AtomicClock {
    /// Creates a new clock initialized to the current wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_ns: AtomicU64::new(nanos_since_epoch()),
        }
    }

    /// Returns the current time in nanoseconds, advancing the clock if
    /// wall-clock time has moved forward since the last read.
    pub fn get_time_ns(&self) -> UnixNanos {
        let now = nanos_since_epoch();
        let _ = self
            .last_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                (now > prev).then_some(now)
            });
        self.last_ns.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_nanos_since_epoch_is_nonzero() {
        assert!(nanos_since_epoch() > 0);
    }

    #[rstest]
    fn test_atomic_clock_is_monotonic() {
        let clock = AtomicClock::new();
        let first = clock.get_time_ns();
        let second = clock.get_time_ns();
        assert!(second >= first);
    }
}
