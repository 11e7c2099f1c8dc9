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

//! Assertion helpers for preconditions that must hold unconditionally.
//!
//! The bus distinguishes two failure registers (see §7 of the design spec):
//! ordinary fallible operations return `bool`/`Option`/an enum, while a
//! structural invariant violation (a desynchronized connection graph, a
//! refcount underflow, an unknown pointer on free) is a bug, not a
//! recoverable error. `fatal!` is the single place that distinction is
//! enforced: it logs at `error` level and aborts the process.

/// Message used with `.expect(FAILED)` for checks that can only fail due to
/// a bug in the caller (e.g. a malformed identifier that validation should
/// already have rejected).
pub const FAILED: &str = "Failed correctness check";

/// Message used with `.expect(MUTEX_POISONED)` when locking a `Mutex` whose
/// poisoning would itself indicate a prior panic inside the critical
/// section — recovering from it would only propagate corrupted state.
pub const MUTEX_POISONED: &str = "Mutex was poisoned";

/// Returns `Ok(())` if `predicate` is true, else an error carrying `msg`.
///
/// # Errors
///
/// Returns an error if `predicate` is `false`.
pub fn check_predicate_true(predicate: bool, msg: &str) -> anyhow::Result<()> {
    if predicate {
        Ok(())
    } else {
        anyhow::bail!(msg.to_string())
    }
}

/// Returns `Ok(())` if `value` is valid UTF-8 (always true for a Rust
/// `&str`); kept as a named check so call sites read the same as the
/// equivalent check over FFI string data.
///
/// # Errors
///
/// This never fails for a Rust `&str`; the signature is kept symmetrical
/// with [`check_predicate_true`] for call-site consistency.
pub fn check_valid_string_utf8(value: &str, field_name: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        anyhow::bail!("`{field_name}` must not be empty")
    } else {
        Ok(())
    }
}

/// Logs an invariant violation at `error` level and aborts the process.
///
/// This is the only response to [`InvariantViolation`]-class failures: a
/// desynchronized connection graph, a refcount that underflowed, or
/// `add_owner`/`remove_owner` called for an allocator's own bookkeeping
/// being internally inconsistent. These are assertions about the core's own
/// correctness, not recoverable errors from bad caller input.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        tracing::error!($($arg)*);
        std::process::abort();
    }};
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_check_predicate_true_ok() {
        assert!(check_predicate_true(true, "unused").is_ok());
    }

    #[rstest]
    fn test_check_predicate_true_err() {
        let err = check_predicate_true(false, "boom").unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[rstest]
    fn test_check_valid_string_utf8_rejects_empty() {
        assert!(check_valid_string_utf8("", "name").is_err());
        assert!(check_valid_string_utf8("ok", "name").is_ok());
    }
}
