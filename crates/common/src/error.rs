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

//! The error kinds that are naturally `Result`-shaped (spec §7).
//!
//! Most of spec §7's taxonomy is expressed as `bool`/enum/`Option` returns at
//! the call site (`RemoveResult`, `IngressDecision`, `add_module -> bool`);
//! `CoreError` covers the remainder — pool allocator construction and the
//! handful of other operations where a `Result` is the natural shape.
//! `InvariantViolation`-class failures never produce a `CoreError`: they log
//! via `tracing::error!` and abort through `corebus_core::fatal!`, matching
//! §7's propagation policy that these are assertions, not recoverable
//! errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A pool allocator failed to pre-allocate one or more of its slots at
    /// construction (spec §4.1, "construction fails (fatal error kind)").
    #[error("pool allocator failed to pre-allocate slot {slot_index} of {slot_count}")]
    PoolAllocationFailed { slot_index: usize, slot_count: usize },

    /// The caller supplied bindings that do not match the target module's
    /// manifest (spec §4.3.3).
    #[error("invalid bindings for module {loaded_id}: {reason}")]
    InvalidBindings { loaded_id: u32, reason: String },

    /// `create_module` returned a null worker handle (spec §6.1).
    #[error("module factory failed to construct module `{module_name}`")]
    FactoryFailed { module_name: String },

    /// Worker thread start or stop exceeded the configured timeout (spec
    /// §4.2 "Start/stop", §7 ThreadTimeout).
    #[error("worker thread {operation} timed out after {timeout_ms}ms")]
    ThreadTimeout { operation: &'static str, timeout_ms: u64 },
}
