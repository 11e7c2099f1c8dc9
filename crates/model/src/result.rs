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

//! Sum-type results used in place of exceptions (spec §9).

use serde::{Deserialize, Serialize};

/// Outcome of `remove_module` (spec §4.3.4).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveResult {
    Success,
    DoesNotExist,
    HasDependencies,
    ThreadStopFailed,
}

/// Worker ingress admission decision for an inbound event on a full or
/// near-full queue (spec §4.2).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngressDecision {
    /// Accept if the queue has room.
    #[default]
    Accept,
    /// Reject the new message; the queue is left unchanged.
    Drop,
    /// Evict the oldest queued entry, then push the new one.
    AcceptDropQueueFirst,
    /// Clear the queue entirely, then push the new one.
    AcceptReplaceQueue,
}
