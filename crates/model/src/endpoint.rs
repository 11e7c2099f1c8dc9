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

//! Connection-graph endpoints and the wire form of a proposed wiring.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ids::RunningModuleId;

/// Inline capacity for an endpoint set before it spills to the heap. Most
/// consumers bind to a handful of producers; this avoids an allocation for
/// the common case.
pub const ENDPOINT_INLINE_CAP: usize = 4;

/// One directed edge endpoint: a running module and one of its local
/// channel indices (into that module's publish/response/subscribe/request
/// list, depending on context).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelEndpoint {
    pub module: RunningModuleId,
    pub channel: u32,
}

impl ChannelEndpoint {
    #[must_use]
    pub const fn new(module: RunningModuleId, channel: u32) -> Self {
        Self { module, channel }
    }
}

impl Display for ChannelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/channel {}", self.module, self.channel)
    }
}

/// The producer endpoints bound to a single declared consumer channel.
pub type ConsumerBinding = SmallVec<[ChannelEndpoint; ENDPOINT_INLINE_CAP]>;

/// The wire form of a proposed wiring supplied to `add_module` (spec §6.1's
/// `InputChannelBindings`): one entry per declared consumer, in manifest
/// order, for each of the subscribe side and the request side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBindings {
    pub subscribe: Vec<ConsumerBinding>,
    pub request: Vec<ConsumerBinding>,
}

impl ChannelBindings {
    /// Bindings declaring zero producers for every consumer — the shape
    /// required when a module has no consumers, or when every consumer is
    /// `AutoAll` (spec §4.3.1 step 4).
    #[must_use]
    pub fn empty(subscribe_consumers: usize, request_consumers: usize) -> Self {
        Self {
            subscribe: vec![ConsumerBinding::new(); subscribe_consumers],
            request: vec![ConsumerBinding::new(); request_consumers],
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_empty_bindings_have_right_shape() {
        let bindings = ChannelBindings::empty(2, 1);
        assert_eq!(bindings.subscribe.len(), 2);
        assert_eq!(bindings.request.len(), 1);
        assert!(bindings.subscribe.iter().all(SmallVec::is_empty));
    }
}
