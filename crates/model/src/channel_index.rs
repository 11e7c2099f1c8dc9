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

//! The secondary index from [`ChannelType`] to the endpoints currently
//! advertising it (spec §3). Used for `AutoAll` expansion and for external
//! lookup by type. Non-`AutoAll` subscribe/request consumers are never
//! indexed here — they never self-discover producers.

use indexmap::IndexMap;

use crate::{channel::ChannelType, endpoint::ChannelEndpoint};

/// One kind's worth of the index: `ChannelType -> [ChannelEndpoint]`. A
/// plain `Vec` multiset rather than a set, since two distinct endpoints can
/// legitimately advertise the same type.
type TypeMap = IndexMap<ChannelType, Vec<ChannelEndpoint>, ahash::RandomState>;

/// Four independent maps: publish, response, and the `AutoAll` subsets of
/// subscribe and request.
#[derive(Clone, Debug, Default)]
pub struct ChannelIndex {
    publish: TypeMap,
    response: TypeMap,
    subscribe_auto_all: TypeMap,
    request_auto_all: TypeMap,
}

/// Which of [`ChannelIndex`]'s four maps an operation targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IndexSlot {
    Publish,
    Response,
    SubscribeAutoAll,
    RequestAutoAll,
}

impl ChannelIndex {
    fn map(&self, slot: IndexSlot) -> &TypeMap {
        match slot {
            IndexSlot::Publish => &self.publish,
            IndexSlot::Response => &self.response,
            IndexSlot::SubscribeAutoAll => &self.subscribe_auto_all,
            IndexSlot::RequestAutoAll => &self.request_auto_all,
        }
    }

    fn map_mut(&mut self, slot: IndexSlot) -> &mut TypeMap {
        match slot {
            IndexSlot::Publish => &mut self.publish,
            IndexSlot::Response => &mut self.response,
            IndexSlot::SubscribeAutoAll => &mut self.subscribe_auto_all,
            IndexSlot::RequestAutoAll => &mut self.request_auto_all,
        }
    }

    /// Registers `endpoint` as advertising `channel_type` under `slot`.
    pub fn insert(&mut self, slot: IndexSlot, channel_type: ChannelType, endpoint: ChannelEndpoint) {
        self.map_mut(slot).entry(channel_type).or_default().push(endpoint);
    }

    /// Removes `endpoint` from `channel_type`'s entry under `slot`. Drops
    /// the entry entirely once its endpoint list is empty so
    /// `existing_publish_channels` never reports a stale, empty type.
    pub fn remove(&mut self, slot: IndexSlot, channel_type: &ChannelType, endpoint: &ChannelEndpoint) {
        let map = self.map_mut(slot);
        if let Some(endpoints) = map.get_mut(channel_type) {
            endpoints.retain(|e| e != endpoint);
            if endpoints.is_empty() {
                map.shift_remove(channel_type);
            }
        }
    }

    /// Returns every endpoint currently advertising `channel_type` under
    /// `slot` (spec §4.3.6 `existing_publish_channels`/
    /// `existing_response_channels`, and §4.3.2 pass (b)'s AutoAll lookup).
    #[must_use]
    pub fn endpoints_for(&self, slot: IndexSlot, channel_type: &ChannelType) -> &[ChannelEndpoint] {
        self.map(slot)
            .get(channel_type)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Iterates every `(ChannelType, endpoints)` pair currently registered
    /// under `slot` (used by `add_module` pass (c) to find existing AutoAll
    /// consumers matching a newly added producer type).
    pub fn iter(&self, slot: IndexSlot) -> impl Iterator<Item = (&ChannelType, &[ChannelEndpoint])> {
        self.map(slot).iter().map(|(k, v)| (k, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::ids::RunningModuleId;

    #[rstest]
    fn test_insert_and_lookup() {
        let mut index = ChannelIndex::default();
        let ty = ChannelType::new("m6/v1:int");
        let ep = ChannelEndpoint::new(RunningModuleId(1), 0);

        index.insert(IndexSlot::Publish, ty, ep);
        assert_eq!(index.endpoints_for(IndexSlot::Publish, &ty), &[ep]);
    }

    #[rstest]
    fn test_remove_drops_empty_entry() {
        let mut index = ChannelIndex::default();
        let ty = ChannelType::new("m6/v1:int");
        let ep = ChannelEndpoint::new(RunningModuleId(1), 0);

        index.insert(IndexSlot::Publish, ty, ep);
        index.remove(IndexSlot::Publish, &ty, &ep);

        assert!(index.endpoints_for(IndexSlot::Publish, &ty).is_empty());
        assert_eq!(index.iter(IndexSlot::Publish).count(), 0);
    }
}
