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

//! A running module's connection map: four parallel adjacency lists, one
//! per [`ChannelKind`], forming the bidirectional message-flow graph
//! (spec §3).

use ahash::RandomState;
use indexmap::IndexSet;

use crate::{channel::ChannelKind, endpoint::ChannelEndpoint, manifest::ModuleManifest};

/// The set of peer endpoints bound to one local channel index. An
/// `IndexSet` gives O(1) contains/remove while keeping deterministic
/// iteration order, which matters for reproducible diagnostic dumps.
pub type EndpointSet = IndexSet<ChannelEndpoint, RandomState>;

/// A running module's four adjacency lists, indexed by local channel index
/// within each kind. Invariant: for every endpoint `A.publish[i]`
/// containing `B.subscribe[j]`, `B.subscribe[j]` contains `A.publish[i]`
/// (spec §3's central invariant) — enforced by the bus, not by this type.
#[derive(Clone, Debug, Default)]
pub struct ConnectionMap {
    pub publish: Vec<EndpointSet>,
    pub response: Vec<EndpointSet>,
    pub subscribe: Vec<EndpointSet>,
    pub request: Vec<EndpointSet>,
}

impl ConnectionMap {
    /// Builds an empty connection map sized to `manifest`'s channel counts
    /// (spec §4.3.2 step 6).
    #[must_use]
    pub fn for_manifest(manifest: &ModuleManifest) -> Self {
        Self {
            publish: vec![EndpointSet::default(); manifest.publish.len()],
            response: vec![EndpointSet::default(); manifest.response.len()],
            subscribe: vec![EndpointSet::default(); manifest.subscribe.len()],
            request: vec![EndpointSet::default(); manifest.request.len()],
        }
    }

    #[must_use]
    pub fn side(&self, kind: ChannelKind) -> &[EndpointSet] {
        match kind {
            ChannelKind::Publish => &self.publish,
            ChannelKind::Response => &self.response,
            ChannelKind::Subscribe => &self.subscribe,
            ChannelKind::Request => &self.request,
        }
    }

    #[must_use]
    pub fn side_mut(&mut self, kind: ChannelKind) -> &mut Vec<EndpointSet> {
        match kind {
            ChannelKind::Publish => &mut self.publish,
            ChannelKind::Response => &mut self.response,
            ChannelKind::Subscribe => &mut self.subscribe,
            ChannelKind::Request => &mut self.request,
        }
    }

    /// Adds `peer` to the edge set at `(kind, channel)`. `true` if this was
    /// a new edge.
    pub fn insert_edge(&mut self, kind: ChannelKind, channel: u32, peer: ChannelEndpoint) -> bool {
        self.side_mut(kind)[channel as usize].insert(peer)
    }

    /// Removes `peer` from the edge set at `(kind, channel)`. `true` if the
    /// edge was present.
    pub fn remove_edge(&mut self, kind: ChannelKind, channel: u32, peer: &ChannelEndpoint) -> bool {
        self.side_mut(kind)[channel as usize].shift_remove(peer)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{channel::ConsumerCardinality, ids::RunningModuleId, manifest::{ConsumerDescriptor, ProducerDescriptor}};

    fn manifest() -> ModuleManifest {
        ModuleManifest {
            publish: vec![ProducerDescriptor::new("m6/v1:int", "p0", "")],
            subscribe: vec![ConsumerDescriptor::new(
                "m1/v1:int",
                ConsumerCardinality::Single,
                "s0",
                "",
            )],
            ..Default::default()
        }
    }

    #[rstest]
    fn test_for_manifest_sizes_match_channel_counts() {
        let map = ConnectionMap::for_manifest(&manifest());
        assert_eq!(map.publish.len(), 1);
        assert_eq!(map.subscribe.len(), 1);
        assert_eq!(map.response.len(), 0);
        assert_eq!(map.request.len(), 0);
    }

    #[rstest]
    fn test_insert_and_remove_edge_roundtrip() {
        let mut map = ConnectionMap::for_manifest(&manifest());
        let peer = ChannelEndpoint::new(RunningModuleId(7), 2);

        assert!(map.insert_edge(ChannelKind::Publish, 0, peer));
        assert!(!map.insert_edge(ChannelKind::Publish, 0, peer));
        assert!(map.publish[0].contains(&peer));

        assert!(map.remove_edge(ChannelKind::Publish, 0, &peer));
        assert!(!map.publish[0].contains(&peer));
        assert!(!map.remove_edge(ChannelKind::Publish, 0, &peer));
    }
}
