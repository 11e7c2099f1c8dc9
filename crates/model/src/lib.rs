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

//! Pure data definitions shared by the module bus engine and its host.
//!
//! Nothing in this crate owns a thread, a lock, or a socket. It is the
//! vocabulary every other crate speaks: channel types and kinds, module
//! manifests, the connection graph's endpoint and binding shapes, the
//! message envelope, and the reference-counted blob handle contract.

pub mod blob;
pub mod channel;
pub mod channel_index;
pub mod connection;
pub mod endpoint;
pub mod ids;
pub mod manifest;
pub mod message;
pub mod result;

pub use blob::{BlockId, BlockOwner, SharedDataBlob};
pub use channel::{ChannelKind, ChannelType, ConsumerCardinality, PriorityClass};
pub use channel_index::{ChannelIndex, IndexSlot};
pub use connection::{ConnectionMap, EndpointSet};
pub use endpoint::{ChannelBindings, ChannelEndpoint, ConsumerBinding};
pub use ids::{LoadedModuleId, ModuleMappingStateId, RunningModuleId};
pub use manifest::{ConsumerDescriptor, ModuleManifest, ProducerDescriptor};
pub use message::MessageHeader;
pub use result::{IngressDecision, RemoveResult};

/// The plug-in ABI version this workspace is compiled against (see §6.1).
pub const CORE_API_VERSION: u64 = 2;
