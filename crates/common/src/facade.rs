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

//! The module facade ("ICore", spec §4.4): the per-module view of the bus.
//!
//! It fixes the module's own identity, stamps outgoing messages with a
//! monotonic timestamp and correlation id, and forwards to the bus's
//! routing entry points. It holds an `Arc<Bus>` but never holds the bus
//! lock across a call back into module code — every method below takes and
//! drops it internally within the `Bus` methods it calls.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use corebus_model::{
    ChannelBindings, ChannelEndpoint, ChannelType, LoadedModuleId, MessageHeader, ModuleMappingStateId, RemoveResult, RunningModuleId,
    SharedDataBlob,
};

use crate::{
    allocator::{AllocatorId, DynamicAllocator, PoolAllocator},
    bus::{Bus, LoadedModuleInfo, RunningModuleInfo},
    error::CoreError,
};

pub struct CoreFacade {
    bus: Arc<Bus>,
    module_id: RunningModuleId,
    next_correlation_id: AtomicU64,
}

impl CoreFacade {
    #[must_use]
    pub(crate) fn new(bus: Arc<Bus>, module_id: RunningModuleId) -> Self {
        Self {
            bus,
            module_id,
            next_correlation_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn module_id(&self) -> RunningModuleId {
        self.module_id
    }

    fn next_correlation_id(&self) -> u64 {
        self.next_correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Publishes `bytes` on `local_channel`, fanning out to every bound
    /// subscriber (spec §4.3.5).
    pub fn send_message(&self, local_channel: u32, bytes: &[u8], blobs: impl IntoIterator<Item = SharedDataBlob>) {
        let header = MessageHeader::new(self.next_correlation_id(), self.bus.now_ns(), bytes).with_blobs(blobs);
        self.bus.send_message(ChannelEndpoint::new(self.module_id, local_channel), header);
    }

    /// Sends a request to `target`'s response channel, returning the
    /// correlation id the responder should echo in its reply (spec §4.3.5).
    pub fn send_request(
        &self,
        local_channel: u32,
        target: ChannelEndpoint,
        bytes: &[u8],
        blobs: impl IntoIterator<Item = SharedDataBlob>,
    ) -> u64 {
        let correlation_id = self.next_correlation_id();
        let header = MessageHeader::new(correlation_id, self.bus.now_ns(), bytes).with_blobs(blobs);
        self.bus.send_request(ChannelEndpoint::new(self.module_id, local_channel), target, header);
        correlation_id
    }

    /// Sends a response to `target`'s request channel, echoing the
    /// originating `correlation_id` (spec §4.3.5).
    pub fn send_response(
        &self,
        local_channel: u32,
        target: ChannelEndpoint,
        correlation_id: u64,
        success: bool,
        bytes: &[u8],
        blobs: impl IntoIterator<Item = SharedDataBlob>,
    ) {
        let header = MessageHeader::new(correlation_id, self.bus.now_ns(), bytes)
            .with_success(success)
            .with_blobs(blobs);
        self.bus.send_response(ChannelEndpoint::new(self.module_id, local_channel), target, header);
    }

    /// Creates a dynamic (heap-backed) allocator registered with the bus
    /// (spec §4.4).
    #[must_use]
    pub fn create_dynamic_allocator(&self) -> (AllocatorId, Arc<DynamicAllocator>) {
        self.bus.create_dynamic_allocator()
    }

    /// Creates a fixed-slot allocator (spec §4.1, §4.4).
    pub fn create_buffer_allocator(&self, slot_bytes: usize, slot_count: usize) -> Result<(AllocatorId, Arc<PoolAllocator>), CoreError> {
        self.bus.create_buffer_allocator(slot_bytes, slot_count)
    }

    /// Releases the bus's own reference to a previously created allocator.
    /// Blobs it already issued keep it alive until the last one drops (spec
    /// §3 "Allocator" lifecycle).
    pub fn delete_allocator(&self, id: AllocatorId) -> bool {
        self.bus.delete_allocator(id)
    }

    // ---------------------------------------------------------------- control surface (spec §2 item 4)
    //
    // A control module drives bus mutation and observability through the
    // same facade every other module holds, mirroring `ICore`'s combined
    // `ICoreBase`/`ICoreControl` inheritance in the original interface.

    /// Starts a running instance of `loaded_id` bound to `bindings` (spec
    /// §4.3.2).
    pub fn add_module(&self, loaded_id: LoadedModuleId, bindings: ChannelBindings) -> bool {
        self.bus.add_module(loaded_id, bindings)
    }

    /// Stops and tombstones `id`, and its dependents if `recursive` (spec
    /// §4.3.4).
    pub fn remove_module(&self, id: RunningModuleId, recursive: bool) -> RemoveResult {
        self.bus.remove_module(id, recursive)
    }

    /// The running modules that would be torn down alongside `id` under a
    /// recursive removal (spec §4.3.4).
    #[must_use]
    pub fn collect_dependencies(&self, id: RunningModuleId) -> Vec<RunningModuleId> {
        self.bus.collect_dependencies(id)
    }

    #[must_use]
    pub fn loaded_modules_count(&self) -> usize {
        self.bus.loaded_modules_count()
    }

    #[must_use]
    pub fn loaded_module_info(&self, id: LoadedModuleId) -> Option<LoadedModuleInfo> {
        self.bus.loaded_module_info(id)
    }

    #[must_use]
    pub fn running_modules_count(&self) -> usize {
        self.bus.running_modules_count()
    }

    #[must_use]
    pub fn running_module_info(&self, id: RunningModuleId) -> RunningModuleInfo {
        self.bus.running_module_info(id)
    }

    #[must_use]
    pub fn mapping_state_id(&self) -> ModuleMappingStateId {
        self.bus.mapping_state_id()
    }

    #[must_use]
    pub fn existing_publish_channels(&self, channel_type: &ChannelType) -> Vec<ChannelEndpoint> {
        self.bus.existing_publish_channels(channel_type)
    }

    #[must_use]
    pub fn existing_response_channels(&self, channel_type: &ChannelType) -> Vec<ChannelEndpoint> {
        self.bus.existing_response_channels(channel_type)
    }
}
