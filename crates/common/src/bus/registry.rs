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

//! The bus: the registry of loaded and running modules plus the three
//! routing entry points, all serialized through one process-wide mutex
//! (spec §4.3, §9 "Single bus lock is intentional").

use std::{collections::VecDeque, path::Path, sync::{Arc, Mutex}, time::Duration};

use ahash::RandomState;
use corebus_core::{
    AtomicClock, UnixNanos,
    correctness::{MUTEX_POISONED, check_predicate_true, check_valid_string_utf8},
    fatal,
};
use corebus_model::{
    BlockOwner, ChannelBindings, ChannelEndpoint, ChannelIndex, ChannelKind, ChannelType, ConnectionMap, ConsumerCardinality,
    ConsumerDescriptor, IndexSlot, LoadedModuleId, MessageHeader, ModuleMappingStateId, ModuleManifest, ProducerDescriptor,
    RunningModuleId,
};
use indexmap::IndexSet;

use crate::{
    allocator::{AllocatorId, DynamicAllocator, PoolAllocator},
    config::BusConfig,
    error::CoreError,
    facade::CoreFacade,
    loader::{ModuleCreateContext, ModuleLoader},
    logging::ScopedLogger,
    worker::{InboundGroup, ModuleWorker},
};

use super::loaded::LoadedModule;
use super::running::{RunningModule, RunningSlot};

/// Snapshot of a loaded module's identity for the diagnostic dump (spec
/// §4.3.6 `loaded_modules_info`).
#[derive(Clone, Debug)]
pub struct LoadedModuleInfo {
    pub name: String,
    pub source_path: std::path::PathBuf,
    pub manifest: ModuleManifest,
}

/// Snapshot of a running-module slot (spec §4.3.6 `running_modules_info`).
#[derive(Clone, Debug)]
pub enum RunningModuleInfo {
    Present { loaded_id: LoadedModuleId, name: String },
    Tombstoned,
    Unknown,
}

struct BusInner {
    loaded_modules: Vec<LoadedModule>,
    running: Vec<RunningSlot>,
    index: ChannelIndex,
    mapping_state_id: ModuleMappingStateId,
    next_running_id: u64,
    allocators: ahash::AHashMap<AllocatorId, Arc<dyn BlockOwner>>,
    next_allocator_id: u64,
}

impl BusInner {
    fn running_mut(&mut self, id: RunningModuleId) -> Option<&mut RunningModule> {
        self.running.get_mut(id.index()).and_then(RunningSlot::as_present_mut)
    }
}

/// The registry of loaded and running modules, the channel-type index, and
/// the three routing entry points (spec §2 item 3).
pub struct Bus {
    inner: Mutex<BusInner>,
    config: BusConfig,
    clock: AtomicClock,
}

impl Bus {
    #[must_use]
    pub fn new(config: BusConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(BusInner {
                loaded_modules: Vec::new(),
                running: Vec::new(),
                index: ChannelIndex::default(),
                mapping_state_id: ModuleMappingStateId::initial(),
                next_running_id: 0,
                allocators: ahash::AHashMap::default(),
                next_allocator_id: 0,
            }),
            config,
            clock: AtomicClock::new(),
        })
    }

    pub(crate) fn now_ns(&self) -> UnixNanos {
        self.clock.get_time_ns()
    }

    // ---------------------------------------------------------------- 4.3.1

    /// Enumerates `modules_dir`, loads each candidate via `loader`, and
    /// auto-creates every eligible module (spec §4.3.1).
    pub fn initialize(self: &Arc<Self>, loader: &dyn ModuleLoader, modules_dir: &Path, data_dir: &Path) -> std::io::Result<()> {
        let mut candidates: Vec<_> = std::fs::read_dir(modules_dir)?.filter_map(Result::ok).map(|entry| entry.path()).collect();
        candidates.sort();

        {
            let mut inner = self.inner.lock().expect(MUTEX_POISONED);
            for path in candidates {
                match loader.load(&path) {
                    Ok(factory) => {
                        if factory.api_version() != corebus_model::CORE_API_VERSION {
                            tracing::warn!(path = %path.display(), reported = factory.api_version(), "initialize: plug-in API version mismatch, skipping");
                            continue;
                        }
                        let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
                        if let Err(err) = check_valid_string_utf8(&name, "module name") {
                            tracing::warn!(path = %path.display(), %err, "initialize: derived module name is invalid, skipping");
                            continue;
                        }
                        let candidate_data_path = data_dir.join(&name);
                        let data_path = candidate_data_path.is_dir().then_some(candidate_data_path);
                        let manifest = factory.manifest();
                        inner.loaded_modules.push(LoadedModule {
                            name,
                            source_path: path,
                            data_path,
                            manifest,
                            factory: Arc::from(factory),
                        });
                    }
                    Err(failure) => {
                        tracing::warn!(path = %path.display(), %failure, "initialize: failed to load module");
                    }
                }
            }
        }

        let eligible: Vec<LoadedModuleId> = {
            let inner = self.inner.lock().expect(MUTEX_POISONED);
            inner
                .loaded_modules
                .iter()
                .enumerate()
                .filter(|(_, m)| m.manifest.is_eligible_for_auto_create())
                .map(|(i, _)| LoadedModuleId(i as u32))
                .collect()
        };

        for loaded_id in eligible {
            let bindings = {
                let inner = self.inner.lock().expect(MUTEX_POISONED);
                let manifest = &inner.loaded_modules[loaded_id.index()].manifest;
                ChannelBindings::empty(manifest.subscribe.len(), manifest.request.len())
            };
            if !self.add_module(loaded_id, bindings) {
                tracing::warn!(%loaded_id, "initialize: auto-create failed for eligible module");
            }
        }

        Ok(())
    }

    // ---------------------------------------------------------------- 4.3.2

    /// Validates bindings, constructs and starts a worker, wires connections
    /// in the three fixed passes, and bumps `mapping_state_id` (spec
    /// §4.3.2).
    pub fn add_module(self: &Arc<Self>, loaded_id: LoadedModuleId, bindings: ChannelBindings) -> bool {
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);

        let Some(loaded) = inner.loaded_modules.get(loaded_id.index()) else {
            tracing::warn!(%loaded_id, "add_module: loaded id out of range");
            return false;
        };
        let manifest = loaded.manifest.clone();

        if let Err(reason) = validate_bindings(&inner, &manifest, &bindings) {
            tracing::warn!(%loaded_id, %reason, "add_module: binding validation failed");
            return false;
        }

        let new_id = RunningModuleId(inner.next_running_id);
        let logger = ScopedLogger::new(manifest.display_name.clone(), new_id);
        let loaded = &inner.loaded_modules[loaded_id.index()];
        let factory = Arc::clone(&loaded.factory);
        let data_path = loaded.data_path.clone();

        let facade = CoreFacade::new(Arc::clone(self), new_id);
        let context = ModuleCreateContext {
            data_path,
            facade,
            bindings: bindings.clone(),
            logger: logger.clone(),
            module_id: new_id,
        };

        let Some(plugin) = factory.create(context) else {
            tracing::warn!(%loaded_id, "add_module: factory failed to construct module");
            return false;
        };

        let worker = ModuleWorker::new(
            &manifest,
            plugin,
            self.config.queue_capacity,
            self.config.regular_workers,
            self.config.prioritized_workers,
            logger.clone(),
        );
        if !worker.thread_start(self.config.thread_timeout) {
            worker.thread_stop(self.config.thread_timeout);
            tracing::warn!(%loaded_id, "add_module: worker failed to start within timeout");
            return false;
        }

        inner.next_running_id += 1;
        let connections = ConnectionMap::for_manifest(&manifest);
        let slot_index = new_id.index();
        let running = RunningSlot::Present(RunningModule {
            loaded_id,
            logger,
            connections,
            worker,
        });
        if slot_index == inner.running.len() {
            inner.running.push(running);
        } else {
            inner.running[slot_index] = running;
        }

        publish_own_channels(&mut inner, new_id, &manifest);
        wire_bound_consumers(&mut inner, new_id, &manifest.subscribe, &bindings.subscribe, ChannelKind::Subscribe);
        wire_bound_consumers(&mut inner, new_id, &manifest.request, &bindings.request, ChannelKind::Request);
        wire_auto_all_consumers(&mut inner, new_id, &manifest.subscribe, ChannelKind::Subscribe, IndexSlot::Publish);
        wire_auto_all_consumers(&mut inner, new_id, &manifest.request, ChannelKind::Request, IndexSlot::Response);
        wire_existing_auto_all_consumers(&mut inner, new_id, &manifest.publish, ChannelKind::Publish, IndexSlot::SubscribeAutoAll);
        wire_existing_auto_all_consumers(&mut inner, new_id, &manifest.response, ChannelKind::Response, IndexSlot::RequestAutoAll);

        inner.mapping_state_id = inner.mapping_state_id.next();
        true
    }

    // ---------------------------------------------------------------- 4.3.4

    /// Computes the dependents closure, tears modules down in reverse
    /// closure order, and bumps `mapping_state_id` (spec §4.3.4).
    pub fn remove_module(self: &Arc<Self>, id: RunningModuleId, recursive: bool) -> corebus_model::RemoveResult {
        use corebus_model::RemoveResult;

        let mut inner = self.inner.lock().expect(MUTEX_POISONED);

        match inner.running.get(id.index()) {
            None | Some(RunningSlot::Tombstoned) => return RemoveResult::DoesNotExist,
            Some(RunningSlot::Present(_)) => {}
        }

        let closure = collect_dependencies_locked(&inner, id);
        if closure.len() > 1 && !recursive {
            return RemoveResult::HasDependencies;
        }

        let mut stop_success = true;
        for &victim in closure.iter().rev() {
            stop_success &= remove_one_locked(&mut inner, victim, self.config.thread_timeout);
        }

        inner.mapping_state_id = inner.mapping_state_id.next();

        if stop_success { RemoveResult::Success } else { RemoveResult::ThreadStopFailed }
    }

    // ---------------------------------------------------------------- 4.3.5

    /// Fans `header` out to every subscriber bound to `source`'s publish
    /// channel (spec §4.3.5).
    pub(crate) fn send_message(self: &Arc<Self>, source: ChannelEndpoint, header: MessageHeader) {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        let Some(module) = inner.running.get(source.module.index()).and_then(RunningSlot::as_present) else {
            tracing::warn!(%source, "send_message: source module not present");
            return;
        };
        let Some(targets) = module.connections.publish.get(source.channel as usize) else {
            tracing::warn!(%source, "send_message: source channel out of range");
            return;
        };

        for &target in targets {
            let Some(target_module) = inner.running.get(target.module.index()).and_then(RunningSlot::as_present) else {
                tracing::warn!(%source, %target, "send_message: destination module not present, skipping");
                continue;
            };
            if target.channel as usize >= target_module.connections.subscribe.len() {
                tracing::warn!(%source, %target, "send_message: destination channel out of range, skipping");
                continue;
            }
            target_module.worker.enqueue(InboundGroup::Subscribe, target.channel, source, header.clone());
        }
    }

    /// Unicasts `header` to `target`'s response channel (spec §4.3.5).
    pub(crate) fn send_request(self: &Arc<Self>, source: ChannelEndpoint, target: ChannelEndpoint, header: MessageHeader) {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        let Some(source_module) = inner.running.get(source.module.index()).and_then(RunningSlot::as_present) else {
            tracing::warn!(%source, "send_request: source module not present");
            return;
        };
        if source.channel as usize >= source_module.connections.request.len() {
            tracing::warn!(%source, "send_request: source channel out of range");
            return;
        }
        let Some(target_module) = inner.running.get(target.module.index()).and_then(RunningSlot::as_present) else {
            tracing::warn!(%source, %target, "send_request: target module not present");
            return;
        };
        if target.channel as usize >= target_module.connections.response.len() {
            tracing::warn!(%source, %target, "send_request: target channel out of range");
            return;
        }
        target_module.worker.enqueue(InboundGroup::Response, target.channel, source, header);
    }

    /// Unicasts `header` to `target`'s request channel (spec §4.3.5).
    pub(crate) fn send_response(self: &Arc<Self>, source: ChannelEndpoint, target: ChannelEndpoint, header: MessageHeader) {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        let Some(source_module) = inner.running.get(source.module.index()).and_then(RunningSlot::as_present) else {
            tracing::warn!(%source, "send_response: source module not present");
            return;
        };
        if source.channel as usize >= source_module.connections.response.len() {
            tracing::warn!(%source, "send_response: source channel out of range");
            return;
        }
        let Some(target_module) = inner.running.get(target.module.index()).and_then(RunningSlot::as_present) else {
            tracing::warn!(%source, %target, "send_response: target module not present");
            return;
        };
        if target.channel as usize >= target_module.connections.request.len() {
            tracing::warn!(%source, %target, "send_response: target channel out of range");
            return;
        }
        target_module.worker.enqueue(InboundGroup::Request, target.channel, source, header);
    }

    // ---------------------------------------------------------------- allocators (4.4)

    pub(crate) fn create_dynamic_allocator(&self) -> (AllocatorId, Arc<DynamicAllocator>) {
        let allocator = DynamicAllocator::new();
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        let id = AllocatorId(inner.next_allocator_id);
        inner.next_allocator_id += 1;
        inner.allocators.insert(id, allocator.clone());
        (id, allocator)
    }

    pub(crate) fn create_buffer_allocator(&self, slot_bytes: usize, slot_count: usize) -> Result<(AllocatorId, Arc<PoolAllocator>), CoreError> {
        let allocator = PoolAllocator::new(slot_bytes, slot_count)?;
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        let id = AllocatorId(inner.next_allocator_id);
        inner.next_allocator_id += 1;
        inner.allocators.insert(id, allocator.clone());
        Ok((id, allocator))
    }

    pub(crate) fn delete_allocator(&self, id: AllocatorId) -> bool {
        self.inner.lock().expect(MUTEX_POISONED).allocators.remove(&id).is_some()
    }

    // ---------------------------------------------------------------- 4.3.6 observability

    #[must_use]
    pub fn loaded_modules_count(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISONED).loaded_modules.len()
    }

    #[must_use]
    pub fn loaded_module_info(&self, id: LoadedModuleId) -> Option<LoadedModuleInfo> {
        self.inner
            .lock()
            .expect(MUTEX_POISONED)
            .loaded_modules
            .get(id.index())
            .map(|m| LoadedModuleInfo { name: m.name.clone(), source_path: m.source_path.clone(), manifest: m.manifest.clone() })
    }

    /// Includes Tombstoned slots, since ids are assigned by table length
    /// (spec §4.3.6).
    #[must_use]
    pub fn running_modules_count(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISONED).running.len()
    }

    #[must_use]
    pub fn running_module_info(&self, id: RunningModuleId) -> RunningModuleInfo {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        match inner.running.get(id.index()) {
            None => RunningModuleInfo::Unknown,
            Some(RunningSlot::Tombstoned) => RunningModuleInfo::Tombstoned,
            Some(RunningSlot::Present(module)) => RunningModuleInfo::Present {
                loaded_id: module.loaded_id,
                name: inner.loaded_modules[module.loaded_id.index()].name.clone(),
            },
        }
    }

    #[must_use]
    pub fn mapping_state_id(&self) -> ModuleMappingStateId {
        self.inner.lock().expect(MUTEX_POISONED).mapping_state_id
    }

    #[must_use]
    pub fn existing_publish_channels(&self, channel_type: &ChannelType) -> Vec<ChannelEndpoint> {
        self.inner.lock().expect(MUTEX_POISONED).index.endpoints_for(IndexSlot::Publish, channel_type).to_vec()
    }

    #[must_use]
    pub fn existing_response_channels(&self, channel_type: &ChannelType) -> Vec<ChannelEndpoint> {
        self.inner.lock().expect(MUTEX_POISONED).index.endpoints_for(IndexSlot::Response, channel_type).to_vec()
    }

    #[must_use]
    pub fn collect_dependencies(&self, id: RunningModuleId) -> Vec<RunningModuleId> {
        collect_dependencies_locked(&self.inner.lock().expect(MUTEX_POISONED), id)
    }

    /// Per-channel worker metrics, for the diagnostic dump (spec §4.2
    /// "Metrics").
    #[must_use]
    pub fn worker_metrics(&self, id: RunningModuleId, group: InboundGroup, local_channel: u32) -> Option<crate::worker::QueueMetrics> {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        inner.running.get(id.index()).and_then(RunningSlot::as_present).and_then(|m| m.worker.metrics(group, local_channel))
    }
}

fn publish_own_channels(inner: &mut BusInner, module_id: RunningModuleId, manifest: &ModuleManifest) {
    for (i, producer) in manifest.publish.iter().enumerate() {
        inner.index.insert(IndexSlot::Publish, producer.channel_type, ChannelEndpoint::new(module_id, i as u32));
    }
    for (i, producer) in manifest.response.iter().enumerate() {
        inner.index.insert(IndexSlot::Response, producer.channel_type, ChannelEndpoint::new(module_id, i as u32));
    }
    for (i, consumer) in manifest.subscribe.iter().enumerate() {
        if matches!(consumer.cardinality, ConsumerCardinality::AutoAll) {
            inner.index.insert(IndexSlot::SubscribeAutoAll, consumer.channel_type, ChannelEndpoint::new(module_id, i as u32));
        }
    }
    for (i, consumer) in manifest.request.iter().enumerate() {
        if matches!(consumer.cardinality, ConsumerCardinality::AutoAll) {
            inner.index.insert(IndexSlot::RequestAutoAll, consumer.channel_type, ChannelEndpoint::new(module_id, i as u32));
        }
    }
}

/// Pass (a): bound (non-AutoAll) consumers wire to their explicit bindings.
fn wire_bound_consumers(
    inner: &mut BusInner,
    module_id: RunningModuleId,
    consumers: &[ConsumerDescriptor],
    bindings: &[corebus_model::ConsumerBinding],
    kind: ChannelKind,
) {
    let peer_kind = kind.peer_kind();
    for (i, binding) in bindings.iter().enumerate().take(consumers.len()) {
        let local = ChannelEndpoint::new(module_id, i as u32);
        for &peer in binding {
            if let Some(m) = inner.running_mut(module_id) {
                m.connections.insert_edge(kind, i as u32, peer);
            }
            if let Some(p) = inner.running_mut(peer.module) {
                p.connections.insert_edge(peer_kind, peer.channel, local);
            }
        }
    }
}

/// Pass (b): AutoAll consumers of the new module bind to every existing
/// producer of the matching type.
fn wire_auto_all_consumers(
    inner: &mut BusInner,
    module_id: RunningModuleId,
    consumers: &[ConsumerDescriptor],
    kind: ChannelKind,
    producer_slot: IndexSlot,
) {
    let peer_kind = kind.peer_kind();
    for (i, consumer) in consumers.iter().enumerate() {
        if !matches!(consumer.cardinality, ConsumerCardinality::AutoAll) {
            continue;
        }
        let producers: Vec<ChannelEndpoint> = inner.index.endpoints_for(producer_slot, &consumer.channel_type).to_vec();
        let local = ChannelEndpoint::new(module_id, i as u32);
        for peer in producers {
            if let Some(m) = inner.running_mut(module_id) {
                m.connections.insert_edge(kind, i as u32, peer);
            }
            if let Some(p) = inner.running_mut(peer.module) {
                p.connections.insert_edge(peer_kind, peer.channel, local);
            }
        }
    }
}

/// Pass (c): the new module's producers bind to every existing module's
/// AutoAll consumer of the matching type.
fn wire_existing_auto_all_consumers(
    inner: &mut BusInner,
    module_id: RunningModuleId,
    producers: &[ProducerDescriptor],
    kind: ChannelKind,
    consumer_auto_all_slot: IndexSlot,
) {
    let peer_kind = kind.peer_kind();
    for (i, producer) in producers.iter().enumerate() {
        let consumers: Vec<ChannelEndpoint> = inner.index.endpoints_for(consumer_auto_all_slot, &producer.channel_type).to_vec();
        let local = ChannelEndpoint::new(module_id, i as u32);
        for peer in consumers {
            if let Some(m) = inner.running_mut(module_id) {
                m.connections.insert_edge(kind, i as u32, peer);
            }
            if let Some(p) = inner.running_mut(peer.module) {
                p.connections.insert_edge(peer_kind, peer.channel, local);
            }
        }
    }
}

fn validate_bindings(inner: &BusInner, manifest: &ModuleManifest, bindings: &ChannelBindings) -> Result<(), String> {
    validate_side(inner, &manifest.subscribe, &bindings.subscribe, ChannelKind::Publish)?;
    validate_side(inner, &manifest.request, &bindings.request, ChannelKind::Response)
}

fn validate_side(inner: &BusInner, consumers: &[ConsumerDescriptor], bindings: &[corebus_model::ConsumerBinding], producer_kind: ChannelKind) -> Result<(), String> {
    check_predicate_true(bindings.len() == consumers.len(), &format!("expected {} binding lists, got {}", consumers.len(), bindings.len()))
        .map_err(|err| err.to_string())?;

    for (i, consumer) in consumers.iter().enumerate() {
        let binding = &bindings[i];
        check_predicate_true(
            consumer.cardinality.accepts(binding.len()),
            &format!("consumer {i} cardinality {:?} rejects {} bound producers", consumer.cardinality, binding.len()),
        )
        .map_err(|err| err.to_string())?;

        for peer in binding {
            let Some(peer_module) = inner.running.get(peer.module.index()).and_then(RunningSlot::as_present) else {
                return Err(format!("binding references non-present module {}", peer.module));
            };
            let loaded = &inner.loaded_modules[peer_module.loaded_id.index()];
            let producers = match producer_kind {
                ChannelKind::Publish => &loaded.manifest.publish,
                ChannelKind::Response => &loaded.manifest.response,
                _ => unreachable!("producer_kind is always Publish or Response"),
            };
            let Some(producer) = producers.get(peer.channel as usize) else {
                return Err(format!("peer channel {} out of range on module {}", peer.channel, peer.module));
            };
            check_predicate_true(
                producer.channel_type == consumer.channel_type,
                &format!("type mismatch: consumer {i} expects `{}`, producer {} advertises `{}`", consumer.channel_type, peer, producer.channel_type),
            )
            .map_err(|err| err.to_string())?;
        }
    }

    Ok(())
}

/// BFS over non-AutoAll outgoing edges (publish→subscribe, response→request),
/// `id` first, in visit order (spec §4.3.4 step 2).
fn collect_dependencies_locked(inner: &BusInner, start: RunningModuleId) -> Vec<RunningModuleId> {
    let mut visited: IndexSet<RunningModuleId, RandomState> = IndexSet::default();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let Some(module) = inner.running.get(current.index()).and_then(RunningSlot::as_present) else {
            continue;
        };
        for (kind, consumer_kind) in [(ChannelKind::Publish, ChannelKind::Subscribe), (ChannelKind::Response, ChannelKind::Request)] {
            for edge_set in module.connections.side(kind) {
                for &peer in edge_set {
                    if is_auto_all_consumer(inner, peer, consumer_kind) {
                        continue;
                    }
                    if visited.insert(peer) {
                        queue.push_back(peer);
                    }
                }
            }
        }
    }

    visited.into_iter().collect()
}

fn is_auto_all_consumer(inner: &BusInner, endpoint: ChannelEndpoint, consumer_kind: ChannelKind) -> bool {
    let Some(module) = inner.running.get(endpoint.module.index()).and_then(RunningSlot::as_present) else {
        return false;
    };
    let loaded = &inner.loaded_modules[module.loaded_id.index()];
    let consumers = match consumer_kind {
        ChannelKind::Subscribe => &loaded.manifest.subscribe,
        ChannelKind::Request => &loaded.manifest.request,
        _ => unreachable!("consumer_kind is always Subscribe or Request"),
    };
    consumers.get(endpoint.channel as usize).is_some_and(|c| matches!(c.cardinality, ConsumerCardinality::AutoAll))
}

/// Tears down one module: erases all four directions of back-edges, removes
/// it from the channel index, stops its worker, and tombstones its slot
/// (spec §4.3.4 step 4). Returns whether the worker stopped cleanly.
fn remove_one_locked(inner: &mut BusInner, id: RunningModuleId, timeout: Duration) -> bool {
    let Some(module) = inner.running.get(id.index()).and_then(RunningSlot::as_present) else {
        fatal!("remove_one_locked: module {id} is not Present");
    };
    let loaded_id = module.loaded_id;
    let worker = Arc::clone(&module.worker);

    for (kind, peer_kind) in [
        (ChannelKind::Publish, ChannelKind::Subscribe),
        (ChannelKind::Response, ChannelKind::Request),
        (ChannelKind::Subscribe, ChannelKind::Publish),
        (ChannelKind::Request, ChannelKind::Response),
    ] {
        let edges: Vec<(u32, ChannelEndpoint)> = {
            let module = inner.running[id.index()].as_present().expect(corebus_core::correctness::FAILED);
            module
                .connections
                .side(kind)
                .iter()
                .enumerate()
                .flat_map(|(ch, set)| set.iter().map(move |&peer| (ch as u32, peer)))
                .collect()
        };

        for (channel, peer) in edges {
            let local = ChannelEndpoint::new(id, channel);
            if let Some(peer_module) = inner.running_mut(peer.module) {
                if !peer_module.connections.remove_edge(peer_kind, peer.channel, &local) {
                    fatal!("invariant violation: missing back-edge {peer} -> {local}");
                }
            }
        }
    }

    let manifest = inner.loaded_modules[loaded_id.index()].manifest.clone();
    for (i, producer) in manifest.publish.iter().enumerate() {
        inner.index.remove(IndexSlot::Publish, &producer.channel_type, &ChannelEndpoint::new(id, i as u32));
    }
    for (i, producer) in manifest.response.iter().enumerate() {
        inner.index.remove(IndexSlot::Response, &producer.channel_type, &ChannelEndpoint::new(id, i as u32));
    }
    for (i, consumer) in manifest.subscribe.iter().enumerate() {
        if matches!(consumer.cardinality, ConsumerCardinality::AutoAll) {
            inner.index.remove(IndexSlot::SubscribeAutoAll, &consumer.channel_type, &ChannelEndpoint::new(id, i as u32));
        }
    }
    for (i, consumer) in manifest.request.iter().enumerate() {
        if matches!(consumer.cardinality, ConsumerCardinality::AutoAll) {
            inner.index.remove(IndexSlot::RequestAutoAll, &consumer.channel_type, &ChannelEndpoint::new(id, i as u32));
        }
    }

    let stopped = worker.thread_stop(timeout);
    inner.loaded_modules[loaded_id.index()].factory.destroy(worker.plugin());
    inner.running[id.index()] = RunningSlot::Tombstoned;
    stopped
}

/// Scenarios S1-S5 and invariants 1-3/5 over the five-module catalogue
/// (spec §8): A publishes `m6`/`m1`; B publishes `m6`, responds `m2`,
/// subscribes `m1` (Single); C is B plus a request consumer of `m4`
/// (Range); D subscribes `m6` (Single), publishes `m5`/`m6`, requests `m4`
/// (Range); E publishes `m3`, responds `m4`, subscribes `m6` (AutoAll) and
/// is `auto_create`.
#[cfg(test)]
mod tests {
    use std::{
        fs,
        sync::atomic::{AtomicU64, Ordering},
        time::{SystemTime, UNIX_EPOCH},
    };

    use ahash::AHashMap;
    use corebus_model::{ConsumerBinding, RemoveResult};
    use rstest::rstest;

    use crate::loader::{LoaderFailure, ModuleFactory, test_support::StubFactory};

    use super::*;

    struct CatalogueLoader {
        manifests: AHashMap<String, ModuleManifest>,
    }

    impl ModuleLoader for CatalogueLoader {
        fn load(&self, path: &Path) -> Result<Box<dyn ModuleFactory>, LoaderFailure> {
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            self.manifests
                .get(name)
                .map(|manifest| Box::new(StubFactory { api_version: corebus_model::CORE_API_VERSION, manifest: manifest.clone() }) as Box<dyn ModuleFactory>)
                .ok_or(LoaderFailure::NotAModule)
        }
    }

    fn module_a() -> ModuleManifest {
        ModuleManifest {
            display_name: "A".into(),
            publish: vec![ProducerDescriptor::new("m6", "pub0", ""), ProducerDescriptor::new("m1", "pub1", "")],
            ..Default::default()
        }
    }

    fn module_b() -> ModuleManifest {
        ModuleManifest {
            display_name: "B".into(),
            publish: vec![ProducerDescriptor::new("m6", "pub0", "")],
            response: vec![ProducerDescriptor::new("m2", "resp0", "")],
            subscribe: vec![ConsumerDescriptor::new("m1", ConsumerCardinality::Single, "sub0", "")],
            ..Default::default()
        }
    }

    fn module_c() -> ModuleManifest {
        let mut manifest = module_b();
        manifest.display_name = "C".into();
        manifest.request.push(ConsumerDescriptor::new("m4", ConsumerCardinality::Range { min: 0, max: 3 }, "req0", ""));
        manifest
    }

    fn module_d() -> ModuleManifest {
        ModuleManifest {
            display_name: "D".into(),
            publish: vec![ProducerDescriptor::new("m5", "pub0", ""), ProducerDescriptor::new("m6", "pub1", "")],
            subscribe: vec![ConsumerDescriptor::new("m6", ConsumerCardinality::Single, "sub0", "")],
            request: vec![ConsumerDescriptor::new("m4", ConsumerCardinality::Range { min: 0, max: 3 }, "req0", "")],
            ..Default::default()
        }
    }

    fn module_e() -> ModuleManifest {
        ModuleManifest {
            display_name: "E".into(),
            publish: vec![ProducerDescriptor::new("m3", "pub0", "")],
            response: vec![ProducerDescriptor::new("m4", "resp0", "")],
            subscribe: vec![ConsumerDescriptor::new("m6", ConsumerCardinality::AutoAll, "sub0", "")],
            auto_create: true,
            ..Default::default()
        }
    }

    static DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// A fresh `modules_dir`/`data_dir` pair per test, named from the
    /// process id, wall-clock time, and a counter so parallel test threads
    /// never collide.
    fn make_catalogue_dirs() -> (std::path::PathBuf, std::path::PathBuf) {
        let unique = format!(
            "corebus-registry-test-{}-{}-{}",
            std::process::id(),
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos(),
            DIR_COUNTER.fetch_add(1, Ordering::Relaxed),
        );
        let root = std::env::temp_dir().join(unique);
        let modules_dir = root.join("modules");
        let data_dir = root.join("data");
        fs::create_dir_all(&modules_dir).unwrap();
        fs::create_dir_all(&data_dir).unwrap();
        for name in ["A", "B", "C", "D", "E"] {
            fs::write(modules_dir.join(name), b"").unwrap();
        }
        (modules_dir, data_dir)
    }

    fn catalogue_bus() -> Arc<Bus> {
        let (modules_dir, data_dir) = make_catalogue_dirs();
        let manifests = [
            ("A".to_string(), module_a()),
            ("B".to_string(), module_b()),
            ("C".to_string(), module_c()),
            ("D".to_string(), module_d()),
            ("E".to_string(), module_e()),
        ]
        .into_iter()
        .collect();
        let loader = CatalogueLoader { manifests };

        let bus = Bus::new(BusConfig { thread_timeout: Duration::from_millis(500), ..BusConfig::default() });
        bus.initialize(&loader, &modules_dir, &data_dir).unwrap();
        bus
    }

    #[rstest]
    fn test_initialize_auto_creates_only_the_auto_all_eligible_module() {
        let bus = catalogue_bus();
        assert_eq!(bus.loaded_modules_count(), 5);
        assert_eq!(bus.running_modules_count(), 1);
        assert_eq!(bus.existing_publish_channels(&ChannelType::new("m6")).len(), 0);
    }

    #[rstest]
    fn test_s1_add_a_wires_publish_channels_and_bumps_state() {
        let bus = catalogue_bus();
        let before = bus.mapping_state_id();

        let ok = bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0));

        assert!(ok);
        assert_eq!(bus.running_modules_count(), 2);
        assert_eq!(bus.existing_publish_channels(&ChannelType::new("m1")).len(), 1);
        assert_eq!(bus.existing_publish_channels(&ChannelType::new("m6")).len(), 1);
        assert_eq!(bus.mapping_state_id(), before.next());
    }

    #[rstest]
    fn test_s2_add_b_bound_to_a_succeeds() {
        let bus = catalogue_bus();
        assert!(bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0)));
        let a_id = RunningModuleId(1);
        let before = bus.mapping_state_id();

        let mut binding = ConsumerBinding::new();
        binding.push(ChannelEndpoint::new(a_id, 1));
        let ok = bus.add_module(LoadedModuleId(1), ChannelBindings { subscribe: vec![binding], request: vec![] });

        assert!(ok);
        assert_eq!(bus.running_modules_count(), 3);
        assert_eq!(bus.mapping_state_id(), before.next());
    }

    #[rstest]
    fn test_s3_invalid_bind_rejected_without_state_change() {
        let bus = catalogue_bus();
        assert!(bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0)));
        let a_id = RunningModuleId(1);
        let before = bus.mapping_state_id();

        // A.ch0 carries `m6`, but B's only subscribe consumer declares `m1`.
        let mut binding = ConsumerBinding::new();
        binding.push(ChannelEndpoint::new(a_id, 0));
        let ok = bus.add_module(LoadedModuleId(1), ChannelBindings { subscribe: vec![binding], request: vec![] });

        assert!(!ok);
        assert_eq!(bus.mapping_state_id(), before);
    }

    #[rstest]
    fn test_s4_remove_a_non_recursive_reports_dependents() {
        let bus = catalogue_bus();
        assert!(bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0)));
        let a_id = RunningModuleId(1);
        let mut binding = ConsumerBinding::new();
        binding.push(ChannelEndpoint::new(a_id, 1));
        assert!(bus.add_module(LoadedModuleId(1), ChannelBindings { subscribe: vec![binding], request: vec![] }));

        let before = bus.mapping_state_id();
        let result = bus.remove_module(a_id, false);

        assert_eq!(result, RemoveResult::HasDependencies);
        assert_eq!(bus.mapping_state_id(), before);
        assert_eq!(bus.running_modules_count(), 3);
    }

    #[rstest]
    fn test_s5_remove_a_recursive_tears_down_dependents_and_keeps_e() {
        let bus = catalogue_bus();
        assert!(bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0)));
        let a_id = RunningModuleId(1);
        let mut binding = ConsumerBinding::new();
        binding.push(ChannelEndpoint::new(a_id, 1));
        assert!(bus.add_module(LoadedModuleId(1), ChannelBindings { subscribe: vec![binding], request: vec![] }));

        let before = bus.mapping_state_id();
        let result = bus.remove_module(a_id, true);

        assert_eq!(result, RemoveResult::Success);
        assert_eq!(bus.mapping_state_id(), before.next());
        assert_eq!(bus.existing_publish_channels(&ChannelType::new("m1")).len(), 0);
        assert_eq!(bus.existing_publish_channels(&ChannelType::new("m6")).len(), 0);
        assert!(matches!(bus.running_module_info(RunningModuleId(0)), RunningModuleInfo::Present { .. }));
        assert!(matches!(bus.running_module_info(a_id), RunningModuleInfo::Tombstoned));
    }

    #[rstest]
    fn test_no_id_reuse_across_remove_and_re_add() {
        let bus = catalogue_bus();
        assert!(bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0)));
        let first = RunningModuleId(1);

        assert_eq!(bus.remove_module(first, true), RemoveResult::Success);
        assert!(bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0)));
        let second = RunningModuleId(2);

        assert_ne!(first, second);
        assert!(matches!(bus.running_module_info(first), RunningModuleInfo::Tombstoned));
        assert!(matches!(bus.running_module_info(second), RunningModuleInfo::Present { .. }));
    }

    #[rstest]
    fn test_dependents_closure_excludes_auto_all_consumer() {
        let bus = catalogue_bus();
        assert!(bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0)));
        let a_id = RunningModuleId(1);
        let mut binding = ConsumerBinding::new();
        binding.push(ChannelEndpoint::new(a_id, 1));
        assert!(bus.add_module(LoadedModuleId(1), ChannelBindings { subscribe: vec![binding], request: vec![] }));
        let b_id = RunningModuleId(2);

        let closure = bus.collect_dependencies(a_id);

        assert_eq!(closure, vec![a_id, b_id]);
    }

    /// A reference model of the running-module table, checked against the
    /// bus after every operation. Mirrors the A/B catalogue: A (`LoadedModuleId(0)`)
    /// needs no bindings, B (`LoadedModuleId(1)`) subscribes to exactly one
    /// A's `m1` channel.
    #[derive(Default)]
    struct ReferenceModel {
        /// One entry per running id ever assigned; `None` once tombstoned.
        slots: Vec<Option<Kind>>,
        /// Present A ids, candidates for a new B to bind to.
        present_a: Vec<RunningModuleId>,
        /// Present B ids mapped to the A id they are bound to.
        present_b: AHashMap<RunningModuleId, RunningModuleId>,
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Kind {
        A,
        B,
    }

    impl ReferenceModel {
        fn add_a(&mut self) -> RunningModuleId {
            let id = RunningModuleId(self.slots.len() as u64);
            self.slots.push(Some(Kind::A));
            self.present_a.push(id);
            id
        }

        fn add_b(&mut self, bound_to: RunningModuleId) -> RunningModuleId {
            let id = RunningModuleId(self.slots.len() as u64);
            self.slots.push(Some(Kind::B));
            self.present_b.insert(id, bound_to);
            id
        }

        /// The dependents closure the bus should compute for `id`: itself,
        /// plus every present B bound to it if `id` is an A.
        fn closure(&self, id: RunningModuleId) -> Vec<RunningModuleId> {
            let mut closure = vec![id];
            if self.slots[id.index()] == Some(Kind::A) {
                closure.extend(self.present_b.iter().filter(|(_, &a)| a == id).map(|(&b, _)| b));
            }
            closure
        }

        fn tombstone(&mut self, id: RunningModuleId) {
            self.slots[id.index()] = None;
            self.present_a.retain(|&a| a != id);
            self.present_b.remove(&id);
        }

        fn present_ids(&self) -> Vec<RunningModuleId> {
            (0..self.slots.len() as u64).map(RunningModuleId).filter(|id| self.slots[id.index()].is_some()).collect()
        }
    }

    /// Hand-rolled randomized model-based test: a fixed-seed `StdRng` drives
    /// a sequence of `add_module`/`remove_module` calls against both the bus
    /// and `ReferenceModel`, asserting agreement after every step. Far fewer
    /// iterations than a pure in-memory model fuzz test would use, since
    /// each add/remove here drives a real OS worker thread through
    /// `thread_start`/`thread_stop` rather than just updating a map.
    #[rstest]
    fn test_control_surface_model_fuzz_testing() {
        use rand::{Rng, SeedableRng, rngs::StdRng};

        let mut rng = StdRng::seed_from_u64(42);
        let bus = catalogue_bus();
        let mut model = ReferenceModel::default();
        let mut expected_state = bus.mapping_state_id();

        let num_operations = 300;
        for op_num in 0..num_operations {
            // A present A guarantees a non-empty removal pool, so "no A yet"
            // is the only case that needs to force `add A` over a random pick.
            let operation = if model.present_a.is_empty() { 0 } else { rng.random_range(0..3) };

            match operation {
                // Add an A.
                0 => {
                    let ok = bus.add_module(LoadedModuleId(0), ChannelBindings::empty(0, 0));
                    assert!(ok, "op {op_num}: add A should always succeed");
                    model.add_a();
                }
                // Add a B bound to a random present A.
                1 => {
                    let a_id = model.present_a[rng.random_range(0..model.present_a.len())];
                    let mut binding = ConsumerBinding::new();
                    binding.push(ChannelEndpoint::new(a_id, 1));
                    let ok = bus.add_module(LoadedModuleId(1), ChannelBindings { subscribe: vec![binding], request: vec![] });
                    assert!(ok, "op {op_num}: add B bound to a present A should always succeed");
                    model.add_b(a_id);
                }
                // Remove a random present module, recursively.
                2 => {
                    let present = model.present_ids();
                    let victim = present[rng.random_range(0..present.len())];
                    let expected_closure = model.closure(victim);

                    let result = bus.remove_module(victim, true);

                    assert_eq!(result, RemoveResult::Success, "op {op_num}: recursive removal should always succeed");
                    for &id in &expected_closure {
                        model.tombstone(id);
                        assert!(
                            matches!(bus.running_module_info(id), RunningModuleInfo::Tombstoned),
                            "op {op_num}: {id} should be tombstoned after removal"
                        );
                    }
                }
                _ => unreachable!(),
            }

            expected_state = expected_state.next();
            assert_eq!(bus.mapping_state_id(), expected_state, "op {op_num}: mapping_state_id should bump by exactly one per successful call");
            assert_eq!(bus.running_modules_count(), model.slots.len(), "op {op_num}: running table length mismatch");
        }

        assert_eq!(
            bus.existing_publish_channels(&ChannelType::new("m1")).len(),
            model.present_a.len(),
            "m1 publisher count should track present A instances"
        );
    }
}
