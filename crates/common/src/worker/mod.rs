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

//! The module worker: per-channel queues, admission, and the scheduling
//! threads that drain them (spec §4.2).

mod queue;

use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use corebus_model::{ChannelEndpoint, MessageHeader, ModuleManifest, PriorityClass};

pub use queue::{AdmissionPolicy, ChannelQueue, DefaultAdmissionPolicy, InboundGroup, QueueEntry, QueueMetrics};

use crate::logging::ScopedLogger;

/// The capability a module plug-in's `create_module` hands back (spec
/// §6.1: "an opaque object implementing the worker capability"). Called
/// from the module's own worker threads as queued events are drained.
pub trait ModulePlugin: Send + Sync {
    /// A published message arrived on a subscribe consumer.
    fn process_message(&self, local_channel: u32, source: ChannelEndpoint, header: &MessageHeader);

    /// A request arrived on a response producer.
    fn process_request(&self, local_channel: u32, source: ChannelEndpoint, header: &MessageHeader);

    /// A response arrived on a request consumer.
    fn process_response(&self, local_channel: u32, source: ChannelEndpoint, header: &MessageHeader);
}

#[derive(Copy, Clone)]
struct QueueRef {
    group: InboundGroup,
    index: usize,
}

struct WorkerQueues {
    subscribe: Vec<ChannelQueue>,
    response: Vec<ChannelQueue>,
    request: Vec<ChannelQueue>,
    regular_refs: Vec<QueueRef>,
    prioritized_refs: Vec<QueueRef>,
    regular_rr: usize,
    prioritized_rr: usize,
}

impl WorkerQueues {
    fn group_mut(&mut self, group: InboundGroup) -> &mut Vec<ChannelQueue> {
        match group {
            InboundGroup::Subscribe => &mut self.subscribe,
            InboundGroup::Response => &mut self.response,
            InboundGroup::Request => &mut self.request,
        }
    }

    /// Pops the next available entry by round-robin across `refs`,
    /// advancing `rr_index` so no channel starves (spec §4.2 "Scheduling").
    fn pop_round_robin(refs: &[QueueRef], rr_index: &mut usize, queues: &mut WorkerQueues) -> Option<(QueueRef, QueueEntry)> {
        if refs.is_empty() {
            return None;
        }
        for step in 0..refs.len() {
            let idx = (*rr_index + step) % refs.len();
            let q_ref = refs[idx];
            let queue = &mut queues.group_mut(q_ref.group)[q_ref.index];
            if let Some(entry) = queue.entries.pop_front() {
                *rr_index = (idx + 1) % refs.len();
                return Some((q_ref, entry));
            }
        }
        None
    }
}

/// Wraps one module instance: its inbound queues, admission policy, and
/// worker threads (spec §4.2).
pub struct ModuleWorker {
    queues: Mutex<WorkerQueues>,
    regular_cv: Condvar,
    prioritized_cv: Condvar,
    stop_flag: AtomicBool,
    running_count: AtomicUsize,
    threads: Mutex<Vec<JoinHandle<()>>>,
    plugin: Arc<dyn ModulePlugin>,
    admission: Arc<dyn AdmissionPolicy>,
    regular_workers: usize,
    prioritized_workers: usize,
    logger: ScopedLogger,
}

/// How long a worker thread sleeps at most between checks of the stop
/// flag when its queues are empty.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl ModuleWorker {
    /// Builds a worker sized to `manifest`'s channel counts, with empty
    /// queues (spec §4.3.2 step 6).
    #[must_use]
    pub fn new(
        manifest: &ModuleManifest,
        plugin: Arc<dyn ModulePlugin>,
        queue_capacity: usize,
        regular_workers: usize,
        prioritized_workers: usize,
        logger: ScopedLogger,
    ) -> Arc<Self> {
        let make_queues = |priorities: &[PriorityClass]| -> Vec<ChannelQueue> {
            priorities.iter().map(|p| ChannelQueue::new(queue_capacity, *p)).collect()
        };

        let subscribe_priorities: Vec<_> = manifest.subscribe.iter().map(|c| c.priority).collect();
        let response_priorities: Vec<_> = manifest.response.iter().map(|p| p.priority).collect();
        let request_priorities: Vec<_> = manifest.request.iter().map(|c| c.priority).collect();

        let subscribe = make_queues(&subscribe_priorities);
        let response = make_queues(&response_priorities);
        let request = make_queues(&request_priorities);

        let mut regular_refs = Vec::new();
        let mut prioritized_refs = Vec::new();
        for (group, priorities) in [
            (InboundGroup::Subscribe, &subscribe_priorities),
            (InboundGroup::Response, &response_priorities),
            (InboundGroup::Request, &request_priorities),
        ] {
            for (index, priority) in priorities.iter().enumerate() {
                let q_ref = QueueRef { group, index };
                match priority {
                    PriorityClass::Regular => regular_refs.push(q_ref),
                    PriorityClass::Prioritized => prioritized_refs.push(q_ref),
                }
            }
        }

        Arc::new(Self {
            queues: Mutex::new(WorkerQueues {
                subscribe,
                response,
                request,
                regular_refs,
                prioritized_refs,
                regular_rr: 0,
                prioritized_rr: 0,
            }),
            regular_cv: Condvar::new(),
            prioritized_cv: Condvar::new(),
            stop_flag: AtomicBool::new(false),
            running_count: AtomicUsize::new(0),
            threads: Mutex::new(Vec::new()),
            plugin,
            admission: Arc::new(DefaultAdmissionPolicy),
            regular_workers,
            prioritized_workers,
            logger,
        })
    }

    /// Enqueues one inbound event, applying the admission policy (spec
    /// §4.2). Wakes the worker class that owns this queue's priority.
    pub fn enqueue(self: &Arc<Self>, group: InboundGroup, local_channel: u32, source: ChannelEndpoint, header: MessageHeader) {
        let mut queues = self.queues.lock().expect(corebus_core::correctness::MUTEX_POISONED);
        let Some(queue) = queues.group_mut(group).get_mut(local_channel as usize) else {
            tracing::error!(local_channel, "enqueue: channel index out of range");
            return;
        };

        let decision = self.admission.decide(queue.entries.len(), queue.capacity);
        let priority = queue.priority;
        queue.admit(decision, QueueEntry { source, header });
        drop(queues);

        match priority {
            PriorityClass::Regular => self.regular_cv.notify_all(),
            PriorityClass::Prioritized => self.prioritized_cv.notify_all(),
        }
    }

    /// Spawns `regular_workers + prioritized_workers` threads, each calling
    /// back into `plugin`. Returns `true` once every thread has signaled it
    /// is running, within `timeout` (spec §4.2 "Start/stop").
    pub fn thread_start(self: &Arc<Self>, timeout: Duration) -> bool {
        self.stop_flag.store(false, Ordering::SeqCst);
        let total = self.regular_workers + self.prioritized_workers;
        let mut handles = Vec::with_capacity(total);

        for _ in 0..self.regular_workers {
            handles.push(self.spawn_worker(PriorityClass::Regular));
        }
        for _ in 0..self.prioritized_workers {
            handles.push(self.spawn_worker(PriorityClass::Prioritized));
        }
        *self.threads.lock().expect(corebus_core::correctness::MUTEX_POISONED) = handles;

        let deadline = Instant::now() + timeout;
        while self.running_count.load(Ordering::SeqCst) < total {
            if Instant::now() >= deadline {
                self.logger.error("thread_start: timed out waiting for workers to start");
                return false;
            }
            std::thread::yield_now();
        }
        true
    }

    fn spawn_worker(self: &Arc<Self>, class: PriorityClass) -> JoinHandle<()> {
        let worker = Arc::clone(self);
        std::thread::spawn(move || worker.run(class))
    }

    fn run(self: Arc<Self>, class: PriorityClass) {
        self.running_count.fetch_add(1, Ordering::SeqCst);
        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }

            let popped = {
                let mut queues = self.queues.lock().expect(corebus_core::correctness::MUTEX_POISONED);
                let result = match class {
                    PriorityClass::Regular => {
                        let mut rr = queues.regular_rr;
                        let refs = queues.regular_refs.clone();
                        let popped = WorkerQueues::pop_round_robin(&refs, &mut rr, &mut queues);
                        queues.regular_rr = rr;
                        popped
                    }
                    PriorityClass::Prioritized => {
                        let mut rr = queues.prioritized_rr;
                        let refs = queues.prioritized_refs.clone();
                        let popped = WorkerQueues::pop_round_robin(&refs, &mut rr, &mut queues);
                        queues.prioritized_rr = rr;
                        popped
                    }
                };

                if result.is_none() {
                    let cv = match class {
                        PriorityClass::Regular => &self.regular_cv,
                        PriorityClass::Prioritized => &self.prioritized_cv,
                    };
                    let _ = cv.wait_timeout(queues, POLL_INTERVAL);
                }
                result
            };

            if let Some((q_ref, entry)) = popped {
                match q_ref.group {
                    InboundGroup::Subscribe => {
                        self.plugin.process_message(q_ref.index as u32, entry.source, &entry.header);
                    }
                    InboundGroup::Response => {
                        self.plugin.process_request(q_ref.index as u32, entry.source, &entry.header);
                    }
                    InboundGroup::Request => {
                        self.plugin.process_response(q_ref.index as u32, entry.source, &entry.header);
                    }
                }
            }
        }
        self.running_count.fetch_sub(1, Ordering::SeqCst);
    }

    /// Signals every worker thread to stop and joins them, returning `true`
    /// if they all exit within `timeout`. Idempotent once begun (spec §4.2
    /// "Start/stop").
    pub fn thread_stop(self: &Arc<Self>, timeout: Duration) -> bool {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.regular_cv.notify_all();
        self.prioritized_cv.notify_all();

        let deadline = Instant::now() + timeout;
        while self.running_count.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                self.logger.error("thread_stop: timed out waiting for workers to stop");
                return false;
            }
            std::thread::yield_now();
        }

        let handles = std::mem::take(&mut *self.threads.lock().expect(corebus_core::correctness::MUTEX_POISONED));
        for handle in handles {
            let _ = handle.join();
        }
        true
    }

    /// The plug-in instance this worker drains, handed to
    /// `ModuleFactory::destroy` after `thread_stop` succeeds.
    #[must_use]
    pub fn plugin(&self) -> &Arc<dyn ModulePlugin> {
        &self.plugin
    }

    /// Per-channel metrics snapshot for the diagnostic dump (spec §4.2
    /// "Metrics").
    #[must_use]
    pub fn metrics(&self, group: InboundGroup, local_channel: u32) -> Option<QueueMetrics> {
        let mut queues = self.queues.lock().expect(corebus_core::correctness::MUTEX_POISONED);
        queues.group_mut(group).get(local_channel as usize).map(|q| q.metrics)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex as StdMutex,
        atomic::{AtomicUsize as StdAtomicUsize, Ordering as StdOrdering},
    };

    use corebus_model::{ConsumerCardinality, ConsumerDescriptor, RunningModuleId};
    use rstest::rstest;

    use super::*;

    struct RecordingPlugin {
        received: StdMutex<Vec<Vec<u8>>>,
        count: StdAtomicUsize,
    }

    impl RecordingPlugin {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: StdMutex::new(Vec::new()),
                count: StdAtomicUsize::new(0),
            })
        }
    }

    impl ModulePlugin for RecordingPlugin {
        fn process_message(&self, _local_channel: u32, _source: ChannelEndpoint, header: &MessageHeader) {
            self.received.lock().unwrap().push(header.bytes.to_vec());
            self.count.fetch_add(1, StdOrdering::SeqCst);
        }

        fn process_request(&self, _local_channel: u32, _source: ChannelEndpoint, _header: &MessageHeader) {}

        fn process_response(&self, _local_channel: u32, _source: ChannelEndpoint, _header: &MessageHeader) {}
    }

    fn manifest_with_one_subscriber() -> ModuleManifest {
        ModuleManifest {
            subscribe: vec![ConsumerDescriptor::new("m1/v1:int", ConsumerCardinality::Single, "s0", "")],
            ..Default::default()
        }
    }

    #[rstest]
    fn test_fifo_order_preserved_for_single_channel() {
        let plugin = RecordingPlugin::new();
        let manifest = manifest_with_one_subscriber();
        let logger = ScopedLogger::new("worker-test", RunningModuleId(1));
        let worker = ModuleWorker::new(&manifest, plugin.clone(), 10, 1, 1, logger);

        assert!(worker.thread_start(Duration::from_secs(1)));

        let source = ChannelEndpoint::new(RunningModuleId(2), 0);
        for i in 0..5u8 {
            worker.enqueue(InboundGroup::Subscribe, 0, source, MessageHeader::new(i as u64, 0, &[i]));
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while plugin.count.load(StdOrdering::SeqCst) < 5 && Instant::now() < deadline {
            std::thread::yield_now();
        }

        assert!(worker.thread_stop(Duration::from_secs(1)));

        let received = plugin.received.lock().unwrap();
        assert_eq!(received.len(), 5);
        for (i, bytes) in received.iter().enumerate() {
            assert_eq!(bytes, &vec![i as u8]);
        }
    }

    #[rstest]
    fn test_queue_full_drops_with_default_policy() {
        let plugin = RecordingPlugin::new();
        let manifest = manifest_with_one_subscriber();
        let logger = ScopedLogger::new("worker-test", RunningModuleId(1));
        // No workers started: queue never drains, so capacity limits are observable.
        let worker = ModuleWorker::new(&manifest, plugin, 2, 1, 1, logger);
        let source = ChannelEndpoint::new(RunningModuleId(2), 0);

        for i in 0..5u8 {
            worker.enqueue(InboundGroup::Subscribe, 0, source, MessageHeader::new(i as u64, 0, &[i]));
        }

        let metrics = worker.metrics(InboundGroup::Subscribe, 0).unwrap();
        assert_eq!(metrics.received, 5);
        assert_eq!(metrics.dropped_on_full, 3);
    }
}
