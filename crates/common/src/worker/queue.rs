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

//! Per-channel bounded queues and the admission policy (spec §4.2).

use std::collections::VecDeque;

use corebus_model::{ChannelEndpoint, IngressDecision, MessageHeader, PriorityClass};

/// Which inbound list a queue belongs to — determines which `process_*`
/// operation the worker calls on dequeue (spec §4.2).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InboundGroup {
    /// A subscribe consumer receiving published messages.
    Subscribe,
    /// A response producer receiving an inbound request.
    Response,
    /// A request consumer receiving an inbound response.
    Request,
}

/// One dequeued event, queued in enqueue order.
#[derive(Debug)]
pub struct QueueEntry {
    pub source: ChannelEndpoint,
    pub header: MessageHeader,
}

/// Per-channel counters exposed via the diagnostic dump (spec §4.2
/// "Metrics").
#[derive(Copy, Clone, Debug, Default)]
pub struct QueueMetrics {
    pub received: u64,
    pub dropped_by_policy: u64,
    pub dropped_on_full: u64,
    pub evicted_drop_first: u64,
    pub evicted_replace: u64,
}

/// Chooses what happens to an inbound message when its destination queue
/// is at or near capacity (spec §4.2 "Admission (ingress) decision").
pub trait AdmissionPolicy: Send + Sync {
    fn decide(&self, queue_len: usize, capacity: usize) -> IngressDecision;
}

/// Accept while there is room, drop once full — the default policy named
/// in spec §4.2.
#[derive(Debug, Default)]
pub struct DefaultAdmissionPolicy;

impl AdmissionPolicy for DefaultAdmissionPolicy {
    fn decide(&self, queue_len: usize, capacity: usize) -> IngressDecision {
        if queue_len < capacity {
            IngressDecision::Accept
        } else {
            IngressDecision::Drop
        }
    }
}

/// A single bounded FIFO with its priority class and running metrics.
pub struct ChannelQueue {
    pub entries: VecDeque<QueueEntry>,
    pub capacity: usize,
    pub priority: PriorityClass,
    pub metrics: QueueMetrics,
}

impl ChannelQueue {
    #[must_use]
    pub fn new(capacity: usize, priority: PriorityClass) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            priority,
            metrics: QueueMetrics::default(),
        }
    }

    /// Applies `decision` to this queue and, if accepted, pushes `entry`.
    /// Returns the decision unchanged for the caller to report/log.
    ///
    /// `Accept` still drops on a full queue (spec §4.2: "if the queue is
    /// full and the decision is `Accept` or `Drop`, the message is
    /// dropped"). `AcceptDropQueueFirst` only evicts when there is no room;
    /// if the queue has space the new entry is simply appended.
    pub fn admit(&mut self, decision: IngressDecision, entry: QueueEntry) -> IngressDecision {
        self.metrics.received += 1;
        let is_full = self.entries.len() >= self.capacity;
        match decision {
            IngressDecision::Accept => {
                if is_full {
                    self.metrics.dropped_on_full += 1;
                } else {
                    self.entries.push_back(entry);
                }
            }
            IngressDecision::Drop => {
                if is_full {
                    self.metrics.dropped_on_full += 1;
                } else {
                    self.metrics.dropped_by_policy += 1;
                }
            }
            IngressDecision::AcceptDropQueueFirst => {
                if is_full && self.entries.pop_front().is_some() {
                    self.metrics.evicted_drop_first += 1;
                }
                self.entries.push_back(entry);
            }
            IngressDecision::AcceptReplaceQueue => {
                self.metrics.evicted_replace += self.entries.len() as u64;
                self.entries.clear();
                self.entries.push_back(entry);
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn entry(n: u8) -> QueueEntry {
        QueueEntry { source: ChannelEndpoint::new(corebus_model::RunningModuleId(1), 0), header: MessageHeader::new(n as u64, 0, &[n]) }
    }

    #[rstest]
    fn test_drop_while_full_counts_as_dropped_on_full() {
        let mut queue = ChannelQueue::new(1, PriorityClass::Regular);
        queue.admit(IngressDecision::Accept, entry(0));

        queue.admit(IngressDecision::Drop, entry(1));

        assert_eq!(queue.metrics.dropped_on_full, 1);
        assert_eq!(queue.metrics.dropped_by_policy, 0);
    }

    #[rstest]
    fn test_drop_with_room_left_counts_as_dropped_by_policy() {
        let mut queue = ChannelQueue::new(4, PriorityClass::Regular);

        queue.admit(IngressDecision::Drop, entry(0));

        assert_eq!(queue.entries.len(), 0);
        assert_eq!(queue.metrics.dropped_by_policy, 1);
        assert_eq!(queue.metrics.dropped_on_full, 0);
    }
}
