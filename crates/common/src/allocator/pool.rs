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

//! Fixed-slot ("pool") allocator with reference-counted blocks (spec §4.1).

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use corebus_core::correctness::MUTEX_POISONED;
use corebus_model::{BlockId, BlockOwner, SharedDataBlob};

use crate::error::CoreError;

struct Slot {
    bytes: Vec<u8>,
    refcount: i64,
    allocated: bool,
}

struct Inner {
    slots: Vec<Slot>,
    free_list: VecDeque<usize>,
}

/// Pre-allocates `slot_count` slots of `slot_bytes` each at construction.
/// `allocate` ignores its requested size and pops a free slot index; the
/// last `remove_owner` on a slot pushes it back onto the free list rather
/// than freeing the underlying buffer (spec §4.1 "Pool (fixed-slot)
/// allocator").
pub struct PoolAllocator {
    inner: Mutex<Inner>,
    slot_bytes: usize,
}

impl std::fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        f.debug_struct("PoolAllocator")
            .field("slot_bytes", &self.slot_bytes)
            .field("slot_count", &inner.slots.len())
            .field("free", &inner.free_list.len())
            .finish()
    }
}

impl PoolAllocator {
    /// Pre-allocates every slot up front. Fails fatally (returns an error
    /// rather than a partially-constructed allocator) if any slot's heap
    /// allocation fails, matching the original `StaticAllocator`
    /// constructor throwing on partial failure.
    pub fn new(slot_bytes: usize, slot_count: usize) -> Result<Arc<Self>, CoreError> {
        let mut slots = Vec::with_capacity(slot_count);
        for slot_index in 0..slot_count {
            let mut bytes = Vec::new();
            if bytes.try_reserve_exact(slot_bytes).is_err() {
                return Err(CoreError::PoolAllocationFailed { slot_index, slot_count });
            }
            bytes.resize(slot_bytes, 0);
            slots.push(Slot { bytes, refcount: 0, allocated: false });
        }

        let free_list = (0..slot_count).collect();

        Ok(Arc::new(Self {
            inner: Mutex::new(Inner { slots, free_list }),
            slot_bytes,
        }))
    }

    /// Pops a free slot and returns its handle at refcount 1, ignoring
    /// `requested_bytes` beyond a debug-only sanity check (spec §9 Open
    /// Question 4). Returns `None` if the pool is drained.
    pub fn allocate(self: &Arc<Self>, requested_bytes: usize) -> Option<SharedDataBlob> {
        debug_assert!(
            requested_bytes <= self.slot_bytes,
            "requested {requested_bytes} bytes exceeds pool slot size {}",
            self.slot_bytes
        );

        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        let slot_index = inner.free_list.pop_front()?;
        let slot = &mut inner.slots[slot_index];
        slot.allocated = true;
        slot.refcount = 1;
        drop(inner);

        Some(SharedDataBlob::new(self.clone(), BlockId(slot_index as u64)))
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISONED).free_list.len()
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISONED).slots.len()
    }
}

impl BlockOwner for PoolAllocator {
    fn add_owner(&self, id: BlockId) {
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        match inner.slots.get_mut(id.0 as usize) {
            Some(slot) if slot.allocated => slot.refcount += 1,
            _ => tracing::error!(?id, "add_owner: unrecognized or unallocated slot"),
        }
    }

    fn remove_owner(&self, id: BlockId) {
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        let slot_index = id.0 as usize;
        let Some(slot) = inner.slots.get_mut(slot_index) else {
            tracing::error!(?id, "remove_owner: unrecognized slot");
            return;
        };
        if !slot.allocated {
            tracing::error!(?id, "remove_owner: slot not currently allocated");
            return;
        }
        slot.refcount -= 1;
        if slot.refcount <= 0 {
            slot.allocated = false;
            inner.free_list.push_back(slot_index);
        }
    }

    fn with_bytes(&self, id: BlockId, f: &mut dyn FnMut(&[u8])) {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        if let Some(slot) = inner.slots.get(id.0 as usize).filter(|s| s.allocated) {
            f(&slot.bytes);
        }
    }

    fn with_bytes_mut(&self, id: BlockId, f: &mut dyn FnMut(&mut [u8])) {
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        if let Some(slot) = inner.slots.get_mut(id.0 as usize).filter(|s| s.allocated) {
            f(&mut slot.bytes);
        }
    }

    fn len(&self, id: BlockId) -> Option<usize> {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        inner.slots.get(id.0 as usize).filter(|s| s.allocated).map(|s| s.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_allocate_drains_and_refills_free_list() {
        let pool = PoolAllocator::new(64, 2).unwrap();
        assert_eq!(pool.free_count(), 2);

        let a = pool.allocate(10).unwrap();
        let b = pool.allocate(10).unwrap();
        assert_eq!(pool.free_count(), 0);
        assert!(pool.allocate(10).is_none());

        drop(a);
        assert_eq!(pool.free_count(), 1);
        drop(b);
        assert_eq!(pool.free_count(), 2);
    }

    #[rstest]
    fn test_slot_bytes_ignores_requested_size() {
        let pool = PoolAllocator::new(64, 1).unwrap();
        let blob = pool.allocate(4).unwrap();
        assert_eq!(blob.len(), 64);
    }

    #[rstest]
    fn test_reallocation_reuses_slot_index() {
        let pool = PoolAllocator::new(16, 1).unwrap();
        let a = pool.allocate(16).unwrap();
        let first_id = a.id();
        drop(a);
        let b = pool.allocate(16).unwrap();
        assert_eq!(b.id(), first_id);
    }
}
