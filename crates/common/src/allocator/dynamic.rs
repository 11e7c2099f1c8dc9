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

//! Heap-backed allocator with reference-counted blocks (spec §4.1).

use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use corebus_core::correctness::MUTEX_POISONED;
use corebus_model::{BlockId, BlockOwner, SharedDataBlob};

struct Block {
    bytes: Vec<u8>,
    refcount: i64,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    blocks: AHashMap<BlockId, Block>,
}

/// Maps an allocation id to a block of raw bytes plus a refcount, all
/// behind one mutex (spec §4.1 "Dynamic allocator"). `allocate` bumps the
/// next id and asks the process heap for memory; on allocation failure it
/// returns `None` and logs, rather than aborting.
#[derive(Default)]
pub struct DynamicAllocator {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for DynamicAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live = self.inner.lock().expect(MUTEX_POISONED).blocks.len();
        f.debug_struct("DynamicAllocator").field("live_blocks", &live).finish()
    }
}

impl DynamicAllocator {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Allocates `n_bytes` of zeroed memory and returns a handle at
    /// refcount 1, or `None` if the heap allocation fails.
    pub fn allocate(self: &Arc<Self>, n_bytes: usize) -> Option<SharedDataBlob> {
        let mut bytes = Vec::new();
        if bytes.try_reserve_exact(n_bytes).is_err() {
            tracing::warn!(n_bytes, "dynamic allocator: heap allocation failed");
            return None;
        }
        bytes.resize(n_bytes, 0);

        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        let id = BlockId(inner.next_id);
        inner.next_id += 1;
        inner.blocks.insert(id, Block { bytes, refcount: 1 });
        drop(inner);

        Some(SharedDataBlob::new(self.clone(), id))
    }

    /// Number of blocks currently live. Exposed for diagnostics and tests.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISONED).blocks.len()
    }
}

impl BlockOwner for DynamicAllocator {
    fn add_owner(&self, id: BlockId) {
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        match inner.blocks.get_mut(&id) {
            Some(block) => block.refcount += 1,
            None => tracing::error!(?id, "add_owner: unrecognized block id"),
        }
    }

    fn remove_owner(&self, id: BlockId) {
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        let Some(block) = inner.blocks.get_mut(&id) else {
            tracing::error!(?id, "remove_owner: unrecognized block id");
            return;
        };
        block.refcount -= 1;
        if block.refcount <= 0 {
            inner.blocks.remove(&id);
        }
    }

    fn with_bytes(&self, id: BlockId, f: &mut dyn FnMut(&[u8])) {
        let inner = self.inner.lock().expect(MUTEX_POISONED);
        if let Some(block) = inner.blocks.get(&id) {
            f(&block.bytes);
        }
    }

    fn with_bytes_mut(&self, id: BlockId, f: &mut dyn FnMut(&mut [u8])) {
        let mut inner = self.inner.lock().expect(MUTEX_POISONED);
        if let Some(block) = inner.blocks.get_mut(&id) {
            f(&mut block.bytes);
        }
    }

    fn len(&self, id: BlockId) -> Option<usize> {
        self.inner.lock().expect(MUTEX_POISONED).blocks.get(&id).map(|b| b.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_allocate_and_free_on_zero_refcount() {
        let allocator = DynamicAllocator::new();
        let blob = allocator.allocate(128).unwrap();
        assert_eq!(blob.len(), 128);
        assert_eq!(allocator.live_count(), 1);

        drop(blob);
        assert_eq!(allocator.live_count(), 0);
    }

    #[rstest]
    fn test_clone_adds_owner_and_both_drops_free_once() {
        let allocator = DynamicAllocator::new();
        let a = allocator.allocate(8).unwrap();
        let b = a.clone();
        assert_eq!(allocator.live_count(), 1);

        drop(a);
        assert_eq!(allocator.live_count(), 1);
        drop(b);
        assert_eq!(allocator.live_count(), 0);
    }

    #[rstest]
    fn test_unrecognized_block_id_is_a_safe_no_op() {
        let allocator = DynamicAllocator::new();
        allocator.add_owner(BlockId(9999));
        allocator.remove_owner(BlockId(9999));
        assert_eq!(allocator.live_count(), 0);
    }

    #[rstest]
    fn test_with_bytes_mut_writes_through() {
        let allocator = DynamicAllocator::new();
        let blob = allocator.allocate(4).unwrap();
        blob.with_bytes_mut(|bytes| bytes.copy_from_slice(&[1, 2, 3, 4]));
        let sum: u8 = blob.with_bytes(|bytes| bytes.iter().sum()).unwrap();
        assert_eq!(sum, 10);
    }
}
