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

//! Reference-counted shared-memory blob handles (spec §3, §4.1).
//!
//! A [`SharedDataBlob`] bundles a pointer to its owning allocator with a
//! block identifier and performs reference counting through the owner.
//! Readers never get a raw pointer or a borrowed slice tied to the
//! allocator's internal lock guard: [`BlockOwner::with_bytes`] hands the
//! bytes to a caller-supplied closure instead, so no `unsafe` is needed to
//! hand out data living behind an `Arc<dyn Trait>`. This is a documented
//! protocol, not enforced by the type system (spec §9): the allocator's job
//! ends at lifetime management, and the producer guarantees it does not
//! mutate a blob's bytes after sending.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Opaque identifier for a block within one allocator's address space. Only
/// meaningful paired with the allocator that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

/// The capability surface every concrete allocator implements (spec §4.1):
/// add/remove an owner, and grant scoped access to the block's bytes.
///
/// `add_owner`/`remove_owner` must never panic: on a `BlockId` the owner
/// does not recognize, they log and return, the safe response to a bug
/// elsewhere in the core (spec §4.1 "Failure semantics").
pub trait BlockOwner: Send + Sync + fmt::Debug {
    /// Increments the reference count for `id`.
    fn add_owner(&self, id: BlockId);

    /// Decrements the reference count for `id`; on reaching zero the
    /// implementation recycles or frees the block.
    fn remove_owner(&self, id: BlockId);

    /// Calls `f` with the block's current bytes. A no-op if `id` is
    /// unrecognized (an invariant violation upstream, not asserted here).
    fn with_bytes(&self, id: BlockId, f: &mut dyn FnMut(&[u8]));

    /// Calls `f` with mutable access to the block's bytes. Only the
    /// producer that just allocated the block should use this; once a blob
    /// has been sent, the protocol in the module docs forbids mutation.
    fn with_bytes_mut(&self, id: BlockId, f: &mut dyn FnMut(&mut [u8]));

    /// Returns the block's byte length, or `None` if `id` is unrecognized.
    fn len(&self, id: BlockId) -> Option<usize>;
}

/// A handle `{allocator, block}` with reference-counted lifetime (spec §3).
///
/// Constructing one directly from an allocator does *not* bump the
/// refcount — allocation itself issues the handle at refcount 1. Cloning
/// adds an owner; dropping removes one. An "empty" blob (no allocator
/// backing it) is inert: `valid()` is `false` and all accessors are no-ops.
pub struct SharedDataBlob {
    owner: Option<Arc<dyn BlockOwner>>,
    id: BlockId,
}

impl SharedDataBlob {
    /// Wraps a block just issued by `owner` at refcount 1. Does not call
    /// `add_owner`; the allocator's `allocate` already accounts for this
    /// first reference.
    #[must_use]
    pub fn new(owner: Arc<dyn BlockOwner>, id: BlockId) -> Self {
        Self {
            owner: Some(owner),
            id,
        }
    }

    /// An empty handle referring to no block.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            owner: None,
            id: BlockId(0),
        }
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.owner.is_some()
    }

    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// The block's byte length, or 0 for an empty handle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owner
            .as_ref()
            .and_then(|owner| owner.len(self.id))
            .unwrap_or(0)
    }

    /// Runs `f` against the block's current bytes, returning `None` for an
    /// empty handle.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let owner = self.owner.as_ref()?;
        let mut slot = None;
        let mut f = Some(f);
        owner.with_bytes(self.id, &mut |bytes| {
            if let Some(f) = f.take() {
                slot = Some(f(bytes));
            }
        });
        slot
    }

    /// Runs `f` against the block's mutable bytes, returning `None` for an
    /// empty handle. See the module docs: only the original producer should
    /// call this.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let owner = self.owner.as_ref()?;
        let mut slot = None;
        let mut f = Some(f);
        owner.with_bytes_mut(self.id, &mut |bytes| {
            if let Some(f) = f.take() {
                slot = Some(f(bytes));
            }
        });
        slot
    }
}

impl Clone for SharedDataBlob {
    fn clone(&self) -> Self {
        if let Some(owner) = &self.owner {
            owner.add_owner(self.id);
        }
        Self {
            owner: self.owner.clone(),
            id: self.id,
        }
    }
}

impl Drop for SharedDataBlob {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.remove_owner(self.id);
        }
    }
}

impl fmt::Debug for SharedDataBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDataBlob")
            .field("id", &self.id)
            .field("valid", &self.valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicI64, AtomicU64, Ordering},
    };

    use rstest::rstest;

    use super::*;

    #[derive(Debug, Default)]
    struct CountingOwner {
        refcount: AtomicI64,
        frees: AtomicU64,
    }

    impl BlockOwner for CountingOwner {
        fn add_owner(&self, _id: BlockId) {
            self.refcount.fetch_add(1, Ordering::SeqCst);
        }

        fn remove_owner(&self, _id: BlockId) {
            if self.refcount.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.frees.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn with_bytes(&self, _id: BlockId, f: &mut dyn FnMut(&[u8])) {
            f(&[1, 2, 3]);
        }

        fn with_bytes_mut(&self, _id: BlockId, _f: &mut dyn FnMut(&mut [u8])) {}

        fn len(&self, _id: BlockId) -> Option<usize> {
            Some(3)
        }
    }

    #[rstest]
    fn test_empty_blob_is_invalid() {
        let blob = SharedDataBlob::empty();
        assert!(!blob.valid());
        assert_eq!(blob.len(), 0);
        assert!(blob.with_bytes(|_| ()).is_none());
    }

    #[rstest]
    fn test_refcount_roundtrip_frees_exactly_once() {
        let owner: Arc<CountingOwner> = Arc::new(CountingOwner {
            refcount: AtomicI64::new(1),
            frees: AtomicU64::new(0),
        });
        let a = SharedDataBlob::new(owner.clone() as Arc<dyn BlockOwner>, BlockId(1));
        let b = a.clone();
        let c = b.clone();
        drop(a);
        assert_eq!(owner.frees.load(Ordering::SeqCst), 0);
        drop(b);
        drop(c);
        assert_eq!(owner.frees.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn test_with_bytes_reads_through_owner() {
        let owner: Arc<CountingOwner> = Arc::new(CountingOwner::default());
        let blob = SharedDataBlob::new(owner as Arc<dyn BlockOwner>, BlockId(7));
        let sum: u8 = blob.with_bytes(|bytes| bytes.iter().sum()).unwrap();
        assert_eq!(sum, 6);
    }
}
