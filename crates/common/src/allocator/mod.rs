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

//! The two shared-memory allocators (spec §4.1).

mod dynamic;
mod pool;

pub use dynamic::DynamicAllocator;
pub use pool::PoolAllocator;

/// Identity of an allocator registered with the bus, returned from
/// `create_dynamic_allocator`/`create_buffer_allocator` so a module can
/// later request `delete_allocator` (spec §4.4).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AllocatorId(pub u64);

impl std::fmt::Display for AllocatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllocatorId({})", self.0)
    }
}
