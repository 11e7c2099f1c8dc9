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

//! Identity types for loaded modules, running modules, and the mapping
//! generation counter.
//!
//! Never store a direct reference to a running module (spec §9): every
//! cross-module edge is one of these small `Copy` ids, resolved through the
//! bus's tables on each use. That naturally accommodates Tombstoned slots.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Index of a [`LoadedModule`](crate::manifest::ModuleManifest) in load
/// order. Stable for the life of the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadedModuleId(pub u32);

impl Display for LoadedModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoadedModuleId({})", self.0)
    }
}

impl LoadedModuleId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a running module instance, assigned monotonically and never
/// reused even across removal and re-addition (spec §3, Testable Property
/// 2).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunningModuleId(pub u64);

impl Display for RunningModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RunningModuleId({})", self.0)
    }
}

impl RunningModuleId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Monotonic counter bumped on every successful `add_module`/`remove_module`
/// (spec §3). Consumers poll it for cheap change detection instead of
/// diffing the whole connection graph.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleMappingStateId(pub u64);

impl ModuleMappingStateId {
    #[must_use]
    pub const fn initial() -> Self {
        Self(0)
    }

    /// Returns the next state id. Does not mutate `self`; callers own the
    /// counter and assign the result back.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for ModuleMappingStateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_mapping_state_id_increments() {
        let a = ModuleMappingStateId::initial();
        let b = a.next();
        assert_eq!(a.0, 0);
        assert_eq!(b.0, 1);
    }
}
