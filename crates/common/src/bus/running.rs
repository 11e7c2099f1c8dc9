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

//! A running module instance and its slot state (spec §3 "RunningModule").

use std::sync::Arc;

use corebus_model::{ConnectionMap, LoadedModuleId};

use crate::{logging::ScopedLogger, worker::ModuleWorker};

/// A live module instance: its originating library, a logger scoped to its
/// name and id, its connection map, and its worker.
pub struct RunningModule {
    pub loaded_id: LoadedModuleId,
    pub logger: ScopedLogger,
    pub connections: ConnectionMap,
    pub worker: Arc<ModuleWorker>,
}

/// One slot in the running-module table: either a live module, or the
/// tombstone left after removal. The id is never reassigned (spec §3).
pub enum RunningSlot {
    Present(RunningModule),
    Tombstoned,
}

impl RunningSlot {
    #[must_use]
    pub fn as_present(&self) -> Option<&RunningModule> {
        match self {
            Self::Present(module) => Some(module),
            Self::Tombstoned => None,
        }
    }

    #[must_use]
    pub fn as_present_mut(&mut self) -> Option<&mut RunningModule> {
        match self {
            Self::Present(module) => Some(module),
            Self::Tombstoned => None,
        }
    }
}
