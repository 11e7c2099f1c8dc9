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

//! A loaded module library (spec §3 "LoadedModule").

use std::{path::PathBuf, sync::Arc};

use corebus_model::ModuleManifest;

use crate::loader::ModuleFactory;

/// A loaded plug-in library: its stable name, an optional data directory,
/// its manifest, and the factory used to spawn instances. Persists for the
/// life of the process; never removed.
pub struct LoadedModule {
    pub name: String,
    /// The candidate path this module was loaded from, retained for
    /// diagnostics even though nothing in the wiring graph needs it again.
    pub source_path: PathBuf,
    pub data_path: Option<PathBuf>,
    pub manifest: ModuleManifest,
    pub factory: Arc<dyn ModuleFactory>,
}
