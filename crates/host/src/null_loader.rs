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

//! The default [`ModuleLoader`] this host ships.
//!
//! Dynamic library discovery and symbol resolution are a deliberately
//! unimplemented collaborator seam: every candidate path is reported as not
//! a module. This keeps `corebus` runnable end to end (argument parsing,
//! bus bootstrap, the diagnostic dump, and graceful shutdown all exercise
//! real code paths) without fabricating a plug-in ABI loader. A deployment
//! that needs real plug-ins supplies its own [`ModuleLoader`] in its place.

use std::path::Path;

use corebus_common::{LoaderFailure, ModuleFactory, ModuleLoader};

pub struct NullModuleLoader;

impl ModuleLoader for NullModuleLoader {
    fn load(&self, _path: &Path) -> Result<Box<dyn ModuleFactory>, LoaderFailure> {
        Err(LoaderFailure::NotAModule)
    }
}
