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

//! The plug-in loading collaborator (spec §6.1).
//!
//! Dynamic library discovery and symbol resolution are explicitly out of
//! scope (spec §1): [`ModuleLoader`] is the seam a host supplies its own
//! implementation through (`libloading`-backed, statically linked test
//! doubles, whatever fits). The bus only asks a loader to resolve one
//! candidate path into a [`ModuleFactory`] and checks the reported API
//! version itself.

use std::{path::Path, sync::Arc};

use corebus_model::{ChannelBindings, ModuleManifest, RunningModuleId};

use crate::{facade::CoreFacade, logging::ScopedLogger, worker::ModulePlugin};

/// Why a candidate path did not produce a loaded module (spec §7
/// `LoaderFailure`).
#[derive(Debug)]
pub enum LoaderFailure {
    /// The path is not a module library the loader recognizes.
    NotAModule,
    /// The library is missing one or more required ABI entry points.
    MissingSymbols(String),
    /// Any other I/O or dynamic-linking failure, carrying a description.
    Io(String),
}

impl std::fmt::Display for LoaderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAModule => write!(f, "not a module library"),
            Self::MissingSymbols(sym) => write!(f, "missing symbol: {sym}"),
            Self::Io(reason) => write!(f, "load failed: {reason}"),
        }
    }
}

/// Everything `create_module` needs from the bus (spec §6.1's
/// `create_module(data_path, core_facade, bindings, logger, module_id)`).
pub struct ModuleCreateContext {
    pub data_path: Option<std::path::PathBuf>,
    pub facade: CoreFacade,
    pub bindings: ChannelBindings,
    pub logger: ScopedLogger,
    pub module_id: RunningModuleId,
}

/// One loaded plug-in library's entry points, modeling the four-symbol ABI
/// of spec §6.1 as a Rust trait object rather than raw function pointers.
pub trait ModuleFactory: Send + Sync {
    /// `read_plugin_api_version`.
    fn api_version(&self) -> u64;

    /// `read_module_info`.
    fn manifest(&self) -> ModuleManifest;

    /// `create_module`. Returns `None` on construction failure (spec §6.1
    /// "may return null").
    fn create(&self, ctx: ModuleCreateContext) -> Option<Arc<dyn ModulePlugin>>;

    /// `destroy_module`: the second half of the ABI's two-phase teardown.
    /// Called unconditionally on removal, after `thread_stop` has been
    /// attempted (regardless of whether it timed out) and before the
    /// module's `Arc<dyn ModulePlugin>` is dropped. Most factories have
    /// nothing to do here beyond what `Drop` already handles; the default
    /// body reflects that.
    fn destroy(&self, _plugin: &Arc<dyn ModulePlugin>) {}
}

/// Resolves a candidate path in `modules_dir` into a loaded factory, or
/// reports why it could not (spec §4.3.1 step 1).
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn ModuleFactory>, LoaderFailure>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use corebus_model::MessageHeader;

    use super::*;

    /// A no-op plug-in used by the bus's own tests: it records every event
    /// it is handed without doing anything with it.
    pub struct RecordingModule {
        pub messages: Mutex<Vec<(u32, corebus_model::ChannelEndpoint)>>,
        pub requests: Mutex<Vec<(u32, corebus_model::ChannelEndpoint)>>,
        pub responses: Mutex<Vec<(u32, corebus_model::ChannelEndpoint)>>,
    }

    impl Default for RecordingModule {
        fn default() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(Vec::new()),
            }
        }
    }

    impl ModulePlugin for RecordingModule {
        fn process_message(&self, local_channel: u32, source: corebus_model::ChannelEndpoint, _header: &MessageHeader) {
            self.messages.lock().unwrap().push((local_channel, source));
        }

        fn process_request(&self, local_channel: u32, source: corebus_model::ChannelEndpoint, _header: &MessageHeader) {
            self.requests.lock().unwrap().push((local_channel, source));
        }

        fn process_response(&self, local_channel: u32, source: corebus_model::ChannelEndpoint, _header: &MessageHeader) {
            self.responses.lock().unwrap().push((local_channel, source));
        }
    }

    /// A stub factory that always succeeds, built straight from a manifest.
    pub struct StubFactory {
        pub api_version: u64,
        pub manifest: ModuleManifest,
    }

    impl ModuleFactory for StubFactory {
        fn api_version(&self) -> u64 {
            self.api_version
        }

        fn manifest(&self) -> ModuleManifest {
            self.manifest.clone()
        }

        fn create(&self, _ctx: ModuleCreateContext) -> Option<Arc<dyn ModulePlugin>> {
            Some(Arc::new(RecordingModule::default()))
        }
    }
}
