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

//! The module bus engine: the registry, worker threads, allocators, and the
//! module-facing facade built on top of `corebus-model`'s pure data types.
//!
//! This is where everything that owns a thread, a lock, or a heap
//! allocation lives. Nothing in `corebus-model` depends on it; everything
//! in `corebus-host` depends on it.

pub mod allocator;
pub mod bus;
pub mod config;
pub mod error;
pub mod facade;
pub mod loader;
pub mod logging;
pub mod worker;

pub use bus::Bus;
pub use config::BusConfig;
pub use error::CoreError;
pub use facade::CoreFacade;
pub use loader::{LoaderFailure, ModuleCreateContext, ModuleFactory, ModuleLoader};
