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

//! The `--dump` diagnostic tree: a tabular rendering of the loaded- and
//! running-module tables, built on the same observability getters the bus
//! exposes to any other caller.

use corebus_common::Bus;
use corebus_model::{LoadedModuleId, RunningModuleId};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct LoadedModuleRow {
    #[tabled(rename = "id")]
    id: u32,
    name: String,
    #[tabled(rename = "source-path")]
    source_path: String,
    #[tabled(rename = "auto-create")]
    auto_create: bool,
    publish: usize,
    response: usize,
    subscribe: usize,
    request: usize,
}

#[derive(Tabled)]
struct RunningModuleRow {
    #[tabled(rename = "id")]
    id: u64,
    state: String,
    #[tabled(rename = "loaded-id")]
    loaded_id: String,
    name: String,
}

/// Prints the loaded- and running-module tables to stdout.
pub fn print(bus: &Bus) {
    let loaded_rows: Vec<LoadedModuleRow> = (0..bus.loaded_modules_count())
        .filter_map(|i| {
            let info = bus.loaded_module_info(LoadedModuleId(i as u32))?;
            Some(LoadedModuleRow {
                id: i as u32,
                name: info.name,
                source_path: info.source_path.display().to_string(),
                auto_create: info.manifest.auto_create,
                publish: info.manifest.publish.len(),
                response: info.manifest.response.len(),
                subscribe: info.manifest.subscribe.len(),
                request: info.manifest.request.len(),
            })
        })
        .collect();

    println!("loaded modules ({})", loaded_rows.len());
    if loaded_rows.is_empty() {
        println!("(none)");
    } else {
        println!("{}", Table::new(loaded_rows));
    }
    println!();

    let running_rows: Vec<RunningModuleRow> = (0..bus.running_modules_count())
        .map(|i| {
            let id = RunningModuleId(i as u64);
            let (state, loaded_id, name) = match bus.running_module_info(id) {
                corebus_common::bus::RunningModuleInfo::Present { loaded_id, name } => {
                    ("present".to_string(), loaded_id.to_string(), name)
                }
                corebus_common::bus::RunningModuleInfo::Tombstoned => ("tombstoned".to_string(), "-".to_string(), "-".to_string()),
                corebus_common::bus::RunningModuleInfo::Unknown => ("unknown".to_string(), "-".to_string(), "-".to_string()),
            };
            RunningModuleRow { id: i as u64, state, loaded_id, name }
        })
        .collect();

    println!("running modules ({})", running_rows.len());
    if running_rows.is_empty() {
        println!("(none)");
    } else {
        println!("{}", Table::new(running_rows));
    }
    println!();

    println!("mapping_state_id: {}", bus.mapping_state_id());
}
