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

//! The core host process: loads modules from `modules_dir`, starts the bus,
//! stays alive running them, and tears everything down on SIGINT/close.

mod dump;
mod null_loader;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use corebus_common::{Bus, BusConfig};
use corebus_model::RunningModuleId;

use null_loader::NullModuleLoader;

/// In-process module bus and lifecycle manager.
#[derive(Parser)]
#[command(name = "corebus", version, about)]
struct Cli {
    /// Directory to scan for plug-in module libraries.
    modules_dir: PathBuf,

    /// Directory holding each module's persisted data, named by module name.
    data_dir: PathBuf,

    /// Print a table of loaded/running modules and exit without starting
    /// worker threads.
    #[arg(long)]
    dump: bool,
}

/// Distinct exit codes beyond clap's own parse-error code (2), so a
/// supervising process can tell "bad arguments" apart from "ran and failed
/// to initialize".
const EXIT_INITIALIZE_FAILED: u8 = 3;

fn main() -> ExitCode {
    corebus_common::logging::ensure_logging_initialized();
    let cli = Cli::parse();

    let config = BusConfig::from_env();
    let bus = Bus::new(config);
    let loader = NullModuleLoader;

    if let Err(err) = bus.initialize(&loader, &cli.modules_dir, &cli.data_dir) {
        tracing::error!(modules_dir = %cli.modules_dir.display(), %err, "failed to initialize module bus");
        return ExitCode::from(EXIT_INITIALIZE_FAILED);
    }

    if cli.dump {
        dump::print(&bus);
        return ExitCode::SUCCESS;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime")
        .block_on(run_until_signalled(&bus));

    ExitCode::SUCCESS
}

/// Stays alive until SIGINT/close, then joins every running module's worker
/// threads in reverse load order.
async fn run_until_signalled(bus: &Arc<Bus>) {
    tracing::info!(running = bus.running_modules_count(), "module bus initialized, awaiting shutdown signal");

    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install Ctrl+C handler, shutting down immediately");
    } else {
        tracing::info!("shutdown signal received");
    }

    let running = bus.running_modules_count();
    for raw_id in (0..running).rev() {
        let id = RunningModuleId(raw_id as u64);
        match bus.remove_module(id, true) {
            corebus_model::RemoveResult::DoesNotExist => {}
            corebus_model::RemoveResult::ThreadStopFailed => {
                tracing::warn!(%id, "worker thread did not stop within the configured timeout");
            }
            corebus_model::RemoveResult::HasDependencies | corebus_model::RemoveResult::Success => {}
        }
    }

    tracing::info!("teardown complete");
}
