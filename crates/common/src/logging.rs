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

//! The logging sink collaborator (spec §1 "Logging sinks").
//!
//! A module's facade hands it a [`ScopedLogger`] carrying its name and
//! [`RunningModuleId`](corebus_model::RunningModuleId) as structured fields,
//! so every line a module emits is attributable without string-formatting
//! the prefix by hand at each call site.

use std::sync::atomic::{AtomicBool, Ordering};

use corebus_model::RunningModuleId;

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global `tracing` subscriber from `RUST_LOG`, defaulting
/// to `info` if unset. Safe to call more than once; only the first call has
/// an effect.
pub fn ensure_logging_initialized() {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// `true` once [`ensure_logging_initialized`] has run.
#[must_use]
pub fn logging_is_initialized() -> bool {
    LOGGING_INITIALIZED.load(Ordering::SeqCst)
}

/// A scoped view of the logging subsystem stamped with one running module's
/// identity. Cheap to construct and clone; it carries no state beyond the
/// fields it attaches to every event.
#[derive(Clone, Debug)]
pub struct ScopedLogger {
    module_name: String,
    running_id: RunningModuleId,
}

impl ScopedLogger {
    #[must_use]
    pub fn new(module_name: impl Into<String>, running_id: RunningModuleId) -> Self {
        Self {
            module_name: module_name.into(),
            running_id,
        }
    }

    pub fn info(&self, message: &str) {
        tracing::info!(module = %self.module_name, running_id = %self.running_id, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(module = %self.module_name, running_id = %self.running_id, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(module = %self.module_name, running_id = %self.running_id, "{message}");
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(module = %self.module_name, running_id = %self.running_id, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_scoped_logger_does_not_panic() {
        let logger = ScopedLogger::new("mod-a", RunningModuleId(1));
        logger.info("hello");
        logger.warn("careful");
        logger.error("boom");
        logger.debug("detail");
    }
}
