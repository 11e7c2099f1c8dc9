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

//! The immutable, per-library module manifest (spec §3, §6.1's `ModuleInfo`).

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelType, ConsumerCardinality, PriorityClass};

/// One producer-side channel declaration (publish or response).
///
/// `priority` only governs scheduling for the `response` list: a response
/// producer has an inbound queue of incoming requests, whereas a `publish`
/// producer has no inbound queue at all and ignores the field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerDescriptor {
    pub channel_type: ChannelType,
    pub display_name: String,
    pub display_description: String,
    pub priority: PriorityClass,
}

impl ProducerDescriptor {
    #[must_use]
    pub fn new(
        channel_type: impl Into<ChannelType>,
        display_name: impl Into<String>,
        display_description: impl Into<String>,
    ) -> Self {
        Self {
            channel_type: channel_type.into(),
            display_name: display_name.into(),
            display_description: display_description.into(),
            priority: PriorityClass::Regular,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: PriorityClass) -> Self {
        self.priority = priority;
        self
    }
}

/// One consumer-side channel declaration (subscribe or request).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerDescriptor {
    pub channel_type: ChannelType,
    pub cardinality: ConsumerCardinality,
    pub display_name: String,
    pub display_description: String,
    pub priority: PriorityClass,
}

impl ConsumerDescriptor {
    #[must_use]
    pub fn new(
        channel_type: impl Into<ChannelType>,
        cardinality: ConsumerCardinality,
        display_name: impl Into<String>,
        display_description: impl Into<String>,
    ) -> Self {
        Self {
            channel_type: channel_type.into(),
            cardinality,
            display_name: display_name.into(),
            display_description: display_description.into(),
            priority: PriorityClass::Regular,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: PriorityClass) -> Self {
        self.priority = priority;
        self
    }
}

/// The immutable description carried by a loaded module library: its four
/// channel lists plus whether it should be auto-created at `initialize`
/// time (spec §4.3.1 step 4).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub display_name: String,
    pub display_description: String,
    pub publish: Vec<ProducerDescriptor>,
    pub response: Vec<ProducerDescriptor>,
    pub subscribe: Vec<ConsumerDescriptor>,
    pub request: Vec<ConsumerDescriptor>,
    pub auto_create: bool,
}

impl ModuleManifest {
    /// `true` if every subscribe and request consumer declares `AutoAll`
    /// cardinality — the precondition `initialize` checks before
    /// auto-creating an `auto_create` module (spec §4.3.1 step 4).
    #[must_use]
    pub fn all_consumers_are_auto_all(&self) -> bool {
        self.subscribe
            .iter()
            .chain(&self.request)
            .all(|c| matches!(c.cardinality, ConsumerCardinality::AutoAll))
    }

    #[must_use]
    pub fn is_eligible_for_auto_create(&self) -> bool {
        self.auto_create && self.all_consumers_are_auto_all()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn consumer(cardinality: ConsumerCardinality) -> ConsumerDescriptor {
        ConsumerDescriptor::new("m6/v1:int", cardinality, "c", "")
    }

    #[rstest]
    fn test_all_auto_all_true_when_empty() {
        let manifest = ModuleManifest::default();
        assert!(manifest.all_consumers_are_auto_all());
    }

    #[rstest]
    fn test_all_auto_all_false_when_any_non_auto_all() {
        let mut manifest = ModuleManifest::default();
        manifest.subscribe.push(consumer(ConsumerCardinality::AutoAll));
        manifest.request.push(consumer(ConsumerCardinality::Single));
        assert!(!manifest.all_consumers_are_auto_all());
    }

    #[rstest]
    fn test_eligible_for_auto_create_requires_flag_and_cardinality() {
        let mut manifest = ModuleManifest {
            auto_create: true,
            ..Default::default()
        };
        manifest.subscribe.push(consumer(ConsumerCardinality::AutoAll));
        assert!(manifest.is_eligible_for_auto_create());

        manifest.auto_create = false;
        assert!(!manifest.is_eligible_for_auto_create());
    }
}
