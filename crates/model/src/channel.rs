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

//! Channel type tags, channel kinds, and consumer cardinality.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum::EnumIter;
use ustr::Ustr;

/// An opaque, byte-exact type tag joining producers and consumers (e.g.
/// `"image_rgb/v1:bytes"`).
///
/// Interned via [`Ustr`] so comparisons and hashing are pointer-cheap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelType(Ustr);

impl ChannelType {
    /// Interns `value` as a channel type.
    pub fn new<T: AsRef<str>>(value: T) -> Self {
        Self(Ustr::from(value.as_ref()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: AsRef<str>> From<T> for ChannelType {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// The four directed roles a channel can play on a module's manifest.
///
/// Publish/Subscribe carries one-to-many messages; Request/Response carries
/// addressed request/reply pairs. Kept as a single tagged enum (rather than
/// four parallel code paths) per the re-architecture guidance in spec §9.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum ChannelKind {
    Publish,
    Response,
    Subscribe,
    Request,
}

impl ChannelKind {
    /// Returns the complementary kind on the other side of a connection
    /// (`Publish` binds to `Subscribe`, `Response` binds to `Request`).
    #[must_use]
    pub const fn peer_kind(self) -> Self {
        match self {
            Self::Publish => Self::Subscribe,
            Self::Subscribe => Self::Publish,
            Self::Response => Self::Request,
            Self::Request => Self::Response,
        }
    }

    /// `true` for the two producer-side kinds (`Publish`, `Response`).
    #[must_use]
    pub const fn is_producer(self) -> bool {
        matches!(self, Self::Publish | Self::Response)
    }

    /// `true` for the two consumer-side kinds (`Subscribe`, `Request`).
    #[must_use]
    pub const fn is_consumer(self) -> bool {
        !self.is_producer()
    }
}

/// How many producers a declared consumer channel expects to be bound to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsumerCardinality {
    /// Exactly one producer must be bound.
    Single,
    /// Between `min` and `max` producers (inclusive) must be bound.
    Range { min: u32, max: u32 },
    /// The bus automatically binds this consumer to every producer of the
    /// matching type, present now or added later. Callers must supply zero
    /// explicit bindings for this consumer.
    AutoAll,
}

/// The scheduling priority class a worker assigns to one of its inbound
/// queues (spec §4.2). Not itself part of the source system's data model;
/// declared per consumer here since something has to decide it and the
/// manifest is where every other per-channel fact about a module lives.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum PriorityClass {
    #[default]
    Regular,
    Prioritized,
}

impl ConsumerCardinality {
    /// Returns `true` if `count` bound producers satisfies this cardinality.
    #[must_use]
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Single => count == 1,
            Self::Range { min, max } => count as u32 >= min && count as u32 <= max,
            Self::AutoAll => count == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_channel_type_equality_is_byte_exact() {
        assert_eq!(ChannelType::new("m1/v1:int"), ChannelType::new("m1/v1:int"));
        assert_ne!(ChannelType::new("m1/v1:int"), ChannelType::new("m1/v2:int"));
    }

    #[rstest]
    #[case(ChannelKind::Publish, ChannelKind::Subscribe)]
    #[case(ChannelKind::Subscribe, ChannelKind::Publish)]
    #[case(ChannelKind::Response, ChannelKind::Request)]
    #[case(ChannelKind::Request, ChannelKind::Response)]
    fn test_peer_kind(#[case] kind: ChannelKind, #[case] expected: ChannelKind) {
        assert_eq!(kind.peer_kind(), expected);
    }

    #[rstest]
    fn test_cardinality_accepts() {
        assert!(ConsumerCardinality::Single.accepts(1));
        assert!(!ConsumerCardinality::Single.accepts(0));
        assert!(!ConsumerCardinality::Single.accepts(2));

        let range = ConsumerCardinality::Range { min: 0, max: 3 };
        assert!(range.accepts(0));
        assert!(range.accepts(3));
        assert!(!range.accepts(4));

        assert!(ConsumerCardinality::AutoAll.accepts(0));
        assert!(!ConsumerCardinality::AutoAll.accepts(1));
    }
}
