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

//! The transport envelope carried across every `send_*` call (spec §3).

use corebus_core::UnixNanos;
use smallvec::SmallVec;

use crate::blob::SharedDataBlob;

/// Inline capacity for a message's plain-old-data payload before it spills
/// to the heap. Most control and telemetry messages fit comfortably within
/// this; larger payloads belong in a [`SharedDataBlob`], not the inline
/// buffer.
pub const MESSAGE_INLINE_CAP: usize = 128;

/// Inline capacity for a message's blob list.
pub const MESSAGE_BLOB_INLINE_CAP: usize = 2;

/// The envelope copied on every enqueue (spec §4.3.5 "Message copying
/// discipline"): an inline byte buffer, a set of blob handles (each holding
/// one more reference after the copy), a correlation id, a timestamp, and a
/// success flag meaningful on responses.
#[derive(Clone, Debug)]
pub struct MessageHeader {
    /// Monotonic id assigned by the sender's facade; used to correlate a
    /// response back to its request.
    pub correlation_id: u64,
    /// Nanosecond timestamp stamped by the facade at send time.
    pub timestamp_ns: UnixNanos,
    /// Meaningful on responses: whether the responder succeeded.
    pub success: bool,
    /// Plain-old-data payload, deep-copied on every enqueue.
    pub bytes: SmallVec<[u8; MESSAGE_INLINE_CAP]>,
    /// Shared-memory blob handles; each copy here holds one reference.
    pub blobs: SmallVec<[SharedDataBlob; MESSAGE_BLOB_INLINE_CAP]>,
}

impl MessageHeader {
    /// Builds a new envelope with `success = true`.
    #[must_use]
    pub fn new(correlation_id: u64, timestamp_ns: UnixNanos, bytes: &[u8]) -> Self {
        Self {
            correlation_id,
            timestamp_ns,
            success: true,
            bytes: SmallVec::from_slice(bytes),
            blobs: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    #[must_use]
    pub fn with_blobs(mut self, blobs: impl IntoIterator<Item = SharedDataBlob>) -> Self {
        self.blobs = blobs.into_iter().collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_new_message_defaults_to_success() {
        let msg = MessageHeader::new(1, 1_000, b"hello");
        assert!(msg.success);
        assert_eq!(&msg.bytes[..], b"hello");
        assert!(msg.blobs.is_empty());
    }

    #[rstest]
    fn test_with_success_overrides_flag() {
        let msg = MessageHeader::new(1, 1_000, b"").with_success(false);
        assert!(!msg.success);
    }
}
