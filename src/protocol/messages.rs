//! Protocol message definitions
//!
//! Every exchange is one fixed 8-byte record with no framing:
//!
//! ```text
//!  0       4       8
//!  +-------+-------+
//!  | value |  tag  |
//!  +-------+-------+
//!   f32 LE  i32 LE
//! ```
//!
//! The tag means different things depending on who sent it: an external
//! sends its own index, the central sends either the update marker or the
//! done marker.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DONE_MARKER, MESSAGE_SIZE, NUM_EXTERNALS, UPDATE_MARKER};

// ─────────────────────────────────────────────────────────────────
// External Identity
// ─────────────────────────────────────────────────────────────────

/// Index of an external peer, always in `1..=NUM_EXTERNALS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ExternalId(u8);

impl ExternalId {
    /// Create an id, rejecting anything outside `1..=NUM_EXTERNALS`
    pub fn new(index: u8) -> Option<Self> {
        if index >= 1 && (index as usize) <= NUM_EXTERNALS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// The 1-based index
    pub fn get(self) -> u8 {
        self.0
    }

    /// 0-based slot in per-external arrays
    pub fn slot(self) -> usize {
        self.0 as usize - 1
    }

    /// All valid ids in order
    pub fn all() -> impl Iterator<Item = ExternalId> {
        (1..=NUM_EXTERNALS as u8).map(ExternalId)
    }
}

impl TryFrom<u8> for ExternalId {
    type Error = String;

    fn try_from(index: u8) -> std::result::Result<Self, Self::Error> {
        ExternalId::new(index)
            .ok_or_else(|| format!("external index must be between 1 and {}, got {}", NUM_EXTERNALS, index))
    }
}

impl From<ExternalId> for u8 {
    fn from(id: ExternalId) -> u8 {
        id.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tag
// ─────────────────────────────────────────────────────────────────

/// Decoded meaning of the tag field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// External → central: the sender's identity
    External(ExternalId),

    /// Central → external: new central value, keep going
    Update,

    /// Central → external: final central value, stop
    Done,

    /// Anything else seen on the wire
    Unknown(i32),
}

impl Tag {
    /// Check if this is the termination marker
    pub fn is_done(&self) -> bool {
        matches!(self, Tag::Done)
    }
}

impl From<i32> for Tag {
    fn from(raw: i32) -> Self {
        match raw {
            DONE_MARKER => Tag::Done,
            UPDATE_MARKER => Tag::Update,
            n => u8::try_from(n)
                .ok()
                .and_then(ExternalId::new)
                .map(Tag::External)
                .unwrap_or(Tag::Unknown(n)),
        }
    }
}

impl From<Tag> for i32 {
    fn from(tag: Tag) -> i32 {
        match tag {
            Tag::External(id) => id.get() as i32,
            Tag::Update => UPDATE_MARKER,
            Tag::Done => DONE_MARKER,
            Tag::Unknown(n) => n,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::External(id) => write!(f, "EXTERNAL({})", id),
            Tag::Update => write!(f, "UPDATE"),
            Tag::Done => write!(f, "DONE"),
            Tag::Unknown(n) => write!(f, "UNKNOWN({})", n),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────

/// One wire record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message {
    /// Temperature carried by the message
    pub value: f32,

    /// What the value means
    pub tag: Tag,
}

impl Message {
    /// External report of its current temperature
    pub fn report(id: ExternalId, value: f32) -> Self {
        Self { value, tag: Tag::External(id) }
    }

    /// Central broadcast of a new central temperature
    pub fn update(value: f32) -> Self {
        Self { value, tag: Tag::Update }
    }

    /// Central broadcast of the final central temperature
    pub fn done(value: f32) -> Self {
        Self { value, tag: Tag::Done }
    }

    /// Encode into the fixed wire layout
    pub fn encode(&self) -> [u8; MESSAGE_SIZE] {
        let mut buf = [0u8; MESSAGE_SIZE];
        buf[..4].copy_from_slice(&self.value.to_le_bytes());
        buf[4..].copy_from_slice(&i32::from(self.tag).to_le_bytes());
        buf
    }

    /// Decode from the fixed wire layout
    pub fn decode(buf: &[u8; MESSAGE_SIZE]) -> Self {
        let value = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let raw_tag = i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Self {
            value,
            tag: Tag::from(raw_tag),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} T={:.6}", self.tag, self.value)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_range() {
        assert!(ExternalId::new(0).is_none());
        assert!(ExternalId::new(1).is_some());
        assert!(ExternalId::new(4).is_some());
        assert!(ExternalId::new(5).is_none());
        assert_eq!(ExternalId::new(3).unwrap().slot(), 2);
        assert_eq!(ExternalId::all().count(), NUM_EXTERNALS);
    }

    #[test]
    fn test_tag_decoding() {
        assert_eq!(Tag::from(-1), Tag::Done);
        assert_eq!(Tag::from(0), Tag::Update);
        assert_eq!(Tag::from(2), Tag::External(ExternalId::new(2).unwrap()));
        assert_eq!(Tag::from(5), Tag::Unknown(5));
        assert_eq!(Tag::from(-7), Tag::Unknown(-7));
        assert_eq!(Tag::from(1000), Tag::Unknown(1000));
    }

    #[test]
    fn test_wire_layout() {
        let msg = Message::done(1.5);
        let bytes = msg.encode();

        // 1.5f32 == 0x3FC00000, then -1 as i32
        assert_eq!(bytes, [0x00, 0x00, 0xC0, 0x3F, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_report_layout() {
        let id = ExternalId::new(3).unwrap();
        let bytes = Message::report(id, 0.0).encode();
        assert_eq!(&bytes[4..], &[3, 0, 0, 0]);
        assert_eq!(Message::decode(&bytes), Message::report(id, 0.0));
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let mut bytes = Message::update(2.0).encode();
        bytes[4..].copy_from_slice(&42i32.to_le_bytes());
        let msg = Message::decode(&bytes);
        assert_eq!(msg.tag, Tag::Unknown(42));
        assert_eq!(msg.encode(), bytes);
    }

    #[test]
    fn test_external_id_serde() {
        let id = ExternalId::new(2).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "2");
        assert!(serde_json::from_str::<ExternalId>("9").is_err());
    }
}
