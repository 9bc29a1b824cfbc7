// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message handles and the pluggable decode capability.
//!
//! A [`Message`] is a zero-copy reference into the bag: its payload is a
//! slice of the source (uncompressed chunks) or of a shared decompressed
//! buffer, and its connection metadata is a reference into the registry.
//! Decoding into a concrete type is delegated to a caller-supplied
//! [`MessageDecoder`]; the engine never interprets payload bytes.

use std::ops::Range;
use std::sync::Arc;

use crate::bag::connection::ConnectionRecord;
use crate::core::{BagError, Result};

/// Payload bytes: borrowed from the source, or a range of a shared
/// decompressed chunk buffer. Neither copies the payload.
#[derive(Debug, Clone)]
pub(crate) enum Payload<'r> {
    /// Slice of the byte source (uncompressed chunk)
    Borrowed(&'r [u8]),
    /// Range of a cached decompressed chunk
    Shared {
        /// The chunk's decompressed bytes
        bytes: Arc<[u8]>,
        /// Payload extent within `bytes`
        range: Range<usize>,
    },
}

/// One message from a bag, valid while the originating reader borrow
/// lives.
#[derive(Debug, Clone)]
pub struct Message<'r> {
    /// Receive timestamp in nanoseconds
    pub stamp: u64,
    payload: Payload<'r>,
    conn: &'r ConnectionRecord,
}

impl<'r> Message<'r> {
    pub(crate) fn new(stamp: u64, payload: Payload<'r>, conn: &'r ConnectionRecord) -> Self {
        Self {
            stamp,
            payload,
            conn,
        }
    }

    /// The raw payload bytes.
    pub fn data(&self) -> &[u8] {
        match &self.payload {
            Payload::Borrowed(bytes) => bytes,
            Payload::Shared { bytes, range } => &bytes[range.clone()],
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Borrowed(bytes) => bytes.len(),
            Payload::Shared { range, .. } => range.len(),
        }
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The connection this message was recorded under.
    pub fn connection(&self) -> &'r ConnectionRecord {
        self.conn
    }

    /// Topic name.
    pub fn topic(&self) -> &'r str {
        &self.conn.topic
    }

    /// Message type name.
    pub fn datatype(&self) -> &'r str {
        &self.conn.datatype
    }

    /// Declared schema digest (hex or "*").
    pub fn md5sum(&self) -> &'r str {
        &self.conn.md5sum
    }

    /// Message definition text.
    pub fn message_definition(&self) -> &'r str {
        &self.conn.message_definition
    }

    /// Publishing node, empty if not recorded.
    pub fn caller_id(&self) -> &'r str {
        &self.conn.caller_id
    }

    /// True if the publisher was latching.
    pub fn is_latching(&self) -> bool {
        self.conn.latching
    }

    /// The latching flag the way a connection header spells it.
    pub fn latching_str(&self) -> &'static str {
        self.conn.latching_str()
    }

    /// True if `decoder` can decode this message: its digest equals the
    /// declared one, or either side is the wildcard "*".
    pub fn matches<D: MessageDecoder + ?Sized>(&self, decoder: &D) -> bool {
        let offered = decoder.digest();
        offered == "*" || self.conn.md5sum == "*" || offered == self.conn.md5sum
    }

    /// Decode this message into `decoder`: check the digest, run the
    /// pre-decode hook, then deserialize the payload in place. All
    /// failures come back as errors, scoped to this message.
    pub fn decode_to<D: MessageDecoder + ?Sized>(&self, decoder: &mut D) -> Result<()> {
        if !self.matches(decoder) {
            return Err(BagError::digest_mismatch(&self.conn.md5sum, decoder.digest()));
        }
        decoder.bind(self.conn);
        decoder.decode(self.data())
    }
}

/// Decode capability supplied by the caller: a type descriptor that can
/// report its schema digest and deserialize from a byte slice.
///
/// Implementations that defer schema binding until decode time (generic
/// "any message" types) advertise the wildcard digest `"*"` and pick up
/// the schema in [`bind`](MessageDecoder::bind).
pub trait MessageDecoder {
    /// The digest this decoder accepts: 32 hex characters, or "*" for
    /// any.
    fn digest(&self) -> &str;

    /// Called with the message's connection metadata before
    /// [`decode`](MessageDecoder::decode). Default is a no-op.
    fn bind(&mut self, _connection: &ConnectionRecord) {}

    /// Deserialize `bytes` into this value.
    fn decode(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Generic decoder that accepts any message and captures its payload
/// together with the schema it was recorded under. The schema binds at
/// decode time, so one value can carry messages of any type.
#[derive(Debug, Clone, Default)]
pub struct DynamicMessage {
    /// Message type name of the last decoded message
    pub datatype: String,
    /// Schema digest of the last decoded message
    pub md5sum: String,
    /// Message definition text of the last decoded message
    pub message_definition: String,
    /// Latching flag of the last decoded message
    pub latching: bool,
    /// Payload bytes of the last decoded message
    pub bytes: Vec<u8>,
}

impl DynamicMessage {
    /// Create an empty value ready to receive any message.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageDecoder for DynamicMessage {
    fn digest(&self) -> &str {
        "*"
    }

    fn bind(&mut self, connection: &ConnectionRecord) {
        self.datatype = connection.datatype.clone();
        self.md5sum = connection.md5sum.clone();
        self.message_definition = connection.message_definition.clone();
        self.latching = connection.latching;
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
}
