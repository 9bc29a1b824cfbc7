// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Connection metadata and the connection registry.
//!
//! A connection ties a topic to a message type, schema digest, and
//! message definition. Connection records are duplicated in a bag (once
//! inside a chunk, once in the trailer), so registration tolerates exact
//! duplicates; the same id with conflicting metadata is corruption.

use std::collections::HashMap;

use crate::bag::record::RecordHeader;
use crate::core::{BagError, Result};

/// A connection declared in a bag file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    /// Connection id, unique within the file
    pub id: u32,
    /// Topic name (e.g., "/joint_states")
    pub topic: String,
    /// Message type name (e.g., "sensor_msgs/JointState")
    pub datatype: String,
    /// MD5 digest of the message definition, as recorded (hex or "*")
    pub md5sum: String,
    /// Message definition text
    pub message_definition: String,
    /// Publishing node, empty if not recorded
    pub caller_id: String,
    /// True if the publisher was latching
    pub latching: bool,
}

impl ConnectionRecord {
    /// Build a connection from a parsed record: topic comes from the
    /// record header, the remaining metadata from the data-section
    /// fields. Returns `None` if required fields are missing.
    pub(crate) fn from_record(header: &RecordHeader, data: &RecordHeader) -> Option<Self> {
        Some(Self {
            id: header.conn?,
            topic: header.topic.clone()?,
            datatype: data.datatype.clone()?,
            md5sum: data.md5sum.clone().unwrap_or_default(),
            message_definition: data.message_definition.clone().unwrap_or_default(),
            caller_id: data.callerid.clone().unwrap_or_default(),
            latching: data.latching.as_deref() == Some("1"),
        })
    }

    /// True if the recorded digest is the wildcard "*".
    pub fn is_wildcard(&self) -> bool {
        self.md5sum == "*"
    }

    /// The recorded digest as 16 raw bytes, or `None` for a wildcard or
    /// malformed digest string.
    pub fn digest(&self) -> Option<[u8; 16]> {
        let mut out = [0u8; 16];
        hex::decode_to_slice(&self.md5sum, &mut out).ok()?;
        Some(out)
    }

    /// The latching flag the way a connection header spells it.
    pub fn latching_str(&self) -> &'static str {
        if self.latching {
            "1"
        } else {
            ""
        }
    }
}

/// Append-only table of connections, keyed by connection id.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    records: Vec<ConnectionRecord>,
    by_id: HashMap<u32, usize>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. Re-registering an id with identical metadata
    /// is a no-op; conflicting metadata for an id is corruption.
    pub fn register(&mut self, record: ConnectionRecord) -> Result<()> {
        if let Some(&slot) = self.by_id.get(&record.id) {
            let existing = &self.records[slot];
            if existing.topic != record.topic
                || existing.datatype != record.datatype
                || existing.md5sum != record.md5sum
            {
                return Err(BagError::parse(
                    "connection registry",
                    format!(
                        "connection id {} reused with conflicting metadata ('{}' vs '{}')",
                        record.id, existing.topic, record.topic
                    ),
                ));
            }
            return Ok(());
        }

        self.by_id.insert(record.id, self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Look up a connection by id.
    pub fn get(&self, id: u32) -> Option<&ConnectionRecord> {
        self.by_id.get(&id).map(|&slot| &self.records[slot])
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All connections, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ConnectionRecord> {
        self.records.iter()
    }

    /// Distinct topic names in first-seen order.
    pub fn topics(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.topic.as_str()))
            .map(|r| r.topic.as_str())
            .collect()
    }

    /// All connection ids recorded for `topic`. A well-formed bag maps a
    /// topic to one connection, but duplicates occur in the wild.
    pub fn find_by_topic(&self, topic: &str) -> Vec<u32> {
        self.records
            .iter()
            .filter(|r| r.topic == topic)
            .map(|r| r.id)
            .collect()
    }
}
