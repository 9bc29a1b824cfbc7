// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests: a synthetic bag builder.
//!
//! The builder emits rosbag 2.0 byte streams directly, so tests control
//! every structural detail: chunk layout, compression, presence of the
//! trailer index and per-chunk index records, and deliberate corruption.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use bagview::{BagReader, View};

/// Digest used by default test connections (std_msgs/String).
pub const DEFAULT_MD5: &str = "992ce8a1687cec8c8bd883ec73ca41d1";

// ============================================================================
// Record encoding helpers
// ============================================================================

fn field(name: &str, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(((name.len() + 1 + value.len()) as u32).to_le_bytes());
    out.extend(name.as_bytes());
    out.push(b'=');
    out.extend(value);
    out
}

fn field_str(name: &str, value: &str) -> Vec<u8> {
    field(name, value.as_bytes())
}

fn field_u32(name: &str, value: u32) -> Vec<u8> {
    field(name, &value.to_le_bytes())
}

fn field_u64(name: &str, value: u64) -> Vec<u8> {
    field(name, &value.to_le_bytes())
}

fn field_op(op: u8) -> Vec<u8> {
    field("op", &[op])
}

/// ROS time value: sec u32 + nsec u32.
fn time_bytes(nanos: u64) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(((nanos / 1_000_000_000) as u32).to_le_bytes());
    out.extend(((nanos % 1_000_000_000) as u32).to_le_bytes());
    out
}

fn field_time(name: &str, nanos: u64) -> Vec<u8> {
    field(name, &time_bytes(nanos))
}

/// `<header_len><header><data_len><data>`
fn record(fields: &[Vec<u8>], data: &[u8]) -> Vec<u8> {
    let header: Vec<u8> = fields.concat();
    let mut out = Vec::new();
    out.extend((header.len() as u32).to_le_bytes());
    out.extend(&header);
    out.extend((data.len() as u32).to_le_bytes());
    out.extend(data);
    out
}

fn compress(kind: &str, data: &[u8]) -> Vec<u8> {
    match kind {
        "bz2" => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        "lz4" => {
            let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        // "none" and unsupported kinds store the bytes as-is.
        _ => data.to_vec(),
    }
}

// ============================================================================
// Bag builder
// ============================================================================

/// A connection declaration for the builder.
#[derive(Debug, Clone)]
pub struct ConnSpec {
    pub id: u32,
    pub topic: String,
    pub datatype: String,
    pub md5sum: String,
    pub definition: String,
    pub callerid: String,
    pub latching: bool,
}

#[derive(Debug, Clone)]
struct ChunkSpec {
    compression: String,
    /// (conn id, timestamp ns, payload)
    messages: Vec<(u32, u64, Vec<u8>)>,
}

/// Builds rosbag 2.0 byte streams for tests.
#[derive(Debug, Clone, Default)]
pub struct BagBuilder {
    connections: Vec<ConnSpec>,
    chunks: Vec<ChunkSpec>,
    no_trailer: bool,
    no_chunk_index: bool,
    bogus_chunk_info: bool,
    corrupt_chunks: HashSet<usize>,
}

impl BagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a connection with default std_msgs/String metadata.
    pub fn connection(self, id: u32, topic: &str) -> Self {
        self.connection_with(id, topic, "std_msgs/String", DEFAULT_MD5)
    }

    /// Declare a connection with explicit type and digest.
    pub fn connection_with(mut self, id: u32, topic: &str, datatype: &str, md5sum: &str) -> Self {
        self.connections.push(ConnSpec {
            id,
            topic: topic.to_string(),
            datatype: datatype.to_string(),
            md5sum: md5sum.to_string(),
            definition: "string data\n".to_string(),
            callerid: String::new(),
            latching: false,
        });
        self
    }

    /// Start a new uncompressed chunk.
    pub fn chunk(self) -> Self {
        self.chunk_with("none")
    }

    /// Start a new chunk with the given compression tag.
    pub fn chunk_with(mut self, compression: &str) -> Self {
        self.chunks.push(ChunkSpec {
            compression: compression.to_string(),
            messages: Vec::new(),
        });
        self
    }

    /// Append a message to the current chunk (opens one if needed).
    pub fn message(mut self, conn: u32, time: u64, payload: &[u8]) -> Self {
        if self.chunks.is_empty() {
            self.chunks.push(ChunkSpec {
                compression: "none".to_string(),
                messages: Vec::new(),
            });
        }
        self.chunks
            .last_mut()
            .unwrap()
            .messages
            .push((conn, time, payload.to_vec()));
        self
    }

    /// Omit the trailer index section (index_pos = 0).
    pub fn without_trailer(mut self) -> Self {
        self.no_trailer = true;
        self
    }

    /// Omit the per-chunk index-data records.
    pub fn without_chunk_index(mut self) -> Self {
        self.no_chunk_index = true;
        self
    }

    /// Add a trailer chunk-info record pointing past end of file.
    pub fn with_bogus_chunk_info(mut self) -> Self {
        self.bogus_chunk_info = true;
        self
    }

    /// Replace chunk `idx`'s stored bytes with garbage.
    pub fn corrupt_chunk(mut self, idx: usize) -> Self {
        self.corrupt_chunks.insert(idx);
        self
    }

    fn connection_record(c: &ConnSpec) -> Vec<u8> {
        let header = [
            field_op(0x07),
            field_u32("conn", c.id),
            field_str("topic", &c.topic),
        ];
        let data: Vec<u8> = [
            field_str("topic", &c.topic),
            field_str("type", &c.datatype),
            field_str("md5sum", &c.md5sum),
            field_str("message_definition", &c.definition),
            field_str("callerid", &c.callerid),
            field_str("latching", if c.latching { "1" } else { "0" }),
        ]
        .concat();
        record(&header, &data)
    }

    /// Assemble the bag bytes.
    pub fn build(&self) -> Vec<u8> {
        let magic = b"#ROSBAG V2.0\n";

        // The bag header record's length does not depend on its values,
        // so probe it once to learn where the chunk region starts.
        let header_record = |index_pos: u64| {
            record(
                &[
                    field_op(0x03),
                    field_u64("index_pos", index_pos),
                    field_u32("conn_count", self.connections.len() as u32),
                    field_u32("chunk_count", self.chunks.len() as u32),
                ],
                &[0u8; 32],
            )
        };
        let prefix_len = magic.len() + header_record(0).len();

        let mut region = Vec::new();
        let mut conn_written: HashSet<u32> = HashSet::new();
        // Per chunk: (absolute pos, per-conn message counts, time span)
        let mut chunk_infos: Vec<(u64, BTreeMap<u32, u32>, u64, u64)> = Vec::new();

        for (i, chunk) in self.chunks.iter().enumerate() {
            // Interior: connection records on first use, then messages.
            let mut interior = Vec::new();
            let mut entries: BTreeMap<u32, Vec<(u64, u32)>> = BTreeMap::new();
            let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
            let mut span: Option<(u64, u64)> = None;

            for &(conn, time, ref payload) in &chunk.messages {
                if conn_written.insert(conn) {
                    if let Some(spec) = self.connections.iter().find(|c| c.id == conn) {
                        interior.extend(Self::connection_record(spec));
                    }
                }
                let offset = interior.len() as u32;
                interior.extend(record(
                    &[field_op(0x02), field_u32("conn", conn), field_time("time", time)],
                    payload,
                ));
                entries.entry(conn).or_default().push((time, offset));
                *counts.entry(conn).or_default() += 1;
                span = Some(match span {
                    Some((lo, hi)) => (lo.min(time), hi.max(time)),
                    None => (time, time),
                });
            }

            let mut stored = compress(&chunk.compression, &interior);
            if self.corrupt_chunks.contains(&i) {
                stored = vec![0xA5; stored.len().max(16)];
            }

            let chunk_pos = (prefix_len + region.len()) as u64;
            region.extend(record(
                &[
                    field_op(0x05),
                    field_str("compression", &chunk.compression),
                    field_u32("size", interior.len() as u32),
                ],
                &stored,
            ));

            if !self.no_chunk_index {
                for (conn, list) in &entries {
                    let mut data = Vec::new();
                    for &(time, offset) in list {
                        data.extend(time_bytes(time));
                        data.extend(offset.to_le_bytes());
                    }
                    region.extend(record(
                        &[
                            field_op(0x04),
                            field_u32("ver", 1),
                            field_u32("conn", *conn),
                            field_u32("count", list.len() as u32),
                        ],
                        &data,
                    ));
                }
            }

            let (lo, hi) = span.unwrap_or((0, 0));
            chunk_infos.push((chunk_pos, counts, lo, hi));
        }

        // Trailer: every connection, then one chunk-info per chunk.
        let mut trailer = Vec::new();
        if !self.no_trailer {
            for c in &self.connections {
                trailer.extend(Self::connection_record(c));
            }
            for &(pos, ref counts, lo, hi) in &chunk_infos {
                let mut data = Vec::new();
                for (&conn, &count) in counts {
                    data.extend(conn.to_le_bytes());
                    data.extend(count.to_le_bytes());
                }
                trailer.extend(record(
                    &[
                        field_op(0x06),
                        field_u32("ver", 1),
                        field_u64("chunk_pos", pos),
                        field_time("start_time", lo),
                        field_time("end_time", hi),
                        field_u32("count", counts.len() as u32),
                    ],
                    &data,
                ));
            }
            if self.bogus_chunk_info {
                trailer.extend(record(
                    &[
                        field_op(0x06),
                        field_u32("ver", 1),
                        field_u64("chunk_pos", (prefix_len + region.len()) as u64 + 99_999),
                        field_time("start_time", 0),
                        field_time("end_time", 0),
                        field_u32("count", 0),
                    ],
                    &[],
                ));
            }
        }

        let index_pos = if self.no_trailer {
            0
        } else {
            (prefix_len + region.len()) as u64
        };

        let mut out = Vec::new();
        out.extend(magic.as_slice());
        out.extend(header_record(index_pos));
        out.extend(region);
        out.extend(trailer);
        out
    }
}

// ============================================================================
// Assertions
// ============================================================================

/// Collect a view as (stamp, topic, payload) triples.
pub fn sequence_of(view: &View<'_>) -> Vec<(u64, String, Vec<u8>)> {
    view.messages()
        .map(|m| (m.stamp, m.topic().to_string(), m.data().to_vec()))
        .collect()
}

/// Collect the whole bag as (stamp, topic, payload) triples.
pub fn sequence(bag: &BagReader<'_>) -> Vec<(u64, String, Vec<u8>)> {
    let view = bag.view();
    sequence_of(&view)
}

/// The two-connection scenario used across suites: "/a" at
/// {1,3,5,7,9}, "/b" at {2,4,6}, split over two chunks.
pub fn two_topic_bag() -> BagBuilder {
    BagBuilder::new()
        .connection(0, "/a")
        .connection(1, "/b")
        .chunk()
        .message(0, 1, b"a1")
        .message(1, 2, b"b2")
        .message(0, 3, b"a3")
        .message(1, 4, b"b4")
        .chunk()
        .message(0, 5, b"a5")
        .message(1, 6, b"b6")
        .message(0, 7, b"a7")
        .message(0, 9, b"a9")
}
