// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message index construction.
//!
//! The index maps each connection to a time-sorted list of message
//! positions (chunk slot + intra-chunk record offset). Two paths produce
//! it:
//!
//! - **Chunk-index path**: each chunk is followed by index-data records
//!   listing (time, offset) pairs per connection. Reading those touches
//!   no payload bytes and costs O(messages).
//! - **Interior scan**: decompress a chunk and walk its records,
//!   collecting message positions directly and registering connection
//!   records found inside. Strictly more expensive, identical result.
//!
//! Entries are stable-sorted by time per connection after accumulation
//! on both paths; on-disk order is not guaranteed to be time-sorted.
//!
//! Degradations are scoped: a chunk with unusable index records is
//! interior-scanned, a chunk that fails to decompress is skipped with a
//! diagnostic, and entries for unknown connections are dropped.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace, warn};

use crate::bag::chunk::{ChunkCache, ChunkSlot, Compression};
use crate::bag::connection::{ConnectionRecord, ConnectionRegistry};
use crate::bag::record::{
    self, RawRecord, OP_BAG_HEADER, OP_CHUNK, OP_CHUNK_INFO, OP_CONNECTION, OP_INDEX_DATA,
    OP_MSG_DATA,
};
use crate::core::{BagError, Result};

/// Position of one message: timestamp plus where its record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    /// Receive timestamp in nanoseconds
    pub time: u64,
    /// Chunk slot the message record lives in
    pub chunk: u32,
    /// Offset of the message record within the decompressed chunk
    pub offset: u32,
}

/// The built index: per-connection, time-sorted entry lists.
#[derive(Debug, Default)]
pub(crate) struct BagIndex {
    /// connection id -> sorted entries
    pub lanes: HashMap<u32, Vec<IndexEntry>>,
    /// Earliest message timestamp
    pub start: Option<u64>,
    /// Latest message timestamp
    pub end: Option<u64>,
    /// Total message count
    pub total: u64,
}

/// Build the index from per-chunk index-data records, falling back to an
/// interior scan for chunks whose index records are absent or unusable.
/// The registry is frozen; entries for unknown connections are dropped.
pub(crate) fn build_from_chunk_index(
    source: &[u8],
    chunks: &[ChunkSlot],
    cache: &ChunkCache,
    registry: &ConnectionRegistry,
) -> BagIndex {
    let mut lanes: HashMap<u32, Vec<IndexEntry>> = HashMap::new();

    for (i, chunk) in chunks.iter().enumerate() {
        match index_records_after(source, chunk, i as u32) {
            Some(groups) => {
                for (conn, entries) in groups {
                    lanes.entry(conn).or_default().extend(entries);
                }
            }
            None => {
                debug!(
                    chunk_pos = chunk.pos,
                    "chunk has no usable index records, scanning interior"
                );
                match cache.materialize(i, chunk, source) {
                    Ok(bytes) => scan_chunk_interior(
                        bytes.as_slice(),
                        i as u32,
                        chunk,
                        &mut lanes,
                        &mut |conn: ConnectionRecord| {
                            if registry.get(conn.id).is_none() {
                                warn!(
                                    conn = conn.id,
                                    topic = %conn.topic,
                                    "connection declared only inside a chunk, not in the index section"
                                );
                            }
                        },
                    ),
                    Err(e) => {
                        warn!(error = %e, chunk_pos = chunk.pos, "skipping unreadable chunk");
                    }
                }
            }
        }
    }

    finish(lanes, registry)
}

/// Linear scan of the top-level record stream: registers connections and
/// returns the chunk table. Structural corruption is fatal here; an
/// unknown record kind at top level is a parse error.
pub(crate) fn scan_layout(
    source: &[u8],
    mut pos: usize,
    registry: &mut ConnectionRegistry,
) -> Result<Vec<ChunkSlot>> {
    let mut chunks = Vec::new();

    while pos < source.len() {
        let rec = record::read_record(source, pos)?;
        match rec.header.op {
            Some(OP_CHUNK) => {
                chunks.push(chunk_slot_from(&rec));
            }
            Some(OP_CONNECTION) => match connection_from(source, &rec) {
                Some(conn) => {
                    if let Err(e) = registry.register(conn) {
                        warn!(error = %e, pos, "ignoring conflicting connection record");
                    }
                }
                None => {
                    warn!(pos, "connection record missing required fields, skipping");
                }
            },
            Some(OP_INDEX_DATA) | Some(OP_CHUNK_INFO) => {
                // Chunk interiors get scanned; the summaries add nothing.
            }
            Some(OP_MSG_DATA) => {
                warn!(pos, "message record outside any chunk, skipping");
            }
            Some(OP_BAG_HEADER) => {
                warn!(pos, "stray bag header record, skipping");
            }
            Some(op) => {
                return Err(BagError::parse(
                    "record stream",
                    format!("unknown record op=0x{op:02x} at offset {pos}"),
                ));
            }
            None => {
                return Err(BagError::parse(
                    "record stream",
                    format!("record without op field at offset {pos}"),
                ));
            }
        }
        pos = rec.end;
    }

    Ok(chunks)
}

/// Decompress and scan every chunk interior, registering connections
/// found inside. Used when the bag carries no trailer index.
pub(crate) fn scan_interiors(
    source: &[u8],
    chunks: &[ChunkSlot],
    cache: &ChunkCache,
    registry: &mut ConnectionRegistry,
) -> BagIndex {
    let mut lanes: HashMap<u32, Vec<IndexEntry>> = HashMap::new();

    for (i, chunk) in chunks.iter().enumerate() {
        match cache.materialize(i, chunk, source) {
            Ok(bytes) => {
                scan_chunk_interior(bytes.as_slice(), i as u32, chunk, &mut lanes, &mut |conn| {
                    if let Err(e) = registry.register(conn) {
                        warn!(error = %e, "ignoring conflicting connection record");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, chunk_pos = chunk.pos, "skipping unreadable chunk");
            }
        }
    }

    finish(lanes, registry)
}

/// Build a chunk slot from a chunk record.
fn chunk_slot_from(rec: &RawRecord) -> ChunkSlot {
    ChunkSlot {
        pos: rec.pos as u64,
        data: rec.data.clone(),
        compression: Compression::parse(rec.header.compression.as_deref()),
        uncompressed_size: rec.header.size.unwrap_or(rec.data.len() as u32),
    }
}

/// Build a connection from a connection record's header and data fields.
fn connection_from(source: &[u8], rec: &RawRecord) -> Option<ConnectionRecord> {
    let data_fields =
        record::parse_header_fields(&source[rec.data.clone()], rec.pos as u64).ok()?;
    ConnectionRecord::from_record(&rec.header, &data_fields)
}

/// Parse the index-data records following a chunk record. Returns `None`
/// if they are absent or unusable; the caller falls back to an interior
/// scan in that case.
fn index_records_after(
    source: &[u8],
    chunk: &ChunkSlot,
    chunk_idx: u32,
) -> Option<Vec<(u32, Vec<IndexEntry>)>> {
    let mut pos = chunk.data.end;
    let mut groups = Vec::new();

    while pos < source.len() {
        let rec = match record::read_record(source, pos) {
            Ok(rec) => rec,
            Err(_) => return None,
        };
        if rec.header.op != Some(OP_INDEX_DATA) {
            break;
        }

        if rec.header.ver != Some(1) {
            warn!(ver = ?rec.header.ver, chunk_pos = chunk.pos, "unsupported index record version");
            return None;
        }
        let conn = rec.header.conn?;
        let count = rec.header.count? as usize;
        let data = &source[rec.data.clone()];
        if data.len() != count * 12 {
            warn!(
                chunk_pos = chunk.pos,
                count,
                data_len = data.len(),
                "index record size does not match its count"
            );
            return None;
        }

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let base = i * 12;
            let sec = LittleEndian::read_u32(&data[base..base + 4]) as u64;
            let nsec = LittleEndian::read_u32(&data[base + 4..base + 8]) as u64;
            let offset = LittleEndian::read_u32(&data[base + 8..base + 12]);
            if offset >= chunk.uncompressed_size {
                warn!(
                    chunk_pos = chunk.pos,
                    offset, "index entry points past the chunk's decompressed extent, dropping"
                );
                continue;
            }
            entries.push(IndexEntry {
                time: sec * 1_000_000_000 + nsec,
                chunk: chunk_idx,
                offset,
            });
        }
        groups.push((conn, entries));
        pos = rec.end;
    }

    if groups.is_empty() {
        None
    } else {
        Some(groups)
    }
}

/// Walk the records inside a decompressed chunk, collecting message
/// positions and handing connection records to `on_connection`.
/// A malformed record stops the scan of this chunk only.
fn scan_chunk_interior(
    buf: &[u8],
    chunk_idx: u32,
    chunk: &ChunkSlot,
    lanes: &mut HashMap<u32, Vec<IndexEntry>>,
    on_connection: &mut dyn FnMut(ConnectionRecord),
) {
    let mut pos = 0usize;

    while pos < buf.len() {
        let rec = match record::read_record(buf, pos) {
            Ok(rec) => rec,
            Err(e) => {
                warn!(
                    error = %e,
                    chunk_pos = chunk.pos,
                    "malformed record inside chunk, stopping interior scan"
                );
                break;
            }
        };
        match rec.header.op {
            Some(OP_MSG_DATA) => match (rec.header.conn, rec.header.time) {
                (Some(conn), Some(time)) => {
                    lanes.entry(conn).or_default().push(IndexEntry {
                        time,
                        chunk: chunk_idx,
                        offset: rec.pos as u32,
                    });
                }
                _ => {
                    warn!(
                        chunk_pos = chunk.pos,
                        "message record missing conn or time field, skipping"
                    );
                }
            },
            Some(OP_CONNECTION) => match connection_from(buf, &rec) {
                Some(conn) => on_connection(conn),
                None => {
                    warn!(
                        chunk_pos = chunk.pos,
                        "connection record missing required fields, skipping"
                    );
                }
            },
            op => {
                trace!(?op, "skipping record inside chunk");
            }
        }
        pos = rec.end;
    }
}

/// Sort lanes, drop entries for unknown connections, compute totals.
fn finish(mut lanes: HashMap<u32, Vec<IndexEntry>>, registry: &ConnectionRegistry) -> BagIndex {
    lanes.retain(|&conn, entries| {
        if registry.get(conn).is_none() {
            warn!(
                conn,
                count = entries.len(),
                "dropping index entries for unknown connection"
            );
            return false;
        }
        true
    });

    let mut start = None;
    let mut end = None;
    let mut total = 0u64;

    for entries in lanes.values_mut() {
        // Stable sort: equal timestamps keep on-disk order.
        entries.sort_by_key(|e| e.time);
        total += entries.len() as u64;
        if let Some(first) = entries.first() {
            start = Some(start.map_or(first.time, |s: u64| s.min(first.time)));
        }
        if let Some(last) = entries.last() {
            end = Some(end.map_or(last.time, |e: u64| e.max(last.time)));
        }
    }

    BagIndex {
        lanes,
        start,
        end,
        total,
    }
}
