// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The bag reader: open paths, index-or-scan decision, accessors.
//!
//! Opening maps the file (or borrows a caller buffer), validates the
//! magic and bag header record, then builds the chunk table and
//! connection registry. If the bag carries an index section (trailer)
//! it is used; an absent, truncated, or inconsistent trailer falls back
//! to a full scan without failing the open. The message index itself is
//! built lazily on first demand with a single-flight guarantee, so a
//! reader shared between threads builds it exactly once.
//!
//! The reader is `Sync`. Views and iterators are per-thread values:
//! each thread takes its own from a shared `&BagReader`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::bag::chunk::{ChunkBytes, ChunkCache, ChunkSlot, Compression};
use crate::bag::connection::{ConnectionRecord, ConnectionRegistry};
use crate::bag::index::{self, BagIndex, IndexEntry};
use crate::bag::message::{Message, Payload};
use crate::bag::record::{self, OP_BAG_HEADER, OP_CHUNK, OP_CHUNK_INFO, OP_CONNECTION, OP_MSG_DATA};
use crate::bag::view::View;
use crate::core::{BagError, Result};
use crate::io::source::ByteSource;

/// Options for opening a bag.
#[derive(Debug, Clone)]
pub struct BagOptions {
    /// Read the trailer index section when present. Disable to force a
    /// full chunk scan, e.g. to cross-check a suspect index.
    pub use_index: bool,
}

impl Default for BagOptions {
    fn default() -> Self {
        Self { use_index: true }
    }
}

/// Counters accumulated while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Chunk decompression runs (at most one per chunk)
    pub chunks_decompressed: u64,
    /// Chunks whose decompression failed
    pub chunk_failures: u64,
    /// Messages skipped during iteration because they were unreadable
    pub messages_skipped: u64,
}

/// A read-only ROS1 bag.
///
/// All raw bytes live in the reader's [`ByteSource`]; views, iterators
/// and messages borrow from it. Payload bytes are never copied except
/// to decompress a chunk, and each chunk decompresses at most once.
#[derive(Debug)]
pub struct BagReader<'a> {
    source: ByteSource<'a>,
    version: String,
    registry: ConnectionRegistry,
    chunks: Vec<ChunkSlot>,
    cache: ChunkCache,
    index: OnceLock<BagIndex>,
    skipped: AtomicU64,
}

/// Everything `parse_structure` derives from the raw bytes. All owned,
/// so the source can be moved into the reader afterwards.
struct Parsed {
    version: String,
    registry: ConnectionRegistry,
    chunks: Vec<ChunkSlot>,
    cache: ChunkCache,
    index: Option<BagIndex>,
}

impl BagReader<'static> {
    /// Open a bag file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, BagOptions::default())
    }

    /// Open a bag file.
    pub fn open_with<P: AsRef<Path>>(path: P, opts: BagOptions) -> Result<Self> {
        Self::from_source(ByteSource::map(path)?, opts)
    }
}

impl<'a> BagReader<'a> {
    /// Open a bag held in a caller-supplied buffer, with no copy. The
    /// buffer must outlive the reader.
    pub fn open_memory(bytes: &'a [u8]) -> Result<Self> {
        Self::open_memory_with(bytes, BagOptions::default())
    }

    /// Open an in-memory bag with options.
    pub fn open_memory_with(bytes: &'a [u8], opts: BagOptions) -> Result<Self> {
        Self::from_source(ByteSource::from_slice(bytes)?, opts)
    }

    fn from_source(source: ByteSource<'a>, opts: BagOptions) -> Result<Self> {
        let parsed = parse_structure(source.bytes(), &opts)?;

        let index = OnceLock::new();
        if let Some(built) = parsed.index {
            let _ = index.set(built);
        }

        Ok(Self {
            source,
            version: parsed.version,
            registry: parsed.registry,
            chunks: parsed.chunks,
            cache: parsed.cache,
            index,
            skipped: AtomicU64::new(0),
        })
    }

    /// Format version from the magic line (always "2.0").
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Path of the underlying file, or `"<memory>"` for buffers.
    pub fn path(&self) -> &str {
        self.source.path()
    }

    /// File size in bytes.
    pub fn file_size(&self) -> u64 {
        self.source.len()
    }

    /// Number of chunks in the file.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total number of indexed messages.
    pub fn message_count(&self) -> u64 {
        self.index().total
    }

    /// Timestamp of the earliest message, if any.
    pub fn start_time(&self) -> Option<u64> {
        self.index().start
    }

    /// Timestamp of the latest message, if any.
    pub fn end_time(&self) -> Option<u64> {
        self.index().end
    }

    /// Recorded span in nanoseconds, 0 for empty bags.
    pub fn duration(&self) -> u64 {
        match (self.start_time(), self.end_time()) {
            (Some(s), Some(e)) if e > s => e - s,
            _ => 0,
        }
    }

    /// All connections, registration order.
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionRecord> {
        self.registry.iter()
    }

    /// Connection metadata by id.
    pub fn connection(&self, id: u32) -> Option<&ConnectionRecord> {
        self.registry.get(id)
    }

    /// All connections recorded for `topic` (usually one; duplicates
    /// occur in the wild).
    pub fn connections_by_topic(&self, topic: &str) -> Vec<&ConnectionRecord> {
        self.registry
            .find_by_topic(topic)
            .into_iter()
            .filter_map(|id| self.registry.get(id))
            .collect()
    }

    /// Distinct topic names, first-seen order.
    pub fn topics(&self) -> Vec<&str> {
        self.registry.topics()
    }

    /// True if any connection uses `topic`.
    pub fn has_topic(&self, topic: &str) -> bool {
        !self.registry.find_by_topic(topic).is_empty()
    }

    /// A default, unfiltered view over the whole bag.
    pub fn view(&self) -> View<'_> {
        View::new(self)
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> ReadStats {
        ReadStats {
            chunks_decompressed: self.cache.decompressions(),
            chunk_failures: self.cache.failures(),
            messages_skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    /// The message index, built on first demand. Concurrent callers
    /// block until the single build completes.
    pub(crate) fn index(&self) -> &BagIndex {
        self.index.get_or_init(|| {
            index::build_from_chunk_index(
                self.source.bytes(),
                &self.chunks,
                &self.cache,
                &self.registry,
            )
        })
    }

    /// Read one message at an index entry. This is the error-surfacing
    /// random-access path; iteration skips where this errors.
    pub(crate) fn read_message<'r>(
        &'r self,
        conn: &'r ConnectionRecord,
        entry: IndexEntry,
    ) -> Result<Message<'r>> {
        let chunk = &self.chunks[entry.chunk as usize];
        let bytes = self
            .cache
            .materialize(entry.chunk as usize, chunk, self.source.bytes())?;

        let rec = record::read_record(bytes.as_slice(), entry.offset as usize)?;
        if rec.header.op != Some(OP_MSG_DATA) {
            return Err(BagError::unexpected_op(
                OP_MSG_DATA,
                rec.header.op,
                entry.offset as u64,
            ));
        }

        let payload = match bytes {
            ChunkBytes::Direct(slice) => Payload::Borrowed(&slice[rec.data]),
            ChunkBytes::Cached(arc) => Payload::Shared {
                bytes: arc,
                range: rec.data,
            },
        };

        Ok(Message::new(entry.time, payload, conn))
    }

    pub(crate) fn note_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Parse magic, bag header, and the chunk/connection structure.
fn parse_structure(bytes: &[u8], opts: &BagOptions) -> Result<Parsed> {
    let (version, first) = record::parse_magic(bytes)?;

    let header = record::read_record(bytes, first)?;
    if header.header.op != Some(OP_BAG_HEADER) {
        return Err(BagError::unexpected_op(
            OP_BAG_HEADER,
            header.header.op,
            first as u64,
        ));
    }
    let index_pos = header.header.index_pos.unwrap_or(0);
    let declared_conns = header.header.conn_count;
    let declared_chunks = header.header.chunk_count;
    let body_start = header.end;

    if opts.use_index && index_pos >= body_start as u64 && index_pos < bytes.len() as u64 {
        let mut registry = ConnectionRegistry::new();
        match parse_index_section(bytes, index_pos as usize, &mut registry) {
            Ok(chunks) => {
                if let Some(declared) = declared_chunks {
                    if declared as usize != chunks.len() {
                        warn!(
                            declared,
                            found = chunks.len(),
                            "chunk count differs from bag header"
                        );
                    }
                }
                if let Some(declared) = declared_conns {
                    if declared as usize != registry.len() {
                        warn!(
                            declared,
                            found = registry.len(),
                            "connection count differs from bag header"
                        );
                    }
                }
                let cache = ChunkCache::new(chunks.len());
                return Ok(Parsed {
                    version,
                    registry,
                    chunks,
                    cache,
                    index: None,
                });
            }
            Err(e) => {
                warn!(error = %e, "index section unusable, falling back to full scan");
            }
        }
    } else if index_pos == 0 {
        debug!("bag has no index section, scanning");
    }

    let mut registry = ConnectionRegistry::new();
    let chunks = index::scan_layout(bytes, body_start, &mut registry)?;
    let cache = ChunkCache::new(chunks.len());
    let built = index::scan_interiors(bytes, &chunks, &cache, &mut registry);

    Ok(Parsed {
        version,
        registry,
        chunks,
        cache,
        index: Some(built),
    })
}

/// Walk the index section: connection records fill the registry,
/// chunk-info records locate the chunks. Any inconsistency is an error
/// here; the caller falls back to the full scan.
fn parse_index_section(
    bytes: &[u8],
    index_pos: usize,
    registry: &mut ConnectionRegistry,
) -> Result<Vec<ChunkSlot>> {
    let mut pos = index_pos;
    let mut chunk_positions: Vec<u64> = Vec::new();

    while pos < bytes.len() {
        let rec = record::read_record(bytes, pos)?;
        match rec.header.op {
            Some(OP_CONNECTION) => {
                let data_fields =
                    record::parse_header_fields(&bytes[rec.data.clone()], pos as u64)?;
                let conn = ConnectionRecord::from_record(&rec.header, &data_fields)
                    .ok_or_else(|| {
                        BagError::parse(
                            "index section",
                            format!("connection record missing required fields at offset {pos}"),
                        )
                    })?;
                registry.register(conn)?;
            }
            Some(OP_CHUNK_INFO) => {
                if rec.header.ver != Some(1) {
                    warn!(ver = ?rec.header.ver, pos, "unexpected chunk info version");
                }
                let chunk_pos = rec.header.chunk_pos.ok_or_else(|| {
                    BagError::parse(
                        "index section",
                        format!("chunk info without chunk_pos at offset {pos}"),
                    )
                })?;
                chunk_positions.push(chunk_pos);
            }
            op => {
                return Err(BagError::parse(
                    "index section",
                    format!("unexpected record op={op:?} at offset {pos}"),
                ));
            }
        }
        pos = rec.end;
    }

    let mut seen = HashSet::new();
    let mut chunks = Vec::with_capacity(chunk_positions.len());
    for chunk_pos in chunk_positions {
        if !seen.insert(chunk_pos) {
            return Err(BagError::parse(
                "index section",
                format!("duplicate chunk offset {chunk_pos}"),
            ));
        }
        let rec = record::read_record(bytes, chunk_pos as usize)?;
        if rec.header.op != Some(OP_CHUNK) {
            return Err(BagError::unexpected_op(OP_CHUNK, rec.header.op, chunk_pos));
        }
        chunks.push(ChunkSlot {
            pos: chunk_pos,
            data: rec.data.clone(),
            compression: Compression::parse(rec.header.compression.as_deref()),
            uncompressed_size: rec.header.size.unwrap_or(rec.data.len() as u32),
        });
    }

    Ok(chunks)
}
