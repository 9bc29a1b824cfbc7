// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Chunk table entries and the decompression cache.
//!
//! A chunk slot records where a chunk's (possibly compressed) bytes live
//! in the source; it owns no bytes itself. The cache materializes the
//! decompressed extent of a chunk on first request and keeps it for the
//! reader's lifetime. Chunks stored uncompressed are returned as direct
//! slices of the source with no cache entry and no copy.
//!
//! Each cache slot is a `OnceLock`, so concurrent requests for the same
//! chunk run exactly one decompression and every caller observes the
//! identical result (single-flight). Failures are cached per chunk and
//! do not affect other chunks.

use std::io::Read;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::core::{BagError, Result};

/// Compression applied to a chunk's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compression {
    /// Stored uncompressed
    None,
    /// bzip2 stream
    Bz2,
    /// LZ4 frame stream
    Lz4,
    /// A tag this reader does not support; kept for diagnostics
    Other(String),
}

impl Compression {
    /// Parse the chunk header's compression tag. A missing tag means
    /// uncompressed.
    pub(crate) fn parse(tag: Option<&str>) -> Self {
        match tag {
            None | Some("none") => Compression::None,
            Some("bz2") => Compression::Bz2,
            Some("lz4") => Compression::Lz4,
            Some(other) => Compression::Other(other.to_string()),
        }
    }

    /// The tag as spelled in chunk headers.
    pub fn as_str(&self) -> &str {
        match self {
            Compression::None => "none",
            Compression::Bz2 => "bz2",
            Compression::Lz4 => "lz4",
            Compression::Other(tag) => tag,
        }
    }
}

/// One chunk of the file: location and codec, but no bytes.
#[derive(Debug, Clone)]
pub(crate) struct ChunkSlot {
    /// Absolute offset of the chunk record in the file
    pub pos: u64,
    /// Extent of the (possibly compressed) chunk data in the source
    pub data: Range<usize>,
    /// Compression kind from the chunk header
    pub compression: Compression,
    /// Declared decompressed size
    pub uncompressed_size: u32,
}

/// Decompressed view of a chunk: a direct slice of the source for
/// uncompressed chunks, or a shared cached buffer.
#[derive(Debug, Clone)]
pub(crate) enum ChunkBytes<'r> {
    /// Uncompressed chunk, sliced straight out of the source
    Direct(&'r [u8]),
    /// Decompressed bytes owned by the cache
    Cached(Arc<[u8]>),
}

impl ChunkBytes<'_> {
    /// The decompressed chunk bytes.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            ChunkBytes::Direct(bytes) => bytes,
            ChunkBytes::Cached(bytes) => bytes,
        }
    }
}

type SlotResult = std::result::Result<Arc<[u8]>, BagError>;

/// Single-flight decompression cache, one slot per chunk.
#[derive(Debug)]
pub(crate) struct ChunkCache {
    slots: Vec<OnceLock<SlotResult>>,
    decompressions: AtomicU64,
    failures: AtomicU64,
}

impl ChunkCache {
    /// Create a cache with one empty slot per chunk.
    pub fn new(chunks: usize) -> Self {
        Self {
            slots: (0..chunks).map(|_| OnceLock::new()).collect(),
            decompressions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Decompressed bytes of chunk `slot`, decompressing on first
    /// request. `source` is the whole file's bytes.
    pub fn materialize<'r>(
        &'r self,
        slot: usize,
        chunk: &ChunkSlot,
        source: &'r [u8],
    ) -> Result<ChunkBytes<'r>> {
        let data = source
            .get(chunk.data.clone())
            .ok_or_else(|| {
                BagError::out_of_bounds(
                    chunk.data.start as u64,
                    chunk.data.len() as u64,
                    source.len() as u64,
                )
            })?;

        if chunk.compression == Compression::None {
            return Ok(ChunkBytes::Direct(data));
        }

        let result = self.slots[slot].get_or_init(|| {
            self.decompressions.fetch_add(1, Ordering::Relaxed);
            let out = decompress(chunk, data);
            if out.is_err() {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
            out
        });

        result.clone().map(ChunkBytes::Cached)
    }

    /// Number of decompression runs so far.
    pub fn decompressions(&self) -> u64 {
        self.decompressions.load(Ordering::Relaxed)
    }

    /// Number of chunks whose decompression failed.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Decompress a chunk's data according to its compression kind.
fn decompress(chunk: &ChunkSlot, data: &[u8]) -> SlotResult {
    let mut out = Vec::with_capacity(chunk.uncompressed_size as usize);

    match &chunk.compression {
        Compression::None => unreachable!("uncompressed chunks bypass the cache"),
        Compression::Bz2 => {
            let mut decoder = bzip2::read::BzDecoder::new(data);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| BagError::decompression(chunk.pos, format!("bz2: {e}")))?;
        }
        Compression::Lz4 => {
            let mut decoder = lz4_flex::frame::FrameDecoder::new(data);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| BagError::decompression(chunk.pos, format!("lz4: {e}")))?;
        }
        Compression::Other(tag) => {
            return Err(BagError::unsupported_compression(tag.clone(), chunk.pos));
        }
    }

    if out.len() != chunk.uncompressed_size as usize {
        return Err(BagError::decompression(
            chunk.pos,
            format!(
                "decompressed to {} bytes, chunk declares {}",
                out.len(),
                chunk.uncompressed_size
            ),
        ));
    }

    Ok(Arc::from(out.into_boxed_slice()))
}
