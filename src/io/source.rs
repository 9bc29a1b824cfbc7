// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Byte source for bag data: a read-only memory map or a borrowed buffer.
//!
//! The source owns (or borrows) all raw bytes for the lifetime of the
//! reader. Everything else in the crate borrows from it; nothing copies
//! it. Access is by absolute offset and is bounds-checked, so a
//! corrupt length field becomes a parse error rather than an
//! out-of-range read.
//!
//! # Ownership Model
//!
//! ```text
//! ByteSource (owns mmap / borrows caller slice)
//!   ↓
//! BagReader (borrows raw bytes)
//!   ↓
//! View / iterator / Message (borrow from reader)
//! ```

use std::fs::File;
use std::path::Path;

use crate::core::{BagError, Result};

/// Raw bytes of a bag: a read-only memory-mapped file or a
/// caller-supplied buffer.
///
/// The mapped variant owns the map; the borrowed variant holds the
/// caller's slice with no copy, so the caller's buffer must outlive the
/// reader. Both are immutable for the source's lifetime.
#[derive(Debug)]
pub enum ByteSource<'a> {
    /// Memory-mapped file (owned)
    Mapped {
        /// The memory map
        map: memmap2::Mmap,
        /// File path for diagnostics
        path: String,
    },
    /// Caller-supplied buffer (borrowed, never copied)
    Borrowed(&'a [u8]),
}

impl ByteSource<'static> {
    /// Map a file read-only.
    ///
    /// # Errors
    ///
    /// Returns a categorized error: [`BagError::NotFound`],
    /// [`BagError::PermissionDenied`], [`BagError::EmptyFile`], or
    /// [`BagError::Io`] for other open/mapping failures.
    pub fn map<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        let file = File::open(path_ref).map_err(|e| BagError::from_open(&path_str, &e))?;

        let len = file
            .metadata()
            .map_err(|e| BagError::from_open(&path_str, &e))?
            .len();
        if len == 0 {
            return Err(BagError::EmptyFile { path: path_str });
        }

        // The map stays valid as long as this source owns it; slices
        // handed out are tied to the source's borrow.
        let map = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| BagError::Io {
            context: format!("mmap '{path_str}'"),
            message: e.to_string(),
        })?;

        Ok(ByteSource::Mapped {
            map,
            path: path_str,
        })
    }
}

impl<'a> ByteSource<'a> {
    /// Borrow a caller-supplied buffer with no copy.
    ///
    /// The buffer must stay alive for the reader's lifetime; the borrow
    /// checker enforces this through the `'a` parameter.
    pub fn from_slice(bytes: &'a [u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(BagError::EmptyFile {
                path: "<memory>".to_string(),
            });
        }
        Ok(ByteSource::Borrowed(bytes))
    }

    /// All bytes of the source.
    pub fn bytes(&self) -> &[u8] {
        match self {
            ByteSource::Mapped { map, .. } => map,
            ByteSource::Borrowed(bytes) => bytes,
        }
    }

    /// Total size in bytes.
    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// True if the source holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Path of the underlying file, or `"<memory>"` for buffers.
    pub fn path(&self) -> &str {
        match self {
            ByteSource::Mapped { path, .. } => path,
            ByteSource::Borrowed(_) => "<memory>",
        }
    }

    /// Slice `len` bytes at absolute `offset`, bounds-checked.
    pub fn slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let bytes = self.bytes();
        let end = offset.checked_add(len).ok_or_else(|| {
            BagError::out_of_bounds(offset, len, bytes.len() as u64)
        })?;
        if end > bytes.len() as u64 {
            return Err(BagError::out_of_bounds(offset, len, bytes.len() as u64));
        }
        Ok(&bytes[offset as usize..end as usize])
    }
}
