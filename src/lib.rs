// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Bagview
//!
//! A minimal, zero-copy, memory-map based ROS1 bag reader.
//!
//! Bagview opens a bag file (or an in-memory buffer), discovers its
//! connections, builds a time index from the bag's own index records —
//! or reconstructs one by scanning when the index is missing or damaged
//! — and iterates messages in timestamp order through filtered views.
//! Payload bytes are never copied except to decompress a chunk, and
//! each chunk decompresses at most once.
//!
//! ## Architecture
//!
//! - `io/` - byte sources (memory map or borrowed buffer) and topic filters
//! - `bag/` - the engine: record parser, connection registry, chunk
//!   decompression cache, index builder, views and message handles
//! - `core/` - error types
//!
//! ## Example: Reading messages
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use bagview::BagReader;
//!
//! let bag = BagReader::open("drive.bag")?;
//! println!("{} messages on {} topics", bag.message_count(), bag.topics().len());
//!
//! let view = bag.view().with_topics(["/imu", "/odom"]);
//! for msg in &view {
//!     println!("{} {} ({} bytes)", msg.stamp, msg.topic(), msg.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Decoding through a capability
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use bagview::{BagReader, DynamicMessage};
//!
//! let bag = BagReader::open("drive.bag")?;
//! let view = bag.view();
//! let mut any = DynamicMessage::new();
//! for msg in &view {
//!     if msg.decode_to(&mut any).is_ok() {
//!         println!("{}: {} bytes of {}", msg.topic(), any.bytes.len(), any.datatype);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{BagError, Result};

// I/O: byte sources and filters
pub mod io;

pub use io::{ByteSource, TopicFilter};

// The bag engine
pub mod bag;

pub use bag::{
    BagOptions, BagReader, Compression, ConnectionRecord, ConnectionRegistry, DynamicMessage,
    Message, MessageDecoder, MessageIter, ReadStats, View,
};
