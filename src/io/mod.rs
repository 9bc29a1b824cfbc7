// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer: byte sources and topic filtering.

pub mod filter;
pub mod source;

pub use filter::TopicFilter;
pub use source::ByteSource;
