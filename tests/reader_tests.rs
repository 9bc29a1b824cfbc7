// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Open paths, categorized errors, and reader accessors.

mod common;

use bagview::{BagError, BagOptions, BagReader};
use common::{two_topic_bag, BagBuilder, DEFAULT_MD5};

fn temp_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("bagview_{}_{}.bag", tag, std::process::id()))
}

#[test]
fn test_open_memory_basic() {
    let bytes = two_topic_bag().build();
    let bag = BagReader::open_memory(&bytes).unwrap();

    assert_eq!(bag.version(), "2.0");
    assert_eq!(bag.path(), "<memory>");
    assert_eq!(bag.file_size(), bytes.len() as u64);
    assert_eq!(bag.chunk_count(), 2);
    assert_eq!(bag.message_count(), 8);
    assert_eq!(bag.start_time(), Some(1));
    assert_eq!(bag.end_time(), Some(9));
    assert_eq!(bag.duration(), 8);
}

#[test]
fn test_open_from_disk() {
    let bytes = two_topic_bag().build();
    let path = temp_path("disk");
    std::fs::write(&path, &bytes).unwrap();

    let bag = BagReader::open(&path).unwrap();
    assert_eq!(bag.message_count(), 8);
    assert_eq!(bag.file_size(), bytes.len() as u64);
    assert!(bag.path().ends_with(".bag"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_open_missing_file() {
    let err = BagReader::open("/nonexistent/dir/file.bag").unwrap_err();
    assert!(matches!(err, BagError::NotFound { .. }));
}

#[test]
fn test_open_empty_file() {
    let path = temp_path("empty");
    std::fs::write(&path, b"").unwrap();

    let err = BagReader::open(&path).unwrap_err();
    assert!(matches!(err, BagError::EmptyFile { .. }));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_open_bad_magic() {
    let err = BagReader::open_memory(b"#NOTABAG V9.9\ngarbage").unwrap_err();
    assert!(matches!(err, BagError::Parse { .. }));
}

#[test]
fn test_open_unsupported_version() {
    let err = BagReader::open_memory(b"#ROSBAG V1.2\nwhatever").unwrap_err();
    assert!(matches!(err, BagError::UnsupportedVersion { .. }));
}

#[test]
fn test_open_truncated_file() {
    let bytes = two_topic_bag().without_trailer().build();
    // Cut into the final record's data; the scan path has to report
    // structural truncation.
    let cut = &bytes[..bytes.len() - 5];

    let err = BagReader::open_memory(cut).unwrap_err();
    assert!(matches!(
        err,
        BagError::OutOfBounds { .. } | BagError::Parse { .. }
    ));
}

#[test]
fn test_open_truncated_trailer_falls_back() {
    // With the trailer cut off, index_pos points past end of file; the
    // open must silently fall back to scanning and still see everything.
    let bytes = two_topic_bag().build();
    let trailer_len = {
        let without = two_topic_bag().without_trailer().build();
        bytes.len() - without.len()
    };
    let cut = &bytes[..bytes.len() - trailer_len];

    let bag = BagReader::open_memory(cut).unwrap();
    assert_eq!(bag.message_count(), 8);
}

#[test]
fn test_topics_and_connections() {
    let bytes = two_topic_bag().build();
    let bag = BagReader::open_memory(&bytes).unwrap();

    assert_eq!(bag.topics(), vec!["/a", "/b"]);
    assert!(bag.has_topic("/a"));
    assert!(!bag.has_topic("/c"));

    let conn = bag.connection(0).unwrap();
    assert_eq!(conn.topic, "/a");
    assert_eq!(conn.datatype, "std_msgs/String");
    assert_eq!(conn.md5sum, DEFAULT_MD5);
    assert!(bag.connection(42).is_none());

    let by_topic = bag.connections_by_topic("/b");
    assert_eq!(by_topic.len(), 1);
    assert_eq!(by_topic[0].id, 1);

    assert_eq!(bag.connections().count(), 2);
}

#[test]
fn test_open_with_index_disabled() {
    let bytes = two_topic_bag().build();
    let bag = BagReader::open_memory_with(&bytes, BagOptions { use_index: false }).unwrap();
    assert_eq!(bag.message_count(), 8);
    assert_eq!(bag.topics(), vec!["/a", "/b"]);
}

#[test]
fn test_stats_uncompressed_bag() {
    let bytes = two_topic_bag().build();
    let bag = BagReader::open_memory(&bytes).unwrap();

    let view = bag.view();
    assert_eq!(view.messages().count(), 8);

    // Uncompressed chunks never touch the decompressor.
    let stats = bag.stats();
    assert_eq!(stats.chunks_decompressed, 0);
    assert_eq!(stats.chunk_failures, 0);
    assert_eq!(stats.messages_skipped, 0);
}

#[test]
fn test_empty_bag() {
    let bytes = BagBuilder::new().connection(0, "/a").build();
    let bag = BagReader::open_memory(&bytes).unwrap();

    assert_eq!(bag.message_count(), 0);
    assert_eq!(bag.start_time(), None);
    assert_eq!(bag.end_time(), None);
    assert_eq!(bag.duration(), 0);
    assert_eq!(bag.chunk_count(), 0);

    let view = bag.view();
    assert_eq!(view.messages().count(), 0);
}

#[test]
fn test_duplicate_connection_records_tolerated() {
    // Connection records legitimately appear both inside chunks and in
    // the trailer; the registry must not treat that as a conflict.
    let bytes = two_topic_bag().build();
    let bag = BagReader::open_memory(&bytes).unwrap();
    assert_eq!(bag.connections().count(), 2);
}

#[test]
fn test_zero_copy_payload_points_into_buffer() {
    // For an uncompressed in-memory bag, payload slices must alias the
    // caller's buffer, not a copy.
    let bytes = two_topic_bag().build();
    let bag = BagReader::open_memory(&bytes).unwrap();

    let view = bag.view();
    let msg = view.messages().next().unwrap();
    let payload_ptr = msg.data().as_ptr() as usize;
    let buf_start = bytes.as_ptr() as usize;
    let buf_end = buf_start + bytes.len();
    assert!(payload_ptr >= buf_start && payload_ptr < buf_end);
}
