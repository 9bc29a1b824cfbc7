// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Filtered, time-ordered views over a bag.
//!
//! A [`View`] is a topic filter plus a `[start, end)` time bound over a
//! reader. Its per-connection position lists materialize lazily, once
//! per filter change. Iteration is a k-way merge over those lists (k =
//! number of connections in the view, not messages): a binary heap keyed
//! by (timestamp, connection id) yields messages in non-decreasing
//! timestamp order, ties broken by lowest connection id so output is
//! reproducible.
//!
//! Messages inside chunks that fail to decompress are skipped with a
//! diagnostic and counted in [`ReadStats`](crate::bag::reader::ReadStats).

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::OnceLock;

use tracing::warn;

use crate::bag::connection::ConnectionRecord;
use crate::bag::index::IndexEntry;
use crate::bag::message::Message;
use crate::bag::reader::BagReader;
use crate::io::filter::TopicFilter;

/// One connection's in-filter, in-bounds entries.
#[derive(Debug, Clone, Copy)]
struct Lane<'r> {
    conn: &'r ConnectionRecord,
    entries: &'r [IndexEntry],
}

/// A filtered projection over a bag's connections and index.
///
/// Built with [`BagReader::view`], narrowed with the `with_*` /
/// `set_*` mutators, iterated with [`messages`](View::messages) or
/// `&view` in a `for` loop.
pub struct View<'r> {
    reader: &'r BagReader<'r>,
    filter: TopicFilter,
    start: Option<u64>,
    end: Option<u64>,
    lanes: OnceLock<Vec<Lane<'r>>>,
}

impl<'r> View<'r> {
    pub(crate) fn new(reader: &'r BagReader<'r>) -> Self {
        Self {
            reader,
            filter: TopicFilter::All,
            start: None,
            end: None,
            lanes: OnceLock::new(),
        }
    }

    /// Restrict to the given topics. Consuming form.
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_topics(topics);
        self
    }

    /// Restrict with an arbitrary topic filter. Consuming form.
    pub fn with_filter(mut self, filter: TopicFilter) -> Self {
        self.set_filter(filter);
        self
    }

    /// Keep messages with `stamp >= start`. Consuming form.
    pub fn with_start_time(mut self, start: u64) -> Self {
        self.set_start_time(start);
        self
    }

    /// Keep messages with `stamp < end`. Consuming form.
    pub fn with_end_time(mut self, end: u64) -> Self {
        self.set_end_time(end);
        self
    }

    /// Keep messages with `start <= stamp < end`. Consuming form.
    pub fn with_time_range(mut self, start: u64, end: u64) -> Self {
        self.set_time_range(start, end);
        self
    }

    /// Combined time range and topic restriction. Consuming form.
    pub fn with_time_range_and_topics<I, S>(mut self, start: u64, end: u64, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_time_range(start, end);
        self.set_topics(topics);
        self
    }

    /// Restrict to the given topics in place.
    pub fn set_topics<I, S>(&mut self, topics: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_filter(TopicFilter::include(topics));
    }

    /// Restrict with an arbitrary topic filter in place.
    pub fn set_filter(&mut self, filter: TopicFilter) {
        self.filter = filter;
        self.lanes = OnceLock::new();
    }

    /// Set the inclusive start bound in place.
    pub fn set_start_time(&mut self, start: u64) {
        self.start = Some(start);
        self.lanes = OnceLock::new();
    }

    /// Set the exclusive end bound in place.
    pub fn set_end_time(&mut self, end: u64) {
        self.end = Some(end);
        self.lanes = OnceLock::new();
    }

    /// Set both time bounds in place.
    pub fn set_time_range(&mut self, start: u64, end: u64) {
        self.start = Some(start);
        self.end = Some(end);
        self.lanes = OnceLock::new();
    }

    /// Materialize the filtered per-connection position lists.
    /// Idempotent: the first call builds, later calls are no-ops.
    pub fn ensure_indices(&self) {
        let _ = self.lanes();
    }

    fn lanes(&self) -> &[Lane<'r>] {
        self.lanes.get_or_init(|| {
            let index = self.reader.index();
            let mut lanes = Vec::new();
            for conn in self.reader.connections() {
                if !self.filter.matches(&conn.topic) {
                    continue;
                }
                let Some(entries) = index.lanes.get(&conn.id) else {
                    continue;
                };
                // Entries are time-sorted; the bound is a subslice.
                let lo = match self.start {
                    Some(start) => entries.partition_point(|e| e.time < start),
                    None => 0,
                };
                let hi = match self.end {
                    Some(end) => entries.partition_point(|e| e.time < end),
                    None => entries.len(),
                };
                let hi = hi.max(lo);
                if lo < hi {
                    lanes.push(Lane {
                        conn,
                        entries: &entries[lo..hi],
                    });
                }
            }
            lanes
        })
    }

    /// Iterate the view's messages in timestamp order.
    pub fn messages<'v>(&'v self) -> MessageIter<'v> {
        let lanes: &'v [Lane<'v>] = self.lanes();
        let mut heap = BinaryHeap::with_capacity(lanes.len());
        for (i, lane) in lanes.iter().enumerate() {
            heap.push(Reverse(Cursor {
                time: lane.entries[0].time,
                conn: lane.conn.id,
                lane: i as u32,
                pos: 0,
            }));
        }
        MessageIter {
            reader: self.reader,
            lanes,
            heap,
        }
    }

    /// Distinct topic names present in the view, first-seen order.
    pub fn present_topics(&self) -> Vec<&'r str> {
        let mut seen = std::collections::HashSet::new();
        self.reader
            .connections()
            .filter(|c| self.filter.matches(&c.topic))
            .filter(|c| seen.insert(c.topic.as_str()))
            .map(|c| c.topic.as_str())
            .collect()
    }

    /// True if the view contains a connection for `topic`.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.filter.matches(topic)
            && self
                .reader
                .connections()
                .any(|c| c.topic == topic)
    }

    /// Call `f` with each connection in the view, registration order.
    pub fn for_each_connection<F: FnMut(&ConnectionRecord)>(&self, mut f: F) {
        for conn in self.reader.connections() {
            if self.filter.matches(&conn.topic) {
                f(conn);
            }
        }
    }
}

impl<'r, 'v> IntoIterator for &'v View<'r> {
    type Item = Message<'v>;
    type IntoIter = MessageIter<'v>;

    fn into_iter(self) -> MessageIter<'v> {
        self.messages()
    }
}

/// Merge cursor: ordering is (time, connection id), so coincident
/// timestamps yield the lowest connection id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Cursor {
    time: u64,
    conn: u32,
    lane: u32,
    pos: u32,
}

/// Iterator over a view's messages in non-decreasing timestamp order.
///
/// A k-way merge: one cursor per connection, the heap always advances
/// the cursor with the smallest (time, connection id) key. Unreadable
/// messages are skipped with a diagnostic.
pub struct MessageIter<'v> {
    reader: &'v BagReader<'v>,
    lanes: &'v [Lane<'v>],
    heap: BinaryHeap<Reverse<Cursor>>,
}

impl<'v> MessageIter<'v> {
    /// Timestamp of the next message, if any, without advancing.
    pub fn peek_stamp(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(c)| c.time)
    }
}

impl<'v> Iterator for MessageIter<'v> {
    type Item = Message<'v>;

    fn next(&mut self) -> Option<Message<'v>> {
        loop {
            let Reverse(cur) = self.heap.pop()?;
            let lane = &self.lanes[cur.lane as usize];
            let entry = lane.entries[cur.pos as usize];

            let next_pos = cur.pos as usize + 1;
            if next_pos < lane.entries.len() {
                self.heap.push(Reverse(Cursor {
                    time: lane.entries[next_pos].time,
                    conn: cur.conn,
                    lane: cur.lane,
                    pos: next_pos as u32,
                }));
            }

            match self.reader.read_message(lane.conn, entry) {
                Ok(msg) => return Some(msg),
                Err(e) => {
                    warn!(
                        error = %e,
                        topic = %lane.conn.topic,
                        stamp = entry.time,
                        "skipping unreadable message"
                    );
                    self.reader.note_skipped();
                }
            }
        }
    }
}
