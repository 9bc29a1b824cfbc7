// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Topic filtering for views.
//!
//! A [`TopicFilter`] decides which connections a view includes. The
//! default accepts every topic; allow/deny lists, regex patterns, and
//! custom predicates narrow it down.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Filter deciding which topics a view includes.
#[derive(Clone, Default)]
pub enum TopicFilter {
    /// Every topic (no filtering)
    #[default]
    All,
    /// Only topics in the set
    Include(HashSet<String>),
    /// Every topic except those in the set
    Exclude(HashSet<String>),
    /// Topics matching a regex pattern
    Pattern(Arc<regex::Regex>),
    /// Custom predicate
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl fmt::Debug for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.debug_tuple("All").finish(),
            Self::Include(set) => f.debug_tuple("Include").field(set).finish(),
            Self::Exclude(set) => f.debug_tuple("Exclude").field(set).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl TopicFilter {
    /// True if `topic` passes the filter.
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            TopicFilter::All => true,
            TopicFilter::Include(set) => set.contains(topic),
            TopicFilter::Exclude(set) => !set.contains(topic),
            TopicFilter::Pattern(re) => re.is_match(topic),
            TopicFilter::Custom(f) => f(topic),
        }
    }

    /// Build an include filter from topic names.
    pub fn include<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Include(topics.into_iter().map(Into::into).collect())
    }

    /// Build an exclude filter from topic names.
    pub fn exclude<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exclude(topics.into_iter().map(Into::into).collect())
    }

    /// Build a regex include filter.
    pub fn pattern(pattern: &str) -> std::result::Result<Self, regex::Error> {
        regex::Regex::new(pattern).map(|re| Self::Pattern(Arc::new(re)))
    }

    /// Build a custom predicate filter.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }
}
