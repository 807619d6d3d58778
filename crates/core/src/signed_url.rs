// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-signed storage URLs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Header a storage backend uses to bound the accepted upload size
/// (`<min>,<max>` in bytes).
pub const CONTENT_LENGTH_RANGE_HEADER: &str = "x-goog-content-length-range";

/// A time-bounded URL plus the headers that must accompany the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SignedUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), headers: BTreeMap::new() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// Accepted upload size in bytes, when the URL was signed with one.
    ///
    /// Returns `None` if the header is absent or malformed.
    pub fn content_length_range(&self) -> Option<RangeInclusive<u64>> {
        let raw = self.header(CONTENT_LENGTH_RANGE_HEADER)?;
        let (min, max) = raw.split_once(',')?;
        let min = min.trim().parse::<u64>().ok()?;
        let max = max.trim().parse::<u64>().ok()?;
        (min <= max).then_some(min..=max)
    }
}

#[cfg(test)]
#[path = "signed_url_tests.rs"]
mod tests;
