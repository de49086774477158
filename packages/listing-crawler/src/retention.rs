//! Publication-date retention policy.

use serde::{Deserialize, Serialize};

use crate::dates::DateParseResult;
use crate::types::record::ExtractedRecord;

/// Minimum-year / keep-undated rule applied to every finished record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Dated records published before this year are dropped
    pub min_year: i32,

    /// Keep records whose date could not be determined
    pub keep_undated: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            min_year: 2019,
            keep_undated: false,
        }
    }
}

impl RetentionPolicy {
    pub fn new(min_year: i32, keep_undated: bool) -> Self {
        Self {
            min_year,
            keep_undated,
        }
    }

    /// Decide whether `record` stays in the result set, given its parsed date.
    pub fn keep(&self, _record: &ExtractedRecord, date: &DateParseResult) -> bool {
        match date.year() {
            Some(year) => year >= self.min_year,
            None => self.keep_undated,
        }
    }
}
