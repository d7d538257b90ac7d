//! Paged access to a parsed listing.

use crate::parser;
use crate::types::FtpEntry;
use std::collections::VecDeque;

/// Entries of one LIST response, handed out a page at a time.
#[derive(Debug, Default)]
pub struct ListParseEngine {
    entries: VecDeque<FtpEntry>,
}

impl ListParseEngine {
    pub fn new(entries: Vec<FtpEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self::new(parser::parse_listing(raw))
    }

    pub fn has_next(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Up to `size` entries; empty once exhausted.
    pub fn next_page(&mut self, size: usize) -> Vec<FtpEntry> {
        let n = size.min(self.entries.len());
        self.entries.drain(..n).collect()
    }
}
