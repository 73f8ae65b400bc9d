//! Domain cycler - round-robin over the configured placement domains.

use crate::domain::DomainId;
use crate::error::{HuntError, Result};

/// Ordered, non-empty list of placement domains. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainList(Vec<DomainId>);

impl DomainList {
    pub fn new(domains: impl IntoIterator<Item = DomainId>) -> Result<Self> {
        let domains: Vec<DomainId> = domains.into_iter().collect();
        if domains.is_empty() {
            return Err(HuntError::Config("at least one availability domain is required".into()));
        }
        Ok(Self(domains))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> &DomainId {
        &self.0[index % self.0.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainId> {
        self.0.iter()
    }
}

/// Cursor over a `DomainList`. Advanced exactly once per attempt.
#[derive(Debug, Clone)]
pub struct DomainCycler {
    domains: DomainList,
    cursor: usize,
    cycles: u64,
}

impl DomainCycler {
    pub fn new(domains: DomainList) -> Self {
        Self {
            domains,
            cursor: 0,
            cycles: 0,
        }
    }

    /// Domain the next attempt targets
    pub fn current(&self) -> &DomainId {
        self.domains.get(self.cursor)
    }

    /// Move to the next domain, wrapping around, and return it.
    pub fn advance(&mut self) -> &DomainId {
        self.cursor = (self.cursor + 1) % self.domains.len();
        if self.cursor == 0 {
            self.cycles += 1;
        }
        self.current()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Completed passes over the whole list
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// True right after `advance` wrapped back to the first domain
    pub fn at_cycle_start(&self) -> bool {
        self.cursor == 0 && self.cycles > 0
    }

    pub fn domains(&self) -> &DomainList {
        &self.domains
    }
}
