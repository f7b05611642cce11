//! Row cache keyed by row index.
//!
//! Each slot is set at most once, so a populated row is never decoded again
//! and readers on the control thread never block on the worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::core::row::Row;
use crate::error::Result;

#[derive(Debug)]
pub struct RowCache {
    base: u64,
    slots: Box<[OnceLock<Row>]>,
    populated: AtomicUsize,
}

impl RowCache {
    pub fn new(base: u64, rows: usize) -> Self {
        Self {
            base,
            slots: (0..rows).map(|_| OnceLock::new()).collect(),
            populated: AtomicUsize::new(0),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Row> {
        self.slots.get(row).and_then(OnceLock::get)
    }

    pub fn is_populated(&self, row: usize) -> bool {
        self.get(row).is_some()
    }

    /// Number of populated rows.
    pub fn populated(&self) -> usize {
        self.populated.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.populated() == self.len()
    }

    /// Populate `row` with `resolve` unless it already is.
    ///
    /// Returns `Ok(true)` when this call filled the slot.
    pub fn populate_with<F>(&self, row: usize, resolve: F) -> Result<bool>
    where
        F: FnOnce() -> Result<Row>,
    {
        let Some(slot) = self.slots.get(row) else {
            return Ok(false);
        };
        if slot.get().is_some() {
            return Ok(false);
        }
        let value = resolve()?;
        // Only the single population worker writes, so a lost race here is a no-op.
        if slot.set(value).is_ok() {
            self.populated.fetch_add(1, Ordering::AcqRel);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
