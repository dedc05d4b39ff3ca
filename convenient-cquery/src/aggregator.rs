//! Thread-safe accumulation of streamed target records
//!
//! Producers deliver batches of records from any number of threads. Each
//! batch is appended contiguously under one lock, so order inside a batch is
//! kept; the order of batches relative to each other is whatever order the
//! producers won the lock in.

use crate::error::{OutputError, OutputResult};
use crate::record::TargetRecord;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Finalized, read-only sequence of target records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    records: Vec<TargetRecord>,
}

impl ResultSet {
    /// Records in aggregation order
    pub fn records(&self) -> &[TargetRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// No records were aggregated
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records
    pub fn iter(&self) -> std::slice::Iter<'_, TargetRecord> {
        self.records.iter()
    }

    /// Records ordered by label, then configuration checksum.
    ///
    /// The sort is stable, so records with equal keys keep aggregation order.
    pub fn sorted_records(&self) -> Vec<&TargetRecord> {
        let mut sorted: Vec<&TargetRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| {
            a.label()
                .cmp(b.label())
                .then_with(|| a.configuration.cmp(&b.configuration))
        });
        sorted
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a TargetRecord;
    type IntoIter = std::slice::Iter<'a, TargetRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[derive(Debug)]
enum AggregationState {
    Idle,
    Collecting(Vec<TargetRecord>),
    Finalized,
}

/// Collects target records from concurrent producers
#[derive(Debug)]
pub struct ResultAggregator {
    state: Mutex<AggregationState>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    /// Create an aggregator; call [`start`](Self::start) before appending
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AggregationState::Idle),
        }
    }

    /// Open a fresh, empty result set.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::AggregationAlreadyStarted` if called twice.
    pub fn start(&self) -> OutputResult<()> {
        let mut state = self.lock();
        match *state {
            AggregationState::Idle => {
                *state = AggregationState::Collecting(Vec::new());
                debug!("Result aggregation started");
                Ok(())
            }
            _ => Err(OutputError::AggregationAlreadyStarted),
        }
    }

    /// Append one producer's batch.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::AggregationNotStarted` before `start` and
    /// `OutputError::AggregationClosed` after `finalize`.
    pub fn append(&self, batch: Vec<TargetRecord>) -> OutputResult<()> {
        let mut state = self.lock();
        match &mut *state {
            AggregationState::Collecting(records) => {
                debug!("Appending batch of {} records", batch.len());
                records.extend(batch);
                Ok(())
            }
            AggregationState::Idle => Err(OutputError::AggregationNotStarted),
            AggregationState::Finalized => Err(OutputError::AggregationClosed),
        }
    }

    /// Close the aggregation and hand out the result set.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::AggregationNotStarted` before `start` and
    /// `OutputError::AggregationClosed` if already finalized.
    pub fn finalize(&self) -> OutputResult<ResultSet> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, AggregationState::Finalized) {
            AggregationState::Collecting(records) => {
                info!("Aggregated {} configured targets", records.len());
                Ok(ResultSet { records })
            }
            AggregationState::Idle => {
                *state = AggregationState::Idle;
                Err(OutputError::AggregationNotStarted)
            }
            AggregationState::Finalized => Err(OutputError::AggregationClosed),
        }
    }

    /// Number of records appended so far (zero unless collecting)
    pub fn len(&self) -> usize {
        match &*self.lock() {
            AggregationState::Collecting(records) => records.len(),
            _ => 0,
        }
    }

    /// No records collected yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, AggregationState> {
        // Appends never leave the state half-written, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
