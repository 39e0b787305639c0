//! Per-run summary returned by every batch job.

use serde::Serialize;

use crate::types::DbId;

/// How one item of a batch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded { id: DbId, detail: Option<String> },
    Skipped { id: DbId, reason: String },
    Failed { id: DbId, error: String },
}

/// Counts plus per-item outcomes for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        self.total += 1;
        match outcome {
            ItemOutcome::Succeeded { .. } => self.succeeded += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
        self.items.push(outcome);
    }

    pub fn succeeded(&mut self, id: DbId, detail: Option<String>) {
        self.record(ItemOutcome::Succeeded { id, detail });
    }

    pub fn skipped(&mut self, id: DbId, reason: impl Into<String>) {
        self.record(ItemOutcome::Skipped {
            id,
            reason: reason.into(),
        });
    }

    pub fn failed(&mut self, id: DbId, error: impl ToString) {
        self.record(ItemOutcome::Failed {
            id,
            error: error.to_string(),
        });
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: BatchReport) {
        for item in other.items {
            self.record(item);
        }
    }
}
