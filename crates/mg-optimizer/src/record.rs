//! Run records and sweep configuration.

use chrono::{DateTime, Utc};
use mg_types::Params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique sweep identifier.
pub type SweepId = Uuid;

/// Top-level configuration for a grid sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub id: SweepId,
    pub name: String,

    /// Worker threads for fresh-construction sweeps. `1` runs inline on the
    /// calling thread. Reparametrize-in-place sweeps ignore it.
    pub concurrency: usize,

    pub created_at: DateTime<Utc>,
}

impl RunnerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            concurrency: 1,
            created_at: Utc::now(),
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new("grid")
    }
}

/// One evaluated grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord<O> {
    pub id: Uuid,
    /// `"{type name}-{id}"`.
    pub label: String,
    /// Position of the grid point in enumeration order.
    pub run_number: usize,
    pub parameters: Params,
    pub output: O,
    pub created_at: DateTime<Utc>,
    pub duration_micros: u64,
}

/// Every record of one sweep, in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults<O> {
    pub sweep_id: SweepId,
    pub name: String,
    records: Vec<RunRecord<O>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<O> RunResults<O> {
    pub(crate) fn new(config: &RunnerConfig, records: Vec<RunRecord<O>>, started_at: DateTime<Utc>) -> Self {
        Self {
            sweep_id: config.id,
            name: config.name.clone(),
            records,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&RunRecord<O>> {
        self.records.iter().find(|record| record.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunRecord<O>> {
        self.records.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.label.as_str())
    }

    pub fn records(&self) -> &[RunRecord<O>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RunRecord<O>> {
        self.records
    }
}
