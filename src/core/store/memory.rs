//! In-memory `ExecutionStore`, used by tests and as a `--dry-run` backend
//! that needs no database file.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use super::ExecutionStore;
use crate::core::domain::{ExecutionRecord, Slug};
use crate::error::Result;

#[derive(Default)]
pub struct InMemoryExecutionStore {
    records: RwLock<HashMap<String, ExecutionRecord>>,
}

impl InMemoryExecutionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>> {
        Ok(self.records.read().get(execution_id).cloned())
    }

    async fn upsert(&self, record: &ExecutionRecord) -> Result<()> {
        self.records.write().insert(record.execution_id.clone(), record.clone());
        Ok(())
    }

    async fn list_non_terminal(&self) -> Result<Vec<ExecutionRecord>> {
        Ok(self.records.read().values().filter(|r| !r.state.is_terminal()).cloned().collect())
    }

    async fn list_unresolved_hedges(&self) -> Result<Vec<ExecutionRecord>> {
        Ok(self.records.read().values().filter(|r| r.is_unresolved_hedge()).cloned().collect())
    }

    async fn count_open_non_terminal(&self) -> Result<usize> {
        Ok(self.records.read().values().filter(|r| !r.state.is_terminal()).count())
    }

    async fn sum_estimated_notional_for_utc_day(&self, day: NaiveDate) -> Result<Decimal> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.created_at.date_naive() == day)
            .map(|r| r.estimated_total_notional)
            .sum())
    }
}
