//! Execution persistence (§3 `ExecutionRecord`, §4.H `RiskLedger`).
//!
//! One durable table keyed by `execution_id`, upserted with total-row
//! semantics; reads are consistent with the latest committed write. The
//! executor is the sole writer; the risk register and the CLI's `unresolved`
//! view are read-only consumers of the same trait.

mod memory;
mod sqlite;

pub use memory::InMemoryExecutionStore;
pub use sqlite::SqliteExecutionStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::core::domain::{ExecutionRecord, Slug};
use crate::error::Result;

/// Durable storage for execution records. Implementors must make `upsert`
/// visible to subsequent `get`/`list_*` calls on the same store instance
/// before returning (§5 "writes use upsert with total-row semantics; reads
/// are consistent with the latest committed write").
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>>;

    /// Replace the full row for `record.execution_id`, inserting it if absent.
    async fn upsert(&self, record: &ExecutionRecord) -> Result<()>;

    /// All records not yet in a terminal state.
    async fn list_non_terminal(&self) -> Result<Vec<ExecutionRecord>>;

    /// ABORTED records with a placed leg A and no placed leg B — the minimal
    /// surface an external exit manager needs (§9 open question).
    async fn list_unresolved_hedges(&self) -> Result<Vec<ExecutionRecord>>;

    async fn count_open_non_terminal(&self) -> Result<usize>;

    async fn sum_estimated_notional_for_utc_day(&self, day: NaiveDate) -> Result<Decimal>;

    /// The scanner's "no currently open execution for this slug" check
    /// (§4.E.4). Implemented in terms of `list_non_terminal` by default;
    /// backends with an index on `slug` may override this.
    async fn open_execution_for_slug(&self, slug: Slug) -> Result<Option<ExecutionRecord>> {
        Ok(self.list_non_terminal().await?.into_iter().find(|r| r.slug == slug))
    }
}
