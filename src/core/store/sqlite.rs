//! SQLite-backed `ExecutionStore` using Diesel.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::ExecutionStore;
use crate::core::db::model::ExecutionRow;
use crate::core::db::schema::executions;
use crate::core::db::DbPool;
use crate::core::domain::{ExecutionRecord, ExecutionState, Slug, TokenId};
use crate::error::{Error, Result};

pub struct SqliteExecutionStore {
    pool: DbPool,
}

impl SqliteExecutionStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(record: &ExecutionRecord) -> ExecutionRow {
        ExecutionRow {
            execution_id: record.execution_id.clone(),
            slug: record.slug.to_string(),
            up_token: record.up_token.to_string(),
            down_token: record.down_token.to_string(),
            target_shares: record.target_shares.to_string(),
            state: record.state.as_str().to_string(),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
            leg_a_external_id: record.leg_a_external_id.clone(),
            leg_b_external_id: record.leg_b_external_id.clone(),
            leg_a_raw_blob: record.leg_a_raw_blob.clone(),
            leg_b_raw_blob: record.leg_b_raw_blob.clone(),
            estimated_total_notional: record.estimated_total_notional.to_string(),
            backend_tag: record.backend_tag.clone(),
        }
    }

    fn from_row(row: ExecutionRow) -> Result<ExecutionRecord> {
        let parse_ts = |s: &str| -> Result<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)).map_err(|e| Error::Parse(e.to_string()))
        };

        Ok(ExecutionRecord {
            slug: Slug::parse(&row.slug).ok_or_else(|| Error::Parse(format!("invalid slug: {}", row.slug)))?,
            up_token: TokenId::new(row.up_token),
            down_token: TokenId::new(row.down_token),
            target_shares: row.target_shares.parse().map_err(|_| Error::Parse(format!("invalid target_shares: {}", row.target_shares)))?,
            state: ExecutionState::parse(&row.state).ok_or_else(|| Error::Parse(format!("invalid state: {}", row.state)))?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            leg_a_external_id: row.leg_a_external_id,
            leg_b_external_id: row.leg_b_external_id,
            leg_a_raw_blob: row.leg_a_raw_blob,
            leg_b_raw_blob: row.leg_b_raw_blob,
            estimated_total_notional: row
                .estimated_total_notional
                .parse()
                .map_err(|_| Error::Parse(format!("invalid estimated_total_notional: {}", row.estimated_total_notional)))?,
            backend_tag: row.backend_tag,
            execution_id: row.execution_id,
        })
    }

    fn conn(&self) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>> {
        self.pool.get().map_err(|e| Error::Connection(e.to_string()))
    }
}

#[async_trait]
impl ExecutionStore for SqliteExecutionStore {
    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>> {
        let mut conn = self.conn()?;
        let row: Option<ExecutionRow> =
            executions::table.find(execution_id).first(&mut conn).optional().map_err(|e| Error::Database(e.to_string()))?;
        row.map(Self::from_row).transpose()
    }

    async fn upsert(&self, record: &ExecutionRecord) -> Result<()> {
        let mut conn = self.conn()?;
        let row = Self::to_row(record);
        diesel::replace_into(executions::table).values(&row).execute(&mut conn).map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_non_terminal(&self) -> Result<Vec<ExecutionRecord>> {
        let mut conn = self.conn()?;
        let rows: Vec<ExecutionRow> = executions::table
            .filter(executions::state.ne(ExecutionState::Done.as_str()))
            .filter(executions::state.ne(ExecutionState::Aborted.as_str()))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::from_row).collect()
    }

    async fn list_unresolved_hedges(&self) -> Result<Vec<ExecutionRecord>> {
        let mut conn = self.conn()?;
        let rows: Vec<ExecutionRow> = executions::table
            .filter(executions::state.eq(ExecutionState::Aborted.as_str()))
            .filter(executions::leg_a_external_id.is_not_null())
            .filter(executions::leg_b_external_id.is_null())
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::from_row).collect()
    }

    async fn count_open_non_terminal(&self) -> Result<usize> {
        Ok(self.list_non_terminal().await?.len())
    }

    async fn sum_estimated_notional_for_utc_day(&self, day: NaiveDate) -> Result<Decimal> {
        let mut conn = self.conn()?;
        let prefix = format!("{}%", day.format("%Y-%m-%d"));
        let rows: Vec<ExecutionRow> =
            executions::table.filter(executions::created_at.like(&prefix)).load(&mut conn).map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| row.estimated_total_notional.parse::<Decimal>().map_err(|_| Error::Parse("estimated_total_notional".into())))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::create_pool;
    use chrono::Utc;
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
    use rust_decimal_macros::dec;

    pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    fn setup_test_db() -> DbPool {
        let pool = create_pool(":memory:").expect("failed to create pool");
        let mut conn = pool.get().expect("failed to get connection");
        conn.run_pending_migrations(MIGRATIONS).expect("failed to run migrations");
        pool
    }

    fn record() -> ExecutionRecord {
        ExecutionRecord::planned(Slug::new(900), TokenId::new("up-1"), TokenId::new("down-1"), dec!(40), dec!(18.5), "direct", Utc::now())
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = SqliteExecutionStore::new(setup_test_db());
        let rec = record();
        store.upsert(&rec).await.unwrap();

        let loaded = store.get(&rec.execution_id).await.unwrap().unwrap();
        assert_eq!(loaded.execution_id, rec.execution_id);
        assert_eq!(loaded.target_shares, rec.target_shares);
        assert_eq!(loaded.state, ExecutionState::Planned);
    }

    #[tokio::test]
    async fn upsert_is_total_row_replace() {
        let store = SqliteExecutionStore::new(setup_test_db());
        let mut rec = record();
        store.upsert(&rec).await.unwrap();

        rec.transition(ExecutionState::LegAPlaced, Utc::now());
        rec.leg_a_external_id = Some("ext-a".into());
        store.upsert(&rec).await.unwrap();

        let loaded = store.get(&rec.execution_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, ExecutionState::LegAPlaced);
        assert_eq!(loaded.leg_a_external_id.as_deref(), Some("ext-a"));
    }

    #[tokio::test]
    async fn list_non_terminal_excludes_terminal_states() {
        let store = SqliteExecutionStore::new(setup_test_db());
        let open = record();
        store.upsert(&open).await.unwrap();

        let mut aborted = ExecutionRecord::planned(Slug::new(1_800), TokenId::new("u2"), TokenId::new("d2"), dec!(1), dec!(1), "direct", Utc::now());
        aborted.transition(ExecutionState::Aborted, Utc::now());
        store.upsert(&aborted).await.unwrap();

        let non_terminal = store.list_non_terminal().await.unwrap();
        assert_eq!(non_terminal.len(), 1);
        assert_eq!(non_terminal[0].execution_id, open.execution_id);
    }

    #[tokio::test]
    async fn unresolved_hedges_requires_leg_a_only() {
        let store = SqliteExecutionStore::new(setup_test_db());
        let mut rec = record();
        rec.leg_a_external_id = Some("ext-a".into());
        rec.transition(ExecutionState::Aborted, Utc::now());
        store.upsert(&rec).await.unwrap();

        let unresolved = store.list_unresolved_hedges().await.unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].execution_id, rec.execution_id);
    }

    #[tokio::test]
    async fn sum_for_utc_day_scopes_to_created_date() {
        let store = SqliteExecutionStore::new(setup_test_db());
        let rec = record();
        let day = rec.created_at.date_naive();
        store.upsert(&rec).await.unwrap();

        let sum = store.sum_estimated_notional_for_utc_day(day).await.unwrap();
        assert_eq!(sum, dec!(18.5));
    }
}
