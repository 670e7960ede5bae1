//! Diesel row type for the `executions` table.

use diesel::prelude::*;

use super::schema::executions;

/// Durable row for one [`crate::core::domain::ExecutionRecord`]. String-typed
/// decimal/timestamp columns so that schema evolution (new nullable columns)
/// never requires a lossy numeric re-encoding of existing rows.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = executions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExecutionRow {
    pub execution_id: String,
    pub slug: String,
    pub up_token: String,
    pub down_token: String,
    pub target_shares: String,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
    pub leg_a_external_id: Option<String>,
    pub leg_b_external_id: Option<String>,
    pub leg_a_raw_blob: Option<String>,
    pub leg_b_raw_blob: Option<String>,
    pub estimated_total_notional: String,
    pub backend_tag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_row_is_insertable() {
        let _row = ExecutionRow {
            execution_id: "id".into(),
            slug: "btc-updown-15m-900".into(),
            up_token: "up".into(),
            down_token: "down".into(),
            target_shares: "40".into(),
            state: "PLANNED".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
            leg_a_external_id: None,
            leg_b_external_id: None,
            leg_a_raw_blob: None,
            leg_b_raw_blob: None,
            estimated_total_notional: "18".into(),
            backend_tag: "direct".into(),
        };
    }
}
