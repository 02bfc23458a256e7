//! Postgres store writing batches into the `cdr` table.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::destination::CdrStore;
use crate::error::CdrResult;
use crate::schema::{Cell, column_mapping};
use crate::types::CdrRecord;

/// Rows per `INSERT`, bounded by the 65535 bind parameters Postgres accepts.
const ROWS_PER_STATEMENT: usize = u16::MAX as usize / CdrRecord::FIELD_COUNT;

/// [`CdrStore`] inserting into the Postgres `cdr` table.
#[derive(Debug, Clone)]
pub struct PostgresCdrStore {
    pool: PgPool,
}

impl PostgresCdrStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a lazily connecting pool from `options`.
    ///
    /// Connections are opened on first use, so an unreachable database surfaces as an
    /// insert error that the writer retries rather than a startup failure.
    pub fn connect_lazy(
        options: sqlx::postgres::PgConnectOptions,
        max_connections: u32,
    ) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(options);

        Self::new(pool)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl CdrStore for PostgresCdrStore {
    fn name() -> &'static str {
        "postgres"
    }

    async fn insert_batch(&self, records: &[CdrRecord]) -> CdrResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut transaction = self.pool.begin().await?;

        for rows in records.chunks(ROWS_PER_STATEMENT) {
            let mut query = insert_query(rows);
            query.build().execute(&mut *transaction).await?;
        }

        transaction.commit().await?;
        debug!(records = records.len(), "inserted batch into cdr table");

        Ok(())
    }
}

/// Builds one multi-row `INSERT` binding every cell of `records` in column order.
fn insert_query(records: &[CdrRecord]) -> QueryBuilder<'_, Postgres> {
    let mapping = column_mapping();
    let mut builder = QueryBuilder::new(mapping.insert_prefix());

    builder.push_values(records, |mut row, record| {
        for cell in mapping.cells(record) {
            match cell {
                Cell::BigInt(value) => {
                    row.push_bind(value);
                }
                Cell::Int(value) => {
                    row.push_bind(value);
                }
                Cell::Text(value) => {
                    row.push_bind(value);
                }
            }
        }
    });

    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::record;

    #[test]
    fn statement_stays_within_bind_limit() {
        assert!(ROWS_PER_STATEMENT * CdrRecord::FIELD_COUNT <= u16::MAX as usize);
        assert!((ROWS_PER_STATEMENT + 1) * CdrRecord::FIELD_COUNT > u16::MAX as usize);
    }

    #[test]
    fn binds_every_record_in_one_statement() {
        let records = vec![record("1000", "m-0"), record("1001", "m-1")];

        let query = insert_query(&records);
        let sql = query.sql();

        assert!(sql.starts_with("INSERT INTO cdr (record_date, submit_date,"));
        assert!(sql.contains("parent_id) VALUES ($1, $2,"));
        assert!(sql.contains("$45, $46), ($47, $48,"));
        assert!(sql.ends_with("$91, $92)"));
    }

    #[test]
    fn full_chunk_uses_last_placeholder_within_limit() {
        let records = vec![record("1000", "m-0"); ROWS_PER_STATEMENT];

        let query = insert_query(&records);
        let last = ROWS_PER_STATEMENT * CdrRecord::FIELD_COUNT;

        assert!(query.sql().ends_with(&format!("${last})")));
    }
}
