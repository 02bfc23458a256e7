//! Column mapping between [`CdrRecord`] fields and the `cdr` table.

use std::sync::OnceLock;

use tracing::warn;

use crate::types::{CdrRecord, ColumnType};

/// Name of the table receiving records in database mode.
pub const CDR_TABLE: &str = "cdr";

static COLUMN_MAPPING: OnceLock<ColumnMapping> = OnceLock::new();

/// Returns the process-wide column mapping, building it on first use.
pub fn column_mapping() -> &'static ColumnMapping {
    COLUMN_MAPPING.get_or_init(ColumnMapping::build)
}

/// Ordered columns of the `cdr` table and the matching insert statement.
///
/// Both are derived from the [`CdrRecord`] field table, so the placeholder `$n` of the
/// statement always binds the `n`-th cell produced by [`ColumnMapping::cells`].
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    columns: Vec<(&'static str, ColumnType)>,
    insert_prefix: String,
    insert_statement: String,
}

impl ColumnMapping {
    fn build() -> Self {
        let columns: Vec<(&'static str, ColumnType)> = CdrRecord::FIELD_NAMES
            .iter()
            .copied()
            .zip(CdrRecord::COLUMN_TYPES.iter().copied())
            .collect();

        let names = columns
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|position| format!("${position}"))
            .collect::<Vec<_>>()
            .join(", ");

        let insert_prefix = format!("INSERT INTO {CDR_TABLE} ({names}) ");

        Self {
            insert_statement: format!("{insert_prefix}VALUES ({placeholders})"),
            insert_prefix,
            columns,
        }
    }

    pub fn columns(&self) -> &[(&'static str, ColumnType)] {
        &self.columns
    }

    /// The statement up to, and excluding, its `VALUES` clause.
    pub fn insert_prefix(&self) -> &str {
        &self.insert_prefix
    }

    /// Single-row insert statement with one placeholder per column.
    pub fn insert_statement(&self) -> &str {
        &self.insert_statement
    }

    /// Converts `record` into typed cells in column order.
    ///
    /// Empty values become typed `NULL`s. A value that does not parse as its column's
    /// integer type also becomes `NULL` and is logged.
    pub fn cells<'a>(&self, record: &'a CdrRecord) -> Vec<Cell<'a>> {
        self.columns
            .iter()
            .zip(record.fields())
            .map(|(&(column, column_type), value)| Cell::parse(column, column_type, value))
            .collect()
    }
}

/// A value ready to be bound to an insert placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell<'a> {
    BigInt(Option<i64>),
    Int(Option<i32>),
    Text(Option<&'a str>),
}

impl<'a> Cell<'a> {
    fn parse(column: &str, column_type: ColumnType, value: &'a str) -> Self {
        if value.is_empty() {
            return match column_type {
                ColumnType::BigInt => Cell::BigInt(None),
                ColumnType::Int => Cell::Int(None),
                ColumnType::Text => Cell::Text(None),
            };
        }

        match column_type {
            ColumnType::BigInt => Cell::BigInt(parse_or_null(column, value)),
            ColumnType::Int => Cell::Int(parse_or_null(column, value)),
            ColumnType::Text => Cell::Text(Some(value)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::BigInt(None) | Cell::Int(None) | Cell::Text(None))
    }
}

fn parse_or_null<T: std::str::FromStr>(column: &str, value: &str) -> Option<T> {
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(column, value, "non-numeric value for integer column, storing NULL");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_lists_every_column_in_order() {
        let mapping = column_mapping();
        let statement = mapping.insert_statement();

        assert!(statement.starts_with(
            "INSERT INTO cdr (record_date, submit_date, delivery_date, message_type,"
        ));
        assert!(statement.contains("parent_id) VALUES ($1, $2,"));
        assert!(statement.ends_with("$45, $46)"));
        assert_eq!(mapping.columns().len(), 46);
    }

    #[test]
    fn mapping_is_built_once() {
        assert!(std::ptr::eq(column_mapping(), column_mapping()));
    }

    #[test]
    fn cells_follow_column_types() {
        let record = CdrRecord {
            record_date: "1700000000000".to_string(),
            routing_id: "7".to_string(),
            message_id: "m-1".to_string(),
            addr_dst_digits: "5551234".to_string(),
            ..Default::default()
        };

        let cells = column_mapping().cells(&record);

        assert_eq!(cells.len(), 46);
        assert_eq!(cells[0], Cell::BigInt(Some(1_700_000_000_000)));
        assert_eq!(cells[1], Cell::BigInt(None));
        assert_eq!(cells[4], Cell::Text(Some("m-1")));
        assert_eq!(cells[11], Cell::Int(Some(7)));
        assert_eq!(cells[22], Cell::Int(Some(5_551_234)));
        assert_eq!(cells[45], Cell::Text(None));
    }

    #[test]
    fn destination_digits_bind_as_integer() {
        let index = CdrRecord::FIELD_NAMES
            .iter()
            .position(|field| *field == "addr_dst_digits")
            .unwrap();
        let mut record = CdrRecord {
            addr_dst_digits: "59999999".to_string(),
            ..Default::default()
        };

        assert_eq!(column_mapping().columns()[index].1, ColumnType::Int);
        assert_eq!(
            column_mapping().cells(&record)[index],
            Cell::Int(Some(59_999_999))
        );

        // Out of `INTEGER` range.
        record.addr_dst_digits = "50599999999".to_string();
        assert_eq!(column_mapping().cells(&record)[index], Cell::Int(None));
    }

    #[test]
    fn empty_and_unparsable_values_bind_null() {
        let record = CdrRecord {
            local_spc: "abc".to_string(),
            dialog_duration: "99999999999999999999999".to_string(),
            ..Default::default()
        };

        let cells = column_mapping().cells(&record);

        assert!(cells.iter().all(Cell::is_null));
    }

    #[test]
    fn empty_string_is_never_zero() {
        let record = CdrRecord::default();
        let cells = column_mapping().cells(&record);

        assert!(!cells.contains(&Cell::Int(Some(0))));
        assert!(!cells.contains(&Cell::BigInt(Some(0))));
    }
}
