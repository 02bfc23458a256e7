use std::ops::Deref;

use crate::types::CdrRecord;

/// Records popped together by one chunk, ordered by `record_date`.
///
/// Records with a parsable `record_date` come first in ascending order, followed by
/// records whose date is missing or invalid. Ties keep their queue order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CdrBatch {
    records: Vec<CdrRecord>,
}

impl CdrBatch {
    pub fn new(mut records: Vec<CdrRecord>) -> Self {
        records.sort_by_key(|record| {
            let millis = record.record_date_millis();
            (millis.is_none(), millis)
        });

        Self { records }
    }

    pub fn records(&self) -> &[CdrRecord] {
        &self.records
    }
}

impl Deref for CdrBatch {
    type Target = [CdrRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(record_date: &str, message_id: &str) -> CdrRecord {
        CdrRecord {
            record_date: record_date.to_string(),
            message_id: message_id.to_string(),
            ..Default::default()
        }
    }

    fn ids(batch: &CdrBatch) -> Vec<&str> {
        batch.iter().map(|r| r.message_id.as_str()).collect()
    }

    #[test]
    fn sorts_ascending_with_invalid_dates_last() {
        let batch = CdrBatch::new(vec![
            record("", "blank"),
            record("300", "c"),
            record("100", "a"),
            record("x1", "garbage"),
            record("200", "b"),
        ]);

        assert_eq!(ids(&batch), vec!["a", "b", "c", "blank", "garbage"]);
    }

    #[test]
    fn equal_dates_keep_queue_order() {
        let batch = CdrBatch::new(vec![
            record("100", "first"),
            record("100", "second"),
            record("", "third"),
            record("", "fourth"),
        ]);

        assert_eq!(ids(&batch), vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn blank_date_sorts_after_small_date() {
        let batch = CdrBatch::new(vec![record("", "blank"), record("100", "hundred")]);

        assert_eq!(ids(&batch), vec!["hundred", "blank"]);
    }
}
