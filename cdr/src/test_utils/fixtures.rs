use crate::codec;
use crate::types::CdrRecord;

/// Builds a record with the given `record_date` and `message_id` and a few
/// representative values in typed columns.
pub fn record(record_date: &str, message_id: &str) -> CdrRecord {
    CdrRecord {
        record_date: record_date.to_string(),
        submit_date: record_date.to_string(),
        message_type: "SMS".to_string(),
        message_id: message_id.to_string(),
        origination_protocol: "SMPP".to_string(),
        routing_id: "1".to_string(),
        status: "DELIVERED".to_string(),
        addr_src_digits: "50588888888".to_string(),
        addr_dst_digits: "59999999".to_string(),
        addr_dst_ton: "1".to_string(),
        local_dialog_id: "42".to_string(),
        ..Default::default()
    }
}

/// Same as [`record`] in its JSON transport form.
pub fn record_json(record_date: &str, message_id: &str) -> String {
    encode(&record(record_date, message_id))
}

/// `count` records in transport form, dated 1000, 1001, ... and identified `m-0`, `m-1`, ...
pub fn records_json(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| record_json(&(1000 + i).to_string(), &format!("m-{i}")))
        .collect()
}

fn encode(record: &CdrRecord) -> String {
    codec::encode(record).unwrap_or_else(|err| panic!("fixture record must encode: {err}"))
}
