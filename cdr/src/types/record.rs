use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Postgres type of a `cdr` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `BIGINT`, bound as `i64`.
    BigInt,
    /// `INTEGER`, bound as `i32`.
    Int,
    /// `TEXT`, bound as is.
    Text,
}

/// Declares [`CdrRecord`] together with its field table.
///
/// The field list is the single source of truth for the JSON keys of the transport
/// form, the column names of the `cdr` table and the order in which values are bound
/// and printed.
macro_rules! cdr_record {
    ($($field:ident: $column_type:ident),+ $(,)?) => {
        /// A call or message detail record as pushed to the queue.
        ///
        /// Every field is kept as text. Missing keys, `null` and `""` all decode to the
        /// empty string, which the database sink stores as `NULL`.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct CdrRecord {
            $(
                #[serde(deserialize_with = "lenient_string")]
                pub $field: String,
            )+
        }

        impl CdrRecord {
            /// Field names in declared order.
            pub const FIELD_NAMES: &'static [&'static str] = &[$(stringify!($field)),+];

            /// Column types in declared order.
            pub const COLUMN_TYPES: &'static [ColumnType] = &[$(ColumnType::$column_type),+];

            pub const FIELD_COUNT: usize = Self::FIELD_NAMES.len();

            /// Field values in declared order.
            pub fn fields(&self) -> Vec<&str> {
                vec![$(self.$field.as_str()),+]
            }
        }
    };
}

cdr_record! {
    record_date: BigInt,
    submit_date: BigInt,
    delivery_date: BigInt,
    message_type: Text,
    message_id: Text,
    origination_protocol: Text,
    origination_network_id: Text,
    origination_type: Text,
    destination_protocol: Text,
    destination_network_id: Text,
    destination_type: Text,
    routing_id: Int,
    status: Text,
    status_code: Text,
    comment: Text,
    dialog_duration: BigInt,
    processing_time: BigInt,
    data_coding: Int,
    validity_period: Text,
    addr_src_digits: Text,
    addr_src_ton: Int,
    addr_src_npi: Int,
    addr_dst_digits: Int,
    addr_dst_ton: Int,
    addr_dst_npi: Int,
    remote_dialog_id: BigInt,
    local_dialog_id: BigInt,
    local_spc: Int,
    local_ssn: Int,
    local_global_title_digits: Text,
    remote_spc: Int,
    remote_ssn: Int,
    remote_global_title_digits: Text,
    imsi: Text,
    nnn_digits: Text,
    originator_sccp_address: Text,
    mt_service_center_address: Text,
    first_20_character_of_sms: Text,
    esm_class: Text,
    udhi: Text,
    registered_delivery: Int,
    msg_reference_number: Text,
    total_segment: Int,
    segment_sequence: Int,
    retry_number: Int,
    parent_id: Text,
}

impl CdrRecord {
    /// Returns `record_date` as epoch milliseconds, or `None` when it is empty or not a number.
    pub fn record_date_millis(&self) -> Option<i64> {
        self.record_date.trim().parse().ok()
    }
}

/// Accepts strings, numbers, booleans and `null` where text is expected.
///
/// Numbers keep their decimal text and `null` becomes the empty string.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientString;

    impl<'de> Visitor<'de> for LenientString {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number, boolean or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LenientString)
}
