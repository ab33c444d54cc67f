//! Partition key scheme.
//!
//! Keys are a stable contract with downstream readers:
//!
//! ```text
//! bronze/{event_type}/{yyyy}/{mm}/{dd}/{hh}/events_{unix_ts}_{batch_id}.parquet
//! silver/{event_type}/{yyyy}/{mm}/{dd}/events_{unix_ts}_{batch_id}.parquet
//! gold/{dataset}/{yyyy}/{mm}/{dd}/data_{unix_ts}_{batch_id}.parquet
//! silver/_rejected/{event_type}/{yyyy}/{mm}/{dd}/rejected_{unix_ts}_{batch_id}.parquet
//! ```
//!
//! Bronze keys are hour-bucketed; silver and gold keys are day-bucketed.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Timelike, Utc};
use strata_types::{BatchId, BatchPrefix, Layer};

/// File extension of every partition.
pub const PARTITION_EXT: &str = "parquet";

/// Path segment under `silver/` holding dead-letter partitions.
pub const REJECTED_SEGMENT: &str = "_rejected";

/// Builds the key for a layer partition.
///
/// `name` is the event type for bronze and silver, the dataset name for gold.
pub fn partition_key(layer: Layer, name: &str, at: DateTime<Utc>, batch_id: &BatchId) -> String {
    let (y, m, d, h) = (at.year(), at.month(), at.day(), at.hour());
    let ts = at.timestamp();
    match layer {
        Layer::Bronze => {
            format!("bronze/{name}/{y}/{m:02}/{d:02}/{h:02}/events_{ts}_{batch_id}.{PARTITION_EXT}")
        }
        Layer::Silver => {
            format!("silver/{name}/{y}/{m:02}/{d:02}/events_{ts}_{batch_id}.{PARTITION_EXT}")
        }
        Layer::Gold => {
            format!("gold/{name}/{y}/{m:02}/{d:02}/data_{ts}_{batch_id}.{PARTITION_EXT}")
        }
    }
}

/// Builds the dead-letter key for rejected events of one type.
pub fn rejected_key(event_type: &str, at: DateTime<Utc>, batch_id: &BatchId) -> String {
    format!(
        "silver/{REJECTED_SEGMENT}/{event_type}/{}/{:02}/{:02}/rejected_{}_{batch_id}.{PARTITION_EXT}",
        at.year(),
        at.month(),
        at.day(),
        at.timestamp()
    )
}

/// Dead-letter key for rejections taken from `bronze_key`: same write time,
/// and the bronze batch id with the `rejected` prefix. None when the bronze
/// key carries no stamp.
pub fn rejected_key_for(event_type: &str, bronze_key: &str) -> Option<String> {
    let stamp = KeyStamp::parse(bronze_key)?;
    let at = DateTime::from_timestamp(stamp.unix_ts, 0)?;
    let suffix = stamp
        .batch_id
        .strip_prefix(BatchPrefix::Batch.as_str())
        .unwrap_or(&stamp.batch_id);
    let batch_id = BatchId::new(format!("{}{suffix}", BatchPrefix::Rejected.as_str()));
    Some(rejected_key(event_type, at, &batch_id))
}

/// Listing prefix for a layer, optionally narrowed to one type or dataset.
pub fn layer_prefix(layer: Layer, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{layer}/{name}/"),
        None => format!("{layer}/"),
    }
}

/// Listing prefix for dead-letter partitions, optionally narrowed to one type.
pub fn rejected_prefix(event_type: Option<&str>) -> String {
    match event_type {
        Some(t) => format!("silver/{REJECTED_SEGMENT}/{t}/"),
        None => format!("silver/{REJECTED_SEGMENT}/"),
    }
}

/// The `(unix_ts, batch_id)` encoded in a partition file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyStamp {
    pub unix_ts: i64,
    pub batch_id: String,
}

impl KeyStamp {
    /// Parses `{prefix}_{unix_ts}_{batch_id}.parquet` from the last key segment.
    pub fn parse(key: &str) -> Option<Self> {
        let file = key.rsplit('/').next()?;
        let stem = file.strip_suffix(".parquet")?;
        let mut parts = stem.rsplitn(3, '_');
        let batch_id = parts.next()?;
        let unix_ts = parts.next()?.parse().ok()?;
        parts.next()?;
        Some(Self {
            unix_ts,
            batch_id: batch_id.to_string(),
        })
    }
}

/// Total order over partition keys: by `(unix_ts, batch_id)`, then key text.
/// Keys that do not carry a stamp sort after all stamped keys.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (KeyStamp::parse(a), KeyStamp::parse(b)) {
        (Some(sa), Some(sb)) => sa.cmp(&sb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 0).unwrap()
    }

    #[test_case(Layer::Bronze, "bronze/transaction-initiated/2026/03/07/09/events_1772874300_batchabc12345.parquet")]
    #[test_case(Layer::Silver, "silver/transaction-initiated/2026/03/07/events_1772874300_batchabc12345.parquet")]
    #[test_case(Layer::Gold, "gold/transaction-initiated/2026/03/07/data_1772874300_batchabc12345.parquet")]
    fn key_scheme(layer: Layer, expected: &str) {
        let key = partition_key(layer, "transaction-initiated", at(), &BatchId::new("batchabc12345"));
        assert_eq!(key, expected);
    }

    #[test]
    fn rejected_key_scheme() {
        let key = rejected_key("remittance-initiated", at(), &BatchId::new("rejected0badf00d"));
        assert_eq!(
            key,
            "silver/_rejected/remittance-initiated/2026/03/07/rejected_1772874300_rejected0badf00d.parquet"
        );
    }

    #[test]
    fn dead_letter_key_follows_its_bronze_partition() {
        let bronze = "bronze/remittance-initiated/2026/03/07/09/events_1772874300_batch0badf00d.parquet";
        let expected =
            "silver/_rejected/remittance-initiated/2026/03/07/rejected_1772874300_rejected0badf00d.parquet";
        assert_eq!(rejected_key_for("remittance-initiated", bronze).as_deref(), Some(expected));
        assert_eq!(rejected_key_for("remittance-initiated", "bronze/unstamped.parquet"), None);
    }

    #[test]
    fn stamp_parses_from_key() {
        let stamp = KeyStamp::parse("silver/x/2026/03/07/events_1772874300_batch00000001.parquet").unwrap();
        assert_eq!(stamp.unix_ts, 1_772_874_300);
        assert_eq!(stamp.batch_id, "batch00000001");
        assert!(KeyStamp::parse("silver/x/readme.txt").is_none());
        assert!(KeyStamp::parse("silver/x/events_notanumber_b.parquet").is_none());
    }

    #[test]
    fn same_second_partitions_order_by_batch_id() {
        let mut keys = vec![
            "bronze/t/2026/03/07/09/events_100_batchffffffff.parquet",
            "bronze/t/2026/03/07/09/events_100_batch00000000.parquet",
            "bronze/t/2026/03/07/08/events_99_batchzzzzzzzz.parquet",
            "bronze/t/unstamped.parquet",
        ];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(
            keys,
            vec![
                "bronze/t/2026/03/07/08/events_99_batchzzzzzzzz.parquet",
                "bronze/t/2026/03/07/09/events_100_batch00000000.parquet",
                "bronze/t/2026/03/07/09/events_100_batchffffffff.parquet",
                "bronze/t/unstamped.parquet",
            ]
        );
    }

    proptest! {
        #[test]
        fn stamp_recovers_write_time(secs in 0i64..4_000_000_000, suffix in "[0-9a-f]{8}") {
            let at = DateTime::from_timestamp(secs, 0).unwrap();
            let batch = BatchId::new(format!("batch{suffix}"));
            for layer in Layer::ALL {
                let stamp = KeyStamp::parse(&partition_key(layer, "t", at, &batch)).unwrap();
                prop_assert_eq!(stamp.unix_ts, secs);
                prop_assert_eq!(stamp.batch_id.as_str(), batch.as_str());
            }
        }
    }
}
