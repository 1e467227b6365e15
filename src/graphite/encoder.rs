use std::collections::BTreeMap;

/// One line per metric: `"{prefix}{name} {value} {timestamp}\n"`.
///
/// Absent (`None`) and non-finite values are skipped. Every line in a batch
/// carries the same timestamp.
pub fn encode<K, V>(metrics: &BTreeMap<K, V>, timestamp: i64, prefix: &str) -> Vec<String>
where
    K: AsRef<str>,
    V: Into<Option<f64>> + Copy,
{
    metrics
        .iter()
        .filter_map(|(name, value)| {
            let value: Option<f64> = (*value).into();
            value
                .filter(|v| v.is_finite())
                .map(|v| format!("{prefix}{} {v} {timestamp}\n", name.as_ref()))
        })
        .collect()
}

/// All lines of a batch joined into a single write.
pub fn encode_payload<K, V>(metrics: &BTreeMap<K, V>, timestamp: i64, prefix: &str) -> String
where
    K: AsRef<str>,
    V: Into<Option<f64>> + Copy,
{
    encode(metrics, timestamp, prefix).concat()
}
