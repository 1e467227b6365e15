use std::collections::{BTreeMap, HashMap};

use super::{Bucket, BucketKey, MetricsMap, PercentileSet, StatusClass};

/// Everything the collector held at the moment of a `snapshot_and_reset`.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    buckets: HashMap<BucketKey, Bucket>,
}

/// One non-empty bucket with its computed statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub key: BucketKey,
    pub stats: PercentileSet,
}

impl MetricsSnapshot {
    pub(crate) fn new(buckets: HashMap<BucketKey, Bucket>) -> Self {
        Self { buckets }
    }

    /// Combine another snapshot's buckets with this one, sample by sample,
    /// so percentiles stay exact across both.
    pub fn merge(&mut self, other: MetricsSnapshot) {
        for (key, bucket) in other.buckets {
            self.buckets.entry(key).or_default().absorb(bucket);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket(&self, service: &str, class: StatusClass) -> Option<&Bucket> {
        self.buckets.get(&BucketKey::new(service, class))
    }

    /// Sample count for a bucket, 0 when it was never created.
    pub fn count(&self, service: &str, class: StatusClass) -> u64 {
        self.bucket(service, class).map_or(0, Bucket::count)
    }

    /// Total calls per service: exact-status buckets plus the error bucket.
    /// Family buckets are skipped since they repeat the exact ones.
    pub fn service_counts(&self) -> BTreeMap<&str, u64> {
        let mut totals = BTreeMap::new();
        for (key, bucket) in &self.buckets {
            if matches!(key.class, StatusClass::Family(_)) || bucket.count() == 0 {
                continue;
            }
            *totals.entry(key.service.as_str()).or_insert(0) += bucket.count();
        }
        totals
    }

    /// Statistics for every non-empty bucket, ordered by key.
    pub fn summaries(&self) -> Vec<BucketSummary> {
        let mut out: Vec<BucketSummary> = self
            .buckets
            .iter()
            .filter_map(|(key, bucket)| {
                bucket.summarize().map(|stats| BucketSummary {
                    key: key.clone(),
                    stats,
                })
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Flatten into dotted metric names under `namespace`:
    ///
    /// ```text
    /// {ns}.{service}.count
    /// {ns}.{service}.response.status_{class}.count
    /// {ns}.{service}.response.status_{class}.response_time.{mean|min|max|median|95th|99th}
    /// ```
    pub fn to_metrics_map(&self, namespace: &str) -> MetricsMap {
        let mut map = MetricsMap::new();

        for (service, total) in self.service_counts() {
            map.insert(format!("{}.count", qualify(namespace, service)), total as f64);
        }

        for summary in self.summaries() {
            let base = format!(
                "{}.response.status_{}",
                qualify(namespace, &summary.key.service),
                summary.key.class
            );
            map.insert(format!("{base}.count"), summary.stats.count as f64);
            for (suffix, value) in summary.stats.response_times() {
                map.insert(format!("{base}.response_time.{suffix}"), value);
            }
        }

        map
    }
}

fn qualify(namespace: &str, service: &str) -> String {
    if namespace.is_empty() {
        service.to_owned()
    } else {
        format!("{namespace}.{service}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_of(entries: &[(&str, StatusClass, &[f64])]) -> MetricsSnapshot {
        let mut buckets = HashMap::new();
        for (service, class, samples) in entries {
            let bucket: &mut Bucket = buckets.entry(BucketKey::new(*service, *class)).or_default();
            for sample in *samples {
                bucket.push(*sample);
            }
        }
        MetricsSnapshot::new(buckets)
    }

    #[test]
    fn metric_names_follow_the_dotted_layout() {
        let snapshot = snapshot_of(&[
            ("blogs", StatusClass::Exact(200), &[10.0, 20.0]),
            ("blogs", StatusClass::Family(2), &[10.0, 20.0]),
        ]);
        let map = snapshot.to_metrics_map("fetch");

        assert_eq!(map["fetch.blogs.count"], 2.0);
        assert_eq!(map["fetch.blogs.response.status_200.count"], 2.0);
        assert_eq!(map["fetch.blogs.response.status_2xx.count"], 2.0);
        for status in ["200", "2xx"] {
            for grouping in ["mean", "min", "max", "median", "95th", "99th"] {
                let key = format!("fetch.blogs.response.status_{status}.response_time.{grouping}");
                assert!(map.contains_key(&key), "{key} missing");
            }
        }
        assert_eq!(map["fetch.blogs.response.status_200.response_time.mean"], 15.0);
    }

    #[test]
    fn service_count_includes_errors_but_not_families() {
        let snapshot = snapshot_of(&[
            ("capi", StatusClass::Exact(404), &[1.0]),
            ("capi", StatusClass::Exact(500), &[2.0]),
            ("capi", StatusClass::Family(4), &[1.0]),
            ("capi", StatusClass::Family(5), &[2.0]),
            ("capi", StatusClass::Error, &[3.0]),
        ]);
        let map = snapshot.to_metrics_map("fetch");

        assert_eq!(map["fetch.capi.count"], 3.0);
        assert_eq!(map["fetch.capi.response.status_error.count"], 1.0);
    }

    #[test]
    fn merged_snapshots_keep_every_sample() {
        let mut first = snapshot_of(&[("blogs", StatusClass::Exact(200), &[10.0, 20.0])]);
        let second = snapshot_of(&[
            ("blogs", StatusClass::Exact(200), &[30.0]),
            ("capi", StatusClass::Error, &[5.0]),
        ]);
        first.merge(second);

        assert_eq!(first.count("blogs", StatusClass::Exact(200)), 3);
        assert_eq!(first.count("capi", StatusClass::Error), 1);
        let map = first.to_metrics_map("fetch");
        assert_eq!(map["fetch.blogs.response.status_200.response_time.median"], 20.0);
        assert_eq!(map["fetch.blogs.response.status_200.response_time.max"], 30.0);
    }

    #[test]
    fn empty_namespace_has_no_leading_dot() {
        let snapshot = snapshot_of(&[("svc", StatusClass::Error, &[5.0])]);
        let map = snapshot.to_metrics_map("");
        assert!(map.contains_key("svc.count"));
    }

    #[test]
    fn empty_buckets_are_not_reported() {
        let snapshot = snapshot_of(&[("svc", StatusClass::Exact(204), &[])]);
        let map = snapshot.to_metrics_map("fetch");
        assert!(!map.keys().any(|k| k.contains("status_204")));
    }
}
