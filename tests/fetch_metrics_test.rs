use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use regex::Regex;

use fetch_telemetry::{
    Classifier, FetchError, FetchHandle, FetchMetrics, FetchOptions, FetchResponse, Fetcher,
    InstrumentOptions, InstrumentationError,
};

// Stub upstream: answers with whatever status is currently set.
struct StubFetch {
    status: AtomicU16,
    calls: Mutex<Vec<(String, FetchOptions)>>,
}

impl StubFetch {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU16::new(status),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn respond_with(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for StubFetch {
    async fn fetch(&self, target: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        self.calls.lock().unwrap().push((target.to_owned(), options.clone()));
        Ok(FetchResponse::new(self.status.load(Ordering::SeqCst)))
    }
}

fn blogs_classifier() -> Classifier {
    Classifier::default().rule("blogs", Regex::new(r"^https?://blogs\.ft\.com").unwrap())
}

fn setup(status: u16) -> (Arc<StubFetch>, Arc<FetchHandle>, FetchMetrics) {
    let stub = StubFetch::new(status);
    let handle = Arc::new(FetchHandle::new(stub.clone()));
    let metrics = FetchMetrics::new(handle.clone(), blogs_classifier());
    (stub, handle, metrics)
}

#[tokio::test]
async fn instrument_replaces_and_restore_returns_the_original() {
    let (stub, handle, metrics) = setup(200);
    let original: Arc<dyn Fetcher> = handle.current().unwrap();

    metrics.instrument(InstrumentOptions::default()).unwrap();
    let wrapped = handle.current().unwrap();
    assert!(wrapped.is_instrumented());
    assert!(!Arc::ptr_eq(&wrapped, &original));

    let restored = metrics.restore().unwrap();
    assert!(Arc::ptr_eq(&restored, &original));
    assert!(Arc::ptr_eq(&handle.current().unwrap(), &original));

    // Calls after restore go straight through and are not recorded.
    let res = handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(stub.calls.lock().unwrap().len(), 1);
    assert!(metrics.reporter().is_empty());
}

#[test]
fn restore_without_instrument_fails() {
    let (_stub, _handle, metrics) = setup(200);
    assert_eq!(metrics.restore().unwrap_err(), InstrumentationError::NotInstrumented);
}

#[test]
fn instrument_without_a_fetcher_fails() {
    let metrics = FetchMetrics::new(Arc::new(FetchHandle::empty()), blogs_classifier());
    assert_eq!(
        metrics.instrument(InstrumentOptions::default()).unwrap_err(),
        InstrumentationError::Unavailable
    );
}

#[tokio::test]
async fn response_and_arguments_pass_through_unchanged() {
    let (stub, handle, metrics) = setup(200);
    metrics.instrument(InstrumentOptions::default()).unwrap();

    let options = FetchOptions::method("PUT");
    let res = handle.fetch("https://blogs.ft.com", &options).await.unwrap();

    assert_eq!(res, FetchResponse::new(200));
    assert_eq!(
        *stub.calls.lock().unwrap(),
        vec![("https://blogs.ft.com".to_string(), options)]
    );
}

#[tokio::test]
async fn unknown_service_goes_to_the_hook_and_the_real_fetch() {
    let (stub, handle, metrics) = setup(200);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hook_calls = Arc::new(AtomicUsize::new(0));

    let options = {
        let seen = seen.clone();
        let hook_calls = hook_calls.clone();
        InstrumentOptions::default().on_unclassified(move |target, options| {
            hook_calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push((target.to_owned(), options.clone()));
        })
    };
    metrics.instrument(options).unwrap();

    let put = FetchOptions::method("PUT");
    handle.fetch("https://www.ft.com", &put).await.unwrap();

    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![("https://www.ft.com".to_string(), put.clone())]);
    assert_eq!(*stub.calls.lock().unwrap(), vec![("https://www.ft.com".to_string(), put)]);
    assert!(metrics.reporter().is_empty());
}

#[tokio::test]
async fn report_contains_counts_and_response_times() {
    let (_stub, handle, metrics) = setup(200);
    metrics.instrument(InstrumentOptions::default()).unwrap();

    handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();

    let report = metrics.reporter();
    assert_eq!(report["fetch.blogs.count"], 1.0);
    assert_eq!(report["fetch.blogs.response.status_200.count"], 1.0);
    assert_eq!(report["fetch.blogs.response.status_2xx.count"], 1.0);
    for status in ["200", "2xx"] {
        for grouping in ["mean", "min", "max", "median", "95th", "99th"] {
            let key = format!("fetch.blogs.response.status_{status}.response_time.{grouping}");
            assert!(report.contains_key(&key), "{key} doesn't exist");
        }
    }
}

#[tokio::test]
async fn counts_multiple_requests() {
    let (_stub, handle, metrics) = setup(200);
    metrics.instrument(InstrumentOptions::default()).unwrap();

    handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();
    handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();

    let report = metrics.reporter();
    assert_eq!(report["fetch.blogs.count"], 2.0);
    assert_eq!(report["fetch.blogs.response.status_200.count"], 2.0);
    assert_eq!(report["fetch.blogs.response.status_2xx.count"], 2.0);
}

#[tokio::test]
async fn non_2xx_responses_get_their_own_buckets() {
    let (stub, handle, metrics) = setup(404);
    metrics.instrument(InstrumentOptions::default()).unwrap();

    handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();
    stub.respond_with(500);
    handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();

    let report = metrics.reporter();
    assert_eq!(report["fetch.blogs.count"], 2.0);
    assert_eq!(report["fetch.blogs.response.status_404.count"], 1.0);
    assert_eq!(report["fetch.blogs.response.status_4xx.count"], 1.0);
    assert_eq!(report["fetch.blogs.response.status_500.count"], 1.0);
    assert_eq!(report["fetch.blogs.response.status_5xx.count"], 1.0);
    assert!(!report.contains_key("fetch.blogs.response.status_2xx.count"));
}

#[tokio::test]
async fn report_is_cleared_after_reading() {
    let (stub, handle, metrics) = setup(404);
    metrics.instrument(InstrumentOptions::default()).unwrap();

    handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();
    metrics.reporter();

    stub.respond_with(500);
    handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();

    let report = metrics.reporter();
    assert_eq!(report["fetch.blogs.count"], 1.0);
    assert_eq!(report["fetch.blogs.response.status_500.count"], 1.0);
    assert_eq!(report["fetch.blogs.response.status_5xx.count"], 1.0);
    assert!(!report.contains_key("fetch.blogs.response.status_404.count"));
}

#[tokio::test]
async fn instrumenting_twice_does_not_double_count() {
    let (stub, handle, metrics) = setup(200);
    metrics.instrument(InstrumentOptions::default()).unwrap();
    metrics.instrument(InstrumentOptions::default()).unwrap();

    handle.fetch("https://blogs.ft.com", &FetchOptions::default()).await.unwrap();

    assert_eq!(stub.calls.lock().unwrap().len(), 1);
    assert_eq!(metrics.reporter()["fetch.blogs.count"], 1.0);
}

#[test]
fn manual_records_share_the_report() {
    let (_stub, _handle, metrics) = setup(200);
    for duration in [10.0, 20.0, 30.0, 40.0, 50.0] {
        metrics.record("search", Some(200), duration);
    }
    metrics.record("search", None, 5.0);

    let report = metrics.reporter();
    let base = "fetch.search.response.status_200.response_time";
    assert_eq!(report[&format!("{base}.mean")], 30.0);
    assert_eq!(report[&format!("{base}.min")], 10.0);
    assert_eq!(report[&format!("{base}.max")], 50.0);
    assert_eq!(report[&format!("{base}.median")], 30.0);
    assert_eq!(report[&format!("{base}.95th")], 50.0);
    assert_eq!(report[&format!("{base}.99th")], 50.0);
    assert_eq!(report["fetch.search.count"], 6.0);
    assert_eq!(report["fetch.search.response.status_error.count"], 1.0);
}
