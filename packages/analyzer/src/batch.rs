//! Parallel analysis of an address list.
//!
//! In [`ExecutionMode::Pooled`] mode, up to `max_workers` analyzers are
//! built up front and each is owned by one worker task. Workers pull
//! addresses from a shared queue and run every address in its own spawned
//! task under `task_timeout`, so a panic or hang only loses that address.
//! [`ExecutionMode::Sequential`] runs a single analyzer over the list in
//! input order.
//!
//! Results are collected in completion order. Successful results form the
//! [`ResultTable`]; error results and dropped addresses are kept aside in
//! [`CountyResults`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use hoa_detect_config::BatchConfig;
use hoa_detect_parcel_models::{AnalysisResult, ResultRow, ResultTable};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::progress::ProgressCallback;
use crate::{Analyzer, SystemError};

/// Default worker pool width.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default per-address timeout.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(120);

/// How addresses are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Worker pool with one task per address.
    #[default]
    Pooled,
    /// One analyzer, input order.
    Sequential,
}

/// Batch scheduling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub max_workers: usize,
    pub task_timeout: Duration,
    pub mode: ExecutionMode,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            mode: ExecutionMode::default(),
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub const fn from_config(config: &BatchConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            task_timeout: Duration::from_secs(config.task_timeout_secs),
            mode: if config.sequential {
                ExecutionMode::Sequential
            } else {
                ExecutionMode::Pooled
            },
        }
    }
}

/// Everything a county run produced.
#[derive(Debug, Clone, Default)]
pub struct CountyResults {
    /// One row per successfully analyzed address.
    pub table: ResultTable,
    /// Results that carry an error, such as a geocoding failure.
    pub failed: Vec<AnalysisResult>,
    /// Addresses whose analysis panicked or timed out.
    pub dropped: Vec<String>,
}

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// An analyzer could not be built for a worker.
    #[error("Failed to construct analyzer: {0}")]
    Construction(#[from] SystemError),
}

enum Outcome {
    Completed(AnalysisResult),
    Dropped(String),
}

#[derive(Default)]
struct Collector {
    rows: Vec<ResultRow>,
    failed: Vec<AnalysisResult>,
    dropped: Vec<String>,
}

impl Collector {
    fn push(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed(result) => {
                if let Some(row) = result.to_row() {
                    self.rows.push(row);
                } else {
                    log::warn!(
                        "Excluding '{}': {}",
                        result.address,
                        result.error.as_deref().unwrap_or("incomplete result")
                    );
                    self.failed.push(result);
                }
            }
            Outcome::Dropped(address) => self.dropped.push(address),
        }
    }

    fn finish(self) -> CountyResults {
        log::info!(
            "Batch complete: {} scored, {} failed, {} dropped",
            self.rows.len(),
            self.failed.len(),
            self.dropped.len()
        );
        CountyResults {
            table: ResultTable::new(self.rows),
            failed: self.failed,
            dropped: self.dropped,
        }
    }
}

/// Analyzes every address in `addresses`.
///
/// `build` is called once per worker (once in sequential mode) to create
/// an independent [`Analyzer`]. An empty list returns immediately without
/// calling it.
///
/// # Errors
///
/// Returns [`BatchError::Construction`] if `build` fails. Per-address
/// failures never fail the batch.
pub async fn process_county<F>(
    addresses: &[String],
    options: &BatchOptions,
    build: F,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<CountyResults, BatchError>
where
    F: Fn() -> Result<Analyzer, SystemError>,
{
    if addresses.is_empty() {
        log::info!("No addresses to process");
        return Ok(CountyResults::default());
    }

    if let Some(p) = progress {
        p.set_total(addresses.len() as u64);
    }

    let collector = match options.mode {
        ExecutionMode::Sequential => {
            run_sequential(addresses, options.task_timeout, build()?, progress).await
        }
        ExecutionMode::Pooled => run_pooled(addresses, options, &build, progress).await?,
    };

    if let Some(p) = progress {
        p.finish(format!(
            "{} of {} addresses scored",
            collector.rows.len(),
            addresses.len()
        ));
    }

    Ok(collector.finish())
}

async fn run_sequential(
    addresses: &[String],
    task_timeout: Duration,
    analyzer: Analyzer,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Collector {
    log::info!("Processing {} addresses sequentially", addresses.len());

    let analyzer = Arc::new(analyzer);
    let mut collector = Collector::default();
    for address in addresses {
        let outcome =
            analyze_isolated(Arc::clone(&analyzer), address.clone(), task_timeout).await;
        collector.push(outcome);
        if let Some(p) = progress {
            p.inc(1);
        }
    }
    collector
}

async fn run_pooled<F>(
    addresses: &[String],
    options: &BatchOptions,
    build: &F,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<Collector, BatchError>
where
    F: Fn() -> Result<Analyzer, SystemError>,
{
    let worker_count = options.max_workers.clamp(1, addresses.len());
    log::info!(
        "Processing {} addresses with {worker_count} workers",
        addresses.len()
    );

    let analyzers = (0..worker_count)
        .map(|_| build().map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;

    let queue = Arc::new(Mutex::new(
        addresses.iter().cloned().collect::<VecDeque<_>>(),
    ));

    let mut workers = JoinSet::new();
    for (worker_id, analyzer) in analyzers.into_iter().enumerate() {
        let queue = Arc::clone(&queue);
        let progress = progress.cloned();
        let task_timeout = options.task_timeout;

        workers.spawn(async move {
            let mut outcomes = Vec::new();
            loop {
                let next = queue.lock().await.pop_front();
                let Some(address) = next else {
                    break;
                };
                let outcome =
                    analyze_isolated(Arc::clone(&analyzer), address, task_timeout).await;
                outcomes.push(outcome);
                if let Some(p) = &progress {
                    p.inc(1);
                }
            }
            log::debug!(
                "Worker {worker_id} drained queue after {} addresses",
                outcomes.len()
            );
            outcomes
        });
    }

    let mut collector = Collector::default();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(outcomes) => outcomes.into_iter().for_each(|o| collector.push(o)),
            Err(e) => log::error!("Worker task failed: {e}"),
        }
    }
    Ok(collector)
}

/// Runs one address in its own task so a panic or hang is contained.
async fn analyze_isolated(
    analyzer: Arc<Analyzer>,
    address: String,
    task_timeout: Duration,
) -> Outcome {
    let task_address = address.clone();
    let mut handle = tokio::spawn(async move { analyzer.analyze_address(&task_address).await });

    match tokio::time::timeout(task_timeout, &mut handle).await {
        Ok(Ok(result)) => Outcome::Completed(result),
        Ok(Err(e)) if e.is_panic() => {
            log::error!("Analysis of '{address}' panicked; dropping it");
            Outcome::Dropped(address)
        }
        Ok(Err(e)) => {
            log::error!("Analysis of '{address}' was cancelled: {e}");
            Outcome::Dropped(address)
        }
        Err(_) => {
            handle.abort();
            log::error!(
                "Analysis of '{address}' timed out after {}s; dropping it",
                task_timeout.as_secs_f64()
            );
            Outcome::Dropped(address)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use hoa_detect_classifier::fixed::FixedClassifier;
    use hoa_detect_gateway::fixture::FixtureGateway;
    use hoa_detect_geocoder::fixture::FixtureGeocoder;
    use hoa_detect_geocoder::{GeocodeError, GeocodedAddress, Geocoder, GeocodingProvider};
    use hoa_detect_parcel_models::Coordinates;

    use super::*;

    /// Resolves everything, except that addresses containing `PANIC` panic
    /// and addresses containing `HANG` never return.
    struct TroubleGeocoder;

    #[async_trait]
    impl Geocoder for TroubleGeocoder {
        async fn lookup(&self, address: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
            assert!(!address.contains("PANIC"), "geocoder blew up on {address}");
            if address.contains("HANG") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(Some(GeocodedAddress {
                coordinates: Coordinates::new(0.5, 0.5),
                matched_address: None,
                provider: GeocodingProvider::Fixture,
            }))
        }
    }

    fn analyzer_with(geocoder: Arc<dyn Geocoder>) -> Analyzer {
        Analyzer::new(
            geocoder,
            Arc::new(FixtureGateway::new().unwrap()),
            Arc::new(FixedClassifier::fixture()),
            100.0,
        )
    }

    fn addresses(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn options(mode: ExecutionMode) -> BatchOptions {
        BatchOptions {
            max_workers: 4,
            task_timeout: Duration::from_millis(500),
            mode,
        }
    }

    #[tokio::test]
    async fn empty_input_builds_nothing() {
        let built = AtomicUsize::new(0);
        let results = process_county(
            &[],
            &BatchOptions::default(),
            || {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(analyzer_with(Arc::new(TroubleGeocoder)))
            },
            None,
        )
        .await
        .unwrap();

        assert!(results.table.is_empty());
        assert!(results.table.columns().is_empty());
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_address_yields_one_row() {
        let results = process_county(
            &addresses(&["123 Main St"]),
            &options(ExecutionMode::Pooled),
            || Ok(analyzer_with(Arc::new(TroubleGeocoder))),
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.table.len(), 1);
        let row = results.table.row_for("123 Main St").unwrap();
        assert!((row.hoa_probability - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn worker_count_is_clamped_to_input() {
        let built = AtomicUsize::new(0);
        process_county(
            &addresses(&["1 A St", "2 B St"]),
            &options(ExecutionMode::Pooled),
            || {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(analyzer_with(Arc::new(TroubleGeocoder)))
            },
            None,
        )
        .await
        .unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_address_is_isolated() {
        let results = process_county(
            &addresses(&["1 A St", "2 PANIC Rd", "3 C St"]),
            &options(ExecutionMode::Pooled),
            || Ok(analyzer_with(Arc::new(TroubleGeocoder))),
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.table.len(), 2);
        assert!(results.table.row_for("2 PANIC Rd").is_none());
        assert_eq!(results.dropped, vec!["2 PANIC Rd".to_string()]);
    }

    #[tokio::test]
    async fn hung_address_times_out() {
        let results = process_county(
            &addresses(&["1 HANG Ln", "2 B St"]),
            &options(ExecutionMode::Pooled),
            || Ok(analyzer_with(Arc::new(TroubleGeocoder))),
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.table.len(), 1);
        assert!(results.table.row_for("2 B St").is_some());
        assert_eq!(results.dropped, vec!["1 HANG Ln".to_string()]);
    }

    #[tokio::test]
    async fn sequential_mode_preserves_order() {
        let input = addresses(&["3 C St", "1 A St", "2 B St"]);
        let results = process_county(
            &input,
            &options(ExecutionMode::Sequential),
            || Ok(analyzer_with(Arc::new(TroubleGeocoder))),
            None,
        )
        .await
        .unwrap();

        let order: Vec<&str> = results
            .table
            .rows
            .iter()
            .map(|r| r.address.as_str())
            .collect();
        assert_eq!(order, vec!["3 C St", "1 A St", "2 B St"]);
    }

    #[tokio::test]
    async fn geocoding_failures_are_excluded_from_table() {
        let geocoder = FixtureGeocoder::new().with_entry("1 Good St", Coordinates::new(0.5, 0.5));
        let geocoder: Arc<dyn Geocoder> = Arc::new(geocoder);
        let results = process_county(
            &addresses(&["1 Good St", "2 Unknown St"]),
            &options(ExecutionMode::Pooled),
            || Ok(analyzer_with(Arc::clone(&geocoder))),
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.table.len(), 1);
        assert_eq!(results.failed.len(), 1);
        assert_eq!(results.failed[0].address, "2 Unknown St");
        assert_eq!(
            results.failed[0].error.as_deref(),
            Some(crate::GEOCODING_FAILED)
        );
    }

    #[tokio::test]
    async fn construction_failure_aborts_batch() {
        let err = process_county(
            &addresses(&["1 A St"]),
            &options(ExecutionMode::Pooled),
            || {
                Err(SystemError::Geocoder(GeocodeError::MissingCredential {
                    provider: "Google",
                }))
            },
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BatchError::Construction(_)));
    }
}
