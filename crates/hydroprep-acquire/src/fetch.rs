//! Fetching tiles with retry.
//!
//! Each tile becomes one request against a [`TileSource`]. A request may be
//! attempted several times in a row; whatever still fails after the main
//! pass gets one more serial pass. Individual failures are values, not
//! errors: the run only aborts when nothing at all was retrieved.

use crate::tiler::Tile;
use crate::{AcquireError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Something that can turn a tile into data.
pub trait TileSource: Sync {
    /// Retrieved dataset type.
    type Output: Send;

    /// The request identifier for a tile (normally its URL).
    fn describe(&self, tile: &Tile) -> String;

    /// Perform one request.
    fn fetch(&self, tile: &Tile) -> Result<Self::Output>;
}

/// How hard to try each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Consecutive attempts per request within one pass.
    pub attempts_per_request: usize,
    /// Make a second, serial pass over requests that failed.
    pub retry_pass: bool,
}

impl RetryPolicy {
    /// Feature-service requests: three attempts, then a retry pass.
    pub const SOILS: RetryPolicy = RetryPolicy {
        attempts_per_request: 3,
        retry_pass: true,
    };

    /// Coverage requests: one attempt per pass, then a retry pass.
    pub const LANDCOVER: RetryPolicy = RetryPolicy {
        attempts_per_request: 1,
        retry_pass: true,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::SOILS
    }
}

/// How the main pass is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Across a dedicated pool of `workers` threads.
    Parallel {
        /// Pool size.
        workers: usize,
    },
    /// One request at a time on the calling thread.
    Serial,
}

/// A request that did not produce data.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    /// The tile that was requested.
    pub tile: Tile,
    /// The request identifier.
    pub request: String,
    /// The last error seen.
    pub reason: String,
}

/// Outcome of one request.
#[derive(Debug)]
pub enum FetchResult<T> {
    /// Data came back.
    Retrieved {
        /// The requested tile.
        tile: Tile,
        /// The dataset.
        data: T,
    },
    /// Every attempt failed.
    Failed(FetchFailure),
}

impl<T> FetchResult<T> {
    /// Whether data came back.
    pub fn is_retrieved(&self) -> bool {
        matches!(self, FetchResult::Retrieved { .. })
    }
}

/// Combined outcome of all passes.
#[derive(Debug)]
pub struct FetchReport<T> {
    /// Retrieved datasets in tile enumeration order.
    pub retrieved: Vec<(Tile, T)>,
    /// Requests that failed permanently.
    pub failed: Vec<FetchFailure>,
}

impl<T> FetchReport<T> {
    /// Identifiers of the permanently failed requests.
    pub fn failed_requests(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.request.as_str()).collect()
    }

    /// Drop tile information, keeping the datasets in order.
    pub fn into_data(self) -> Vec<T> {
        self.retrieved.into_iter().map(|(_, data)| data).collect()
    }
}

/// Size a worker pool as `fraction` of the available parallelism, at least one.
pub fn worker_count(fraction: f64) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    ((available as f64 * fraction).floor() as usize).max(1)
}

/// Request one tile, trying up to `attempts` times.
pub fn fetch_one<S: TileSource + ?Sized>(
    source: &S,
    tile: &Tile,
    attempts: usize,
) -> FetchResult<S::Output> {
    let request = source.describe(tile);
    let attempts = attempts.max(1);
    let mut reason = String::new();

    for attempt in 1..=attempts {
        match source.fetch(tile) {
            Ok(data) => {
                debug!("Retrieved {} (attempt {})", request, attempt);
                return FetchResult::Retrieved { tile: *tile, data };
            }
            Err(e) => {
                debug!("Attempt {}/{} failed for {}: {}", attempt, attempts, request, e);
                reason = e.to_string();
            }
        }
    }

    FetchResult::Failed(FetchFailure {
        tile: *tile,
        request,
        reason,
    })
}

/// Request all tiles across a pool of `workers` threads.
///
/// Results are returned in input order once every worker has finished.
pub fn fetch_parallel<S: TileSource + ?Sized>(
    source: &S,
    tiles: &[Tile],
    attempts: usize,
    workers: usize,
) -> Result<Vec<FetchResult<S::Output>>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("fetch-{}", i))
        .build()?;
    info!(
        "Fetching {} tile(s) using {} worker(s)",
        tiles.len(),
        pool.current_num_threads()
    );
    Ok(pool.install(|| {
        tiles
            .par_iter()
            .map(|tile| fetch_one(source, tile, attempts))
            .collect()
    }))
}

/// Request all tiles one after another.
pub fn fetch_serial<S: TileSource + ?Sized>(
    source: &S,
    tiles: &[Tile],
    attempts: usize,
) -> Vec<FetchResult<S::Output>> {
    info!("Fetching {} tile(s) serially", tiles.len());
    tiles
        .iter()
        .map(|tile| fetch_one(source, tile, attempts))
        .collect()
}

/// Serially re-request previously failed tiles.
pub fn retry_failed<S: TileSource + ?Sized>(
    source: &S,
    failures: &[FetchFailure],
    attempts: usize,
) -> Vec<FetchResult<S::Output>> {
    info!("Retrying {} failed request(s)", failures.len());
    failures
        .iter()
        .map(|failure| fetch_one(source, &failure.tile, attempts))
        .collect()
}

fn partition<T>(results: Vec<FetchResult<T>>) -> (Vec<(Tile, T)>, Vec<FetchFailure>) {
    let mut retrieved = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            FetchResult::Retrieved { tile, data } => retrieved.push((tile, data)),
            FetchResult::Failed(failure) => failed.push(failure),
        }
    }
    (retrieved, failed)
}

/// Run the main pass, then the retry pass, and collect the outcome.
///
/// Fails with [`AcquireError::NoDataRetrieved`] only when no tile at all
/// produced data. Permanent failures of some tiles are logged as warnings
/// and returned in the report.
pub fn acquire<S: TileSource + ?Sized>(
    source: &S,
    tiles: &[Tile],
    policy: &RetryPolicy,
    schedule: Schedule,
) -> Result<FetchReport<S::Output>> {
    let first = match schedule {
        Schedule::Parallel { workers } => {
            fetch_parallel(source, tiles, policy.attempts_per_request, workers)?
        }
        Schedule::Serial => fetch_serial(source, tiles, policy.attempts_per_request),
    };
    let (mut retrieved, mut failed) = partition(first);

    if policy.retry_pass && !failed.is_empty() {
        let second = retry_failed(source, &failed, policy.attempts_per_request);
        let (recovered, still_failed) = partition(second);
        info!(
            "Retry pass recovered {} of {} request(s)",
            recovered.len(),
            failed.len()
        );
        retrieved.extend(recovered);
        failed = still_failed;
    }
    retrieved.sort_by_key(|(tile, _)| tile.index);

    if retrieved.is_empty() {
        error!("No data retrieved from {} request(s)", tiles.len());
        return Err(AcquireError::NoDataRetrieved {
            requested: tiles.len(),
        });
    }

    for failure in &failed {
        warn!("Failed to retrieve {}: {}", failure.request, failure.reason);
    }
    info!(
        "Retrieved {} of {} tile(s)",
        retrieved.len(),
        tiles.len()
    );
    Ok(FetchReport { retrieved, failed })
}
