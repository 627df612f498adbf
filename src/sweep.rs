//! # Parameter Sweep Module
//!
//! Applies ordered grids of Otsu thresholds and Sauvola parameter sets to one
//! source buffer and labels every output. Results always come back in grid
//! order: Otsu entries first, then Sauvola entries, each as listed.
//!
//! Two runners share the same planning and per-entry code:
//! - [`ParameterSweepRunner::run`]: sequential reference implementation
//! - [`ParameterSweepRunner::run_parallel`]: worker pool on Tokio's blocking
//!   threads, sharing one read-only [`IntegralStatistics`]

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::binarization::{
    compute_otsu_threshold, otsu_threshold, sauvola_threshold_with_stats, BinarizationError,
    IntegralStatistics, PixelBuffer, SauvolaParams, ThresholdParameters, DEFAULT_DYNAMIC_RANGE,
};
use crate::errors::{AppError, AppResult};
use crate::observability;

/// Otsu thresholds swept when no grid file is configured
pub const DEFAULT_OTSU_THRESHOLDS: [u8; 6] = [30, 60, 90, 120, 150, 180];
/// Sauvola windows swept when no grid file is configured
pub const DEFAULT_SAUVOLA_WINDOWS: [usize; 5] = [11, 15, 21, 25, 33];
/// Sauvola k paired with every default window
pub const DEFAULT_SAUVOLA_K: f64 = 0.4;

/// Requested parameter grids, one list per category.
///
/// An empty list skips its category entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Explicit global thresholds, in sweep order
    pub otsu_thresholds: Vec<u8>,
    /// Sauvola window/k pairs, in sweep order
    pub sauvola_params: Vec<SauvolaParams>,
    /// Prepend one Otsu entry whose threshold comes from the histogram search
    pub computed_otsu: bool,
    /// Sauvola dynamic range R
    pub dynamic_range: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            otsu_thresholds: DEFAULT_OTSU_THRESHOLDS.to_vec(),
            sauvola_params: DEFAULT_SAUVOLA_WINDOWS
                .iter()
                .map(|&window_size| SauvolaParams::new(window_size, DEFAULT_SAUVOLA_K))
                .collect(),
            computed_otsu: true,
            dynamic_range: DEFAULT_DYNAMIC_RANGE,
        }
    }
}

impl SweepConfig {
    /// Grid with exactly the given entries and nothing computed.
    pub fn new(otsu_thresholds: Vec<u8>, sauvola_params: Vec<SauvolaParams>) -> Self {
        Self {
            otsu_thresholds,
            sauvola_params,
            computed_otsu: false,
            dynamic_range: DEFAULT_DYNAMIC_RANGE,
        }
    }

    /// Number of results a successful sweep produces.
    pub fn entry_count(&self) -> usize {
        self.computed_otsu as usize + self.otsu_thresholds.len() + self.sauvola_params.len()
    }

    /// Image-independent checks; window-vs-image limits are checked per sweep.
    pub fn validate(&self) -> AppResult<()> {
        if self.entry_count() == 0 {
            return Err(AppError::Config(
                "Sweep configuration requests no Otsu or Sauvola entries".to_string(),
            ));
        }

        if !self.dynamic_range.is_finite() || self.dynamic_range <= 0.0 {
            return Err(AppError::Config(format!(
                "Dynamic range must be a finite number greater than 0, got {}",
                self.dynamic_range
            )));
        }

        for params in &self.sauvola_params {
            if params.window_size < 3 || params.window_size % 2 == 0 {
                return Err(AppError::Config(format!(
                    "Sauvola window size {} is invalid. Must be odd and at least 3",
                    params.window_size
                )));
            }
            if !params.k.is_finite() {
                return Err(AppError::Config(format!(
                    "Sauvola k {} for window {} must be a finite number",
                    params.k, params.window_size
                )));
            }
        }

        Ok(())
    }
}

/// One labeled output of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepEntry {
    pub parameters: ThresholdParameters,
    pub output: PixelBuffer,
    pub label: String,
}

/// Ordered sweep outputs; order equals grid iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepResult {
    entries: Vec<SweepEntry>,
}

impl SweepResult {
    pub fn entries(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<SweepEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SweepEntry> {
        self.entries.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.label.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a SweepResult {
    type Item = &'a SweepEntry;
    type IntoIter = std::slice::Iter<'a, SweepEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Called with the grid index and label of every finished entry.
///
/// The parallel runner calls it from worker threads, so completion order is
/// not grid order there.
pub type ProgressCallback = Arc<dyn Fn(usize, &str) + Send + Sync>;

/// Runs one [`SweepConfig`] against source buffers.
#[derive(Clone)]
pub struct ParameterSweepRunner {
    config: SweepConfig,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for ParameterSweepRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterSweepRunner")
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl ParameterSweepRunner {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Reports every finished entry to `progress`.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Sequential sweep.
    pub fn run(&self, buffer: &PixelBuffer) -> Result<SweepResult, BinarizationError> {
        self.run_with_cancellation(buffer, &CancellationToken::new())
    }

    /// Sequential sweep that checks `cancel` between combinations.
    pub fn run_with_cancellation(
        &self,
        buffer: &PixelBuffer,
        cancel: &CancellationToken,
    ) -> Result<SweepResult, BinarizationError> {
        let span = observability::sweep_span("sequential", self.config.entry_count());
        let _enter = span.enter();
        let start_time = Instant::now();

        let plan = plan_sweep(buffer, &self.config)?;
        let stats = build_shared_statistics(buffer, &plan)?;

        let mut entries = Vec::with_capacity(plan.len());
        for (index, parameters) in plan.into_iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(completed = index, "Sweep cancelled");
                return Err(BinarizationError::Cancelled { completed: index });
            }

            let output = run_entry(buffer, stats.as_ref(), parameters, self.config.dynamic_range)
                .map_err(|source| entry_error(index, &parameters, source))?;

            let label = parameters.label();
            debug!(index, label = %label, "Sweep entry completed");
            if let Some(progress) = &self.progress {
                progress(index, &label);
            }
            entries.push(SweepEntry {
                parameters,
                output,
                label,
            });
        }

        finish(entries, start_time, "sequential")
    }

    /// Parallel sweep over at most `max_workers` blocking worker threads.
    ///
    /// Output is identical to [`run`](Self::run), including order. Cancellation
    /// is observed before each combination starts; a cancelled sweep returns
    /// [`BinarizationError::Cancelled`] and no partial result.
    pub async fn run_parallel(
        &self,
        buffer: Arc<PixelBuffer>,
        max_workers: usize,
        cancel: CancellationToken,
    ) -> Result<SweepResult, BinarizationError> {
        let span = observability::sweep_span("parallel", self.config.entry_count());
        self.run_parallel_inner(buffer, max_workers, cancel)
            .instrument(span)
            .await
    }

    async fn run_parallel_inner(
        &self,
        buffer: Arc<PixelBuffer>,
        max_workers: usize,
        cancel: CancellationToken,
    ) -> Result<SweepResult, BinarizationError> {
        let start_time = Instant::now();

        let plan = plan_sweep(&buffer, &self.config)?;
        let stats = build_shared_statistics(&buffer, &plan)?.map(Arc::new);
        let dynamic_range = self.config.dynamic_range;

        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut tasks: JoinSet<(usize, Option<Result<PixelBuffer, BinarizationError>>)> =
            JoinSet::new();

        for (index, parameters) in plan.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|e| BinarizationError::WorkerFailed { message: e.to_string() })?
                }
            };

            let buffer = Arc::clone(&buffer);
            let stats = stats.clone();
            let cancel = cancel.clone();
            let progress = self.progress.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                if cancel.is_cancelled() {
                    return (index, None);
                }
                let result = run_entry(&buffer, stats.as_deref(), parameters, dynamic_range);
                if let (Ok(_), Some(progress)) = (&result, &progress) {
                    progress(index, &parameters.label());
                }
                (index, Some(result))
            });
        }

        let mut outputs: Vec<Option<PixelBuffer>> = vec![None; plan.len()];
        let mut first_error: Option<(usize, BinarizationError)> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(Ok(output)))) => outputs[index] = Some(output),
                Ok((_, None)) => {}
                Ok((index, Some(Err(source)))) => {
                    if first_error.as_ref().is_none_or(|(first, _)| index < *first) {
                        first_error = Some((index, source));
                    }
                }
                Err(join_error) => {
                    return Err(BinarizationError::WorkerFailed {
                        message: join_error.to_string(),
                    });
                }
            }
        }

        if let Some((index, source)) = first_error {
            return Err(entry_error(index, &plan[index], source));
        }

        let completed = outputs.iter().filter(|output| output.is_some()).count();
        if completed < plan.len() {
            warn!(completed, requested = plan.len(), "Sweep cancelled");
            return Err(BinarizationError::Cancelled { completed });
        }

        let entries = plan
            .into_iter()
            .zip(outputs.into_iter().flatten())
            .map(|(parameters, output)| SweepEntry {
                parameters,
                output,
                label: parameters.label(),
            })
            .collect();

        finish(entries, start_time, "parallel")
    }
}

/// Sequential sweep over explicit grids.
///
/// # Examples
///
/// ```
/// use doc_binarize::binarization::{PixelBuffer, SauvolaParams};
/// use doc_binarize::sweep::run_sweep;
///
/// let buffer = PixelBuffer::from_fn(16, 16, |r, c| ((r + c) * 8) as u8);
/// let result = run_sweep(&buffer, &[60, 120], &[SauvolaParams::new(5, 0.4)]).unwrap();
/// assert_eq!(
///     result.labels(),
///     vec!["Otsu threshold=60", "Otsu threshold=120", "Sauvola window=5 k=0.40"]
/// );
/// ```
pub fn run_sweep(
    buffer: &PixelBuffer,
    otsu_thresholds: &[u8],
    sauvola_params: &[SauvolaParams],
) -> Result<SweepResult, BinarizationError> {
    ParameterSweepRunner::new(SweepConfig::new(
        otsu_thresholds.to_vec(),
        sauvola_params.to_vec(),
    ))
    .run(buffer)
}

/// Parallel sweep over an explicit [`SweepConfig`].
pub async fn run_sweep_parallel(
    buffer: Arc<PixelBuffer>,
    config: SweepConfig,
    max_workers: usize,
    cancel: CancellationToken,
) -> Result<SweepResult, BinarizationError> {
    ParameterSweepRunner::new(config)
        .run_parallel(buffer, max_workers, cancel)
        .await
}

/// Validates every entry, then resolves the computed Otsu threshold if requested.
fn plan_sweep(
    buffer: &PixelBuffer,
    config: &SweepConfig,
) -> Result<Vec<ThresholdParameters>, BinarizationError> {
    buffer.ensure_not_empty()?;
    if !config.dynamic_range.is_finite() || config.dynamic_range <= 0.0 {
        return Err(BinarizationError::InvalidDynamicRange {
            dynamic_range: config.dynamic_range,
        });
    }

    let explicit: Vec<ThresholdParameters> = config
        .otsu_thresholds
        .iter()
        .map(|&threshold| ThresholdParameters::Otsu { threshold })
        .chain(config.sauvola_params.iter().copied().map(Into::into))
        .collect();

    let offset = config.computed_otsu as usize;
    for (position, parameters) in explicit.iter().enumerate() {
        parameters
            .validate_for(buffer)
            .map_err(|source| entry_error(offset + position, parameters, source))?;
    }

    let mut plan = Vec::with_capacity(offset + explicit.len());
    if config.computed_otsu {
        let threshold = compute_otsu_threshold(buffer)?;
        info!(threshold, "Computed Otsu threshold for sweep");
        plan.push(ThresholdParameters::Otsu { threshold });
    }
    plan.extend(explicit);
    Ok(plan)
}

/// Statistics are only needed when the plan has at least one Sauvola entry.
fn build_shared_statistics(
    buffer: &PixelBuffer,
    plan: &[ThresholdParameters],
) -> Result<Option<IntegralStatistics>, BinarizationError> {
    let needs_stats = plan
        .iter()
        .any(|parameters| matches!(parameters, ThresholdParameters::Sauvola { .. }));
    if needs_stats {
        IntegralStatistics::build(buffer).map(Some)
    } else {
        Ok(None)
    }
}

fn run_entry(
    buffer: &PixelBuffer,
    stats: Option<&IntegralStatistics>,
    parameters: ThresholdParameters,
    dynamic_range: f64,
) -> Result<PixelBuffer, BinarizationError> {
    match parameters {
        ThresholdParameters::Otsu { threshold } => {
            otsu_threshold(buffer, Some(threshold)).map(|outcome| outcome.image)
        }
        ThresholdParameters::Sauvola { window_size, k } => match stats {
            Some(stats) => sauvola_threshold_with_stats(buffer, stats, window_size, k, dynamic_range),
            None => {
                let stats = IntegralStatistics::build(buffer)?;
                sauvola_threshold_with_stats(buffer, &stats, window_size, k, dynamic_range)
            }
        },
    }
}

fn entry_error(
    index: usize,
    parameters: &ThresholdParameters,
    source: BinarizationError,
) -> BinarizationError {
    BinarizationError::SweepEntry {
        index,
        label: parameters.label(),
        source: Box::new(source),
    }
}

fn finish(
    entries: Vec<SweepEntry>,
    start_time: Instant,
    mode: &str,
) -> Result<SweepResult, BinarizationError> {
    let duration = start_time.elapsed();
    info!(
        mode,
        entries = entries.len(),
        duration_ms = duration.as_millis() as u64,
        "Sweep completed"
    );
    observability::record_sweep_metrics(mode, entries.len(), duration);
    Ok(SweepResult { entries })
}
