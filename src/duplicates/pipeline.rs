use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::cluster::{self, DEFAULT_THRESHOLD};
use super::decision::DecisionSet;
use super::fingerprint::{ImageRecord, HASH_BITS};
use super::scorer::{self, QualityWeights, RankedGroup};
use super::source::{ImageSource, SourceImage};
use crate::common::config::Config;
use crate::common::errors::{PhotoError, Result};

/// Shared abort switch. Raising it stops the pipeline at the next image;
/// a cancelled run returns [`PhotoError::Cancelled`] and no groups.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PhotoError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Settings for one engine run
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Max Hamming distance for two images to be linked
    pub threshold: u32,
    /// Longest side images are shrunk to before hashing (0 = never)
    pub max_decode_dimension: u32,
    /// Fingerprint worker count (0 = one per core)
    pub workers: usize,
    pub weights: QualityWeights,
    /// Show progress bars
    pub show_progress: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_decode_dimension: crate::common::config::DEFAULT_MAX_DECODE_DIMENSION,
            workers: 0,
            weights: QualityWeights::default(),
            show_progress: false,
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            threshold: config.threshold,
            max_decode_dimension: config.max_decode_dimension,
            workers: config.workers,
            weights: config.weights,
            show_progress: false,
        }
    }
}

/// Fingerprints that succeeded plus the images that were skipped
#[derive(Debug, Default)]
pub struct FingerprintBatch {
    pub records: Vec<ImageRecord>,
    pub failures: Vec<(String, PhotoError)>,
}

/// Complete results from one engine run
#[derive(Debug)]
pub struct ScanReport {
    /// Images handed to the engine
    pub images_seen: usize,
    /// Images fingerprinted successfully
    pub records_scanned: usize,
    /// Images skipped as unreadable or unsupported
    pub failures: Vec<(String, PhotoError)>,
    /// Groups with scores; engine-internal, not part of the decision file
    pub groups: Vec<RankedGroup>,
    pub decisions: DecisionSet,
    pub threshold: u32,
    /// Scan duration in seconds
    pub duration_secs: f64,
}

impl ScanReport {
    fn empty(threshold: u32, images_seen: usize, started: Instant) -> Self {
        Self {
            images_seen,
            records_scanned: 0,
            failures: Vec::new(),
            groups: Vec::new(),
            decisions: DecisionSet::default(),
            threshold,
            duration_secs: started.elapsed().as_secs_f64(),
        }
    }

    pub fn total_reclaimable(&self) -> u64 {
        self.groups
            .iter()
            .fold(0u64, |acc, g| acc.saturating_add(g.reclaimable_bytes()))
    }

    pub fn total_discards(&self) -> usize {
        self.groups.iter().map(|g| g.discard.len()).sum()
    }
}

/// The duplicate detection pipeline:
/// fingerprint (parallel) → cluster → rank → assemble (sequential).
#[derive(Debug, Clone)]
pub struct Engine {
    settings: EngineSettings,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Result<Self> {
        if settings.threshold > HASH_BITS {
            return Err(PhotoError::InvalidSettings {
                message: format!(
                    "threshold {} exceeds {} hash bits",
                    settings.threshold, HASH_BITS
                ),
            });
        }
        if !settings.weights.is_valid() {
            return Err(PhotoError::InvalidSettings {
                message: format!("unusable quality weights {:?}", settings.weights),
            });
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn worker_count(&self) -> usize {
        if self.settings.workers > 0 {
            self.settings.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// Fingerprint every image on a bounded worker pool.
    ///
    /// Unreadable images are collected in `failures` and the batch continues.
    /// An empty input is [`PhotoError::InputExhausted`]. If `cancel` is raised
    /// the whole batch is discarded.
    pub fn fingerprint_batch(
        &self,
        images: &[SourceImage],
        cancel: &CancelFlag,
    ) -> Result<FingerprintBatch> {
        if images.is_empty() {
            return Err(PhotoError::InputExhausted);
        }
        cancel.check()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count())
            .thread_name(|i| format!("fingerprint-{}", i))
            .build()
            .map_err(|e| PhotoError::WorkerPool {
                message: e.to_string(),
            })?;

        let pb = make_progress(
            self.settings.show_progress,
            images.len() as u64,
            "Computing fingerprints...",
        );
        let max_dimension = self.settings.max_decode_dimension;

        // None = skipped because of cancellation
        let outcomes: Vec<Option<std::result::Result<ImageRecord, PhotoError>>> = pool.install(|| {
            images
                .par_iter()
                .map(|image| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let outcome = image.fingerprint(max_dimension);
                    if let Some(ref pb) = pb {
                        pb.inc(1);
                    }
                    Some(outcome)
                })
                .collect()
        });

        if cancel.is_cancelled() {
            if let Some(pb) = pb {
                pb.abandon_with_message("Cancelled");
            }
            tracing::warn!("fingerprinting cancelled; discarding batch");
            return Err(PhotoError::Cancelled);
        }

        let mut batch = FingerprintBatch::default();
        for (image, outcome) in images.iter().zip(outcomes) {
            match outcome {
                Some(Ok(record)) => batch.records.push(record),
                Some(Err(e)) if e.is_skippable() => {
                    tracing::warn!(id = %image.id, error = %e, "skipping image");
                    batch.failures.push((image.id.clone(), e));
                }
                Some(Err(e)) => return Err(e),
                None => return Err(PhotoError::Cancelled),
            }
        }

        finish_progress(
            pb,
            &format!("Fingerprinted {} images", batch.records.len()),
        );
        tracing::info!(
            fingerprinted = batch.records.len(),
            skipped = batch.failures.len(),
            "fingerprinting finished"
        );

        Ok(batch)
    }

    /// Cluster and rank records that were already fingerprinted
    pub fn group(&self, records: &[ImageRecord]) -> Vec<RankedGroup> {
        let groups = cluster::cluster(records, self.settings.threshold);
        scorer::rank_all(&groups, &self.settings.weights)
    }

    /// Run the full pipeline on a set of images
    pub fn run(&self, images: &[SourceImage], cancel: &CancelFlag) -> Result<ScanReport> {
        let started = Instant::now();

        let batch = match self.fingerprint_batch(images, cancel) {
            Ok(batch) => batch,
            Err(PhotoError::InputExhausted) => {
                tracing::info!("no images to process");
                return Ok(ScanReport::empty(self.settings.threshold, 0, started));
            }
            Err(e) => return Err(e),
        };

        cancel.check()?;
        let groups = self.group(&batch.records);
        cancel.check()?;
        let decisions = DecisionSet::assemble(&groups);

        Ok(ScanReport {
            images_seen: images.len(),
            records_scanned: batch.records.len(),
            failures: batch.failures,
            groups,
            decisions,
            threshold: self.settings.threshold,
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// List a provider and run the pipeline on everything it returns
    pub fn run_source(&self, source: &dyn ImageSource, cancel: &CancelFlag) -> Result<ScanReport> {
        let pb = make_spinner(
            self.settings.show_progress,
            &format!("Listing images ({})...", source.name()),
        );
        let images = source.list()?;
        finish_spinner(pb, &format!("Found {} images", images.len()));
        self.run(&images, cancel)
    }
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(show: bool, msg: &str) -> Option<ProgressBar> {
    if show {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(msg.to_string());
        Some(pb)
    } else {
        None
    }
}

fn finish_spinner(pb: Option<ProgressBar>, msg: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(msg.to_string());
    }
}

fn make_progress(show: bool, total: u64, msg: &str) -> Option<ProgressBar> {
    if show {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("━━░"));
        }
        pb.set_message(msg.to_string());
        Some(pb)
    } else {
        None
    }
}

fn finish_progress(pb: Option<ProgressBar>, msg: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(msg.to_string());
    }
}
