// file: src/pipeline/progress.rs
// description: progress tracking and statistics for chunk embedding during ingestion
// reference: uses indicatif for progress bars and tracks processing metrics

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub chunks_embedded: usize,
    pub batches_completed: usize,
    pub batches_failed: usize,
    pub total_bytes_processed: u64,
    pub duration_secs: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks_per_second(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.chunks_embedded as f64 / self.duration_secs
    }

    pub fn bytes_per_second(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.total_bytes_processed as f64 / self.duration_secs
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    chunks_embedded: AtomicUsize,
    batches_completed: AtomicUsize,
    batches_failed: AtomicUsize,
    bytes_processed: AtomicU64,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn with_color(total_chunks: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();
        Self::build(&multi_progress, total_chunks, colored)
    }

    /// Draws nothing; used when stdout/stderr belong to another protocol.
    pub fn hidden(total_chunks: usize) -> Self {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        Self::build(&multi_progress, total_chunks, false)
    }

    fn build(multi_progress: &MultiProgress, total_chunks: usize, colored: bool) -> Self {
        let main_bar = create_progress_bar(multi_progress, total_chunks as u64, colored);
        let detail_bar = create_detail_bar(multi_progress);

        Self {
            main_bar,
            detail_bar,
            chunks_embedded: AtomicUsize::new(0),
            batches_completed: AtomicUsize::new(0),
            batches_failed: AtomicUsize::new(0),
            bytes_processed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn batch_completed(&self, chunks: usize, bytes: u64) {
        self.chunks_embedded.fetch_add(chunks, Ordering::SeqCst);
        self.batches_completed.fetch_add(1, Ordering::SeqCst);
        self.bytes_processed.fetch_add(bytes, Ordering::SeqCst);
        self.main_bar.inc(chunks as u64);
        self.update_detail_bar();
    }

    pub fn batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::SeqCst);
        self.update_detail_bar();
    }

    pub fn set_message(&self, message: String) {
        self.main_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Embedding complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            chunks_embedded: self.chunks_embedded.load(Ordering::SeqCst),
            batches_completed: self.batches_completed.load(Ordering::SeqCst),
            batches_failed: self.batches_failed.load(Ordering::SeqCst),
            total_bytes_processed: self.bytes_processed.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }

    fn update_detail_bar(&self) {
        let batches = self.batches_completed.load(Ordering::SeqCst);
        let failed = self.batches_failed.load(Ordering::SeqCst);
        let kib = self.bytes_processed.load(Ordering::SeqCst) / 1024;

        self.detail_bar.set_message(format!(
            "Batches: {} | Failed: {} | Text: {} KiB",
            batches, failed, kib
        ));
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        if !self.main_bar.is_finished() {
            self.main_bar.abandon();
        }
        self.detail_bar.finish_and_clear();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    let template = if colored {
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta}) {msg}"
    } else {
        "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} chunks ({eta}) {msg}"
    };

    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        let chars = if colored { "█▓▒░" } else { "=>-" };
        bar.set_style(style.progress_chars(chars));
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    if let Ok(style) = ProgressStyle::default_bar().template("{msg}") {
        bar.set_style(style);
    }
    bar
}
