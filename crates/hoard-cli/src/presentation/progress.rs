//! Per-job progress bars for `hoard download`.
//!
//! Falls back to plain status lines when stdout is not a terminal.

use std::collections::HashMap;
use std::io::{self, IsTerminal};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use hoard_core::{DownloadJob, JobId};

use super::truncate_label;

const MAX_LABEL: usize = 32;

const BAR_TEMPLATE: &str =
    "{msg:32} {bar:28.cyan/blue} {bytes:>10} / {total_bytes:>10} ({percent:>3}%) {binary_bytes_per_sec}";

/// Live progress display for leaf download jobs.
pub struct DownloadProgress {
    multi: MultiProgress,
    bars: HashMap<JobId, ProgressBar>,
    style: ProgressStyle,
}

impl DownloadProgress {
    /// Create a display, hidden unless stdout is a terminal.
    pub fn new() -> Self {
        let target = if io::stdout().is_terminal() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self::with_draw_target(target)
    }

    /// Create a display drawing to `target`.
    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
            style: ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        }
    }

    /// Reflect the byte counts of a leaf job.
    pub fn update(&mut self, job: &DownloadJob) {
        if job.is_aggregate {
            return;
        }
        let bar = self.bars.entry(job.id).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(0));
            bar.set_style(self.style.clone());
            bar.set_message(truncate_label(&job.display_name(), MAX_LABEL));
            bar
        });
        if job.total_bytes > 0 && bar.length() != Some(job.total_bytes) {
            bar.set_length(job.total_bytes);
        }
        bar.set_position(job.bytes_downloaded);
    }

    /// Drop the bar of `id`, if any, and print `line` above the rest.
    pub fn finish(&mut self, id: JobId, line: &str) {
        if let Some(bar) = self.bars.remove(&id) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        self.println(line);
    }

    /// Print a line without tearing the bars.
    pub fn println(&self, line: &str) {
        if self.multi.is_hidden() {
            println!("{line}");
        } else if self.multi.println(line).is_err() {
            println!("{line}");
        }
    }

    /// Number of bars still shown.
    pub fn active(&self) -> usize {
        self.bars.len()
    }

    /// Clear every remaining bar.
    pub fn clear(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_core::{MediaItem, Sequence};

    fn leaf(downloaded: u64, total: u64) -> DownloadJob {
        let mut job = DownloadJob::new_leaf(
            JobId::generate(),
            Sequence::new(1),
            MediaItem::new("1", "direct"),
            "/tmp".into(),
            "/tmp/direct_1".into(),
        );
        job.bytes_downloaded = downloaded;
        job.total_bytes = total;
        job
    }

    #[test]
    fn tracks_one_bar_per_leaf() {
        let mut progress = DownloadProgress::with_draw_target(ProgressDrawTarget::hidden());
        let job = leaf(10, 100);
        progress.update(&job);
        progress.update(&leaf(5, 0));
        assert_eq!(progress.active(), 2);

        let bar = &progress.bars[&job.id];
        assert_eq!(bar.length(), Some(100));
        assert_eq!(bar.position(), 10);

        progress.finish(job.id, "done");
        assert_eq!(progress.active(), 1);
    }

    #[test]
    fn aggregates_have_no_bar() {
        let mut progress = DownloadProgress::with_draw_target(ProgressDrawTarget::hidden());
        let group = DownloadJob::new_aggregate(
            JobId::generate(),
            Sequence::new(1),
            "/tmp".into(),
            Some("pool".into()),
        );
        progress.update(&group);
        assert_eq!(progress.active(), 0);
    }
}
