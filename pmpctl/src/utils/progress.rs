// SPDX-License-Identifier: MIT

use indicatif::{ProgressBar, ProgressStyle};
use pmpfs::TransferObserver;

use crate::utils::{LogLevel, log_level};

const BYTES_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.white}] {bytes}/{total_bytes} (ETA {eta_precise}) {msg}";
const BLOCKS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.white}] block {pos}/{len} (ETA {eta_precise}) {msg}";

/// Progress bar fed by transfer and scan callbacks. Hidden in quiet mode.
pub struct ProgressObserver {
    pb: ProgressBar,
}

impl ProgressObserver {
    fn with_template(total: u64, template: &str, message: &str) -> Self {
        let pb = if log_level() == LogLevel::Quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total)
        };
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░░");
        pb.set_style(style);
        pb.set_message(message.to_string());
        Self { pb }
    }

    pub fn bytes(total: u64, message: &str) -> Self {
        Self::with_template(total, BYTES_TEMPLATE, message)
    }

    pub fn blocks(total: u64, message: &str) -> Self {
        Self::with_template(total, BLOCKS_TEMPLATE, message)
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl TransferObserver for ProgressObserver {
    fn on_progress(&mut self, done: u64, total: u64) {
        if self.pb.length() != Some(total) {
            self.pb.set_length(total);
        }
        self.pb.set_position(done);
    }
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.abandon();
        }
    }
}
