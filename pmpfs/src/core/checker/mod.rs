// SPDX-License-Identifier: MIT

pub mod types;

pub use types::*;

/// Consistency checks over an in-memory structure.
pub trait FsChecker {
    /// Runs the phases selected in `opts` and collects findings.
    fn verify(&self, opts: &VerifyOptions) -> VerifyReport;

    fn verify_all(&self) -> VerifyReport {
        self.verify(&VerifyOptions::default())
    }
}
