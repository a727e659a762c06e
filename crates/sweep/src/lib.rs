//! deadwood Sweep - finds and removes dead accounts
//!
//! - classifier: per-account verdicts under one rule
//! - runner: the loop over followings/followers
//! - console: colored lines and the progress bar

pub mod classifier;
pub mod console;
pub mod runner;

#[cfg(test)]
mod fake;

pub use classifier::{Classifier, Finding, LastActivity, Rule, Verdict};
pub use console::{Console, Tone};
pub use runner::{AccountFailure, Mode, SweepOptions, SweepReport, Sweeper};
