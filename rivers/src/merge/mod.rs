//! The two merge passes.
//!
//! Both passes walk a list of grouping keys and issue one grouped insert per key
//! through the [`ResilientInsertExecutor`](crate::retry::ResilientInsertExecutor).
//! They differ only in the keys they list, the insert they issue and how often
//! they report progress.

use std::fmt;

use tracing::{Instrument, debug, info_span};

use crate::error::RiversResult;
use crate::pipeline::PipelineContext;
use crate::progress::ProgressReporter;
use crate::retry::{InsertOutcome, TransientErrorClassifier};
use crate::store::RiverStore;
use crate::types::MergePass;

mod fallback;
mod identity;

pub use fallback::merge_fallback_keyed;
pub use identity::merge_identity_keyed;

/// What one merge pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub pass: MergePass,
    /// Number of grouping keys listed by the store.
    pub keys_total: u64,
    /// Number of keys whose grouped insert succeeded.
    pub keys_merged: u64,
    /// Number of merged rows inserted over all keys.
    pub rows_inserted: u64,
    /// Keys given up on after exhausting their insert attempts.
    pub skipped_keys: Vec<String>,
}

impl MergeSummary {
    fn new(pass: MergePass, keys_total: u64) -> Self {
        Self {
            pass,
            keys_total,
            keys_merged: 0,
            rows_inserted: 0,
            skipped_keys: Vec::new(),
        }
    }
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} merge: {} of {} {}s merged, {} rows inserted, {} skipped",
            self.pass,
            self.keys_merged,
            self.keys_total,
            self.pass.key_label(),
            self.rows_inserted,
            self.skipped_keys.len()
        )
    }
}

/// Progress settings of one pass.
struct PassSettings {
    pass: MergePass,
    progress_interval: u64,
    /// Width of the remaining key count in progress lines.
    remaining_width: usize,
}

/// Merges every key of `keys`, in order, with the insert belonging to `settings.pass`.
///
/// Keys whose insert exhausts its attempts are logged and skipped, any other
/// error aborts the pass.
async fn merge_keys<S, C>(
    ctx: &PipelineContext<S, C>,
    settings: PassSettings,
    keys: Vec<String>,
) -> RiversResult<MergeSummary>
where
    S: RiverStore,
    C: TransientErrorClassifier,
{
    let PassSettings {
        pass,
        progress_interval,
        remaining_width,
    } = settings;
    let label = pass.key_label();

    let mut summary = MergeSummary::new(pass, keys.len() as u64);
    let mut remaining = summary.keys_total;

    for key in keys {
        let store = &ctx.store;
        let key_ref = key.as_str();
        let span = info_span!("merge_key", %pass, key = key_ref);

        let outcome = ctx
            .executor
            .execute_with(
                move || async move {
                    match pass {
                        MergePass::Identity => store.insert_identity_group(key_ref).await,
                        MergePass::Fallback => store.insert_fallback_group(key_ref).await,
                    }
                },
                |err, attempts_left| {
                    ctx.progress
                        .warn(transient_failure_line(pass, key_ref, attempts_left));
                    debug!(error = %err, "transient insert failure");
                },
            )
            .instrument(span)
            .await?;

        let rows = match outcome {
            InsertOutcome::Inserted { rows, .. } => {
                summary.keys_merged += 1;
                summary.rows_inserted += rows;
                rows
            }
            InsertOutcome::Exhausted { attempts, last_error } => {
                ctx.progress.warn(format_args!(
                    "Failed to insert {label} {key} after {attempts} attempts, skipping."
                ));
                debug!(error = %last_error, "last insert failure");
                summary.skipped_keys.push(key.clone());
                0
            }
        };

        remaining -= 1;
        if ProgressReporter::should_report(remaining, progress_interval) {
            ctx.progress.log(format_args!(
                "{remaining:remaining_width$} {label}s to go {rows:5} rows added for {label} {key}"
            ));
        }
    }

    Ok(summary)
}

/// Formats the progress line logged before an insert is retried.
fn transient_failure_line(pass: MergePass, key: &str, attempts_left: u32) -> String {
    format!(
        "Transient geometry union failure on insert for {} {key}. Tries left: {attempts_left}",
        pass.key_label()
    )
}

/// Logs the number of keys of a pass and how long it should roughly take.
fn log_pass_start<S, C>(
    ctx: &PipelineContext<S, C>,
    pass: MergePass,
    key_count: usize,
    keys_per_second: f64,
) {
    let estimate = key_count as f64 / keys_per_second;
    ctx.progress.log(format_args!(
        "Merging {key_count} unique {}s, roughly {estimate:.0} seconds",
        pass.key_label()
    ));
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn transient_failure_line_names_key_and_attempts_left() {
        let progress = ProgressReporter::starting_at(Instant::now() - Duration::from_secs(3));

        let line = progress.format_line(transient_failure_line(MergePass::Fallback, "10300101", 2));

        assert!(line.starts_with("   3."));
        assert!(line.ends_with(
            "s Transient geometry union failure on insert for HUC8 10300101. Tries left: 2"
        ));
    }
}
