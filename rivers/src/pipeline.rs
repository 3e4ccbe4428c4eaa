//! Sequencing of the merge run.
//!
//! A run initializes the destination table, merges identity-keyed segments, then
//! merges the remaining segments by watershed code and finally indexes the result.
//! Every step finishes, retries included, before the next one starts.

use config::shared::MergeConfig;
use tracing::info;

use crate::error::RiversResult;
use crate::finalize::finalize;
use crate::merge::{MergeSummary, merge_fallback_keyed, merge_identity_keyed};
use crate::progress::ProgressReporter;
use crate::retry::{GeometryUnionDefect, ResilientInsertExecutor, TransientErrorClassifier};
use crate::schema::initialize_schema;
use crate::store::RiverStore;

/// Everything the pipeline components share during a run.
#[derive(Debug)]
pub struct PipelineContext<S, C = GeometryUnionDefect> {
    pub store: S,
    pub executor: ResilientInsertExecutor<C>,
    pub progress: ProgressReporter,
    pub config: MergeConfig,
}

impl<S> PipelineContext<S> {
    /// Creates a context whose executor is built from `config`.
    ///
    /// The progress clock starts now.
    pub fn new(store: S, config: MergeConfig) -> Self {
        let executor = ResilientInsertExecutor::from_config(&config);

        Self::with_executor(store, executor, config)
    }
}

impl<S, C> PipelineContext<S, C> {
    /// Creates a context with a custom insert executor.
    pub fn with_executor(
        store: S,
        executor: ResilientInsertExecutor<C>,
        config: MergeConfig,
    ) -> Self {
        Self {
            store,
            executor,
            progress: ProgressReporter::start(),
            config,
        }
    }
}

/// What a complete run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub identity: MergeSummary,
    pub fallback: MergeSummary,
    /// Whether indexes and statistics were built.
    pub finalized: bool,
}

impl PipelineSummary {
    /// Returns the number of rows inserted by both passes.
    pub fn rows_inserted(&self) -> u64 {
        self.identity.rows_inserted + self.fallback.rows_inserted
    }

    /// Returns whether some keys were skipped after exhausting their attempts.
    pub fn has_skipped_keys(&self) -> bool {
        !self.identity.skipped_keys.is_empty() || !self.fallback.skipped_keys.is_empty()
    }
}

/// Runs the whole merge.
///
/// Returns an error on the first fatal failure, leaving a partial destination
/// table behind that the next run discards. Keys skipped after transient failures
/// do not fail the run, they are listed in the returned summary.
pub async fn run_pipeline<S, C>(ctx: &PipelineContext<S, C>) -> RiversResult<PipelineSummary>
where
    S: RiverStore,
    C: TransientErrorClassifier,
{
    info!(
        source_table = %ctx.config.source_table,
        destination_table = %ctx.config.destination_table,
        max_insert_attempts = ctx.executor.max_attempts(),
        "starting river merge"
    );

    initialize_schema(ctx).await?;

    let identity = merge_identity_keyed(ctx).await?;
    let fallback = merge_fallback_keyed(ctx).await?;

    let finalized = if ctx.config.finalize {
        finalize(ctx).await?;
        true
    } else {
        ctx.progress.log("Finalization disabled, skipping indices and vacuum");
        false
    };

    let summary = PipelineSummary {
        identity,
        fallback,
        finalized,
    };

    info!(
        rows_inserted = summary.rows_inserted(),
        elapsed_secs = ctx.progress.elapsed().as_secs_f64(),
        "{}; {}",
        summary.identity,
        summary.fallback
    );

    Ok(summary)
}
