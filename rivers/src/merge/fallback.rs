use crate::error::RiversResult;
use crate::merge::{MergeSummary, PassSettings, log_pass_start, merge_keys};
use crate::pipeline::PipelineContext;
use crate::retry::TransientErrorClassifier;
use crate::store::RiverStore;
use crate::types::MergePass;

/// Merges every segment without identity key into one row per
/// (watershed code, flow-order class).
///
/// Unrelated streams of the same class in one watershed end up in the same row.
/// Rows keep the maximum watershed code of their group and a null identity key.
pub async fn merge_fallback_keyed<S, C>(ctx: &PipelineContext<S, C>) -> RiversResult<MergeSummary>
where
    S: RiverStore,
    C: TransientErrorClassifier,
{
    let codes = ctx.store.fallback_watershed_codes().await?;
    log_pass_start(
        ctx,
        MergePass::Fallback,
        codes.len(),
        ctx.config.fallback_codes_per_second,
    );

    let settings = PassSettings {
        pass: MergePass::Fallback,
        progress_interval: ctx.config.fallback_progress_interval,
        remaining_width: 5,
    };

    merge_keys(ctx, settings, codes).await
}
