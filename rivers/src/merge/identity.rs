use crate::error::RiversResult;
use crate::merge::{MergeSummary, PassSettings, log_pass_start, merge_keys};
use crate::pipeline::PipelineContext;
use crate::retry::TransientErrorClassifier;
use crate::store::RiverStore;
use crate::types::MergePass;

/// Merges every segment carrying an identity key into one row per
/// (identity key, flow-order class).
///
/// Rows keep the minimum watershed code of their group. A river crossing several
/// watersheds is therefore attributed to only one of them.
pub async fn merge_identity_keyed<S, C>(ctx: &PipelineContext<S, C>) -> RiversResult<MergeSummary>
where
    S: RiverStore,
    C: TransientErrorClassifier,
{
    let keys = ctx.store.identity_keys().await?;
    log_pass_start(
        ctx,
        MergePass::Identity,
        keys.len(),
        ctx.config.identity_keys_per_second,
    );

    let settings = PassSettings {
        pass: MergePass::Identity,
        progress_interval: ctx.config.identity_progress_interval,
        remaining_width: 7,
    };

    merge_keys(ctx, settings, keys).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRiverStore;
    use crate::test_utils::{identity_segment, test_merge_config, watershed_segment};

    #[tokio::test]
    async fn merges_one_row_per_identity_key_and_class() {
        let store = MemoryRiverStore::new(vec![
            identity_segment("756422", "10300101", Some("Missouri River"), 5, 0.0),
            identity_segment("756422", "10300102", Some("Missouri River"), 5, 1.0),
            identity_segment("756422", "10300103", Some("Missouri River"), 3, 2.0),
            identity_segment("1", "10300101", None, 1, 10.0),
            watershed_segment("10300101", 2, 20.0),
        ]);
        store.recreate_destination().await.unwrap();
        let ctx = PipelineContext::new(store.clone(), test_merge_config());

        let summary = merge_identity_keyed(&ctx).await.unwrap();

        assert_eq!(summary.keys_total, 2);
        assert_eq!(summary.keys_merged, 2);
        assert_eq!(summary.rows_inserted, 3);
        assert!(summary.skipped_keys.is_empty());

        let rows = store.merged_rivers().await;
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.identity_key.is_some()));
    }
}
