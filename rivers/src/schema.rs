use crate::error::RiversResult;
use crate::pipeline::PipelineContext;
use crate::store::RiverStore;

/// Drops the destination table if it exists and creates it empty.
///
/// Runs before any merging. Rows of a previous run, complete or not, are discarded.
pub async fn initialize_schema<S, C>(ctx: &PipelineContext<S, C>) -> RiversResult<()>
where
    S: RiverStore,
{
    ctx.store.recreate_destination().await?;
    ctx.progress.log("Table created");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRiverStore;
    use crate::test_utils::{identity_segment, test_merge_config};

    #[tokio::test]
    async fn previous_rows_are_discarded() {
        let store = MemoryRiverStore::new(vec![identity_segment("1", "10300101", None, 1, 0.0)]);
        let ctx = PipelineContext::new(store.clone(), test_merge_config());

        initialize_schema(&ctx).await.unwrap();
        store.insert_identity_group("1").await.unwrap();
        assert_eq!(store.merged_rivers().await.len(), 1);

        initialize_schema(&ctx).await.unwrap();
        assert!(store.merged_rivers().await.is_empty());
    }
}
