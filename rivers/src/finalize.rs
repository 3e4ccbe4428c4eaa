use crate::error::RiversResult;
use crate::pipeline::PipelineContext;
use crate::store::RiverStore;

/// Indexes the merged table and refreshes its statistics.
///
/// Must run after every insert of both passes is durable. Statistics are refreshed
/// outside of any transaction.
pub async fn finalize<S, C>(ctx: &PipelineContext<S, C>) -> RiversResult<()>
where
    S: RiverStore,
{
    ctx.progress.log("Creating indices");
    ctx.store.create_indexes().await?;
    ctx.store.refresh_statistics().await?;
    ctx.progress.log("All done!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::memory::MemoryRiverStore;
    use crate::test_utils::test_merge_config;

    #[tokio::test]
    async fn indexes_and_statistics_are_built() {
        let store = MemoryRiverStore::new(Vec::new());
        store.recreate_destination().await.unwrap();
        let ctx = PipelineContext::new(store.clone(), test_merge_config());

        finalize(&ctx).await.unwrap();

        assert!(store.indexes_created().await);
        assert!(store.statistics_refreshed().await);
    }

    #[tokio::test]
    async fn missing_destination_is_fatal() {
        let store = MemoryRiverStore::new(Vec::new());
        let ctx = PipelineContext::new(store.clone(), test_merge_config());

        let err = finalize(&ctx).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationTableMissing);
        assert!(!store.statistics_refreshed().await);
    }
}
