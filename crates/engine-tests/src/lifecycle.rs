#[cfg(test)]
mod tests {
    use crate::{
        scripted::ScriptedConnector,
        utils::{descriptor, drain, eventually, settings},
    };
    use engine_core::{CacheError, CacheState, StreamingTableCache};
    use model::{
        core::value::Value,
        events::{CellRegion, ColumnRegion, ModelChange, RowRegion},
    };
    use tracing_test::traced_test;

    const ORDERED: &str = "SELECT id FROM t ORDER BY id";

    #[tokio::test]
    async fn identical_update_is_a_no_op() {
        let backend = ScriptedConnector::new(100);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();
        let mut rx = cache.subscribe();

        cache
            .update(Some(descriptor()), ORDERED, Some("s1".into()))
            .await
            .unwrap();
        let calls = backend.calls();
        drain(&mut rx);

        cache
            .update(Some(descriptor()), ORDERED, Some("s1".into()))
            .await
            .unwrap();

        assert_eq!(backend.calls(), calls);
        assert!(drain(&mut rx).is_empty());

        // A different session is a different binding.
        cache
            .update(Some(descriptor()), ORDERED, Some("s2".into()))
            .await
            .unwrap();
        assert_eq!(backend.connects(), 2);
        assert_eq!(backend.sessions(), vec![Some("s1".into()), Some("s2".into())]);
    }

    #[tokio::test]
    async fn empty_query_resets_without_network() {
        let backend = ScriptedConnector::new(100);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();
        let mut rx = cache.subscribe();

        cache.update(Some(descriptor()), "", None).await.unwrap();

        assert_eq!(drain(&mut rx), vec![ModelChange::ModelReset]);
        assert_eq!(cache.row_count(RowRegion::Body), 0);
        assert_eq!(cache.column_count(ColumnRegion::Body), 0);
        assert_eq!(cache.state(), CacheState::Empty);
        assert_eq!(backend.calls(), 0);

        cache.update(Some(descriptor()), "  \n ", None).await.unwrap();
        cache.update(None, ORDERED, None).await.unwrap();
        assert_eq!(drain(&mut rx).len(), 2);
        assert_eq!(backend.calls(), 0);
    }

    #[traced_test]
    #[tokio::test]
    async fn validation_failure_leaves_cache_empty() {
        let backend = ScriptedConnector::new(100);
        backend.fail_validation("syntax error");
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();

        let err = cache
            .update(Some(descriptor()), "SELCT * FROM t", None)
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Validation(_)));
        assert!(err.is_validation());
        assert_eq!(err.message(), "syntax error");
        assert_eq!(cache.row_count(RowRegion::Body), 0);
        assert_eq!(cache.state(), CacheState::Empty);
        assert!(cache.resident_blocks().is_empty());
        assert_eq!(backend.query_count(), 0);
        assert!(logs_contain("Update failed"));

        // Re-issuing the same query is how a caller retries.
        backend.heal();
        cache
            .update(Some(descriptor()), "SELCT * FROM t", None)
            .await
            .unwrap();
        assert_eq!(cache.state(), CacheState::Bounded);
        assert_eq!(backend.validations(), 2);
    }

    #[tokio::test]
    async fn connection_failure_is_reported_before_validation() {
        let backend = ScriptedConnector::new(100);
        backend.fail_connect("host unreachable");
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();

        let err = cache
            .update(Some(descriptor()), ORDERED, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Connection(_)));
        assert!(err.is_validation());
        assert_eq!(backend.validations(), 0);
        assert_eq!(cache.state(), CacheState::Empty);
    }

    #[tokio::test]
    async fn failed_first_block_rejects_update() {
        let backend = ScriptedConnector::new(100);
        backend.fail_offset(0);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();

        let err = cache
            .update(Some(descriptor()), ORDERED, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Fetch { block: 0, .. }));
        assert_eq!(cache.row_count(RowRegion::Body), 0);
        assert_eq!(cache.column_count(ColumnRegion::Body), 0);
        assert_eq!(cache.state(), CacheState::Empty);
    }

    #[traced_test]
    #[tokio::test]
    async fn stale_block_is_discarded_after_rebind() {
        let backend = ScriptedConnector::gated(100);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();

        backend.release(1);
        cache.update(Some(descriptor()), ORDERED, None).await.unwrap();
        assert_eq!(cache.cell(CellRegion::Body, 25, 0), None);
        eventually(|| backend.query_count() == 2).await;

        backend.release(2);
        cache
            .update(Some(descriptor()), "SELECT id FROM t ORDER BY id DESC", None)
            .await
            .unwrap();
        eventually(|| cache.metrics().stale_discarded >= 1).await;

        assert_eq!(cache.resident_blocks(), vec![0]);
        assert_eq!(cache.row_count(RowRegion::Body), 10);
        assert!(logs_contain("Discarded stale block"));
    }

    #[tokio::test]
    async fn dispose_discards_in_flight_work() {
        let backend = ScriptedConnector::gated(100);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();
        let mut rx = cache.subscribe();

        backend.release(1);
        cache.update(Some(descriptor()), ORDERED, None).await.unwrap();
        assert_eq!(cache.cell(CellRegion::Body, 25, 0), None);
        eventually(|| backend.query_count() == 2).await;

        cache.dispose();
        backend.release(1);
        eventually(|| cache.metrics().stale_discarded == 1).await;

        assert_eq!(cache.state(), CacheState::Empty);
        assert_eq!(cache.row_count(RowRegion::Body), 0);
        assert!(cache.binding().is_none());
        drain(&mut rx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn mutators_keep_the_other_half_of_the_binding() {
        let backend = ScriptedConnector::new(100);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();

        cache
            .set_connection_data(Some(descriptor()), Some("abc".into()))
            .await
            .unwrap();
        assert_eq!(backend.calls(), 0);
        assert_eq!(cache.connection_data(), Some(descriptor()));

        cache.set_query(ORDERED).await.unwrap();
        assert_eq!(cache.query(), ORDERED);
        assert_eq!(backend.sessions(), vec![Some("abc".into())]);
        assert_eq!(cache.cell(CellRegion::Body, 3, 0), Some(Value::Int(3)));

        cache.set_connection_data(None, None).await.unwrap();
        assert_eq!(cache.query(), ORDERED);
        assert_eq!(cache.row_count(RowRegion::Body), 0);
    }

    #[tokio::test]
    async fn refresh_rebuilds_a_streaming_binding() {
        let backend = ScriptedConnector::new(100);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();
        cache.update(Some(descriptor()), ORDERED, None).await.unwrap();

        cache.refresh().await.unwrap();

        assert_eq!(backend.connects(), 2);
        assert_eq!(backend.validations(), 2);
        assert_eq!(cache.row_count(RowRegion::Body), 10);
        assert_eq!(cache.query(), ORDERED);
    }

    #[test]
    fn construction_needs_a_runtime() {
        let backend = ScriptedConnector::new(1);
        let result = StreamingTableCache::new(backend.connector(), settings(10));
        assert!(matches!(result, Err(CacheError::NoRuntime)));
    }

    #[tokio::test]
    async fn construction_rejects_invalid_settings() {
        let backend = ScriptedConnector::new(1);
        let result = StreamingTableCache::new(backend.connector(), settings(0));
        assert!(matches!(result, Err(CacheError::Settings(_))));
        assert_eq!(backend.calls(), 0);
    }
}
