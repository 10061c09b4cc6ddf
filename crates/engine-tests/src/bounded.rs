#[cfg(test)]
mod tests {
    use crate::{
        scripted::ScriptedConnector,
        utils::{descriptor, drain, settings},
    };
    use engine_core::{CacheState, StreamingTableCache};
    use model::{
        core::value::Value,
        events::{CellRegion, ModelChange, RowRegion},
    };
    use tracing_test::traced_test;

    #[traced_test]
    #[tokio::test]
    async fn self_limited_query_is_fetched_once() {
        let backend = ScriptedConnector::new(100);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();
        let mut rx = cache.subscribe();

        cache
            .update(Some(descriptor()), "SELECT x FROM t LIMIT 5", None)
            .await
            .unwrap();

        assert_eq!(cache.state(), CacheState::Bounded);
        assert_eq!(cache.row_count(RowRegion::Body), 5);
        assert_eq!(
            drain(&mut rx),
            vec![
                ModelChange::ModelReset,
                ModelChange::ModelReset,
                ModelChange::rows_inserted(0, 5),
            ]
        );

        for row in 0..5 {
            assert_eq!(cache.cell(CellRegion::Body, row, 0), Some(Value::Int(row as i64)));
        }
        assert_eq!(cache.cell(CellRegion::Body, 5, 0), None);
        assert_eq!(cache.cell(CellRegion::Body, 50, 0), None);

        let queries = backend.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].sql, "SELECT x FROM t LIMIT 5");
        assert_eq!(queries[0].options.limit, Some(50_000));
        assert_eq!(queries[0].options.offset, None);
        assert_eq!(cache.resident_blocks(), vec![0]);
    }

    #[tokio::test]
    async fn unordered_query_is_capped_by_fetch_option() {
        let backend = ScriptedConnector::new(100);
        let cache = StreamingTableCache::new(
            backend.connector(),
            settings(10).with_bounded_limit(30),
        )
        .unwrap();

        cache
            .update(Some(descriptor()), "SELECT id FROM t", None)
            .await
            .unwrap();

        assert_eq!(cache.state(), CacheState::Bounded);
        assert_eq!(cache.row_count(RowRegion::Body), 30);
        assert_eq!(
            cache.cell(CellRegion::Body, 29, 1),
            Some(Value::String("row-29".into()))
        );
        assert_eq!(backend.query_texts(), vec!["SELECT id FROM t"]);
    }

    #[tokio::test]
    async fn refresh_reloads_in_place() {
        let backend = ScriptedConnector::new(100);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();
        let mut rx = cache.subscribe();
        cache
            .update(Some(descriptor()), "SELECT id FROM t LIMIT 5", None)
            .await
            .unwrap();
        drain(&mut rx);

        cache.refresh().await.unwrap();

        assert_eq!(drain(&mut rx), vec![ModelChange::cells_changed(0, 5, 2)]);
        assert_eq!(backend.query_count(), 2);
        assert_eq!(backend.validations(), 1);
        assert_eq!(cache.row_count(RowRegion::Body), 5);
    }

    #[tokio::test]
    async fn failed_dataset_fetch_rejects_update() {
        let backend = ScriptedConnector::new(100);
        backend.fail_offset(0);
        let cache = StreamingTableCache::new(backend.connector(), settings(10)).unwrap();

        let err = cache
            .update(Some(descriptor()), "SELECT id FROM t", None)
            .await
            .unwrap_err();

        assert!(err.is_fetch());
        assert!(!err.is_validation());
        assert_eq!(cache.state(), CacheState::Empty);
        assert_eq!(cache.row_count(RowRegion::Body), 0);
        assert!(cache.resident_blocks().is_empty());
    }
}
