// ABOUTME: Catalog correctness tests across both replication methods
// ABOUTME: Mirrors the stream declarations of an xmin acceptance setup

use pg_source_extractor::{
    CatalogBuilder, DestinationWriteMode, Field, FieldType, ReplicationMethod, SyncError, SyncMode,
};

fn id_and_name_fields() -> Vec<Field> {
    vec![
        Field::new("id", FieldType::Number),
        Field::new("name", FieldType::String),
    ]
}

/// Build the three-stream catalog the connector declares for an xmin
/// source: two tables plus a materialized view, all with source-defined
/// cursors.
#[test]
fn test_xmin_catalog_declares_source_defined_cursors() {
    let builder = CatalogBuilder::new(ReplicationMethod::Xmin);

    for name in ["id_and_name", "starships", "testview"] {
        let stream = builder.build_stream(
            "public",
            name,
            id_and_name_fields(),
            vec![vec!["id".to_string()]],
        );

        assert!(stream.source_defined_cursor, "{} must be source-defined", name);
        assert!(stream.default_cursor_field.is_empty());
        assert_eq!(
            stream.source_defined_primary_key,
            vec![vec!["id".to_string()]]
        );
        assert!(stream.supports(SyncMode::Incremental));

        let configured = builder
            .configure_stream(
                stream,
                SyncMode::Incremental,
                DestinationWriteMode::Append,
                None,
            )
            .unwrap();
        assert!(configured.cursor_field.is_none());
    }
}

#[test]
fn test_standard_catalog_requires_caller_cursor_for_incremental() {
    let builder = CatalogBuilder::new(ReplicationMethod::Standard);
    let stream = builder.build_stream(
        "public",
        "id_and_name",
        id_and_name_fields(),
        vec![vec!["id".to_string()]],
    );
    assert!(!stream.source_defined_cursor);

    // Without a cursor field, INCREMENTAL is rejected.
    let err = builder
        .configure_stream(
            stream.clone(),
            SyncMode::Incremental,
            DestinationWriteMode::Append,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedSyncMode { .. }));
    assert_eq!(err.stream(), Some("public.id_and_name"));

    // With one, it is accepted.
    let configured = builder
        .configure_stream(
            stream,
            SyncMode::Incremental,
            DestinationWriteMode::Append,
            Some(vec!["id".to_string()]),
        )
        .unwrap();
    assert_eq!(configured.cursor_field, Some(vec!["id".to_string()]));
}

#[test]
fn test_xmin_catalog_rejects_caller_cursor() {
    let builder = CatalogBuilder::new(ReplicationMethod::Xmin);
    let stream = builder.build_stream(
        "public",
        "starships",
        id_and_name_fields(),
        vec![vec!["id".to_string()]],
    );

    let err = builder
        .configure_stream(
            stream,
            SyncMode::Incremental,
            DestinationWriteMode::Append,
            Some(vec!["id".to_string()]),
        )
        .unwrap_err();
    assert!(err.to_string().contains("source-defined"));
}

#[test]
fn test_incremental_dedup_without_primary_key_is_rejected() {
    for method in [ReplicationMethod::Standard, ReplicationMethod::Xmin] {
        let builder = CatalogBuilder::new(method);
        let stream = builder.build_stream("public", "no_pk", id_and_name_fields(), vec![]);

        let cursor_field = match method {
            ReplicationMethod::Standard => Some(vec!["id".to_string()]),
            ReplicationMethod::Xmin => None,
        };

        let err = builder
            .configure_stream(
                stream,
                SyncMode::Incremental,
                DestinationWriteMode::AppendDedup,
                cursor_field,
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedSyncMode { .. }));
    }
}

#[test]
fn test_catalog_preserves_stream_order() {
    let builder = CatalogBuilder::new(ReplicationMethod::Xmin);
    let streams: Vec<_> = ["id_and_name", "starships"]
        .iter()
        .map(|name| {
            let stream = builder.build_stream("public", name, id_and_name_fields(), vec![]);
            builder
                .configure_stream(
                    stream,
                    SyncMode::Incremental,
                    DestinationWriteMode::Append,
                    None,
                )
                .unwrap()
        })
        .collect();

    let catalog = builder.build_catalog(streams);
    let names: Vec<_> = catalog
        .streams
        .iter()
        .map(|s| s.stream.name.as_str())
        .collect();
    assert_eq!(names, vec!["id_and_name", "starships"]);
}
