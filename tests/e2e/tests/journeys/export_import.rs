//! Round-trip and idempotence laws over the public surface.

use cortex_e2e_tests::harness::{
    catalog_with_embeddings, catalog_without_embeddings, remember, TestCatalog,
};
use cortex_core::{
    ActivityInput, EventType, ExportBundle, ExportFormat, LinkKind, MemoryFilter, MemoryPatch,
    RememberInput, RestoreMode, SearchMode,
};
use serde_json::json;

fn seeded() -> TestCatalog {
    let catalog = catalog_with_embeddings();
    let a = catalog
        .storage
        .create_memory(RememberInput {
            content: "primary exported memory about batching writes".to_string(),
            tags: vec!["perf".into(), "io".into()],
            importance: Some(70),
            ..Default::default()
        })
        .unwrap();
    let b = remember(&catalog.storage, "secondary note");
    catalog
        .storage
        .link_memories(&b, &a.id, LinkKind::DependsOn)
        .unwrap();
    catalog.storage.get_memory(&a.id).unwrap();

    catalog
        .storage
        .log_activity(ActivityInput {
            event_type: EventType::PostToolUse,
            tool_name: Some("Edit".into()),
            tool_input: Some(json!({"file_path": "src/batch.rs"})),
            tool_output: None,
            success: true,
            error_message: None,
            duration_ms: Some(30),
            file_path: None,
        })
        .unwrap();
    catalog
        .storage
        .log_activity(ActivityInput {
            event_type: EventType::Stop,
            tool_name: None,
            tool_input: None,
            tool_output: None,
            success: true,
            error_message: None,
            duration_ms: None,
            file_path: None,
        })
        .unwrap();
    catalog
        .storage
        .record_user_message("please keep this exportable")
        .unwrap();
    catalog
}

#[test]
fn export_fresh_catalog_import_restores_everything() {
    let source = seeded();
    let rendered = source.storage.export(ExportFormat::Json).unwrap();
    let bundle = ExportBundle::parse(&rendered, ExportFormat::Json).unwrap();

    let target = catalog_with_embeddings();
    target
        .storage
        .import_bundle(&bundle, RestoreMode::Restore)
        .unwrap();

    let original = source.storage.export_bundle().unwrap();
    let restored = target.storage.export_bundle().unwrap();

    assert_eq!(original.memories.len(), restored.memories.len());
    for (a, b) in original.memories.iter().zip(restored.memories.iter()) {
        assert_eq!(a.memory.id, b.memory.id);
        assert_eq!(a.memory.content, b.memory.content);
        assert_eq!(a.memory.context, b.memory.context);
        assert_eq!(a.memory.memory_type, b.memory.memory_type);
        assert_eq!(a.memory.status, b.memory.status);
        assert_eq!(a.memory.importance_score, b.memory.importance_score);
        assert_eq!(a.memory.created_at, b.memory.created_at);
        assert_eq!(a.memory.updated_at, b.memory.updated_at);
        assert_eq!(a.memory.tags, b.memory.tags);
        assert_eq!(a.embedding, b.embedding);
        // Restore keeps the bookkeeping fields too
        assert_eq!(a.memory.access_count, b.memory.access_count);
        assert_eq!(a.memory.last_accessed, b.memory.last_accessed);
    }
    assert_eq!(original.links.len(), restored.links.len());
    assert_eq!(original.tags.len(), restored.tags.len());
    assert_eq!(original.activities.len(), restored.activities.len());
    assert_eq!(original.sessions.len(), restored.sessions.len());
    assert_eq!(original.user_messages.len(), restored.user_messages.len());
}

#[test]
fn merge_import_resets_bookkeeping_only() {
    let source = seeded();
    let bundle = source.storage.export_bundle().unwrap();
    assert!(bundle.memories.iter().any(|m| m.memory.access_count > 0));

    let target = catalog_with_embeddings();
    target
        .storage
        .import_bundle(&bundle, RestoreMode::Merge)
        .unwrap();

    for m in &target.storage.export_bundle().unwrap().memories {
        assert_eq!(m.memory.access_count, 0);
        assert!(m.memory.last_accessed.is_none());
    }
}

#[test]
fn jsonl_round_trips_through_parse() {
    let source = seeded();
    let rendered = source.storage.export(ExportFormat::Jsonl).unwrap();
    let bundle = ExportBundle::parse(&rendered, ExportFormat::Jsonl).unwrap();

    let target = catalog_with_embeddings();
    target
        .storage
        .import_bundle(&bundle, RestoreMode::Restore)
        .unwrap();

    let outcome = target
        .storage
        .recall(
            "batching",
            SearchMode::Keyword,
            &MemoryFilter::default(),
            None,
            0,
        )
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
}

#[test]
fn duplicate_link_is_idempotent() {
    let catalog = catalog_without_embeddings();
    let a = remember(&catalog.storage, "alpha");
    let b = remember(&catalog.storage, "beta");

    assert!(catalog
        .storage
        .link_memories(&a, &b, LinkKind::RelatesTo)
        .unwrap());
    assert!(!catalog
        .storage
        .link_memories(&a, &b, LinkKind::RelatesTo)
        .unwrap());
    assert_eq!(catalog.storage.links_of(&a).unwrap().len(), 1);
}

#[test]
fn empty_update_only_advances_updated_at() {
    let catalog = catalog_without_embeddings();
    let before = catalog
        .storage
        .create_memory(RememberInput {
            content: "untouched content".to_string(),
            tags: vec!["idle".into()],
            ..Default::default()
        })
        .unwrap();

    catalog.clock.advance(chrono::Duration::seconds(10));
    let after = catalog
        .storage
        .update_memory(&before.id, MemoryPatch::default())
        .unwrap();

    assert!(after.updated_at > before.updated_at);
    assert_eq!(after.content, before.content);
    assert_eq!(after.context, before.context);
    assert_eq!(after.memory_type, before.memory_type);
    assert_eq!(after.status, before.status);
    assert_eq!(after.importance_score, before.importance_score);
    assert_eq!(after.tags, before.tags);
    assert_eq!(after.access_count, before.access_count);
}

#[test]
fn forget_leaves_no_references_behind() {
    let catalog = catalog_with_embeddings();
    let doomed = catalog
        .storage
        .create_memory(RememberInput {
            content: "marked for deletion".to_string(),
            tags: vec!["gone".into()],
            ..Default::default()
        })
        .unwrap();
    let witness = remember(&catalog.storage, "the witness");
    catalog
        .storage
        .link_memories(&witness, &doomed.id, LinkKind::Contradicts)
        .unwrap();

    assert_eq!(catalog.storage.forget_memory(&doomed.id).unwrap(), 1);

    // No table still references the id
    let bundle = catalog.storage.export_bundle().unwrap();
    assert!(bundle.memories.iter().all(|m| m.memory.id != doomed.id));
    assert!(bundle
        .links
        .iter()
        .all(|l| l.from_id != doomed.id && l.to_id != doomed.id));
    assert!(bundle.tags.iter().all(|t| t.memory_id != doomed.id));

    // And it is gone from both retrieval paths
    for mode in [SearchMode::Keyword, SearchMode::Semantic] {
        let outcome = catalog
            .storage
            .recall("deletion", mode, &MemoryFilter::default(), None, 0)
            .unwrap();
        assert!(outcome.results.iter().all(|h| h.memory.id != doomed.id));
    }
}
