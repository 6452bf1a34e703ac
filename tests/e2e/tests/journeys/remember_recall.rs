//! Write-then-read journeys: keyword, semantic, hybrid, tags, pagination.

use cortex_e2e_tests::harness::{catalog_with_embeddings, catalog_without_embeddings, remember};
use cortex_core::{
    LinkKind, MemoryFilter, MemoryPatch, MemoryType, RememberInput, SearchMode, TagCount,
};

#[test]
fn write_then_keyword_read() {
    let catalog = catalog_without_embeddings();
    let m1 = catalog
        .storage
        .create_memory(RememberInput {
            content: "Use AES-GCM for envelope encryption".to_string(),
            memory_type: MemoryType::Decision,
            tags: vec!["crypto".into(), "security".into()],
            importance: Some(80),
            ..Default::default()
        })
        .unwrap();

    let outcome = catalog
        .storage
        .recall("AES", SearchMode::Keyword, &MemoryFilter::default(), Some(5), 0)
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].memory.id, m1.id);
    assert!(outcome.results[0].score > 0.0);
}

#[test]
fn semantic_beats_keyword() {
    let catalog = catalog_with_embeddings();
    let m2 = remember(&catalog.storage, "adopt rotation policy for signing keys");

    let keyword = catalog
        .storage
        .recall(
            "key management",
            SearchMode::Keyword,
            &MemoryFilter::default(),
            None,
            0,
        )
        .unwrap();
    assert!(keyword.results.is_empty());

    let semantic = catalog
        .storage
        .recall(
            "key management",
            SearchMode::Semantic,
            &MemoryFilter::default(),
            None,
            0,
        )
        .unwrap();
    assert!(semantic.results.iter().any(|h| h.memory.id == m2));

    let hybrid = catalog
        .storage
        .recall(
            "key management",
            SearchMode::Hybrid,
            &MemoryFilter::default(),
            None,
            0,
        )
        .unwrap();
    assert!(hybrid.results.iter().any(|h| h.memory.id == m2));
}

#[test]
fn tag_counts_sort_by_count_then_name() {
    let catalog = catalog_without_embeddings();
    for tags in [vec!["a", "b"], vec!["b"], vec!["b", "c"]] {
        catalog
            .storage
            .create_memory(RememberInput {
                content: format!("note tagged {tags:?}"),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            })
            .unwrap();
    }

    assert_eq!(
        catalog.storage.list_tags().unwrap(),
        vec![
            TagCount { tag: "b".into(), count: 3 },
            TagCount { tag: "a".into(), count: 1 },
            TagCount { tag: "c".into(), count: 1 },
        ]
    );
}

#[test]
fn hybrid_ranks_double_hits_first() {
    let catalog = catalog_with_embeddings();
    // Hits both keyword and semantic sides
    let both = remember(&catalog.storage, "database connection pool sizing");
    // Shares no tokens with the query; semantic-only at best
    remember(&catalog.storage, "window resize jitter fix");

    let outcome = catalog
        .storage
        .recall(
            "database pool",
            SearchMode::Hybrid,
            &MemoryFilter::default(),
            None,
            0,
        )
        .unwrap();
    assert!(!outcome.results.is_empty());
    assert_eq!(outcome.results[0].memory.id, both);
}

#[test]
fn pagination_slices_are_disjoint_and_contiguous() {
    let catalog = catalog_without_embeddings();
    for i in 0..9 {
        remember(&catalog.storage, &format!("pagination subject {i}"));
    }

    let mut paged: Vec<String> = Vec::new();
    for page in 0..3 {
        let outcome = catalog
            .storage
            .recall(
                "pagination",
                SearchMode::Keyword,
                &MemoryFilter::default(),
                Some(3),
                page * 3,
            )
            .unwrap();
        assert_eq!(outcome.results.len(), 3);
        paged.extend(outcome.results.iter().map(|h| h.memory.id.clone()));
    }

    let whole = catalog
        .storage
        .recall(
            "pagination",
            SearchMode::Keyword,
            &MemoryFilter::default(),
            Some(20),
            0,
        )
        .unwrap();
    let direct: Vec<String> = whole.results.iter().map(|h| h.memory.id.clone()).collect();
    assert_eq!(paged, direct);
}

#[test]
fn importance_filter_bounds() {
    let catalog = catalog_without_embeddings();
    for (content, importance) in [("minor detail note", 10), ("critical outage note", 95)] {
        catalog
            .storage
            .create_memory(RememberInput {
                content: content.to_string(),
                importance: Some(importance),
                ..Default::default()
            })
            .unwrap();
    }

    let filter = MemoryFilter {
        min_importance: Some(50),
        ..Default::default()
    };
    let outcome = catalog
        .storage
        .recall("note", SearchMode::Keyword, &filter, None, 0)
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].memory.importance_score, 95);
}

#[test]
fn update_reembeds_changed_content() {
    let catalog = catalog_with_embeddings();
    let id = remember(&catalog.storage, "original topic about caching layers");

    catalog
        .storage
        .update_memory(
            &id,
            MemoryPatch {
                content: Some("entirely different subject concerning websocket reconnects".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let outcome = catalog
        .storage
        .recall(
            "websocket reconnect",
            SearchMode::Semantic,
            &MemoryFilter::default(),
            None,
            0,
        )
        .unwrap();
    assert!(outcome.results.iter().any(|h| h.memory.id == id));
}

#[test]
fn links_survive_archiving_but_not_forgetting() {
    let catalog = catalog_without_embeddings();
    let a = remember(&catalog.storage, "link endpoint a");
    let b = remember(&catalog.storage, "link endpoint b");
    catalog
        .storage
        .link_memories(&a, &b, LinkKind::DependsOn)
        .unwrap();

    catalog
        .storage
        .update_memory(
            &a,
            MemoryPatch {
                status: Some(cortex_core::MemoryStatus::Archived),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(catalog.storage.links_of(&b).unwrap().len(), 1);

    catalog.storage.forget_memory(&a).unwrap();
    assert!(catalog.storage.links_of(&b).unwrap().is_empty());
}
