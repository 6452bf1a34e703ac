//! Freshness journeys driven by a pinned, advanceable clock.

use cortex_e2e_tests::harness::{catalog_without_embeddings, remember};
use cortex_core::{
    Freshness, MemoryFilter, MemoryPatch, MemoryStatus, SearchMode, SortBy, SortOrder,
};

#[test]
fn unaccessed_memory_ages_into_outdated() {
    let catalog = catalog_without_embeddings();
    let old = remember(&catalog.storage, "forgotten lore about build caching");

    catalog.clock.advance(chrono::Duration::days(100));

    // Review surfaces it as outdated
    let review = catalog.storage.review_memories().unwrap();
    let entry = review
        .iter()
        .find(|item| item.linked.memory.id == old)
        .expect("aged memory is up for review");
    assert_eq!(entry.classification, Freshness::Outdated);

    // The default listing hides it
    let listed = catalog
        .storage
        .list_memories(
            &MemoryFilter::default(),
            SortBy::CreatedAt,
            SortOrder::Desc,
            None,
            0,
        )
        .unwrap();
    assert!(listed.iter().all(|m| m.id != old));

    // An explicit status filter surfaces it again
    let filter = MemoryFilter {
        status: Some(vec![MemoryStatus::Fresh, MemoryStatus::Outdated]),
        ..Default::default()
    };
    let outcome = catalog
        .storage
        .recall("caching", SearchMode::Keyword, &filter, None, 0)
        .unwrap();
    assert!(outcome.results.iter().any(|h| h.memory.id == old));
}

#[test]
fn accessed_memory_stays_fresh() {
    let catalog = catalog_without_embeddings();
    let id = remember(&catalog.storage, "regularly consulted checklist");

    // Touch it every three weeks for twelve weeks
    for _ in 0..4 {
        catalog.clock.advance(chrono::Duration::days(21));
        catalog.storage.get_memory(&id).unwrap();
    }

    let review = catalog.storage.review_memories().unwrap();
    assert!(review.iter().all(|item| item.linked.memory.id != id));
}

#[test]
fn middle_window_is_needs_review() {
    let catalog = catalog_without_embeddings();
    let id = remember(&catalog.storage, "aging design note");
    catalog.storage.get_memory(&id).unwrap();

    catalog.clock.advance(chrono::Duration::days(45));
    let review = catalog.storage.review_memories().unwrap();
    let entry = review
        .iter()
        .find(|item| item.linked.memory.id == id)
        .expect("45-day-old memory needs review");
    assert_eq!(entry.classification, Freshness::NeedsReview);
}

#[test]
fn explicit_marks_override_recency() {
    let catalog = catalog_without_embeddings();
    let id = remember(&catalog.storage, "just written but already doubted");
    catalog
        .storage
        .update_memory(
            &id,
            MemoryPatch {
                status: Some(MemoryStatus::NeedsReview),
                ..Default::default()
            },
        )
        .unwrap();

    let review = catalog.storage.review_memories().unwrap();
    let entry = review
        .iter()
        .find(|item| item.linked.memory.id == id)
        .expect("explicitly marked memory is up for review");
    assert_eq!(entry.classification, Freshness::NeedsReview);
}

#[test]
fn archived_memories_never_enter_the_review_queue() {
    let catalog = catalog_without_embeddings();
    let id = remember(&catalog.storage, "retired approach");
    catalog
        .storage
        .update_memory(
            &id,
            MemoryPatch {
                status: Some(MemoryStatus::Archived),
                ..Default::default()
            },
        )
        .unwrap();

    catalog.clock.advance(chrono::Duration::days(365));
    let review = catalog.storage.review_memories().unwrap();
    assert!(review.iter().all(|item| item.linked.memory.id != id));
}
