//! Session lifecycle journeys: implicit assignment, stop handling, explicit
//! bracketing, and the persisted state file.

use cortex_e2e_tests::harness::{catalog_without_embeddings, remember};
use cortex_core::{ActivityInput, Clock, EventType, SessionStateFile};
use serde_json::json;

fn tool_event(tool: &str) -> ActivityInput {
    ActivityInput {
        event_type: EventType::PreToolUse,
        tool_name: Some(tool.to_string()),
        tool_input: Some(json!({"file_path": "src/lib.rs"})),
        tool_output: None,
        success: true,
        error_message: None,
        duration_ms: None,
        file_path: None,
    }
}

fn stop_event() -> ActivityInput {
    ActivityInput {
        event_type: EventType::Stop,
        tool_name: None,
        tool_input: None,
        tool_output: None,
        success: true,
        error_message: None,
        duration_ms: None,
        file_path: None,
    }
}

#[test]
fn activities_create_and_close_sessions_implicitly() {
    let catalog = catalog_without_embeddings();

    // No current session: the first activity starts one
    let first = catalog.storage.log_activity(tool_event("Read")).unwrap();
    let s1 = first.session_id.clone().expect("session assigned");

    // Subsequent activities share it
    let second = catalog.storage.log_activity(tool_event("Edit")).unwrap();
    assert_eq!(second.session_id.as_deref(), Some(s1.as_str()));

    // Stop is recorded into the session, then closes it
    catalog.storage.log_activity(stop_event()).unwrap();
    assert!(catalog.storage.current_session().unwrap().is_none());

    let closed = catalog.storage.get_session(&s1).unwrap().unwrap();
    assert!(closed.ended_at.is_some());
    assert_eq!(closed.activity_count, 3);
    assert!(closed.summary.as_deref().unwrap().contains("3 activities"));

    // The next activity opens a different session
    let next = catalog.storage.log_activity(tool_event("Bash")).unwrap();
    assert_ne!(next.session_id.unwrap(), s1);
}

#[test]
fn state_file_tracks_the_current_session() {
    let catalog = catalog_without_embeddings();
    let state_file = SessionStateFile::for_project(catalog.dir.path());

    assert!(state_file.read().current_session_id.is_none());

    let activity = catalog.storage.log_activity(tool_event("Read")).unwrap();
    assert_eq!(
        state_file.read().current_session_id,
        activity.session_id
    );

    catalog.storage.log_activity(stop_event()).unwrap();
    assert!(state_file.read().current_session_id.is_none());
}

#[test]
fn stale_state_file_recovers() {
    let catalog = catalog_without_embeddings();
    let state_file = SessionStateFile::for_project(catalog.dir.path());

    // Point the cache at a session the catalog never had
    state_file
        .write(&cortex_core::SessionState {
            current_session_id: Some("ses-0000000000000-stale0".to_string()),
            started_at: Some(catalog.clock.now()),
        })
        .unwrap();

    let activity = catalog.storage.log_activity(tool_event("Read")).unwrap();
    let session_id = activity.session_id.unwrap();
    assert_ne!(session_id, "ses-0000000000000-stale0");
    assert_eq!(state_file.read().current_session_id.as_deref(), Some(session_id.as_str()));
}

#[test]
fn explicit_start_supersedes_current() {
    let catalog = catalog_without_embeddings();
    let implicit = catalog
        .storage
        .log_activity(tool_event("Read"))
        .unwrap()
        .session_id
        .unwrap();

    let explicit = catalog.storage.start_session(None).unwrap();
    assert_ne!(explicit.id, implicit);

    let old = catalog.storage.get_session(&implicit).unwrap().unwrap();
    assert!(old.ended_at.is_some());

    // New activities land in the explicit session
    let activity = catalog.storage.log_activity(tool_event("Grep")).unwrap();
    assert_eq!(activity.session_id.as_deref(), Some(explicit.id.as_str()));
}

#[test]
fn session_context_reports_current_state() {
    let catalog = catalog_without_embeddings();
    remember(&catalog.storage, "relevant background");
    catalog.storage.log_activity(tool_event("Read")).unwrap();

    let context = catalog.storage.session_context().unwrap();
    let current = context.current_session.expect("session open");
    assert!(current.ended_at.is_none());
    assert_eq!(context.recent_activities.len(), 1);
    assert_eq!(context.recent_memories.len(), 1);
    assert_eq!(context.stats.total_sessions, 1);
}

#[test]
fn ended_sessions_keep_their_activities() {
    let catalog = catalog_without_embeddings();
    catalog.storage.log_activity(tool_event("Read")).unwrap();
    catalog.storage.log_activity(stop_event()).unwrap();
    catalog.storage.log_activity(tool_event("Edit")).unwrap();

    let activities = catalog
        .storage
        .get_activities(&Default::default(), None, 0)
        .unwrap();
    assert_eq!(activities.len(), 3);
    // Every activity still references an existing session
    for activity in &activities {
        let session_id = activity.session_id.as_ref().expect("assigned");
        assert!(catalog.storage.get_session(session_id).unwrap().is_some());
    }
}
