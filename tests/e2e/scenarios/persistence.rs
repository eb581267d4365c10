use crate::harness::{ListKind, Scenario, Slot, TestWorkspace};
use fragment_core::persist::{from_document, ReferencedRecord, SessionDocument};
use fragment_core::{
    Context, ContextFragment, ContextHistory, Fragment, FragmentError, FragmentId, ProjectPathFragment, SessionStore,
    UsageFragment,
};
use std::sync::Arc;

const APP: &str = "src/com/example/App.java";
const GREETER: &str = "src/com/example/Greeter.java";

#[test]
fn test_reload_preserves_sharing_across_turns() {
    Scenario::new("reload_preserves_sharing")
        .from_fixture("java_project")
        .add_editable("greeter", GREETER)
        .share("greeter", ListKind::Readonly)
        .add_task_log("turn1", "Greeter", "explain greet")
        .commit("Explain")
        .commit("Again")
        .save_and_reload()
        .assert_history_len(2)
        .assert_same((0, Slot::Editable(0)), (0, Slot::Readonly(0)))
        .assert_same((0, Slot::Editable(0)), (1, Slot::Editable(0)))
        .assert_same((0, Slot::TaskLog(0)), (1, Slot::ParsedOutput))
        .assert_frozen(1, Slot::Readonly(0))
        .assert_interned(1)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_reload_keeps_captured_content() {
    Scenario::new("reload_keeps_captured_content")
        .from_fixture("java_project")
        .add_editable("app", APP)
        .commit("Before")
        .edit_file(APP, b"class App { /* rewritten */ }")
        .commit("After")
        .save_and_reload()
        .edit_file(APP, b"class App { /* third */ }")
        .assert_text(0, Slot::Editable(0), include_str!("../../fixtures/java_project/src/com/example/App.java"))
        .assert_text(1, Slot::Editable(0), "class App { /* rewritten */ }")
        .assert_distinct((0, Slot::Editable(0)), (1, Slot::Editable(0)))
        .run()
        .unwrap();
}

#[test]
fn test_commit_after_reload_shares_pool() {
    Scenario::new("commit_after_reload_shares_pool")
        .from_fixture("java_project")
        .add_editable("greeter", GREETER)
        .commit("Before save")
        .save_and_reload()
        .commit("After load")
        .assert_history_len(2)
        .assert_interned(1)
        .run()
        .unwrap();
}

#[test]
fn test_live_fragments_advance_id_allocator_on_load() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let services = workspace.services();
    let app = ContextFragment::from(ProjectPathFragment::new(workspace.project_file(APP), &services)).shared();
    let usage = ContextFragment::from(UsageFragment::new("com.example.Greeter.greet", &services)).shared();
    let highest = match usage.id() {
        FragmentId::Dynamic(n) => n,
        other => panic!("unexpected id {}", other),
    };
    let mut history = ContextHistory::new();
    history.push(Context::new("live").with_editable(app.clone()).with_virtual(usage));
    let path = workspace.path().join("live.ctx");
    let store = SessionStore::new(services.config());
    store.save(&path, &history, &services).unwrap();

    let fresh = workspace.services();
    let loaded = store.load(&path, &fresh).unwrap();

    assert_eq!(loaded.contexts()[0].editable[0].id(), app.id());
    assert!(fresh.ids().current_watermark() > highest);
    assert!(matches!(fresh.ids().next_dynamic_id(), FragmentId::Dynamic(n) if n > highest));
}

#[test]
fn test_hand_written_document_resolves_one_fragment_per_id() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let json = format!(
        r#"{{
            "version": 1,
            "fragments": {{
                "referenced": {{
                    "7": {{ "type": "project_file", "id": "7", "repo_root": {root}, "rel_path": "{app}" }}
                }},
                "task": {{
                    "{hash}": {{ "id": "{hash}", "session_name": "Greeter", "messages": [
                        {{ "role": "user", "content": "what does App do?" }},
                        {{ "role": "ai", "content": "It greets the world." }}
                    ] }}
                }}
            }},
            "contexts": [
                {{ "editable": ["7"], "readonly": ["7"], "tasks": [{{ "sequence": 1, "log_id": "{hash}" }}],
                   "parsed_output_id": "{hash}", "action": "Ask" }},
                {{ "editable": ["7"], "action": "Again" }}
            ]
        }}"#,
        root = serde_json::to_string(&workspace.path().display().to_string()).unwrap(),
        app = APP,
        hash = task_hash(&workspace),
    );
    let doc: SessionDocument = serde_json::from_str(&json).unwrap();
    let services = workspace.services();

    let history = from_document(&doc, &services).unwrap();

    let first = &history.contexts()[0];
    let second = &history.contexts()[1];
    assert!(Arc::ptr_eq(&first.editable[0], &first.readonly[0]));
    assert!(Arc::ptr_eq(&first.editable[0], &second.editable[0]));
    assert!(Arc::ptr_eq(
        first.task_history[0].log_fragment().unwrap(),
        first.parsed_output.as_ref().unwrap()
    ));
    assert_eq!(first.editable[0].id(), FragmentId::Dynamic(7));
    assert_eq!(services.ids().next_dynamic_id(), FragmentId::Dynamic(8));
}

/// Content id of the conversation used by the hand-written document.
fn task_hash(workspace: &TestWorkspace) -> String {
    use fragment_core::{ChatMessage, TaskFragment};
    let task = TaskFragment::new(
        "Greeter",
        vec![
            ChatMessage::user("what does App do?"),
            ChatMessage::ai("It greets the world."),
        ],
        &workspace.services(),
    );
    task.id().to_string()
}

#[test]
fn test_tampered_session_fails_to_load() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let services = workspace.services();
    let live = Context::new("Add").with_editable(
        ContextFragment::from(ProjectPathFragment::new(workspace.project_file(APP), &services)).shared(),
    );
    let mut history = ContextHistory::new();
    history.commit(&live, &services).unwrap();
    let store = SessionStore::new(services.config());
    let path = workspace.path().join("tampered.ctx");
    store.save(&path, &history, &services).unwrap();

    let mut doc = store.read_document(&path).unwrap();
    for record in doc.fragments.referenced.values_mut() {
        if let ReferencedRecord::Frozen(frozen) = record {
            frozen.description = "Something else".to_string();
        }
    }
    store.write_document(&path, &doc).unwrap();

    let err = store.load(&path, &workspace.services()).unwrap_err();
    assert!(matches!(err, FragmentError::ContentHashMismatch { .. }));
}

#[test]
fn test_session_file_survives_missing_source_files() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let services = workspace.services();
    let live = Context::new("Add").with_editable(
        ContextFragment::from(ProjectPathFragment::new(workspace.project_file(GREETER), &services)).shared(),
    );
    let mut history = ContextHistory::new();
    history.commit(&live, &services).unwrap();
    let store = SessionStore::new(services.config());
    let path = workspace.path().join("session.ctx");
    store.save(&path, &history, &services).unwrap();
    workspace.remove_file(GREETER).unwrap();

    let loaded = store.load(&path, &workspace.services()).unwrap();

    let text = loaded.contexts()[0].editable[0].text().unwrap();
    assert!(text.contains("public void greet"));
}
