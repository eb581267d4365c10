use crate::harness::{FakeAnalyzer, TestWorkspace};
use fragment_core::{
    freeze, syntax, unfreeze, CallDirection, CallGraphFragment, CodeUnitKind, ContextFragment, ContextServices,
    Fragment, FragmentError, FragmentId, FragmentKind, ProjectPathFragment, StringFragment, TaskFragment,
    UsageFragment, ChatMessage,
};
use std::sync::Arc;

const GREETER: &str = "src/com/example/Greeter.java";
const APP: &str = "src/com/example/App.java";

fn analyzed(workspace: &TestWorkspace) -> ContextServices {
    let analyzer = FakeAnalyzer::new(workspace.path())
        .with_class(GREETER, "com.example", "Greeter", "public class Greeter {}")
        .with_class(APP, "com.example", "App", "public class App {}");
    let app_main = analyzer.unit(APP, "com.example", "App.main", CodeUnitKind::Function);
    let greet = analyzer.unit(GREETER, "com.example", "Greeter.greet", CodeUnitKind::Function);
    let analyzer = analyzer
        .with_usage("com.example.Greeter.greet", app_main.clone(), "new Greeter().greet(\"world\");")
        .with_call("com.example.App.main", greet, "        new Greeter().greet(\"world\");");
    workspace.services().with_analyzer(Arc::new(analyzer))
}

#[test]
fn test_unfreezing_a_string_snapshot_is_unsupported() {
    let workspace = TestWorkspace::empty().unwrap();
    let services = workspace.services();
    let note = ContextFragment::from(StringFragment::new("remember this", "Reminder", syntax::NONE, &services));
    let snapshot = ContextFragment::Frozen(freeze(&note, &services).unwrap()).shared();

    let err = unfreeze(&snapshot, &services).unwrap_err();

    assert!(matches!(err, FragmentError::UnsupportedReconstruction(FragmentKind::String)));
}

#[test]
fn test_unfreezing_task_snapshot_is_unsupported() {
    let workspace = TestWorkspace::empty().unwrap();
    let services = workspace.services();
    let task = ContextFragment::from(TaskFragment::new("S", vec![ChatMessage::user("hi")], &services));
    let snapshot = ContextFragment::Frozen(freeze(&task, &services).unwrap()).shared();

    let err = unfreeze(&snapshot, &services).unwrap_err();

    assert!(matches!(err, FragmentError::UnsupportedReconstruction(FragmentKind::Task)));
}

#[test]
fn test_unfrozen_path_reads_current_content() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let services = workspace.services();
    let live = ContextFragment::from(ProjectPathFragment::new(workspace.project_file(APP), &services));
    let snapshot = ContextFragment::Frozen(freeze(&live, &services).unwrap()).shared();
    workspace.write_file(APP, b"class App { int v2; }").unwrap();

    let restored = unfreeze(&snapshot, &services).unwrap();

    assert_eq!(restored.kind(), FragmentKind::ProjectPath);
    assert!(restored.is_dynamic());
    assert_eq!(restored.text().unwrap(), "class App { int v2; }");
    assert_ne!(snapshot.text().unwrap(), restored.text().unwrap());
    match (live.id(), restored.id()) {
        (FragmentId::Dynamic(old), FragmentId::Dynamic(new)) => assert!(new > old),
        other => panic!("unexpected ids {:?}", other),
    }
}

#[test]
fn test_unfreezing_live_fragment_is_identity() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let services = workspace.services();
    let live = ContextFragment::from(ProjectPathFragment::new(workspace.project_file(APP), &services)).shared();

    let same = unfreeze(&live, &services).unwrap();

    assert!(Arc::ptr_eq(&same, &live));
}

#[test]
fn test_usage_roundtrips_through_snapshot() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let services = analyzed(&workspace);
    let usage = ContextFragment::from(UsageFragment::new("com.example.Greeter.greet", &services));
    let snapshot = ContextFragment::Frozen(freeze(&usage, &services).unwrap()).shared();

    let restored = unfreeze(&snapshot, &services).unwrap();

    assert_eq!(restored.kind(), FragmentKind::Usage);
    assert_eq!(restored.description(), usage.description());
    assert_eq!(restored.text().unwrap(), usage.text().unwrap());
    assert_eq!(restored.files(), snapshot.files());
}

#[test]
fn test_call_graph_roundtrips_through_snapshot() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let services = analyzed(&workspace);
    let graph = ContextFragment::from(CallGraphFragment::new(
        "com.example.App.main",
        2,
        CallDirection::Callees,
        &services,
    ));
    let snapshot = ContextFragment::Frozen(freeze(&graph, &services).unwrap()).shared();

    let restored = unfreeze(&snapshot, &services).unwrap();

    let ContextFragment::CallGraph(restored_graph) = restored.as_ref() else {
        panic!("expected a call graph, got {:?}", restored.kind());
    };
    assert_eq!(restored_graph.depth(), 2);
    assert_eq!(restored_graph.direction(), CallDirection::Callees);
    assert_eq!(restored.text().unwrap(), graph.text().unwrap());
    assert!(restored.text().unwrap().contains("Greeter.greet"));
}

#[test]
fn test_reset_forgets_snapshots() {
    let workspace = TestWorkspace::from_fixture("java_project").unwrap();
    let services = workspace.services();
    let live = ContextFragment::from(ProjectPathFragment::new(workspace.project_file(GREETER), &services));
    let before = freeze(&live, &services).unwrap();

    services.reset();
    assert!(services.interner().is_empty());
    let after = freeze(&live, &services).unwrap();

    assert_eq!(before.content_hash(), after.content_hash());
    assert!(!Arc::ptr_eq(&before, &after));
}
