use crate::harness::{ListKind, Scenario, Slot};
use anyhow::{ensure, Context};
use fragment_core::Fragment;
use std::sync::Arc;

const APP: &str = "src/com/example/App.java";
const GREETER: &str = "src/com/example/Greeter.java";
const APP_SOURCE: &str = include_str!("../../fixtures/java_project/src/com/example/App.java");

#[test]
fn test_commit_freezes_file_content() {
    Scenario::new("commit_freezes_file_content")
        .from_fixture("java_project")
        .add_editable("app", APP)
        .commit("Add App")
        .edit_file(APP, b"class App {}")
        .commit("Edit App")
        .assert_history_len(2)
        .assert_frozen(0, Slot::Editable(0))
        .assert_text(0, Slot::Editable(0), APP_SOURCE)
        .assert_text(1, Slot::Editable(0), "class App {}")
        .assert_action(1, "Edit App")
        .assert_interned(2)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_unchanged_file_reuses_snapshot() {
    Scenario::new("unchanged_file_reuses_snapshot")
        .from_fixture("java_project")
        .add_editable("greeter", GREETER)
        .commit("First")
        .commit("Second")
        .assert_interned(1)
        .assert_custom(|history, _| {
            let first = history.contexts()[0].editable[0].as_frozen().context("first not frozen")?;
            let second = history.contexts()[1].editable[0].as_frozen().context("second not frozen")?;
            ensure!(Arc::ptr_eq(first, second), "equal content produced two snapshots");
            Ok(())
        })
        .run()
        .unwrap();
}

#[test]
fn test_missing_file_is_dropped_from_commit() {
    Scenario::new("missing_file_is_dropped")
        .from_fixture("java_project")
        .add_editable("app", APP)
        .add_editable("ghost", "src/com/example/Ghost.java")
        .commit("Add files")
        .assert_list_len(0, ListKind::Editable, 1)
        .assert_text(0, Slot::Editable(0), APP_SOURCE)
        .run()
        .unwrap();
}

#[test]
fn test_file_deleted_between_commits() {
    Scenario::new("file_deleted_between_commits")
        .from_fixture("java_project")
        .add_editable("app", APP)
        .add_readonly("greeter", GREETER)
        .commit("Both")
        .delete_file(GREETER)
        .commit("Greeter gone")
        .assert_list_len(0, ListKind::Readonly, 1)
        .assert_list_len(1, ListKind::Readonly, 0)
        .assert_list_len(1, ListKind::Editable, 1)
        .run()
        .unwrap();
}

#[test]
fn test_shared_fragment_stays_shared() {
    Scenario::new("shared_fragment_stays_shared")
        .from_fixture("java_project")
        .add_editable("greeter", GREETER)
        .share("greeter", ListKind::Readonly)
        .commit("Shared")
        .assert_same((0, Slot::Editable(0)), (0, Slot::Readonly(0)))
        .run()
        .unwrap();
}

#[test]
fn test_task_logs_stay_live() {
    Scenario::new("task_logs_stay_live")
        .from_fixture("java_project")
        .add_note("note", "Plan", "Rename greet to welcome")
        .add_task_log("turn1", "Rename", "rename greet")
        .commit("Rename")
        .assert_live(0, Slot::TaskLog(0))
        .assert_live(0, Slot::Virtual(0))
        .assert_same((0, Slot::TaskLog(0)), (0, Slot::ParsedOutput))
        .run()
        .unwrap();
}

#[test]
fn test_compressed_entries_are_kept() {
    Scenario::new("compressed_entries_are_kept")
        .from_fixture("java_project")
        .add_summary("Earlier work on the greeter")
        .add_task_log("turn2", "Greeter", "add a farewell")
        .commit("Farewell")
        .assert_custom(|history, _| {
            let ctx = &history.contexts()[0];
            ensure!(ctx.task_history.len() == 2, "expected two task entries");
            ensure!(ctx.task_history[0].summary() == Some("Earlier work on the greeter"));
            ensure!(ctx.task_history[1].log_fragment().is_some());
            Ok(())
        })
        .run()
        .unwrap();
}

#[test]
fn test_analysis_results_are_captured_at_commit() {
    Scenario::new("analysis_results_are_captured")
        .from_fixture("java_project")
        .with_analyzer(|a| {
            a.with_class(
                GREETER,
                "com.example",
                "Greeter",
                "public class Greeter {\n  public void greet(String name) {...}\n}",
            )
        })
        .add_skeleton("skeleton", "com.example.Greeter")
        .commit("Summarize")
        .analyzer_ready(false)
        .commit("Analyzer restarting")
        .assert_frozen(0, Slot::Virtual(0))
        .assert_custom(|history, _| {
            let ready = history.contexts()[0].virtuals[0].text()?;
            let pending = history.contexts()[1].virtuals[0].text()?;
            ensure!(ready.starts_with("package com.example;"), "got {:?}", ready);
            ensure!(ready.contains("public void greet"), "got {:?}", ready);
            ensure!(pending.contains("not ready"), "got {:?}", pending);
            Ok(())
        })
        .run()
        .unwrap();
}

#[test]
fn test_drop_fragment_between_commits() {
    Scenario::new("drop_fragment_between_commits")
        .from_fixture("java_project")
        .add_editable("app", APP)
        .add_editable("greeter", GREETER)
        .commit("Both")
        .drop_fragment("app")
        .commit("Only greeter")
        .assert_list_len(0, ListKind::Editable, 2)
        .assert_list_len(1, ListKind::Editable, 1)
        .assert_custom(|history, _| {
            let description = history.contexts()[1].editable[0].description();
            ensure!(description.starts_with("Greeter.java"), "got {:?}", description);
            Ok(())
        })
        .run()
        .unwrap();
}

#[test]
fn test_assertion_failure_is_reported() {
    Scenario::new("assertion_failure_is_reported")
        .from_fixture("java_project")
        .add_editable("app", APP)
        .commit("One")
        .assert_history_len(2)
        .run()
        .expect_failure("expected 2 contexts");
}
