//! End-to-end gate flows: session lifecycle, gate checks, and intent.

use jjgate_tools::testing::{FakeDriver, FakeOp};
use jjgate_tools::{Admission, GateError};
use jjgate_types::{GateState, GatedTool, SessionId};
use serde_json::json;

use crate::common::Harness;

#[tokio::test]
async fn clean_repository_denies_every_gated_tool() {
    let h = Harness::new(FakeDriver::repo());
    assert_eq!(h.create("ses_a").await, GateState::locked());

    for tool in GatedTool::ALL {
        let err = h.check("ses_a", tool.as_str()).await.unwrap_err();
        let GateError::Locked { session, tool: denied } = &err;
        assert_eq!(session, &SessionId::new("ses_a"));
        assert_eq!(denied, &tool);
        assert!(err.to_string().contains("`jj` tool"), "{err}");
    }
    assert_eq!(h.state("ses_a").await, Some(GateState::locked()));
}

#[tokio::test]
async fn ungated_tools_always_pass_without_vcs_calls() {
    let h = Harness::new(FakeDriver::repo());
    h.create("ses_a").await;
    h.driver.clear_calls();

    for tool in ["read", "bash", "jj", "jj_push", "jj_status", "Write", "edit "] {
        assert_eq!(h.check("ses_a", tool).await.unwrap(), Admission::Ungated);
    }
    assert!(h.driver.calls().is_empty());
}

#[tokio::test]
async fn intent_unlocks_and_next_check_needs_no_vcs() {
    let h = Harness::new(FakeDriver::repo());
    h.create("ses_a").await;
    assert!(h.check("ses_a", "write").await.is_err());

    let out = h
        .call("ses_a", "jj", json!({"description": "Add retry to upload"}))
        .await
        .unwrap();
    assert!(out.contains("unlocked"), "{out}");

    h.driver.clear_calls();
    for tool in GatedTool::ALL {
        assert_eq!(
            h.check("ses_a", tool.as_str()).await.unwrap(),
            Admission::Unlocked
        );
    }
    assert!(h.driver.calls().is_empty());
}

#[tokio::test]
async fn rejected_intent_keeps_session_locked() {
    let h = Harness::new(FakeDriver::repo());
    h.create("ses_a").await;

    for description in ["hi", "short one", "implementfeature", "          "] {
        let out = h
            .call("ses_a", "jj", json!({"description": description}))
            .await
            .unwrap();
        assert!(out.starts_with("Rejected:"), "{description:?}: {out}");
        assert!(h.check("ses_a", "edit").await.is_err());
    }
    assert!(h.driver.mutations().is_empty());
}

#[tokio::test]
async fn manual_checkpoint_is_honored_on_recheck() {
    let h = Harness::new(FakeDriver::repo());
    h.create("ses_a").await;
    assert!(h.check("ses_a", "write").await.is_err());

    // The user runs `jj describe` by hand.
    h.driver.set_description("Fix flaky upload test");
    assert_eq!(h.check("ses_a", "write").await.unwrap(), Admission::Reconciled);
    assert_eq!(h.state("ses_a").await, Some(GateState::unlocked()));
}

#[tokio::test]
async fn uncommitted_diff_alone_unlocks() {
    let h = Harness::new(FakeDriver::repo());
    h.create("ses_a").await;
    h.driver.set_diff("src/lib.rs | 2 +-", "src/lib.rs\n");
    assert_eq!(h.check("ses_a", "edit").await.unwrap(), Admission::Reconciled);
}

#[tokio::test]
async fn session_created_over_work_in_progress_starts_unlocked() {
    let h = Harness::new(FakeDriver::repo());
    h.driver.set_description("Half-finished refactor");
    assert_eq!(h.create("ses_a").await, GateState::unlocked());
}

#[tokio::test]
async fn not_a_repository_is_a_no_op_gate() {
    let h = Harness::new(FakeDriver::not_a_repo());
    assert_eq!(h.create("ses_a").await, GateState::unlocked());
    assert_eq!(h.check("ses_a", "write").await.unwrap(), Admission::Unlocked);
    assert_eq!(
        h.check("ses_unseen", "write").await.unwrap(),
        Admission::Reconciled
    );
}

#[tokio::test]
async fn child_inherits_unlocked_parent_in_clean_repository() {
    let h = Harness::new(FakeDriver::repo());
    h.create("ses_parent").await;
    h.call("ses_parent", "jj", json!({"description": "Add retry to upload"}))
        .await
        .unwrap();
    // The checkpoint description would unlock on its own; clear it so only
    // inheritance can explain the child's state.
    h.driver.set_description("");

    let child = h.create_child("ses_child", "ses_parent").await;
    assert_eq!(
        child,
        GateState::inherited_from(SessionId::new("ses_parent"))
    );
    assert_eq!(h.check("ses_child", "edit").await.unwrap(), Admission::Unlocked);
}

#[tokio::test]
async fn locked_parent_hint_falls_back_to_newest_unlocked_session() {
    let h = Harness::new(FakeDriver::repo());
    for id in ["ses_old", "ses_locked", "ses_new"] {
        h.create(id).await;
    }
    h.gate.unlock(&SessionId::new("ses_old")).await;
    h.gate.unlock(&SessionId::new("ses_new")).await;

    let child = h.create_child("ses_child", "ses_locked").await;
    assert_eq!(child.parent, Some(SessionId::new("ses_new")));
}

#[tokio::test]
async fn deleting_sessions_forgets_them() {
    let h = Harness::new(FakeDriver::repo());
    h.create("ses_parent").await;
    h.gate.unlock(&SessionId::new("ses_parent")).await;
    h.gate.on_session_deleted(&SessionId::new("ses_parent")).await;
    assert_eq!(h.state("ses_parent").await, None);

    // Nothing unlocked remains to inherit from.
    assert_eq!(h.create("ses_b").await, GateState::locked());
}

#[tokio::test]
async fn unknown_session_is_observed_and_recorded() {
    let h = Harness::new(FakeDriver::repo());
    assert!(h.check("ses_late", "write").await.is_err());
    assert_eq!(h.state("ses_late").await, Some(GateState::locked()));

    // An unlocked peer does not leak into a session created before we started.
    h.create("ses_peer").await;
    h.gate.unlock(&SessionId::new("ses_peer")).await;
    assert!(h.check("ses_other_late", "write").await.is_err());
}

#[tokio::test]
async fn probe_failures_deny_rather_than_allow() {
    let h = Harness::impatient(FakeDriver::repo());
    h.create("ses_a").await;
    h.driver.fail(FakeOp::Description);
    h.driver.hang(FakeOp::DiffStat);
    assert!(h.check("ses_a", "write").await.is_err());
    assert_eq!(h.state("ses_a").await, Some(GateState::locked()));
}

#[tokio::test]
async fn failed_checkpoint_reports_manual_command() {
    let h = Harness::new(FakeDriver::repo());
    h.create("ses_a").await;
    h.driver.fail(FakeOp::NewChange);

    let err = h
        .call("ses_a", "jj", json!({"description": "Add retry to upload"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("jj new main -m"), "{err}");
    assert!(h.check("ses_a", "write").await.is_err());
}
