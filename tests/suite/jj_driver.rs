//! The real `JjDriver` against a scripted `jj` that prints what jj prints.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jjgate_tools::{
    Admission, Gatekeeper, JjDriver, ToolCtx, ToolRegistry, VcsConfig, VcsSettings,
    register_builtins,
};
use jjgate_types::{GateState, SessionId};
use serde_json::json;

/// A tiny jj: the description and changed files live in plain files under
/// the repository directory; `jj new` resets both.
const SCRIPTED_JJ: &str = r#"#!/bin/sh
state='@STATE@'
shift 2
case "$*" in
  "root") echo "$state" ;;
  "log -r @ --no-graph -T description") cat "$state/description" 2>/dev/null || true ;;
  "log -r @ --no-graph -T change_id.short()") echo qpvuntsm ;;
  "diff --stat")
    if [ -s "$state/files" ]; then
      sed 's/$/ | 1 +/' "$state/files"
      echo "1 file changed, 1 insertion(+), 0 deletions(-)"
    else
      echo "0 files changed, 0 insertions(+), 0 deletions(-)"
    fi ;;
  "diff --name-only") cat "$state/files" 2>/dev/null || true ;;
  "status") echo "The working copy has no changes." ;;
  "git fetch --remote origin") ;;
  new\ *)
    : > "$state/files"
    case "$3" in
      --message=*) printf '%s\n' "${3#--message=}" > "$state/description" ;;
      *) : > "$state/description" ;;
    esac ;;
  *) echo "Error: unexpected arguments: $*" >&2; exit 1 ;;
esac
"#;

/// Answers `jj root`, then hangs on everything else.
const HANGING_JJ: &str = r#"#!/bin/sh
shift 2
if [ "$1" = root ]; then echo '@STATE@'; exit 0; fi
sleep 30
"#;

fn install(dir: &Path, script: &str, timeout_ms: u64) -> Arc<Gatekeeper> {
    let path = dir.join("jj");
    std::fs::write(&path, script.replace("@STATE@", &dir.display().to_string())).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    let settings = VcsSettings::from_config(&VcsConfig {
        binary: Some(path.display().to_string()),
        timeout_ms: Some(timeout_ms),
        working_dir: Some(dir.to_path_buf()),
        ..VcsConfig::default()
    });
    Arc::new(Gatekeeper::new(
        Arc::new(JjDriver::new(settings.clone())),
        settings,
    ))
}

#[tokio::test]
async fn clean_repository_starts_locked_and_denies() {
    let dir = tempfile::tempdir().unwrap();
    let gate = install(dir.path(), SCRIPTED_JJ, 5_000);
    let id = SessionId::new("ses_a");

    assert_eq!(
        gate.on_session_created(id.clone(), None).await,
        GateState::locked()
    );
    assert!(gate.check_tool(&id, "write").await.is_err());
    assert_eq!(gate.probe().diff_summary().await, "");
}

#[tokio::test]
async fn edited_files_unlock_on_recheck() {
    let dir = tempfile::tempdir().unwrap();
    let gate = install(dir.path(), SCRIPTED_JJ, 5_000);
    let id = SessionId::new("ses_a");
    gate.on_session_created(id.clone(), None).await;

    std::fs::write(dir.path().join("files"), "src/lib.rs\n").unwrap();
    assert_eq!(gate.check_tool(&id, "edit").await.unwrap(), Admission::Reconciled);
    assert!(
        gate.probe()
            .diff_summary()
            .await
            .contains("src/lib.rs | 1 +")
    );
}

#[tokio::test]
async fn intent_tool_describes_new_change_through_jj() {
    let dir = tempfile::tempdir().unwrap();
    let gate = install(dir.path(), SCRIPTED_JJ, 5_000);
    let mut tools = ToolRegistry::default();
    register_builtins(&mut tools, &gate).unwrap();
    let id = SessionId::new("ses_a");
    gate.on_session_created(id.clone(), None).await;

    let mut ctx = ToolCtx::new(id.clone());
    let out = tools
        .execute("jj", json!({"description": "-- fix the parser"}), &mut ctx)
        .await
        .unwrap();
    assert!(out.contains("Checkpoint qpvuntsm created on main@origin"), "{out}");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("description")).unwrap(),
        "-- fix the parser\n"
    );
    assert_eq!(gate.check_tool(&id, "write").await.unwrap(), Admission::Unlocked);
}

#[tokio::test]
async fn hanging_jj_fails_closed_within_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let gate = install(dir.path(), HANGING_JJ, 200);
    let id = SessionId::new("ses_a");

    let started = Instant::now();
    assert_eq!(
        gate.on_session_created(id.clone(), None).await,
        GateState::locked()
    );
    assert!(gate.check_tool(&id, "write").await.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}
