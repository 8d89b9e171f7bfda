//! Scriptable in-memory [`VcsDriver`] for tests.
//!
//! Models just enough of a jj repository for the gate: a working-copy change
//! with a description and a diff, a set of bookmarks, and refs that can be
//! made unavailable. Every operation is recorded in a call log and can be
//! forced to fail or hang.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::vcs::{VcsDriver, VcsError, VcsFut};

/// What `jj diff --stat` prints for a change with no modifications.
pub const CLEAN_DIFF_STAT: &str = "0 files changed, 0 insertions(+), 0 deletions(-)\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Root,
    Description,
    DiffStat,
    DiffNameOnly,
    Status,
    Fetch,
    NewChange,
    ShortId,
    BookmarkMove,
    BookmarkCreate,
    Push,
}

impl FakeOp {
    fn label(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Description => "description",
            Self::DiffStat => "diff_stat",
            Self::DiffNameOnly => "diff_name_only",
            Self::Status => "status",
            Self::Fetch => "fetch",
            Self::NewChange => "new",
            Self::ShortId => "short_id",
            Self::BookmarkMove => "bookmark_move",
            Self::BookmarkCreate => "bookmark_create",
            Self::Push => "push",
        }
    }
}

#[derive(Debug, Default)]
struct FakeRepo {
    is_repo: bool,
    description: String,
    diff_stat: String,
    name_only: String,
    changes_created: u32,
    bookmarks: BTreeSet<String>,
    unavailable_refs: HashSet<String>,
    failing: HashSet<FakeOp>,
    hanging: HashSet<FakeOp>,
    pushed: Vec<String>,
    calls: Vec<String>,
}

impl FakeRepo {
    fn change_id(&self) -> String {
        format!("zzzz{:04}", self.changes_created)
    }
}

enum Step {
    Hang,
    Fail(VcsError),
    Proceed,
}

#[derive(Debug, Default)]
pub struct FakeDriver {
    repo: Mutex<FakeRepo>,
}

impl FakeDriver {
    /// A clean repository: no description, no diff, no bookmarks.
    #[must_use]
    pub fn repo() -> Self {
        let driver = Self::default();
        driver.lock().is_repo = true;
        driver
    }

    /// A directory that is not a repository; every operation fails.
    #[must_use]
    pub fn not_a_repo() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeRepo> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_description(&self, description: &str) {
        self.lock().description = description.to_string();
    }

    pub fn set_diff(&self, stat: &str, name_only: &str) {
        let mut repo = self.lock();
        repo.diff_stat = stat.to_string();
        repo.name_only = name_only.to_string();
    }

    pub fn add_bookmark(&self, name: &str) {
        self.lock().bookmarks.insert(name.to_string());
    }

    /// Make `new_change` fail for this base ref.
    pub fn make_ref_unavailable(&self, name: &str) {
        self.lock().unavailable_refs.insert(name.to_string());
    }

    pub fn fail(&self, op: FakeOp) {
        self.lock().failing.insert(op);
    }

    pub fn recover(&self, op: FakeOp) {
        let mut repo = self.lock();
        repo.failing.remove(&op);
        repo.hanging.remove(&op);
    }

    pub fn hang(&self, op: FakeOp) {
        self.lock().hanging.insert(op);
    }

    #[must_use]
    pub fn description(&self) -> String {
        self.lock().description.clone()
    }

    #[must_use]
    pub fn bookmarks(&self) -> Vec<String> {
        self.lock().bookmarks.iter().cloned().collect()
    }

    #[must_use]
    pub fn pushed(&self) -> Vec<String> {
        self.lock().pushed.clone()
    }

    /// Recorded operations, e.g. `"new main@origin"` or `"description"`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Mutating operations recorded so far.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| {
                ["fetch", "new", "bookmark_move", "bookmark_create", "push"]
                    .iter()
                    .any(|op| call == op || call.starts_with(&format!("{op} ")))
            })
            .collect()
    }

    fn begin(&self, op: FakeOp, detail: &str) -> Step {
        let mut repo = self.lock();
        let call = if detail.is_empty() {
            op.label().to_string()
        } else {
            format!("{} {detail}", op.label())
        };
        repo.calls.push(call.clone());
        if repo.hanging.contains(&op) {
            return Step::Hang;
        }
        if !repo.is_repo || repo.failing.contains(&op) {
            return Step::Fail(VcsError::Failed {
                command: format!("jj {call}"),
                status: "exit 1".to_string(),
                stderr: if repo.is_repo {
                    "Error: simulated failure".to_string()
                } else {
                    "Error: There is no jj repo in \".\"".to_string()
                },
            });
        }
        Step::Proceed
    }

    fn read(&self, op: FakeOp, get: fn(&FakeRepo) -> String) -> VcsFut<'_, String> {
        let step = self.begin(op, "");
        let value = get(&*self.lock());
        Box::pin(async move {
            match step {
                Step::Hang => std::future::pending().await,
                Step::Fail(err) => Err(err),
                Step::Proceed => Ok(value),
            }
        })
    }

    fn write<'a>(
        &'a self,
        op: FakeOp,
        detail: &str,
        apply: impl FnOnce(&mut FakeRepo) -> Result<(), VcsError>,
    ) -> VcsFut<'a, ()> {
        let step = self.begin(op, detail);
        let outcome = match step {
            Step::Hang => None,
            Step::Fail(err) => Some(Err(err)),
            Step::Proceed => Some(apply(&mut *self.lock())),
        };
        Box::pin(async move {
            match outcome {
                None => std::future::pending().await,
                Some(result) => result,
            }
        })
    }
}

fn rejected(command: String, stderr: &str) -> VcsError {
    VcsError::Failed {
        command,
        status: "exit 1".to_string(),
        stderr: stderr.to_string(),
    }
}

impl VcsDriver for FakeDriver {
    fn root(&self) -> VcsFut<'_, String> {
        self.read(FakeOp::Root, |_| "/repo\n".to_string())
    }

    fn current_description(&self) -> VcsFut<'_, String> {
        self.read(FakeOp::Description, |repo| repo.description.clone())
    }

    fn diff_stat(&self) -> VcsFut<'_, String> {
        self.read(FakeOp::DiffStat, |repo| {
            if repo.diff_stat.trim().is_empty() {
                CLEAN_DIFF_STAT.to_string()
            } else {
                repo.diff_stat.clone()
            }
        })
    }

    fn diff_name_only(&self) -> VcsFut<'_, String> {
        self.read(FakeOp::DiffNameOnly, |repo| repo.name_only.clone())
    }

    fn status(&self) -> VcsFut<'_, String> {
        self.read(FakeOp::Status, |repo| {
            if repo.diff_stat.trim().is_empty() {
                "The working copy has no changes.\n".to_string()
            } else {
                format!("Working copy changes:\n{}", repo.name_only)
            }
        })
    }

    fn fetch(&self) -> VcsFut<'_, ()> {
        self.write(FakeOp::Fetch, "", |_| Ok(()))
    }

    fn new_change<'a>(&'a self, base: &'a str, description: &'a str) -> VcsFut<'a, ()> {
        self.write(FakeOp::NewChange, base, |repo| {
            if repo.unavailable_refs.contains(base) {
                return Err(rejected(
                    format!("jj new {base}"),
                    &format!("Error: Revision `{base}` doesn't exist"),
                ));
            }
            repo.changes_created += 1;
            repo.description = description.to_string();
            repo.diff_stat.clear();
            repo.name_only.clear();
            Ok(())
        })
    }

    fn current_change_short_id(&self) -> VcsFut<'_, String> {
        self.read(FakeOp::ShortId, FakeRepo::change_id)
    }

    fn bookmark_move<'a>(&'a self, name: &'a str, target: &'a str) -> VcsFut<'a, ()> {
        self.write(FakeOp::BookmarkMove, name, |repo| {
            if repo.bookmarks.contains(name) {
                Ok(())
            } else {
                Err(rejected(
                    format!("jj bookmark move {name} --to {target}"),
                    &format!("Error: No such bookmark: {name}"),
                ))
            }
        })
    }

    fn bookmark_create<'a>(&'a self, name: &'a str, target: &'a str) -> VcsFut<'a, ()> {
        self.write(FakeOp::BookmarkCreate, name, |repo| {
            if repo.bookmarks.insert(name.to_string()) {
                Ok(())
            } else {
                Err(rejected(
                    format!("jj bookmark create {name} -r {target}"),
                    &format!("Error: Bookmark already exists: {name}"),
                ))
            }
        })
    }

    fn push<'a>(&'a self, bookmark: &'a str) -> VcsFut<'a, ()> {
        self.write(FakeOp::Push, bookmark, |repo| {
            repo.pushed.push(bookmark.to_string());
            Ok(())
        })
    }
}
