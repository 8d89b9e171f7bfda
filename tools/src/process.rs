//! Subprocess cleanup for jj invocations.

/// RAII guard that kills a child process (and its process group on Unix) on drop.
///
/// Wrap a spawned `tokio::process::Child` immediately after `spawn()` so a
/// cancelled or timed-out probe never leaves a stray `jj` behind. Call
/// `disarm()` once the process has exited normally.
pub struct ChildGuard {
    child: Option<tokio::process::Child>,
}

impl ChildGuard {
    #[must_use]
    pub fn new(child: tokio::process::Child) -> Self {
        Self { child: Some(child) }
    }

    pub fn child_mut(&mut self) -> Option<&mut tokio::process::Child> {
        self.child.as_mut()
    }

    pub fn disarm(&mut self) {
        self.child = None;
    }

    /// Send SIGKILL to the child's process group (Unix) or the child itself.
    ///
    /// Must run before the child is reaped: once `wait` returns, the pid is
    /// gone and the rest of the group can no longer be addressed.
    pub fn kill_tree(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                // SAFETY: killpg has no memory-safety preconditions.
                let rc = unsafe { libc::killpg(pid as i32, libc::SIGKILL) };
                if rc == 0 {
                    return;
                }
            }
        }
        let _ = child.start_kill();
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill_tree();
        if let Some(child) = self.child.as_mut() {
            let _ = child.try_wait();
        }
    }
}

/// Put the child process in its own process group (Unix only) so the whole
/// group can be killed via `killpg` in `ChildGuard::drop`.
#[cfg(unix)]
pub fn set_new_process_group(cmd: &mut tokio::process::Command) {
    cmd.process_group(0);
}
