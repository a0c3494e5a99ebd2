//! Player process abstraction
//!
//! The engine only needs three things from a player: two readable output
//! streams and a way to kill it. `ProcessLauncher` provides them with a real
//! child process; tests substitute scripted players.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::{Error, Result};

pub type OutputReader = Box<dyn AsyncRead + Send + Unpin>;

/// Which of the player's output streams a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Kill operation of a running player
#[async_trait]
pub trait PlayerHandle: Send {
    /// OS process id, when there is one
    fn id(&self) -> Option<u32>;

    /// Kill the player and wait for it to be gone
    async fn kill(&mut self) -> std::io::Result<()>;

    /// Request a kill without waiting. Used where awaiting is impossible (`Drop`).
    fn start_kill(&mut self) -> std::io::Result<()>;
}

/// A launched player: its two output streams plus its kill handle
pub struct PlayerProcess {
    pub stdout: OutputReader,
    pub stderr: OutputReader,
    pub handle: Box<dyn PlayerHandle>,
}

impl fmt::Debug for PlayerProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerProcess")
            .field("pid", &self.handle.id())
            .finish_non_exhaustive()
    }
}

/// Starts a player against a stream URL
pub trait PlayerLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<PlayerProcess>;
}

impl<T: PlayerLauncher + ?Sized> PlayerLauncher for Arc<T> {
    fn launch(&self, url: &str) -> Result<PlayerProcess> {
        (**self).launch(url)
    }
}

/// Launches an external player executable as `program args... url`
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl PlayerLauncher for ProcessLauncher {
    fn launch(&self, url: &str) -> Result<PlayerProcess> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ProcessLaunch(format!("{}: {e}", self.program.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ProcessLaunch("stdout pipe was not created".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ProcessLaunch("stderr pipe was not created".to_string()))?;

        debug!(program = %self.program.display(), pid = ?child.id(), "Player launched");

        Ok(PlayerProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            handle: Box::new(ChildHandle { child }),
        })
    }
}

struct ChildHandle {
    child: Child,
}

#[async_trait]
impl PlayerHandle for ChildHandle {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

/// Owns a player's kill handle for the lifetime of a session.
///
/// `terminate` kills the player at most once. If the guard is dropped without
/// `terminate` having run (a panic, or the session future being dropped), it
/// still issues a kill.
pub struct ProcessGuard {
    handle: Option<Box<dyn PlayerHandle>>,
}

impl ProcessGuard {
    #[must_use]
    pub fn new(handle: Box<dyn PlayerHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Kill the player. Later calls are no-ops.
    pub async fn terminate(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(mut handle) => {
                let pid = handle.id();
                handle
                    .kill()
                    .await
                    .map_err(|e| Error::Teardown(format!("pid {pid:?}: {e}")))?;
                debug!(pid = ?pid, "Player terminated");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            warn!(pid = ?handle.id(), "Session ended without teardown, killing player");
            if let Err(e) = handle.start_kill() {
                warn!(pid = ?handle.id(), error = %e, "Failed to kill player on drop");
            }
        }
    }
}
