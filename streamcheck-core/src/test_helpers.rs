//! Test doubles shared by unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::verify::{OutputSource, PlayerHandle, PlayerLauncher, PlayerProcess};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct ScriptedLine {
    at: Duration,
    source: OutputSource,
    text: String,
}

#[derive(Debug, Default)]
struct Counters {
    launches: AtomicUsize,
    kills: AtomicUsize,
    running: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

/// Fake player that prints scripted lines at fixed offsets from launch.
///
/// Unless `exit_after` is set, the fake keeps both output streams open until
/// it is killed, like a real player would.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    lines: Vec<ScriptedLine>,
    exit_after: Option<Duration>,
    fail_launch: bool,
    fail_kill: bool,
    counters: Arc<Counters>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(self, at: Duration, text: &str) -> Self {
        self.line(at, OutputSource::Stdout, text)
    }

    pub fn stderr(self, at: Duration, text: &str) -> Self {
        self.line(at, OutputSource::Stderr, text)
    }

    fn line(mut self, at: Duration, source: OutputSource, text: &str) -> Self {
        self.lines.push(ScriptedLine {
            at,
            source,
            text: text.to_string(),
        });
        self.lines.sort_by_key(|line| line.at);
        self
    }

    /// Close both output streams at `at`, as if the player exited
    pub fn exit_after(mut self, at: Duration) -> Self {
        self.exit_after = Some(at);
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn failing_kill(mut self) -> Self {
        self.fail_kill = true;
        self
    }

    pub fn launches(&self) -> usize {
        self.counters.launches.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.counters.kills.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.counters.running.load(Ordering::SeqCst) > 0
    }

    pub fn last_url(&self) -> Option<String> {
        self.counters.last_url.lock().unwrap().clone()
    }
}

impl PlayerLauncher for ScriptedLauncher {
    fn launch(&self, url: &str) -> Result<PlayerProcess> {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_url.lock().unwrap() = Some(url.to_string());

        if self.fail_launch {
            return Err(Error::ProcessLaunch("scripted launch failure".to_string()));
        }

        let (stdout_reader, mut stdout_writer) = tokio::io::duplex(64 * 1024);
        let (stderr_reader, mut stderr_writer) = tokio::io::duplex(64 * 1024);
        let alive = Arc::new(AtomicBool::new(true));
        self.counters.running.fetch_add(1, Ordering::SeqCst);

        let lines = self.lines.clone();
        let exit_after = self.exit_after;
        let task_alive = alive.clone();
        let task_counters = self.counters.clone();
        let task = tokio::spawn(async move {
            let started = Instant::now();
            for line in lines {
                sleep_until(started + line.at).await;
                let writer = match line.source {
                    OutputSource::Stdout => &mut stdout_writer,
                    OutputSource::Stderr => &mut stderr_writer,
                };
                let _ = writer.write_all(format!("{}\n", line.text).as_bytes()).await;
            }

            match exit_after {
                Some(at) => sleep_until(started + at).await,
                None => std::future::pending::<()>().await,
            }

            if task_alive.swap(false, Ordering::SeqCst) {
                task_counters.running.fetch_sub(1, Ordering::SeqCst);
            }
            // Writers drop here, closing both streams
        });

        Ok(PlayerProcess {
            stdout: Box::new(stdout_reader),
            stderr: Box::new(stderr_reader),
            handle: Box::new(ScriptedHandle {
                task,
                alive,
                counters: self.counters.clone(),
                fail_kill: self.fail_kill,
            }),
        })
    }
}

struct ScriptedHandle {
    task: JoinHandle<()>,
    alive: Arc<AtomicBool>,
    counters: Arc<Counters>,
    fail_kill: bool,
}

impl ScriptedHandle {
    fn stop(&mut self) -> std::io::Result<()> {
        self.counters.kills.fetch_add(1, Ordering::SeqCst);
        if self.fail_kill {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "scripted kill failure",
            ));
        }

        self.task.abort();
        if self.alive.swap(false, Ordering::SeqCst) {
            self.counters.running.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerHandle for ScriptedHandle {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.stop()
    }

    fn start_kill(&mut self) -> std::io::Result<()> {
        self.stop()
    }
}
