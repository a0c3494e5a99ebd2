//! Playback verification sessions
//!
//! One session launches the player, scans both of its output streams, and
//! turns whatever markers show up into a single verdict within a hard time
//! bound. A single arbiter owns the verdict:
//!
//! - the scanners only report which rule matched; they never decide anything
//! - at most one confirmation timer is pending; [`MarkerPrecedence`] decides
//!   whether a new marker replaces it
//! - the first of {confirmation, player exit, hard timeout} concludes the session
//!
//! The player is killed exactly once on every exit path, before the verdict is
//! returned. A failed kill turns the verdict into `false`.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant, Sleep};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classifier::{Classifier, Outcome};
use super::codec::PlayerLineCodec;
use super::launcher::{OutputReader, OutputSource, PlayerLauncher, PlayerProcess, ProcessGuard};

const EVENT_BUFFER: usize = 64;

/// Which confirmation survives when markers with opposite outcomes overlap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPrecedence {
    /// A failure marker replaces a pending success confirmation; a success
    /// marker never replaces a pending failure confirmation.
    #[default]
    FailureOverrides,
    /// The first armed confirmation stands until it fires.
    FirstWins,
    /// A marker with the opposite outcome always replaces the pending confirmation.
    LatestWins,
}

impl MarkerPrecedence {
    /// Whether a marker predicting `incoming` replaces a confirmation pending for `pending`.
    /// Markers repeating the pending outcome never re-arm its timer.
    #[must_use]
    pub const fn replaces(self, pending: Outcome, incoming: Outcome) -> bool {
        match (pending, incoming) {
            (Outcome::Playable, Outcome::Playable) | (Outcome::NotPlayable, Outcome::NotPlayable) => {
                false
            }
            _ => match self {
                Self::FailureOverrides => matches!(incoming, Outcome::NotPlayable),
                Self::FirstWins => false,
                Self::LatestWins => true,
            },
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conclusion {
    /// A marker's confirmation delay elapsed unchallenged
    Confirmed { outcome: Outcome, marker: String },
    /// Both output streams closed before anything was confirmed
    PlayerExited,
    /// No conclusive signal before the hard timeout
    TimedOut,
    LaunchFailed { reason: String },
    /// The player could not be killed, so nothing it showed is trusted
    TeardownFailed { reason: String },
}

impl Conclusion {
    #[must_use]
    pub const fn verdict(&self) -> bool {
        matches!(
            self,
            Self::Confirmed {
                outcome: Outcome::Playable,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub verdict: bool,
    pub conclusion: Conclusion,
    pub elapsed: Duration,
}

impl SessionReport {
    fn new(conclusion: Conclusion, elapsed: Duration) -> Self {
        Self {
            verdict: conclusion.verdict(),
            conclusion,
            elapsed,
        }
    }
}

/// Parameters of one verification run
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub url: String,
    pub classifier: Classifier,
    pub hard_timeout: Duration,
}

impl VerificationSession {
    pub fn new(url: impl Into<String>, classifier: Classifier, hard_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            classifier,
            hard_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scanning,
    SuccessPending,
    FailurePending,
}

impl Phase {
    const fn pending(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Playable => Self::SuccessPending,
            Outcome::NotPlayable => Self::FailurePending,
        }
    }
}

#[derive(Debug)]
enum ScanEvent {
    Marker { source: OutputSource, rule: usize },
    Closed(OutputSource),
}

struct PendingConfirmation {
    rule: usize,
    outcome: Outcome,
    timer: Pin<Box<Sleep>>,
}

/// Runs verification sessions against a player launcher
#[derive(Clone)]
pub struct PlaybackVerifier {
    launcher: Arc<dyn PlayerLauncher>,
    precedence: MarkerPrecedence,
}

impl std::fmt::Debug for PlaybackVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackVerifier")
            .field("precedence", &self.precedence)
            .finish_non_exhaustive()
    }
}

impl PlaybackVerifier {
    #[must_use]
    pub fn new(launcher: Arc<dyn PlayerLauncher>) -> Self {
        Self {
            launcher,
            precedence: MarkerPrecedence::default(),
        }
    }

    #[must_use]
    pub const fn with_precedence(mut self, precedence: MarkerPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Run a session and keep only its verdict
    pub async fn verify(&self, session: &VerificationSession) -> bool {
        self.run(session).await.verdict
    }

    /// Run a session to its conclusion. Never outlives the call: the player is
    /// killed and the scanners are stopped before this returns.
    pub async fn run(&self, session: &VerificationSession) -> SessionReport {
        let started = Instant::now();

        let PlayerProcess {
            stdout,
            stderr,
            handle,
        } = match self.launcher.launch(&session.url) {
            Ok(process) => process,
            Err(e) => {
                warn!(url = %session.url, error = %e, "Could not launch player");
                return SessionReport::new(
                    Conclusion::LaunchFailed {
                        reason: e.to_string(),
                    },
                    started.elapsed(),
                );
            }
        };
        let mut guard = ProcessGuard::new(handle);
        info!(url = %session.url, hard_timeout = ?session.hard_timeout, "Player launched, scanning output");

        let cancel = CancellationToken::new();
        // Stops the scanners even if this future is dropped mid-session
        let _stop_scanners = cancel.clone().drop_guard();

        let classifier = Arc::new(session.classifier.clone());
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let scanners = [
            tokio::spawn(scan_output(
                OutputSource::Stdout,
                stdout,
                classifier.clone(),
                events_tx.clone(),
                cancel.clone(),
            )),
            tokio::spawn(scan_output(
                OutputSource::Stderr,
                stderr,
                classifier.clone(),
                events_tx,
                cancel.clone(),
            )),
        ];

        let mut conclusion = self
            .arbitrate(events_rx, &classifier, session.hard_timeout)
            .await;

        if let Err(e) = guard.terminate().await {
            warn!(url = %session.url, error = %e, "Error terminating player process");
            conclusion = Conclusion::TeardownFailed {
                reason: e.to_string(),
            };
        }

        cancel.cancel();
        for scanner in scanners {
            if let Err(e) = scanner.await {
                warn!(error = %e, "Output scanner ended abnormally");
            }
        }

        let report = SessionReport::new(conclusion, started.elapsed());
        match &report.conclusion {
            Conclusion::Confirmed { outcome, marker } => info!(
                url = %session.url,
                marker = %marker,
                outcome = ?outcome,
                elapsed = ?report.elapsed,
                "Playback check concluded"
            ),
            Conclusion::TimedOut => warn!(
                url = %session.url,
                elapsed = ?report.elapsed,
                "Timeout reached, player process has been terminated"
            ),
            other => warn!(
                url = %session.url,
                conclusion = ?other,
                elapsed = ?report.elapsed,
                "Playback check concluded without confirmation"
            ),
        }
        report
    }

    async fn arbitrate(
        &self,
        mut events: mpsc::Receiver<ScanEvent>,
        classifier: &Classifier,
        hard_timeout: Duration,
    ) -> Conclusion {
        let deadline = sleep(hard_timeout);
        tokio::pin!(deadline);

        let mut pending: Option<PendingConfirmation> = None;
        let mut phase = Phase::Scanning;
        let mut open_streams = 2_usize;

        loop {
            tokio::select! {
                biased;

                () = async {
                    if let Some(confirmation) = pending.as_mut() {
                        confirmation.timer.as_mut().await;
                    }
                }, if pending.is_some() => {
                    if let Some(confirmation) = pending.take() {
                        let marker = classifier
                            .rule(confirmation.rule)
                            .map(|rule| rule.name.clone())
                            .unwrap_or_default();
                        return Conclusion::Confirmed {
                            outcome: confirmation.outcome,
                            marker,
                        };
                    }
                }

                () = &mut deadline => {
                    debug!(phase = ?phase, "Hard timeout reached");
                    return Conclusion::TimedOut;
                }

                event = events.recv() => match event {
                    Some(ScanEvent::Marker { source, rule: index }) => {
                        if let Some(rule) = classifier.rule(index) {
                            let arm = match &pending {
                                None => true,
                                Some(current) => self.precedence.replaces(current.outcome, rule.outcome),
                            };

                            if arm {
                                info!(
                                    source = %source,
                                    marker = %rule.name,
                                    confirm_after = ?rule.confirm_after,
                                    replaced = pending.is_some(),
                                    "Marker seen, awaiting confirmation"
                                );
                                pending = Some(PendingConfirmation {
                                    rule: index,
                                    outcome: rule.outcome,
                                    timer: Box::pin(sleep(rule.confirm_after)),
                                });
                                let next = Phase::pending(rule.outcome);
                                debug!(from = ?phase, to = ?next, "Session phase changed");
                                phase = next;
                            } else {
                                debug!(source = %source, marker = %rule.name, phase = ?phase, "Marker ignored");
                            }
                        }
                    }
                    Some(ScanEvent::Closed(source)) => {
                        debug!(source = %source, "Player output closed");
                        open_streams = open_streams.saturating_sub(1);
                        if open_streams == 0 {
                            return Conclusion::PlayerExited;
                        }
                    }
                    None => return Conclusion::PlayerExited,
                }
            }
        }
    }
}

/// Read one output stream line by line, reporting marker matches until the
/// stream closes or the session is torn down.
async fn scan_output(
    source: OutputSource,
    reader: OutputReader,
    classifier: Arc<Classifier>,
    events: mpsc::Sender<ScanEvent>,
    cancel: CancellationToken,
) {
    let mut lines = FramedRead::new(reader, PlayerLineCodec::default());

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return,
            next = lines.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                debug!(source = %source, "Player output: {line}");
                if let Some(rule) = classifier.classify(&line) {
                    if events.send(ScanEvent::Marker { source, rule }).await.is_err() {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                debug!(source = %source, error = %e, "Failed to read player output");
                break;
            }
            None => break,
        }
    }

    let _ = events.send(ScanEvent::Closed(source)).await;
}
