//! Check orchestration
//!
//! Runs the cheap one-shot probe first and only drives a player when the probe
//! passes. Push-style and pull-style checks share no state, so the combined
//! test runs them as two independent tasks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::config::Config;
use crate::probe::{probe_tcp, PlaylistProbe};
use crate::target::{PullTarget, PushTarget};
use crate::verify::{Classifier, PlaybackVerifier, ProcessLauncher, VerificationSession};
use crate::Result;

/// Check timings and markers resolved from [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSettings {
    pub connect_timeout: Duration,
    pub push_timeout: Duration,
    pub push_confirm: Duration,
    pub push_failure_confirm: Duration,
    pub long_push_confirm: Duration,
    pub long_push_grace: Duration,
    pub push_success_marker: String,
    pub push_failure_marker: String,
    pub pull_confirm_grace: Duration,
    pub pull_timeout_grace: Duration,
    pub pull_failure_confirm: Duration,
    pub pull_success_marker: String,
    pub pull_failure_marker: String,
}

impl From<&Config> for CheckSettings {
    fn from(config: &Config) -> Self {
        let push = &config.push;
        let pull = &config.pull;
        Self {
            connect_timeout: Duration::from_secs(push.connect_timeout_seconds),
            push_timeout: Duration::from_secs(push.timeout_seconds),
            push_confirm: Duration::from_secs(push.confirm_seconds),
            push_failure_confirm: Duration::from_secs(push.failure_confirm_seconds),
            long_push_confirm: Duration::from_secs(push.long_confirm_seconds),
            long_push_grace: Duration::from_secs(push.long_timeout_grace_seconds),
            push_success_marker: push.success_marker.clone(),
            push_failure_marker: push.failure_marker.clone(),
            pull_confirm_grace: Duration::from_secs(pull.confirm_grace_seconds),
            pull_timeout_grace: Duration::from_secs(pull.timeout_grace_seconds),
            pull_failure_confirm: Duration::from_secs(pull.failure_confirm_seconds),
            pull_success_marker: pull.success_marker.clone(),
            pull_failure_marker: pull.failure_marker.clone(),
        }
    }
}

impl CheckSettings {
    /// Push-style session: fixed upper bound, stretched only if the
    /// confirmations themselves would not fit inside it
    #[must_use]
    pub fn push_session(&self, target: &PushTarget) -> VerificationSession {
        self.push_session_with(target, self.push_confirm, self.push_timeout)
    }

    /// Long push-style session: the stream has to keep playing for the long
    /// confirmation window
    #[must_use]
    pub fn long_push_session(&self, target: &PushTarget) -> VerificationSession {
        self.push_session_with(
            target,
            self.long_push_confirm,
            self.long_push_confirm.saturating_add(self.long_push_grace),
        )
    }

    fn push_session_with(
        &self,
        target: &PushTarget,
        confirm: Duration,
        bound: Duration,
    ) -> VerificationSession {
        let classifier = Classifier::push(
            &self.push_success_marker,
            &self.push_failure_marker,
            confirm,
            self.push_failure_confirm,
        );
        let hard_timeout = bound.max(confirm.saturating_add(self.push_failure_confirm));
        VerificationSession::new(target.url(), classifier, hard_timeout)
    }

    /// Pull-style session: success must hold for `duration` plus a grace
    /// period, all inside `duration` plus a slightly longer grace
    #[must_use]
    pub fn pull_session(&self, target: &PullTarget, duration: Duration) -> VerificationSession {
        let classifier = Classifier::pull(
            &self.pull_success_marker,
            &self.pull_failure_marker,
            duration.saturating_add(self.pull_confirm_grace),
            self.pull_failure_confirm,
        );
        VerificationSession::new(
            target.url(),
            classifier,
            duration.saturating_add(self.pull_timeout_grace),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// TCP connection to the server succeeded
    pub reachable: bool,
    /// A player consumed the stream path
    pub playable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// Playlist answered 200 OK and references segments
    pub playlist_available: bool,
    pub playable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FullReport {
    pub push: PushReport,
    pub pull: PullReport,
}

/// Composes the probes and the verification engine per stream style
#[derive(Debug, Clone)]
pub struct StreamChecker {
    settings: Arc<CheckSettings>,
    playlist: PlaylistProbe,
    verifier: PlaybackVerifier,
}

impl StreamChecker {
    #[must_use]
    pub fn new(settings: CheckSettings, playlist: PlaylistProbe, verifier: PlaybackVerifier) -> Self {
        Self {
            settings: Arc::new(settings),
            playlist,
            verifier,
        }
    }

    /// Build a checker driving the configured external player
    pub fn from_config(config: &Config) -> Result<Self> {
        let launcher =
            ProcessLauncher::new(&config.player.path).with_args(config.player.args.clone());
        let verifier =
            PlaybackVerifier::new(Arc::new(launcher)).with_precedence(config.player.precedence);
        let playlist = PlaylistProbe::new(
            config.pull.segment_marker.clone(),
            Duration::from_secs(config.pull.http_timeout_seconds),
        )?;

        Ok(Self::new(CheckSettings::from(config), playlist, verifier))
    }

    /// Reachability first; the stream path is never validated against an
    /// unreachable server.
    pub async fn check_push(&self, target: &PushTarget) -> PushReport {
        let session = self.settings.push_session(target);
        self.run_push(target, &session).await
    }

    /// Same short-circuit as [`Self::check_push`] with the long confirmation window
    pub async fn check_push_long(&self, target: &PushTarget) -> PushReport {
        let session = self.settings.long_push_session(target);
        self.run_push(target, &session).await
    }

    async fn run_push(&self, target: &PushTarget, session: &VerificationSession) -> PushReport {
        if !probe_tcp(target.host(), target.port(), self.settings.connect_timeout).await {
            return PushReport::default();
        }

        info!(
            server = %target.authority(),
            path = %target.path(),
            "Server reachable, checking stream path with player"
        );
        PushReport {
            reachable: true,
            playable: self.verifier.verify(session).await,
        }
    }

    /// Playlist first; no player is launched against a dead playlist.
    pub async fn check_pull(&self, target: &PullTarget, duration: Duration) -> PullReport {
        if !self.playlist.probe(target.url()).await {
            return PullReport::default();
        }

        let session = self.settings.pull_session(target, duration);
        PullReport {
            playlist_available: true,
            playable: self.verifier.verify(&session).await,
        }
    }

    /// Run the push and pull checks concurrently and join both
    pub async fn full_test(
        &self,
        push: PushTarget,
        pull: PullTarget,
        duration: Duration,
    ) -> FullReport {
        let push_task = {
            let checker = self.clone();
            tokio::spawn(async move {
                let report = checker.check_push(&push).await;
                info!("Push check complete");
                report
            })
        };
        let pull_task = {
            let checker = self.clone();
            tokio::spawn(async move {
                let report = checker.check_pull(&pull, duration).await;
                info!("Pull check complete");
                report
            })
        };

        let (push, pull) = tokio::join!(push_task, pull_task);

        FullReport {
            push: push.unwrap_or_else(|e| {
                error!(error = %e, "Push check task failed");
                PushReport::default()
            }),
            pull: pull.unwrap_or_else(|e| {
                error!(error = %e, "Pull check task failed");
                PullReport::default()
            }),
        }
    }
}
