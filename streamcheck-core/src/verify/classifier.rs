//! Marker classification of player output lines
//!
//! A classifier is data: an ordered list of literal substrings, each mapped to
//! the outcome it predicts and how long that prediction must hold before it is
//! trusted. Per-target marker sets are built from configuration instead of
//! being spread through the scanning code.

use std::time::Duration;

use serde::Serialize;

/// What a marker says about playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Playable,
    NotPlayable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRule {
    pub name: String,
    pub pattern: String,
    pub outcome: Outcome,
    /// How long the marker must stand unchallenged before its outcome is committed
    pub confirm_after: Duration,
}

impl MarkerRule {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        outcome: Outcome,
        confirm_after: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            outcome,
            confirm_after,
        }
    }

    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        !self.pattern.is_empty() && line.contains(&self.pattern)
    }
}

/// Ordered pattern -> outcome table. The first matching rule wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    rules: Vec<MarkerRule>,
}

impl Classifier {
    #[must_use]
    pub const fn new(rules: Vec<MarkerRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: MarkerRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Markers for a push-style session: the player has locked on once it raises
    /// its decoded picture buffer.
    pub fn push(
        success_marker: impl Into<String>,
        failure_marker: impl Into<String>,
        confirm_after: Duration,
        failure_confirm_after: Duration,
    ) -> Self {
        Self::new(vec![
            MarkerRule::new("stream-locked", success_marker, Outcome::Playable, confirm_after),
            MarkerRule::new(
                "stream-error",
                failure_marker,
                Outcome::NotPlayable,
                failure_confirm_after,
            ),
        ])
    }

    /// Markers for a pull-style session: the player has switched its demuxer to
    /// transport stream segments.
    pub fn pull(
        success_marker: impl Into<String>,
        failure_marker: impl Into<String>,
        confirm_after: Duration,
        failure_confirm_after: Duration,
    ) -> Self {
        Self::new(vec![
            MarkerRule::new("segments-demuxed", success_marker, Outcome::Playable, confirm_after),
            MarkerRule::new(
                "stream-error",
                failure_marker,
                Outcome::NotPlayable,
                failure_confirm_after,
            ),
        ])
    }

    /// Index of the first rule matching `line`
    #[must_use]
    pub fn classify(&self, line: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.matches(line))
    }

    #[must_use]
    pub fn rule(&self, index: usize) -> Option<&MarkerRule> {
        self.rules.get(index)
    }

    #[must_use]
    pub fn rules(&self) -> &[MarkerRule] {
        &self.rules
    }
}
