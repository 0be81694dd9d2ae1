//! Deployment phase tracking
//!
//! A deployment is a single forward pass through [`DeployPhase`]. The
//! [`StateMachine`] records the path taken and refuses any edge that is not
//! part of that pass.

use std::fmt::{self, Debug, Display};

use serde::Serialize;

use crate::error::{Error, Result};

/// Phases of one deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    Start,
    RepoReady,
    BranchReady,
    Synced,
    Cleared,
    Materialized,
    Staged,
    Committed,
    Pushed,
    Skipped,
    Done,
}

impl Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::RepoReady => "repo_ready",
            Self::BranchReady => "branch_ready",
            Self::Synced => "synced",
            Self::Cleared => "cleared",
            Self::Materialized => "materialized",
            Self::Staged => "staged",
            Self::Committed => "committed",
            Self::Pushed => "pushed",
            Self::Skipped => "skipped",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

impl DeployPhase {
    /// Every edge a deployment may take
    pub fn transitions() -> Vec<(Self, Self)> {
        use DeployPhase::*;

        vec![
            // Empty artifact set
            (Start, Done),
            (Start, RepoReady),
            (RepoReady, BranchReady),
            (BranchReady, Synced),
            (Synced, Cleared),
            (Cleared, Materialized),
            (Materialized, Staged),
            (Staged, Skipped),
            (Staged, Committed),
            (Committed, Pushed),
            (Committed, Done),
            (Pushed, Done),
            (Skipped, Done),
        ]
    }
}

/// A basic state machine implementation
///
/// Tracks the current phase and every phase visited so far.
#[derive(Debug, Clone)]
pub struct StateMachine<P: Clone + PartialEq + Debug> {
    current_phase: P,
    valid_transitions: Vec<(P, P)>,
    history: Vec<P>,
}

impl<P: Clone + PartialEq + Debug + Display> StateMachine<P> {
    /// Create a new state machine with the given initial phase
    pub fn new(initial_phase: P) -> Self {
        Self {
            history: vec![initial_phase.clone()],
            current_phase: initial_phase,
            valid_transitions: Vec::new(),
        }
    }

    /// Add multiple valid transitions
    pub fn add_transitions(mut self, transitions: Vec<(P, P)>) -> Self {
        self.valid_transitions.extend(transitions);
        self
    }

    pub fn current_phase(&self) -> &P {
        &self.current_phase
    }

    /// Phases visited, in order, starting with the initial one
    pub fn history(&self) -> &[P] {
        &self.history
    }

    pub fn can_transition_to(&self, phase: &P) -> bool {
        self.valid_transitions
            .iter()
            .any(|(f, t)| f == &self.current_phase && t == phase)
    }

    /// Move to `phase`, failing if there is no edge from the current phase
    pub fn transition_to(&mut self, phase: P) -> Result<()> {
        if !self.can_transition_to(&phase) {
            return Err(Error::InvalidTransition {
                from: self.current_phase.to_string(),
                to: phase.to_string(),
            });
        }

        tracing::debug!(
            from = %self.current_phase,
            to = %phase,
            "Deployment phase transition"
        );

        self.history.push(phase.clone());
        self.current_phase = phase;
        Ok(())
    }
}

impl StateMachine<DeployPhase> {
    /// State machine for one deployment run
    pub fn deployment() -> Self {
        Self::new(DeployPhase::Start).add_transitions(DeployPhase::transitions())
    }
}
