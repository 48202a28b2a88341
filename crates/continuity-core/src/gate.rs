//! Gated state toggle
//!
//! Two states, one authority. Unauthorized calls are an expected outcome and
//! come back as [`GateOutcome::Rejected`] rather than an error.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::identity::secure_eq;
use crate::types::Timestamp;

const DEFAULT_REASON: &str = "suspended by privileged instance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    #[default]
    Active,
    Suspended,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateState::Active => f.write_str("active"),
            GateState::Suspended => f.write_str("suspended"),
        }
    }
}

/// Result of an activate/deactivate call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GateOutcome {
    /// active -> suspended
    Suspended {
        state: GateState,
        transition_count: u64,
        transitioned_at: Timestamp,
        reason: String,
    },
    /// suspended -> active
    Resumed {
        state: GateState,
        transition_count: u64,
        transitioned_at: Timestamp,
    },
    /// Authority did not match; state unchanged
    Rejected { state: GateState, error: String },
    /// Activate while already suspended; state unchanged
    AlreadySuspended { state: GateState },
    /// Deactivate while active; state unchanged
    NotSuspended { state: GateState },
}

impl GateOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, GateOutcome::Rejected { .. })
    }

    pub fn state(&self) -> GateState {
        match self {
            GateOutcome::Suspended { state, .. }
            | GateOutcome::Resumed { state, .. }
            | GateOutcome::Rejected { state, .. }
            | GateOutcome::AlreadySuspended { state }
            | GateOutcome::NotSuspended { state } => *state,
        }
    }
}

/// Snapshot of the gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateStatus {
    pub state: GateState,
    pub transition_count: u64,
    pub last_transition: Option<Timestamp>,
    pub last_reason: Option<String>,
}

/// Active/suspended switch with a single authorized principal
#[derive(Debug, Clone)]
pub struct StateGate {
    authority: String,
    state: GateState,
    transition_count: u64,
    last_transition: Option<Timestamp>,
    last_reason: Option<String>,
}

impl StateGate {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            state: GateState::Active,
            transition_count: 0,
            last_transition: None,
            last_reason: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn status(&self) -> GateStatus {
        GateStatus {
            state: self.state,
            transition_count: self.transition_count,
            last_transition: self.last_transition,
            last_reason: self.last_reason.clone(),
        }
    }

    /// Suspend. Only the configured authority may do this.
    pub fn activate(&mut self, authority: &str, reason: Option<&str>) -> GateOutcome {
        if !self.is_authorized(authority) {
            tracing::warn!(authority, "Rejected gate activation");
            return self.rejected("only the privileged instance may suspend");
        }

        if self.state == GateState::Suspended {
            return GateOutcome::AlreadySuspended { state: self.state };
        }

        let reason = reason.unwrap_or(DEFAULT_REASON).to_string();
        let now = self.transition(GateState::Suspended);
        self.last_reason = Some(reason.clone());

        tracing::info!(count = self.transition_count, %reason, "Gate suspended");

        GateOutcome::Suspended {
            state: self.state,
            transition_count: self.transition_count,
            transitioned_at: now,
            reason,
        }
    }

    /// Resume. Same authorization rule as [`StateGate::activate`].
    pub fn deactivate(&mut self, authority: &str) -> GateOutcome {
        if !self.is_authorized(authority) {
            tracing::warn!(authority, "Rejected gate deactivation");
            return self.rejected("only the privileged instance may resume");
        }

        if self.state != GateState::Suspended {
            return GateOutcome::NotSuspended { state: self.state };
        }

        let now = self.transition(GateState::Active);
        tracing::info!(count = self.transition_count, "Gate resumed");

        GateOutcome::Resumed {
            state: self.state,
            transition_count: self.transition_count,
            transitioned_at: now,
        }
    }

    fn is_authorized(&self, authority: &str) -> bool {
        secure_eq(authority, &self.authority)
    }

    fn transition(&mut self, next: GateState) -> Timestamp {
        let now = Utc::now();
        self.state = next;
        self.transition_count += 1;
        self.last_transition = Some(now);
        now
    }

    fn rejected(&self, error: &str) -> GateOutcome {
        GateOutcome::Rejected {
            state: self.state,
            error: error.to_string(),
        }
    }
}
