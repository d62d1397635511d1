use serde::Serialize;
use std::fmt;

use super::chain::SweepQueue;
use super::error::SessionError;
use crate::channel::JobType;
use crate::types::{Progress, SweepRequest};

/// Lifecycle of the optimization session. Exactly one variant holds at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Running {
        strategy: String,
        progress: Progress,
    },
    ChainRunning {
        active: SweepRequest,
        queue: SweepQueue,
        progress: Progress,
        completed: usize,
        total: usize,
    },
    /// Terminal for the last sweep; a new sweep may start from here.
    Error {
        error: SessionError,
    },
}

impl SessionState {
    pub fn is_optimizing(&self) -> bool {
        matches!(self, SessionState::Running { .. } | SessionState::ChainRunning { .. })
    }

    /// Job type of the sweep in flight, if any.
    pub fn mode(&self) -> Option<JobType> {
        match self {
            SessionState::Running { .. } => Some(JobType::Standard),
            SessionState::ChainRunning { .. } => Some(JobType::Ultimate),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<Progress> {
        match self {
            SessionState::Running { progress, .. }
            | SessionState::ChainRunning { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Idle => SessionStatus::Idle,
            SessionState::Running { .. } => SessionStatus::Running,
            SessionState::ChainRunning { .. } => SessionStatus::ChainRunning,
            SessionState::Error { .. } => SessionStatus::Error,
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            SessionState::Error { error } => Some(error),
            _ => None,
        }
    }

    /// What went wrong, with backend messages passed through verbatim.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(|error| match error {
            SessionError::Backend(message) => message.clone(),
            other => other.to_string(),
        })
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Idle,
    Running,
    ChainRunning,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Running => write!(f, "Running"),
            SessionStatus::ChainRunning => write!(f, "Chain running"),
            SessionStatus::Error => write!(f, "Error"),
        }
    }
}
