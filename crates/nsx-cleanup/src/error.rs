//! Teardown error taxonomy
//!
//! Collaborators and remote calls report plain `anyhow` errors. The top-level
//! run wraps whatever a phase surfaced into a [`TeardownError`] naming the
//! stage that failed.

use crate::retry::is_terminal;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// cluster field is empty
    #[error("cluster cannot be empty")]
    EmptyCluster,

    /// queue worker count is zero
    #[error("vpc workers must be at least 1, got {0}")]
    InvalidWorkers(usize),

    /// a backoff policy allows no attempts
    #[error("backoff steps must be at least 1")]
    InvalidSteps,

    /// a backoff factor below 1.0 would shrink delays
    #[error("backoff factor must be >= 1.0, got {0}")]
    InvalidFactor(f64),

    /// jitter outside 0.0..=1.0
    #[error("backoff jitter must be between 0.0 and 1.0, got {0}")]
    InvalidJitter(f64),

    /// bulk update chunk size is zero
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    /// run timeout is zero
    #[error("timeout must be greater than 0, got {0:?}")]
    InvalidTimeout(Duration),
}

/// Teardown stage a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    BeforeVpcDeletion,
    AutoCreatedVpcs,
    PreCreatedVpc,
    Infra,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BeforeVpcDeletion => "pre-VPC-deletion cleanup",
            Stage::AutoCreatedVpcs => "auto-created VPC cleanup",
            Stage::PreCreatedVpc => "pre-created VPC cleanup",
            Stage::Infra => "infra cleanup",
        };
        f.write_str(name)
    }
}

/// The single error a teardown caller sees
#[derive(Debug, Error)]
pub enum TeardownError {
    /// Precondition not met before teardown starts
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ConfigError),

    /// No usable connection to the NSX manager
    #[error("NSX client unavailable")]
    ClientUnavailable,

    /// A collaborator factory failed; nothing was deleted
    #[error("failed to initialize cleanup service: {0:#}")]
    InitializationFailed(anyhow::Error),

    /// The run's context finished while `stage` was running
    #[error("{stage} timed out: {source:#}")]
    Timeout {
        stage: Stage,
        source: anyhow::Error,
    },

    /// A remote delete or update kept failing after retries
    #[error("{stage} failed: {source:#}")]
    ResourceCleanupFailed {
        stage: Stage,
        source: anyhow::Error,
    },
}

impl TeardownError {
    /// Wrap a phase failure, classifying it as a timeout if its chain is terminal
    pub fn from_stage(stage: Stage, source: anyhow::Error) -> Self {
        if is_terminal(&source) {
            TeardownError::Timeout { stage, source }
        } else {
            TeardownError::ResourceCleanupFailed { stage, source }
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            TeardownError::Timeout { stage, .. }
            | TeardownError::ResourceCleanupFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TeardownError::Timeout { .. })
    }
}
