//! Teardown configuration
//!
//! [`CleanupConfig`] is what the engine consumes. [`CleanArgs`] is the clap
//! argument group an embedding binary flattens into its own CLI.

use crate::cleanup::QueueConfig;
use crate::context::TeardownContext;
use crate::error::ConfigError;
use crate::retry::BackoffPolicy;
use clap::Args;
use nsx_cleanup_common::defaults::{
    DEFAULT_HAPI_CHUNK_SIZE, DEFAULT_TIMEOUT_MINUTES, DEFAULT_VPC_MAX_RETRIES, DEFAULT_VPC_WORKERS,
};
use std::time::Duration;

/// Configuration for one teardown run
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupConfig {
    /// Cluster whose NSX objects are removed
    pub cluster: String,
    /// Policy shared by the orchestrator phases
    pub backoff: BackoffPolicy,
    /// Small policy for hierarchical update throttling
    pub default_retry: BackoffPolicy,
    /// Worker pool for auto-created VPCs
    pub queue: QueueConfig,
    /// Objects per hierarchical update request
    pub chunk_size: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cluster: String::new(),
            backoff: BackoffPolicy::default(),
            default_retry: BackoffPolicy::default_retry(),
            queue: QueueConfig::default(),
            chunk_size: DEFAULT_HAPI_CHUNK_SIZE,
        }
    }
}

impl CleanupConfig {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.is_empty() {
            return Err(ConfigError::EmptyCluster);
        }
        if self.queue.workers == 0 {
            return Err(ConfigError::InvalidWorkers(self.queue.workers));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        validate_policy(&self.backoff)?;
        validate_policy(&self.default_retry)?;
        Ok(())
    }
}

fn validate_policy(policy: &BackoffPolicy) -> Result<(), ConfigError> {
    if policy.steps == 0 {
        return Err(ConfigError::InvalidSteps);
    }
    if policy.factor < 1.0 {
        return Err(ConfigError::InvalidFactor(policy.factor));
    }
    if !(0.0..=1.0).contains(&policy.jitter) {
        return Err(ConfigError::InvalidJitter(policy.jitter));
    }
    Ok(())
}

/// Command-line arguments for a teardown run
///
/// The embedding binary's `clean` subcommand flattens this group, passes
/// `debug` and `log_level` to [`init_logging`](crate::logging::init_logging),
/// and hands [`CleanArgs::context`] and the converted [`CleanupConfig`] to
/// [`clean`](crate::clean::clean).
#[derive(Debug, Clone, Args)]
pub struct CleanArgs {
    /// Cluster whose NSX objects are removed
    #[arg(long, env = "NSX_CLEANUP_CLUSTER")]
    pub cluster: String,

    /// Overall teardown timeout in minutes
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MINUTES)]
    pub timeout: u64,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log verbosity: 0 = info, 1 = debug, 2+ = trace
    #[arg(long, default_value_t = 0)]
    pub log_level: u8,

    /// Concurrent workers deleting auto-created VPCs
    #[arg(long, default_value_t = DEFAULT_VPC_WORKERS)]
    pub vpc_workers: usize,

    /// Retries per auto-created VPC before giving up
    #[arg(long, default_value_t = DEFAULT_VPC_MAX_RETRIES)]
    pub vpc_max_retries: usize,

    /// Objects per hierarchical update request
    #[arg(long, default_value_t = DEFAULT_HAPI_CHUNK_SIZE)]
    pub chunk_size: usize,
}

impl CleanArgs {
    /// The `--timeout` minutes as a duration, saturating on overflow
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.saturating_mul(60))
    }

    /// A context expiring after the configured timeout
    ///
    /// Fails when the timeout is zero or the deadline cannot be represented.
    pub fn context(&self) -> Result<TeardownContext, ConfigError> {
        let timeout = self.timeout();
        let deadline = tokio::time::Instant::now().checked_add(timeout);
        match (self.timeout, deadline) {
            (0, _) | (_, None) => Err(ConfigError::InvalidTimeout(timeout)),
            (_, Some(deadline)) => Ok(TeardownContext::with_deadline(deadline)),
        }
    }
}

impl From<&CleanArgs> for CleanupConfig {
    fn from(args: &CleanArgs) -> Self {
        Self {
            cluster: args.cluster.clone(),
            queue: QueueConfig {
                workers: args.vpc_workers,
                max_retries: args.vpc_max_retries,
                ..QueueConfig::default()
            },
            chunk_size: args.chunk_size,
            ..Default::default()
        }
    }
}
