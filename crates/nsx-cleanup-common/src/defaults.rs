//! Default configuration values for the teardown engine
//!
//! These constants keep the CLI defaults and the library defaults in sync.

use std::time::Duration;

/// Number of workers tearing down auto-created VPCs in parallel
pub const DEFAULT_VPC_WORKERS: usize = 8;

/// Maximum number of requeues for a single VPC before giving up on it
pub const DEFAULT_VPC_MAX_RETRIES: usize = 12;

/// Delay before a failed VPC is processed again
pub const DEFAULT_VPC_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Maximum number of objects submitted in one hierarchical update request
pub const DEFAULT_HAPI_CHUNK_SIZE: usize = 500;

/// Overall teardown timeout in minutes
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 30;

// Shared backoff used by the orchestrator phases

/// Number of attempts made by the shared backoff
pub const DEFAULT_BACKOFF_STEPS: usize = 6;

/// First delay of the shared backoff
pub const DEFAULT_BACKOFF_DURATION: Duration = Duration::from_millis(500);

/// Multiplier applied to the delay after every attempt
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Upper bound for a single backoff delay
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Fraction of the delay added as random jitter
pub const DEFAULT_BACKOFF_JITTER: f64 = 0.1;

// Small bounded policy used by per-object legacy paths

/// Number of attempts made by the default retry
pub const DEFAULT_RETRY_STEPS: usize = 5;

/// Constant delay of the default retry
pub const DEFAULT_RETRY_DURATION: Duration = Duration::from_millis(10);
