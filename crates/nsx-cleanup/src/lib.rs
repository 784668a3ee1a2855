//! nsx-cleanup - Teardown orchestration for NSX resources
//!
//! Removes everything an operator created on an NSX manager for one cluster:
//! auto-created VPCs and their children, the children of the pre-created
//! VPC, and infra-level load-balancer objects. Collaborators that own
//! individual resource types plug in through the capability traits in
//! [`cleanup`]; the engine only sequences phases, bounds concurrency and
//! aggregates failures.
//!
//! ## Modules
//!
//! - [`clean`]: Top-level entry point
//! - [`cleanup`]: Capabilities, registration and the four-phase orchestrator
//! - [`lb_infra`]: Load-balancer infra cleaner
//! - [`nsx`]: NSX client seam, object model and error classification
//! - [`context`]: Cancellation and deadlines
//! - [`retry`]: Backoff policies and error classification
//! - [`config`]: Configuration and CLI arguments
//! - [`error`]: Error taxonomy
//! - [`logging`]: Tracing setup

pub mod clean;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod error;
pub mod lb_infra;
pub mod logging;
pub mod nsx;
pub mod retry;

pub use clean::{CollaboratorFactory, clean, initialize_cleanup_service};
pub use cleanup::{
    Capabilities, CleanupBeforeVpcDeletion, CleanupInfra, CleanupService, CleanupVpcChildren,
    PRE_CREATED_VPC_PATH, QueueConfig, VpcService,
};
pub use config::{CleanArgs, CleanupConfig};
pub use context::{ContextError, TeardownContext, TimeoutError};
pub use error::{ConfigError, Stage, TeardownError};
pub use lb_infra::{CleanupReport, LbInfraCleaner};
pub use nsx::{NsxApiError, NsxClient, PolicyObject};
pub use retry::BackoffPolicy;
