//! Teardown orchestration
//!
//! - `capability`: the cleanup roles collaborators fill
//! - `service`: registration builder and the four-phase orchestrator
//! - `queue`: bounded retry queue for per-VPC teardown
//! - `fanout`: fixed-size fan-out with first-error aggregation

pub mod capability;
pub mod fanout;
pub mod queue;
pub mod service;

pub use capability::{
    Capabilities, CleanupBeforeVpcDeletion, CleanupInfra, CleanupVpcChildren, Registered,
    VpcService,
};
pub use fanout::run_all;
pub use queue::{QueueConfig, RetryQueue, process_queue};
pub use service::{CleanupService, PRE_CREATED_VPC_PATH};
