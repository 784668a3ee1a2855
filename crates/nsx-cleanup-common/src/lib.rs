//! nsx-cleanup-common - Shared types for NSX teardown
//!
//! This crate holds the definitions shared by the teardown engine and its
//! collaborators, without any runtime dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Default tuning values for retries, queues and chunking
//! - [`resource_kind`]: Load-balancer resource families and cleanup ordering
//! - [`tags`]: NSX tag scopes used for discovery

pub mod defaults;
pub mod resource_kind;
pub mod tags;

pub use resource_kind::LbResourceKind;
pub use tags::Tag;
