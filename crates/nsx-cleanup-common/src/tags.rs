//! NSX tag scopes for the teardown engine
//!
//! Every object the operator creates on NSX carries these tags, which is how
//! teardown discovers what to delete without any local state.
//!
//! ## Tag Schema
//!
//! | Scope | Description |
//! |-------|-------------|
//! | `nsx-op/cluster` | Kubernetes cluster that owns the object |
//! | `nsx-op/created_for` | Feature that created the object (e.g. `DLB`) |
//! | `ncp/cluster` | Cluster tag written by the legacy NCP component |

use serde::{Deserialize, Serialize};

/// Tag scope for cluster ownership
pub const TAG_SCOPE_CLUSTER: &str = "nsx-op/cluster";

/// Tag scope naming the feature an object was created for
pub const TAG_SCOPE_CREATED_FOR: &str = "nsx-op/created_for";

/// `created_for` value of distributed load-balancer objects
pub const TAG_VALUE_DLB: &str = "DLB";

/// Cluster tag scope used by NCP
pub const TAG_SCOPE_NCP_CLUSTER: &str = "ncp/cluster";

/// A single NSX tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub scope: String,
    pub tag: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tag: tag.into(),
        }
    }
}

/// Tags matching every object owned by `cluster`
pub fn cluster_tags(cluster: &str) -> Vec<Tag> {
    vec![Tag::new(TAG_SCOPE_CLUSTER, cluster)]
}

/// Tags matching the distributed load-balancer objects owned by `cluster`
pub fn dlb_tags(cluster: &str) -> Vec<Tag> {
    vec![
        Tag::new(TAG_SCOPE_CLUSTER, cluster),
        Tag::new(TAG_SCOPE_CREATED_FOR, TAG_VALUE_DLB),
    ]
}

/// Tags matching objects NCP created for `cluster`
pub fn ncp_cluster_tags(cluster: &str) -> Vec<Tag> {
    vec![Tag::new(TAG_SCOPE_NCP_CLUSTER, cluster)]
}
