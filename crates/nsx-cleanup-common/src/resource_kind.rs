//! Load-balancer resource families and cleanup ordering
//!
//! Virtual servers reference pools, services, groups and profiles, so they
//! have to be removed before anything else. All other families are
//! independent of each other.

use crate::tags::{self, Tag};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Families of NSX objects removed by the load-balancer infra cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LbResourceKind {
    /// Virtual server (references pools, services and profiles)
    VirtualServer,
    /// Server pool
    Pool,
    /// Load-balancer service
    Service,
    /// Group backing DLB pool membership
    Group,
    /// Share under the shared root
    Share,
    /// Shared resource under a share
    SharedResource,
    /// TLS certificate
    Certificate,
    /// Policy domain
    Domain,
    /// Application profile
    AppProfile,
    /// Persistence profile
    PersistenceProfile,
    /// Health monitor profile
    MonitorProfile,
}

impl LbResourceKind {
    /// Every family, in cleanup order
    pub const ALL: [LbResourceKind; 11] = [
        LbResourceKind::VirtualServer,
        LbResourceKind::Pool,
        LbResourceKind::Service,
        LbResourceKind::Group,
        LbResourceKind::Share,
        LbResourceKind::SharedResource,
        LbResourceKind::Certificate,
        LbResourceKind::Domain,
        LbResourceKind::AppProfile,
        LbResourceKind::PersistenceProfile,
        LbResourceKind::MonitorProfile,
    ];

    /// The three profile families, which cannot be bulk deleted
    pub const PROFILES: [LbResourceKind; 3] = [
        LbResourceKind::AppProfile,
        LbResourceKind::PersistenceProfile,
        LbResourceKind::MonitorProfile,
    ];

    /// NSX policy `resource_type` used in searches
    pub fn resource_type(self) -> &'static str {
        match self {
            LbResourceKind::VirtualServer => "LBVirtualServer",
            LbResourceKind::Pool => "LBPool",
            LbResourceKind::Service => "LBService",
            LbResourceKind::Group => "Group",
            LbResourceKind::Share => "Share",
            LbResourceKind::SharedResource => "SharedResource",
            LbResourceKind::Certificate => "TlsCertificate",
            LbResourceKind::Domain => "Domain",
            LbResourceKind::AppProfile => "LBAppProfile",
            LbResourceKind::PersistenceProfile => "LBPersistenceProfile",
            LbResourceKind::MonitorProfile => "LBMonitorProfile",
        }
    }

    /// Whether objects of this family can go through a hierarchical
    /// mark-for-delete update
    pub fn supports_bulk_delete(self) -> bool {
        !Self::PROFILES.contains(&self)
    }

    /// Whether the family is created by the distributed load balancer
    pub fn is_dlb(self) -> bool {
        matches!(
            self,
            LbResourceKind::VirtualServer
                | LbResourceKind::Pool
                | LbResourceKind::Service
                | LbResourceKind::Group
        )
    }

    /// Get cleanup priority (lower number = cleanup first)
    ///
    /// - 0: Virtual servers
    /// - 1: Everything else, in parallel
    pub fn cleanup_priority(self) -> u8 {
        match self {
            LbResourceKind::VirtualServer => 0,
            _ => 1,
        }
    }

    /// Every family grouped by [`cleanup_priority`](Self::cleanup_priority),
    /// lowest priority first
    ///
    /// A stage may only start once every earlier stage has finished. Families
    /// within one stage are independent.
    pub fn cleanup_stages() -> Vec<Vec<LbResourceKind>> {
        let mut kinds = Self::ALL.to_vec();
        kinds.sort_by_key(|k| k.cleanup_priority());

        let mut stages: Vec<Vec<LbResourceKind>> = Vec::new();
        for kind in kinds {
            match stages.last_mut() {
                Some(stage) if stage[0].cleanup_priority() == kind.cleanup_priority() => {
                    stage.push(kind)
                }
                _ => stages.push(vec![kind]),
            }
        }
        stages
    }

    /// Tags used to discover objects of this family for `cluster`
    ///
    /// Shares, shared resources and certificates under the shared root were
    /// historically written by NCP and carry its cluster tag.
    pub fn discovery_tags(self, cluster: &str) -> Vec<Tag> {
        match self {
            k if k.is_dlb() => tags::dlb_tags(cluster),
            LbResourceKind::Share
            | LbResourceKind::SharedResource
            | LbResourceKind::Certificate => tags::ncp_cluster_tags(cluster),
            _ => tags::cluster_tags(cluster),
        }
    }
}

impl fmt::Display for LbResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_type())
    }
}
