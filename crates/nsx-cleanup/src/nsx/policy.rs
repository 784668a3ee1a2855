//! Minimal NSX policy object model
//!
//! Only the fields teardown needs: identity, type, tags and the
//! mark-for-delete flag used by hierarchical updates.

use nsx_cleanup_common::{LbResourceKind, Tag};
use serde::{Deserialize, Serialize};

/// A policy object returned by a tag search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyObject {
    pub id: String,
    pub path: String,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub marked_for_delete: bool,
}

impl PolicyObject {
    pub fn new(kind: LbResourceKind, id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            resource_type: kind.resource_type().to_string(),
            parent_path: None,
            tags: Vec::new(),
            marked_for_delete: false,
        }
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// Flag the object for deletion in the next hierarchical update
    pub fn mark_for_delete(mut self) -> Self {
        self.marked_for_delete = true;
        self
    }

    /// The load-balancer family this object belongs to, if any
    pub fn kind(&self) -> Option<LbResourceKind> {
        LbResourceKind::ALL
            .into_iter()
            .find(|k| k.resource_type() == self.resource_type)
    }

    /// Whether every one of `tags` is present on the object
    pub fn has_tags(&self, tags: &[Tag]) -> bool {
        tags.iter().all(|t| self.tags.contains(t))
    }
}
