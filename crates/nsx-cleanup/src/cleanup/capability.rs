//! Cleanup capabilities a resource-owning collaborator can provide
//!
//! A collaborator declares at registration time which roles it fills by
//! returning a [`Capabilities`] value. One object may fill several roles by
//! handing out clones of the same `Arc`.

use crate::context::TeardownContext;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Removes objects that would block recursive VPC deletion
#[async_trait]
pub trait CleanupBeforeVpcDeletion: Send + Sync {
    async fn cleanup_before_vpc_deletion(&self, ctx: &TeardownContext) -> Result<()>;
}

/// Removes the children of one VPC
///
/// An empty `vpc_path` names the pre-created VPC, which is never deleted
/// itself; implementors must accept it.
#[async_trait]
pub trait CleanupVpcChildren: Send + Sync {
    async fn cleanup_vpc_child_resources(
        &self,
        ctx: &TeardownContext,
        vpc_path: &str,
    ) -> Result<()>;
}

/// Removes project or infra level objects once all VPCs are gone
#[async_trait]
pub trait CleanupInfra: Send + Sync {
    async fn cleanup_infra_resources(&self, ctx: &TeardownContext) -> Result<()>;
}

/// The VPC-owning collaborator
#[async_trait]
pub trait VpcService: Send + Sync {
    /// Paths of every VPC created on demand for a namespace
    fn list_auto_created_vpc_paths(&self) -> HashSet<String>;

    /// Recursively delete one VPC. An empty path is the pre-created VPC and
    /// must be skipped.
    async fn delete_vpc(&self, ctx: &TeardownContext, path: &str) -> Result<()>;
}

/// A capability registered under a collaborator name
pub struct Registered<T: ?Sized> {
    pub name: String,
    pub cleaner: Arc<T>,
}

impl<T: ?Sized> Clone for Registered<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            cleaner: Arc::clone(&self.cleaner),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Registered<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registered").field("name", &self.name).finish()
    }
}

/// The roles one collaborator fills
#[derive(Default)]
pub struct Capabilities {
    pub name: String,
    pub before_vpc_deletion: Option<Arc<dyn CleanupBeforeVpcDeletion>>,
    pub vpc_children: Option<Arc<dyn CleanupVpcChildren>>,
    pub infra: Option<Arc<dyn CleanupInfra>>,
    pub vpc_service: Option<Arc<dyn VpcService>>,
}

impl Capabilities {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_before_vpc_deletion(mut self, cleaner: Arc<dyn CleanupBeforeVpcDeletion>) -> Self {
        self.before_vpc_deletion = Some(cleaner);
        self
    }

    pub fn with_vpc_children(mut self, cleaner: Arc<dyn CleanupVpcChildren>) -> Self {
        self.vpc_children = Some(cleaner);
        self
    }

    pub fn with_infra(mut self, cleaner: Arc<dyn CleanupInfra>) -> Self {
        self.infra = Some(cleaner);
        self
    }

    pub fn with_vpc_service(mut self, service: Arc<dyn VpcService>) -> Self {
        self.vpc_service = Some(service);
        self
    }

    /// Whether the collaborator fills no cleanup role at all
    pub fn is_empty(&self) -> bool {
        self.before_vpc_deletion.is_none()
            && self.vpc_children.is_none()
            && self.infra.is_none()
            && self.vpc_service.is_none()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("name", &self.name)
            .field("before_vpc_deletion", &self.before_vpc_deletion.is_some())
            .field("vpc_children", &self.vpc_children.is_some())
            .field("infra", &self.infra.is_some())
            .field("vpc_service", &self.vpc_service.is_some())
            .finish()
    }
}
