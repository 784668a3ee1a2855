//! The teardown orchestrator
//!
//! [`CleanupService`] is built by registering collaborator factories in
//! order and then runs exactly one four-phase teardown:
//!
//! 1. Pre-VPC-deletion cleaners, concurrently, each under its own retry
//! 2. Auto-created VPCs through the bounded retry queue
//! 3. Children of the pre-created VPC, under one retry
//! 4. Infra cleaners, concurrently, the whole batch retried on any failure

use super::capability::{
    Capabilities, CleanupBeforeVpcDeletion, CleanupInfra, CleanupVpcChildren, Registered,
    VpcService,
};
use super::fanout::run_all;
use super::queue::{QueueConfig, process_queue};
use crate::context::TeardownContext;
use crate::error::{Stage, TeardownError};
use crate::retry::{BackoffPolicy, is_retriable, retry_on_error};
use anyhow::{Context, Result, anyhow};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Path of the pre-created VPC, whose children are cleaned but which is
/// never deleted itself
pub const PRE_CREATED_VPC_PATH: &str = "";

/// Registered cleanup capabilities plus the policies used to run them
pub struct CleanupService {
    before_vpc_deletion: Vec<Registered<dyn CleanupBeforeVpcDeletion>>,
    vpc_children: Vec<Registered<dyn CleanupVpcChildren>>,
    infra: Vec<Registered<dyn CleanupInfra>>,
    vpc_service: Option<Arc<dyn VpcService>>,
    svc_err: Option<anyhow::Error>,
    backoff: BackoffPolicy,
    queue: QueueConfig,
}

impl Default for CleanupService {
    fn default() -> Self {
        Self::new(BackoffPolicy::default(), QueueConfig::default())
    }
}

impl CleanupService {
    pub fn new(backoff: BackoffPolicy, queue: QueueConfig) -> Self {
        Self {
            before_vpc_deletion: Vec::new(),
            vpc_children: Vec::new(),
            infra: Vec::new(),
            vpc_service: None,
            svc_err: None,
            backoff,
            queue,
        }
    }

    /// Construct one collaborator and register the roles it fills.
    ///
    /// Once a factory has failed, its error is kept and every later call is
    /// a no-op that does not invoke its factory. Registrations made before
    /// the failure are kept.
    pub fn add<F>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> Result<Capabilities>,
    {
        if self.svc_err.is_some() {
            return self;
        }

        let caps = match factory() {
            Ok(caps) => caps,
            Err(e) => {
                warn!(error = %e, "Failed to initialize cleanup collaborator");
                self.svc_err = Some(e);
                return self;
            }
        };

        if caps.is_empty() {
            debug!(name = %caps.name, "Collaborator has no cleanup capabilities");
        }

        let name = caps.name;
        if let Some(cleaner) = caps.before_vpc_deletion {
            self.before_vpc_deletion.push(Registered {
                name: name.clone(),
                cleaner,
            });
        }
        if let Some(cleaner) = caps.vpc_children {
            self.vpc_children.push(Registered {
                name: name.clone(),
                cleaner,
            });
        }
        if let Some(cleaner) = caps.infra {
            self.infra.push(Registered {
                name: name.clone(),
                cleaner,
            });
        }
        if let Some(service) = caps.vpc_service {
            if self.vpc_service.is_some() {
                warn!(name = %name, "VPC service already registered, replacing it");
            }
            self.vpc_service = Some(service);
        }

        self
    }

    /// The first registration error, if any
    pub fn svc_err(&self) -> Option<&anyhow::Error> {
        self.svc_err.as_ref()
    }

    /// Hand back the service, or the registration error if one occurred
    pub fn build(mut self) -> Result<Self> {
        match self.svc_err.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    pub fn before_vpc_deletion_count(&self) -> usize {
        self.before_vpc_deletion.len()
    }

    pub fn vpc_children_count(&self) -> usize {
        self.vpc_children.len()
    }

    pub fn infra_count(&self) -> usize {
        self.infra.len()
    }

    pub fn has_vpc_service(&self) -> bool {
        self.vpc_service.is_some()
    }

    /// Run all four teardown phases in order.
    pub async fn cleanup(&self, ctx: &TeardownContext) -> Result<(), TeardownError> {
        if let Some(e) = &self.svc_err {
            return Err(TeardownError::InitializationFailed(anyhow!("{e:#}")));
        }

        let start = Instant::now();
        info!(
            before_vpc_deletion = self.before_vpc_deletion.len(),
            vpc_children = self.vpc_children.len(),
            infra = self.infra.len(),
            "Starting NSX teardown"
        );

        self.cleanup_before_vpc_deletion(ctx)
            .await
            .map_err(|e| TeardownError::from_stage(Stage::BeforeVpcDeletion, e))?;
        self.cleanup_auto_created_vpcs(ctx)
            .await
            .map_err(|e| TeardownError::from_stage(Stage::AutoCreatedVpcs, e))?;
        self.cleanup_pre_created_vpc(ctx)
            .await
            .map_err(|e| TeardownError::from_stage(Stage::PreCreatedVpc, e))?;
        self.cleanup_infra(ctx)
            .await
            .map_err(|e| TeardownError::from_stage(Stage::Infra, e))?;

        info!(elapsed = ?start.elapsed(), "NSX teardown complete");
        Ok(())
    }

    /// Phase 1: every pre-cleaner concurrently, each with its own retry
    pub async fn cleanup_before_vpc_deletion(&self, ctx: &TeardownContext) -> Result<()> {
        info!(cleaners = self.before_vpc_deletion.len(), "Cleaning resources before VPC deletion");

        let tasks = self
            .before_vpc_deletion
            .iter()
            .map(|registered| {
                let Registered { name, cleaner } = registered.clone();
                let ctx = ctx.clone();
                let backoff = self.backoff.clone();
                let task = async move {
                    retry_on_error(&ctx, &backoff, is_retriable, &name, || {
                        cleaner.cleanup_before_vpc_deletion(&ctx)
                    })
                    .await
                };
                (registered.name.clone(), task)
            })
            .collect();

        run_all(tasks).await
    }

    /// Phase 2: delete every auto-created VPC and clean its children
    pub async fn cleanup_auto_created_vpcs(&self, ctx: &TeardownContext) -> Result<()> {
        let Some(vpc_service) = self.vpc_service.clone() else {
            debug!("No VPC service registered, skipping auto-created VPCs");
            return Ok(());
        };

        let paths = vpc_service.list_auto_created_vpc_paths();
        if paths.is_empty() {
            info!("No auto-created VPCs to clean");
            return Ok(());
        }
        info!(vpcs = paths.len(), "Cleaning auto-created VPCs");

        let children: Arc<[Registered<dyn CleanupVpcChildren>]> = self.vpc_children.clone().into();
        let ctx_for_items = ctx.clone();

        process_queue(ctx, paths, &self.queue, move |path: String| {
            let ctx = ctx_for_items.clone();
            let vpc_service = Arc::clone(&vpc_service);
            let children = Arc::clone(&children);
            async move {
                ctx.check()?;
                if path != PRE_CREATED_VPC_PATH {
                    vpc_service
                        .delete_vpc(&ctx, &path)
                        .await
                        .with_context(|| format!("Failed to delete VPC {path}"))?;
                }
                cleanup_vpc_children(&ctx, &children, &path).await
            }
        })
        .await
    }

    /// Phase 3: children of the pre-created VPC
    pub async fn cleanup_pre_created_vpc(&self, ctx: &TeardownContext) -> Result<()> {
        info!(cleaners = self.vpc_children.len(), "Cleaning pre-created VPC children");

        let children: Arc<[Registered<dyn CleanupVpcChildren>]> = self.vpc_children.clone().into();
        retry_on_error(ctx, &self.backoff, is_retriable, "pre-created VPC", || {
            cleanup_vpc_children(ctx, &children, PRE_CREATED_VPC_PATH)
        })
        .await
    }

    /// Phase 4: every infra cleaner concurrently; any failure retries the
    /// whole batch
    pub async fn cleanup_infra(&self, ctx: &TeardownContext) -> Result<()> {
        info!(cleaners = self.infra.len(), "Cleaning infra resources");

        retry_on_error(ctx, &self.backoff, is_retriable, "infra", || {
            let tasks: Vec<(String, BoxFuture<'static, Result<()>>)> = self
                .infra
                .iter()
                .map(|registered| {
                    let cleaner = Arc::clone(&registered.cleaner);
                    let ctx = ctx.clone();
                    let task = async move { cleaner.cleanup_infra_resources(&ctx).await }.boxed();
                    (registered.name.clone(), task)
                })
                .collect();
            run_all(tasks)
        })
        .await
    }
}

/// Run every children cleaner against `vpc_path` concurrently
async fn cleanup_vpc_children(
    ctx: &TeardownContext,
    children: &Arc<[Registered<dyn CleanupVpcChildren>]>,
    vpc_path: &str,
) -> Result<()> {
    let tasks = children
        .iter()
        .map(|registered| {
            let cleaner = Arc::clone(&registered.cleaner);
            let ctx = ctx.clone();
            let vpc_path = vpc_path.to_string();
            let task = async move { cleaner.cleanup_vpc_child_resources(&ctx, &vpc_path).await };
            (registered.name.clone(), task)
        })
        .collect();

    run_all(tasks).await
}
