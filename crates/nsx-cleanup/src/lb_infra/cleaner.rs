//! Load-balancer infra cleanup
//!
//! Virtual servers reference pools, services, groups and profiles, so they
//! are removed first and everything else waits for them. The remaining
//! families are independent and run concurrently:
//!
//! - Bulk families are searched by tag, marked for delete and submitted
//!   through chunked hierarchical updates.
//! - Profile families cannot be bulk deleted. Their objects are deleted one
//!   at a time, best effort, and the last failure is reported after every
//!   object has been attempted.

use super::report::CleanupReport;
use crate::cleanup::{CleanupInfra, run_all};
use crate::context::TeardownContext;
use crate::nsx::{NsxClient, PolicyObject, ignore_not_found, paging_update};
use crate::retry::BackoffPolicy;
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use nsx_cleanup_common::LbResourceKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Removes every load-balancer object owned by one cluster
#[derive(Clone)]
pub struct LbInfraCleaner {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn NsxClient>,
    cluster: String,
    chunk_size: usize,
    retry: BackoffPolicy,
    report: Mutex<CleanupReport>,
}

impl LbInfraCleaner {
    pub fn new(
        client: Arc<dyn NsxClient>,
        cluster: impl Into<String>,
        chunk_size: usize,
        retry: BackoffPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                cluster: cluster.into(),
                chunk_size,
                retry,
                report: Mutex::new(CleanupReport::default()),
            }),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.inner.cluster
    }

    /// Snapshot of what has been deleted so far
    pub fn report(&self) -> CleanupReport {
        self.report_mut().clone()
    }

    fn report_mut(&self) -> MutexGuard<'_, CleanupReport> {
        self.inner.report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn cleanup_infra_dlb_virtual_servers(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_bulk(ctx, LbResourceKind::VirtualServer).await
    }

    pub async fn cleanup_infra_dlb_pools(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_bulk(ctx, LbResourceKind::Pool).await
    }

    pub async fn cleanup_infra_dlb_services(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_bulk(ctx, LbResourceKind::Service).await
    }

    pub async fn cleanup_infra_dlb_groups(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_bulk(ctx, LbResourceKind::Group).await
    }

    pub async fn cleanup_infra_shares(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_bulk(ctx, LbResourceKind::Share).await
    }

    pub async fn cleanup_infra_shared_resources(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_bulk(ctx, LbResourceKind::SharedResource).await
    }

    pub async fn cleanup_infra_certificates(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_bulk(ctx, LbResourceKind::Certificate).await
    }

    pub async fn cleanup_infra_domains(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_bulk(ctx, LbResourceKind::Domain).await
    }

    /// Search, mark for delete and submit one family through hierarchical
    /// updates
    async fn cleanup_bulk(&self, ctx: &TeardownContext, kind: LbResourceKind) -> Result<()> {
        ctx.check()?;

        let tags = kind.discovery_tags(&self.inner.cluster);
        let objects = self.inner.client.search(kind, &tags).await?;
        if objects.is_empty() {
            debug!(kind = %kind, "No objects to delete");
            return Ok(());
        }

        let marked: Vec<PolicyObject> = objects
            .into_iter()
            .map(PolicyObject::mark_for_delete)
            .collect();
        info!(kind = %kind, count = marked.len(), "Deleting objects");

        let mut accepted = 0usize;
        let result = paging_update(
            ctx,
            self.inner.client.as_ref(),
            &marked,
            self.inner.chunk_size,
            &self.inner.retry,
            |chunk| {
                accepted += chunk.len();
                self.report_mut().record_deleted(kind, chunk.len());
            },
        )
        .await;

        if let Err(e) = &result {
            let failed = marked.len() - accepted;
            self.report_mut().record_failed(kind, failed);
            warn!(kind = %kind, deleted = accepted, failed, error = %e, "Failed to delete objects");
        }
        result
    }

    /// Delete every application, persistence and monitor profile one at a
    /// time
    pub async fn cleanup_lb_profiles(&self, ctx: &TeardownContext) -> Result<()> {
        self.cleanup_singly(ctx, &LbResourceKind::PROFILES).await
    }

    /// Best-effort single deletes for families without bulk delete support
    async fn cleanup_singly(&self, ctx: &TeardownContext, kinds: &[LbResourceKind]) -> Result<()> {
        let mut last_err = None;

        for &kind in kinds {
            ctx.check()?;

            let tags = kind.discovery_tags(&self.inner.cluster);
            let objects = match self.inner.client.search(kind, &tags).await {
                Ok(objects) => objects,
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Failed to list profiles");
                    last_err = Some(e);
                    continue;
                }
            };

            let (mut deleted, mut failed) = (0usize, 0usize);
            for object in &objects {
                ctx.check()?;
                match ignore_not_found(self.inner.client.delete(object).await) {
                    Ok(_) => deleted += 1,
                    Err(e) => {
                        warn!(
                            kind = %kind,
                            path = %object.path,
                            error = %e,
                            "Failed to delete profile"
                        );
                        failed += 1;
                        last_err = Some(e);
                    }
                }
            }

            {
                let mut report = self.report_mut();
                report.record_deleted(kind, deleted);
                report.record_failed(kind, failed);
            }
            if !objects.is_empty() {
                info!(kind = %kind, deleted, failed, "Profiles cleaned");
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run one cleanup stage: every bulk family concurrently, alongside a
    /// single task deleting the remaining families one object at a time
    async fn cleanup_stage(&self, ctx: &TeardownContext, stage: &[LbResourceKind]) -> Result<()> {
        let (bulk, single): (Vec<LbResourceKind>, Vec<LbResourceKind>) =
            stage.iter().copied().partition(|k| k.supports_bulk_delete());

        let mut tasks: Vec<(String, BoxFuture<'static, Result<()>>)> = bulk
            .into_iter()
            .map(|kind| {
                let this = self.clone();
                let ctx = ctx.clone();
                let task = async move { this.cleanup_bulk(&ctx, kind).await }.boxed();
                (kind.to_string(), task)
            })
            .collect();

        if !single.is_empty() {
            let this = self.clone();
            let ctx = ctx.clone();
            tasks.push((
                "LBProfiles".to_string(),
                async move { this.cleanup_singly(&ctx, &single).await }.boxed(),
            ));
        }

        run_all(tasks).await
    }
}

#[async_trait]
impl CleanupInfra for LbInfraCleaner {
    /// Stages run in priority order, so virtual servers are gone before any
    /// family they reference is touched
    async fn cleanup_infra_resources(&self, ctx: &TeardownContext) -> Result<()> {
        for stage in LbResourceKind::cleanup_stages() {
            debug!(families = stage.len(), "Starting cleanup stage");
            self.cleanup_stage(ctx, &stage).await?;
        }
        Ok(())
    }
}
