//! NSX manager client seam
//!
//! The transport, authentication and paging of the real REST client live
//! outside this crate. Teardown only needs a tag search, a hierarchical
//! update and a single-object delete, so that is all the trait exposes.

use super::error::is_retryable_api_error;
use super::policy::PolicyObject;
use crate::context::{TeardownContext, TimeoutError};
use crate::retry::BackoffPolicy;
use anyhow::Result;
use async_trait::async_trait;
use backon::Retryable;
use nsx_cleanup_common::{LbResourceKind, Tag};
use tracing::{debug, warn};

/// Operations teardown performs against the NSX policy API
#[async_trait]
pub trait NsxClient: Send + Sync {
    /// Objects of `kind` carrying every tag in `tags`
    async fn search(&self, kind: LbResourceKind, tags: &[Tag]) -> Result<Vec<PolicyObject>>;

    /// Submit one hierarchical update request
    async fn hierarchical_update(&self, objects: &[PolicyObject]) -> Result<()>;

    /// Delete a single object by path
    async fn delete(&self, object: &PolicyObject) -> Result<()>;
}

/// Submit `objects` through hierarchical updates of at most `chunk_size`
/// objects each.
///
/// Each chunk is retried with `retry` while the manager reports throttling
/// or unavailability; any other failure is returned unchanged so callers see
/// the manager's own message. `on_chunk_done` is called with every chunk the
/// manager accepted, which lets callers evict those objects from local state.
pub async fn paging_update<F>(
    ctx: &TeardownContext,
    client: &dyn NsxClient,
    objects: &[PolicyObject],
    chunk_size: usize,
    retry: &BackoffPolicy,
    mut on_chunk_done: F,
) -> Result<()>
where
    F: FnMut(&[PolicyObject]),
{
    let total_chunks = objects.len().div_ceil(chunk_size.max(1));

    for (index, chunk) in objects.chunks(chunk_size.max(1)).enumerate() {
        ctx.check()?;

        let submit = (|| async move { client.hierarchical_update(chunk).await })
            .retry(retry.builder())
            .when(is_retryable_api_error)
            .notify(|e, dur| {
                warn!(
                    chunk = index,
                    delay = ?dur,
                    error = %e,
                    "Hierarchical update throttled, retrying..."
                );
            });

        tokio::select! {
            result = submit => result?,
            e = ctx.done() => return Err(TimeoutError(e).into()),
        }

        debug!(
            chunk = index + 1,
            total_chunks,
            size = chunk.len(),
            "Hierarchical update chunk accepted"
        );
        on_chunk_done(chunk);
    }

    Ok(())
}
