//! Top-level teardown entry point

use crate::cleanup::{Capabilities, CleanupService};
use crate::config::CleanupConfig;
use crate::context::TeardownContext;
use crate::error::TeardownError;
use crate::lb_infra::LbInfraCleaner;
use crate::nsx::NsxClient;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Constructs one resource-owning collaborator
pub type CollaboratorFactory = Box<dyn FnOnce() -> Result<Capabilities> + Send>;

/// Register `factories` in order, followed by the load-balancer infra
/// cleaner for `config.cluster`.
///
/// A factory failure is kept on the returned service; see
/// [`CleanupService::add`].
pub fn initialize_cleanup_service(
    config: &CleanupConfig,
    client: Arc<dyn NsxClient>,
    factories: Vec<CollaboratorFactory>,
) -> CleanupService {
    let service = factories.into_iter().fold(
        CleanupService::new(config.backoff.clone(), config.queue.clone()),
        |service, factory| service.add(factory),
    );

    let lb = LbInfraCleaner::new(
        client,
        config.cluster.clone(),
        config.chunk_size,
        config.default_retry.clone(),
    );
    service.add(move || Ok(Capabilities::new("lb-infra").with_infra(Arc::new(lb))))
}

/// Remove every NSX object owned by `config.cluster`.
///
/// Validates the configuration, builds the cleanup service and runs the four
/// teardown phases. Safe to re-run after a partial failure: objects already
/// deleted are no longer returned by discovery.
pub async fn clean(
    ctx: &TeardownContext,
    config: &CleanupConfig,
    client: Option<Arc<dyn NsxClient>>,
    factories: Vec<CollaboratorFactory>,
) -> Result<(), TeardownError> {
    config.validate()?;
    let client = client.ok_or(TeardownError::ClientUnavailable)?;

    info!(cluster = %config.cluster, "Starting cleanup");
    let start = Instant::now();

    let service = initialize_cleanup_service(config, client, factories)
        .build()
        .map_err(TeardownError::InitializationFailed)?;

    match service.cleanup(ctx).await {
        Ok(()) => {
            info!(cluster = %config.cluster, elapsed = ?start.elapsed(), "Cleanup succeeded");
            Ok(())
        }
        Err(e) => {
            error!(cluster = %config.cluster, stage = ?e.stage(), error = %e, "Cleanup failed");
            Err(e)
        }
    }
}
