//! Background maintenance loop
//!
//! Periodically scans for drift, consolidates when the record-count trigger
//! fires and runs an evolution cycle. Cycle errors are logged and the loop
//! keeps going.

use crate::context::GovernanceContext;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Run one maintenance pass.
pub async fn run_maintenance_pass(ctx: &GovernanceContext) {
    let settings = &ctx.config().maintenance;

    let report = ctx.scan_drift().await;
    if report.execution_blocked {
        tracing::warn!(
            critical = report.critical,
            errors = report.error,
            "Maintenance drift scan found blocking issues: {}",
            report.primary_recommendation()
        );
    } else if report.total_issues > 0 {
        tracing::info!(
            status = ?report.overall_status,
            total = report.total_issues,
            "Maintenance drift scan found {} issue(s)",
            report.total_issues
        );
    }

    if settings.run_consolidation {
        match ctx.consolidate_if_due().await {
            Ok(Some(report)) => tracing::info!(
                blocks = report.blocks_created.len(),
                archived = report.records_archived.len(),
                "Maintenance consolidation complete"
            ),
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "Maintenance consolidation failed"),
        }
    }

    if settings.run_evolution {
        match ctx.evolve().await {
            Ok(report) => tracing::info!(
                applied = report.proposals_applied,
                retirement = report.retirement_candidates,
                "Maintenance evolution complete"
            ),
            Err(e) => tracing::error!(error = %e, "Maintenance evolution failed"),
        }
    }
}

/// Spawn the periodic maintenance loop.
///
/// Returns `None` when maintenance is disabled.
pub fn spawn_maintenance_loop(ctx: Arc<GovernanceContext>) -> Option<JoinHandle<()>> {
    let settings = ctx.config().maintenance.clone();
    if !settings.enabled {
        tracing::debug!("Maintenance disabled, skipping background loop");
        return None;
    }

    let interval = settings.interval_secs.max(1);
    tracing::info!(interval_secs = interval, "Maintenance loop started");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tokio::time::Duration::from_secs(interval));
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_maintenance_pass(&ctx).await;
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, GovernanceConfig};
    use crate::memory::Scope;
    use serde_json::json;

    fn config(enabled: bool) -> GovernanceConfig {
        let mut config = GovernanceConfig::default();
        config.storage.backend = BackendKind::Memory;
        config.maintenance.enabled = enabled;
        config.consolidation.trigger_entry_count = 3;
        config
    }

    #[tokio::test]
    async fn test_disabled_loop_is_not_spawned() {
        let ctx = Arc::new(GovernanceContext::open(config(false)).await.unwrap());
        assert!(spawn_maintenance_loop(ctx).is_none());
    }

    #[tokio::test]
    async fn test_enabled_loop_is_spawned() {
        let ctx = Arc::new(GovernanceContext::open(config(true)).await.unwrap());
        let handle = spawn_maintenance_loop(ctx).unwrap();
        handle.abort();
    }

    #[tokio::test]
    async fn test_pass_consolidates_and_evolves() {
        let ctx = GovernanceContext::open(config(true)).await.unwrap();
        for i in 0..3 {
            ctx.store()
                .write(
                    Scope::Global,
                    &format!("build-{}", i),
                    json!({"description": format!("linker failed {}", i)}),
                    vec!["build_failure".into()],
                    "test",
                )
                .await
                .unwrap();
        }
        run_maintenance_pass(&ctx).await;

        assert_eq!(ctx.knowledge().all().await.len(), 1);
        assert!(ctx.patterns().load().await.unwrap().is_some());
    }
}
