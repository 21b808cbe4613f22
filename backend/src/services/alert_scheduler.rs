//! Background re-evaluation of inventory alerts for open lots

use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use super::inventory_alert::InventoryAlertService;
use crate::AppState;

/// Spawn the periodic evaluation loop
pub fn start_alert_scheduler(state: &AppState) -> JoinHandle<()> {
    let db = state.db.clone();
    let alerts = InventoryAlertService::from_state(state);
    let period = Duration::from_secs(state.config.alerts.scheduler_interval_secs.max(1));

    tracing::info!(interval_secs = period.as_secs(), "Starting alert scheduler");

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            run_once(&db, &alerts).await;
        }
    })
}

/// Evaluate every lot that can still change; one failing lot does not stop the sweep
async fn run_once(db: &PgPool, alerts: &InventoryAlertService) {
    let lots: Vec<Uuid> = match sqlx::query_scalar(
        "SELECT id FROM production_lots WHERE status IN ('planning', 'ready', 'in_progress')",
    )
    .fetch_all(db)
    .await
    {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "Alert scheduler could not list lots");
            return;
        }
    };

    let mut evaluated = 0usize;
    for lot_id in lots {
        match alerts.evaluate_lot(lot_id).await {
            Ok(_) => evaluated += 1,
            Err(e) => tracing::warn!(lot_id = %lot_id, error = %e, "Scheduled alert evaluation failed"),
        }
    }

    tracing::debug!(evaluated, "Alert scheduler sweep finished");
}
