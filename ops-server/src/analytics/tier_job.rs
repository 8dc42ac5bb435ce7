//! Tier 重算定时任务
//!
//! 按 `TIER_RECALC_INTERVAL_HOURS` 周期对每家餐厅的在职服务员重算
//! 30 天滚动指标、peer 统计和 tier 分档，写回 `composite_score` /
//! `tier` / `tier_updated_at`。注册为 Periodic 任务。

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::analytics::aggregator::MetricsAggregator;
use crate::analytics::tiers::TierCalculator;
use crate::core::ServerState;
use crate::db::repository::{restaurant, waiter};

/// Rolling window for tier metrics
const TIER_LOOKBACK_DAYS: u64 = 30;

pub struct TierRecalcJob {
    state: ServerState,
    shutdown: CancellationToken,
}

impl TierRecalcJob {
    pub fn new(state: ServerState, shutdown: CancellationToken) -> Self {
        Self { state, shutdown }
    }

    pub async fn run(self) {
        tracing::info!("Tier recalculation job started");
        let interval =
            Duration::from_secs(self.state.config.tier_recalc_interval_hours.max(1) * 3600);

        // First pass shortly after boot, then on the configured cadence
        loop {
            self.recalculate_all().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Tier recalculation job stopping");
                    return;
                }
            }
        }
    }

    /// One full pass over every restaurant. Failures are per-restaurant.
    pub async fn recalculate_all(&self) {
        let restaurants = match restaurant::find_all(&self.state.pool).await {
            Ok(restaurants) => restaurants,
            Err(e) => {
                tracing::error!(error = %e, "Tier recalc: failed to list restaurants");
                return;
            }
        };

        for r in restaurants {
            if let Err(e) = self.recalculate_restaurant(&r.id).await {
                tracing::warn!(restaurant_id = %r.id, error = %e, "Tier recalc failed");
            }
        }
    }

    async fn recalculate_restaurant(&self, restaurant_id: &str) -> shared::AppResult<()> {
        let aggregator = MetricsAggregator::new(self.state.pool.clone());
        let today = Utc::now().date_naive();

        let snapshots = aggregator
            .all_waiter_snapshots(restaurant_id, TIER_LOOKBACK_DAYS, today)
            .await?;
        if snapshots.is_empty() {
            return Ok(());
        }

        let peers = MetricsAggregator::peer_stats_from(&snapshots);
        let results = TierCalculator::calculate_all(&snapshots, &peers);

        let mut updated = 0usize;
        for (snapshot, breakdown, tier) in results {
            waiter::update_tier(
                &self.state.pool,
                &snapshot.waiter_id,
                tier.tier,
                breakdown.composite,
            )
            .await
            .map_err(shared::AppError::from)?;
            updated += 1;
        }

        tracing::info!(restaurant_id = %restaurant_id, updated, "Waiter tiers recalculated");
        Ok(())
    }
}
