//! Analytics — rollups from visits and tier calculation

pub mod aggregator;
pub mod rollups;
pub mod tier_job;
pub mod tiers;

pub use aggregator::{MetricsAggregator, PeerStats, WaiterSnapshot};
pub use rollups::AnalyticsService;
pub use tier_job::TierRecalcJob;
pub use tiers::TierCalculator;
