//! Narrative text for schedules — optional external collaborator
//!
//! The engine is fully functional with the structured rule lines alone; an
//! LLM-backed narrator can be plugged in to add prose, and the default
//! implementation simply declines.

use async_trait::async_trait;

/// Inputs for a whole-schedule summary paragraph
#[derive(Debug, Clone)]
pub struct SummaryContext {
    pub week_start: chrono::NaiveDate,
    pub items_created: usize,
    pub total_hours: f64,
    pub coverage_pct: f64,
    pub fairness_gini: f64,
    pub preference_avg: f64,
    pub understaffed_slots: Vec<String>,
}

/// Narrates schedules. Implementations may call out to an external model;
/// failures must degrade to `None`, never block the run.
#[async_trait]
pub trait ScheduleNarrator: Send + Sync {
    /// Optional paragraph for one schedule item
    async fn narrate_item(&self, reasons: &[String]) -> Option<String>;

    /// Optional summary paragraph for the whole schedule
    async fn narrate_summary(&self, context: &SummaryContext) -> Option<String>;
}

/// Default narrator: produces nothing
pub struct DisabledNarrator;

#[async_trait]
impl ScheduleNarrator for DisabledNarrator {
    async fn narrate_item(&self, _reasons: &[String]) -> Option<String> {
        None
    }

    async fn narrate_summary(&self, _context: &SummaryContext) -> Option<String> {
        None
    }
}
