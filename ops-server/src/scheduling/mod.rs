//! Weekly scheduling engine
//!
//! Score-and-rank shift assignment driven by a demand forecaster (weighted
//! historical averages with trend), a fairness evaluator (Gini over hours
//! and prime-shift exposure), and hard/soft constraint validation.

pub mod constraints;
pub mod engine;
pub mod fairness;
pub mod forecast;
pub mod narrator;
pub mod reasoning;

pub use constraints::{ShiftAssignment, StaffContext};
pub use engine::{EngineResult, RunLocks, SchedulingEngine, ENGINE_VERSION};
pub use fairness::{FairnessRating, FairnessReport};
pub use forecast::{DemandForecaster, WeeklyForecast};
pub use narrator::{DisabledNarrator, ScheduleNarrator};
