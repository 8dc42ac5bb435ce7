//! Fairness-first party router
//!
//! Selects a (table, waiter) pair for a seating request subject to
//! capacity, preference, section/rotation mode, and a fairness penalty
//! that prevents tip/cover concentration.

pub mod scoring;
pub mod service;

pub use scoring::{rank_waiters, score_tables, RankedWaiter, ScoredTable};
pub use service::{NoMatchReason, RouteRequest, RouteResponse, RouterService};
