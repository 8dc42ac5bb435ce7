//! Table state machine and its transactional application service

pub mod service;
pub mod state_machine;

pub use service::{ApplyOutcome, TableStateService};
pub use state_machine::{Decision, Provenance, StateMachineError};
