//! Table state machine
//!
//! Pure transition rules; no I/O. The service layer applies accepted
//! decisions against the store.
//!
//! ```text
//! clean       → occupied (host | ml | system)
//! occupied    → dirty    (ml | host | system)
//! dirty       → clean    (ml | host | system)
//! clean       → reserved | unavailable   (host | system)
//! reserved    → occupied | clean         (host | system)
//! unavailable → clean                    (host | system)
//! ```
//!
//! Same-state pushes for clean→clean and occupied→occupied are accepted as
//! idempotent ML no-ops: the confidence refreshes when it beats the stored
//! value, otherwise the push is ignored. Anything else is invalid.

use shared::models::{StateSource, TableState};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StateMachineError {
    #[error("invalid transition {from} → {to} (source: {state_source})")]
    InvalidTransition {
        from: TableState,
        to: TableState,
        state_source: StateSource,
    },
}

/// Who is writing, with the provenance the audit row keeps
#[derive(Debug, Clone)]
pub enum Provenance {
    Ml {
        confidence: f64,
        model_id: Option<String>,
    },
    Host {
        user_id: String,
    },
    System {
        operation: String,
    },
}

impl Provenance {
    pub fn source(&self) -> StateSource {
        match self {
            Self::Ml { .. } => StateSource::Ml,
            Self::Host { .. } => StateSource::Host,
            Self::System { .. } => StateSource::System,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Ml { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }

    /// Audit detail: model id, user id, or operation name
    pub fn detail(&self) -> String {
        match self {
            Self::Ml { model_id, .. } => {
                model_id.clone().unwrap_or_else(|| "classifier".to_string())
            }
            Self::Host { user_id } => user_id.clone(),
            Self::System { operation } => operation.clone(),
        }
    }
}

/// Outcome of evaluating a requested transition
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Valid transition: apply and append one audit row
    Apply,
    /// Same-state ML push with higher confidence: refresh, no audit row
    RefreshConfidence,
    /// Same-state push with no better confidence: drop silently
    Ignore,
}

/// Evaluate a requested transition against the rules.
pub fn evaluate(
    current: TableState,
    current_confidence: Option<f64>,
    next: TableState,
    provenance: &Provenance,
) -> Result<Decision, StateMachineError> {
    use TableState::*;

    let source = provenance.source();

    // Idempotent same-state pushes (ML repeats the winning label every frame)
    if current == next {
        if matches!(current, Clean | Occupied) {
            let better = match (provenance.confidence(), current_confidence) {
                (Some(new), Some(old)) => new > old,
                (Some(_), None) => true,
                (None, _) => false,
            };
            return Ok(if better { Decision::RefreshConfidence } else { Decision::Ignore });
        }
        return Err(StateMachineError::InvalidTransition { from: current, to: next, state_source: source });
    }

    let allowed = match (current, next) {
        (Clean, Occupied) => true,
        (Occupied, Dirty) => true,
        (Dirty, Clean) => true,
        // Reservation and maintenance moves are operator decisions; the
        // classifier only ever emits clean/occupied/dirty labels.
        (Clean, Reserved) | (Clean, Unavailable) => source != StateSource::Ml,
        (Reserved, Occupied) | (Reserved, Clean) => source != StateSource::Ml,
        (Unavailable, Clean) => source != StateSource::Ml,
        _ => false,
    };

    if allowed {
        Ok(Decision::Apply)
    } else {
        Err(StateMachineError::InvalidTransition { from: current, to: next, state_source: source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TableState::*;

    fn ml(confidence: f64) -> Provenance {
        Provenance::Ml { confidence, model_id: Some("dino-v3".into()) }
    }

    fn host() -> Provenance {
        Provenance::Host { user_id: "user-1".into() }
    }

    fn system(op: &str) -> Provenance {
        Provenance::System { operation: op.into() }
    }

    #[test]
    fn occupancy_cycle_is_valid_for_all_sources() {
        for p in [ml(0.9), host(), system("visit.clear")] {
            assert_eq!(evaluate(Clean, None, Occupied, &p), Ok(Decision::Apply));
            assert_eq!(evaluate(Occupied, None, Dirty, &p), Ok(Decision::Apply));
            assert_eq!(evaluate(Dirty, None, Clean, &p), Ok(Decision::Apply));
        }
    }

    #[test]
    fn reservation_moves_are_operator_only() {
        assert_eq!(evaluate(Clean, None, Reserved, &host()), Ok(Decision::Apply));
        assert_eq!(evaluate(Clean, None, Unavailable, &system("maintenance")), Ok(Decision::Apply));
        assert_eq!(evaluate(Reserved, None, Occupied, &host()), Ok(Decision::Apply));
        assert_eq!(evaluate(Reserved, None, Clean, &host()), Ok(Decision::Apply));
        assert_eq!(evaluate(Unavailable, None, Clean, &system("maintenance.done")), Ok(Decision::Apply));

        assert!(evaluate(Clean, None, Reserved, &ml(0.99)).is_err());
        assert!(evaluate(Reserved, None, Clean, &ml(0.99)).is_err());
    }

    #[test]
    fn illegal_jumps_are_rejected() {
        assert!(evaluate(Clean, None, Dirty, &host()).is_err());
        assert!(evaluate(Occupied, None, Clean, &ml(0.9)).is_err());
        assert!(evaluate(Occupied, None, Reserved, &host()).is_err());
        assert!(evaluate(Dirty, None, Occupied, &ml(0.9)).is_err());
        assert!(evaluate(Unavailable, None, Occupied, &host()).is_err());
    }

    #[test]
    fn same_state_ml_push_refreshes_on_higher_confidence() {
        assert_eq!(
            evaluate(Occupied, Some(0.6), Occupied, &ml(0.8)),
            Ok(Decision::RefreshConfidence)
        );
        assert_eq!(
            evaluate(Occupied, Some(0.8), Occupied, &ml(0.6)),
            Ok(Decision::Ignore)
        );
        assert_eq!(
            evaluate(Clean, None, Clean, &ml(0.5)),
            Ok(Decision::RefreshConfidence)
        );
        // Equal confidence does not refresh
        assert_eq!(
            evaluate(Clean, Some(0.5), Clean, &ml(0.5)),
            Ok(Decision::Ignore)
        );
    }

    #[test]
    fn same_state_host_push_is_ignored_not_invalid() {
        // Hosts re-marking the current state is a harmless no-op
        assert_eq!(evaluate(Clean, Some(0.9), Clean, &host()), Ok(Decision::Ignore));
    }

    #[test]
    fn same_state_on_other_states_is_invalid() {
        assert!(evaluate(Dirty, None, Dirty, &ml(0.9)).is_err());
        assert!(evaluate(Reserved, None, Reserved, &host()).is_err());
    }
}
