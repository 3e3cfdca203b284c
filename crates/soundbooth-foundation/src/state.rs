use crate::error::AudioError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Lifecycle of the capture loop. Fault recovery is modelled as explicit
/// states instead of control-flow jumps: a transient read fault moves
/// Capturing -> Recovering -> Negotiating, a negotiation mismatch moves
/// Negotiating -> Stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Negotiating,
    Capturing,
    Recovering { reason: String },
    Stopped,
}

pub struct StateMachine {
    state: Arc<RwLock<CaptureState>>,
    state_tx: Sender<CaptureState>,
    state_rx: Receiver<CaptureState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(CaptureState::Idle)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: CaptureState) -> Result<(), AudioError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (CaptureState::Idle, CaptureState::Negotiating)
                | (CaptureState::Negotiating, CaptureState::Capturing)
                | (CaptureState::Negotiating, CaptureState::Stopped)
                | (CaptureState::Capturing, CaptureState::Recovering { .. })
                | (CaptureState::Capturing, CaptureState::Stopped)
                | (CaptureState::Recovering { .. }, CaptureState::Negotiating)
                | (CaptureState::Recovering { .. }, CaptureState::Stopped)
                | (CaptureState::Stopped, CaptureState::Negotiating)
        );

        if !valid {
            return Err(AudioError::Fatal(format!(
                "Invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::debug!("Capture state: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> CaptureState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<CaptureState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_recovery_cycle_is_valid() {
        let sm = StateMachine::new();
        sm.transition(CaptureState::Negotiating).unwrap();
        sm.transition(CaptureState::Capturing).unwrap();
        sm.transition(CaptureState::Recovering {
            reason: "xrun".into(),
        })
        .unwrap();
        sm.transition(CaptureState::Negotiating).unwrap();
        sm.transition(CaptureState::Capturing).unwrap();
        sm.transition(CaptureState::Stopped).unwrap();
        assert_eq!(sm.current(), CaptureState::Stopped);
    }

    #[test]
    fn negotiation_failure_stops() {
        let sm = StateMachine::new();
        sm.transition(CaptureState::Negotiating).unwrap();
        sm.transition(CaptureState::Stopped).unwrap();
    }

    #[test]
    fn restart_after_stop_is_valid() {
        let sm = StateMachine::new();
        sm.transition(CaptureState::Negotiating).unwrap();
        sm.transition(CaptureState::Stopped).unwrap();
        sm.transition(CaptureState::Negotiating).unwrap();
    }

    #[test]
    fn idle_cannot_jump_to_capturing() {
        let sm = StateMachine::new();
        assert!(sm.transition(CaptureState::Capturing).is_err());
        assert_eq!(sm.current(), CaptureState::Idle);
    }

    #[test]
    fn transitions_are_observable() {
        let sm = StateMachine::new();
        let rx = sm.subscribe();
        sm.transition(CaptureState::Negotiating).unwrap();
        assert_eq!(rx.recv().unwrap(), CaptureState::Negotiating);
    }
}
