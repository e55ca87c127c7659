use super::error::{StateError, StateResult};
use super::{event::StateTransition, CaptureEvent, CaptureState};

#[derive(Debug)]
pub struct StateMachine {
    state: CaptureState,
    transition_history: Vec<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: CaptureState::default(),
            transition_history: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn can_transition(&self, event: CaptureEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: CaptureEvent) -> Option<CaptureState> {
        use CaptureEvent::*;
        match (self.state, event) {
            (CaptureState::Idle, Begin) => Some(CaptureState::Capturing),
            (CaptureState::Ready, Begin) => Some(CaptureState::Capturing),
            (CaptureState::Capturing, SnapshotAcquired) => Some(CaptureState::Composing),
            (CaptureState::Composing, Composed) => Some(CaptureState::Ready),
            (CaptureState::Capturing, Fail) => Some(CaptureState::Failed),
            (CaptureState::Composing, Fail) => Some(CaptureState::Failed),
            (CaptureState::Failed, Reset) => Some(CaptureState::Idle),
            (CaptureState::Ready, Reset) => Some(CaptureState::Idle),
            (CaptureState::Idle, Reset) => Some(CaptureState::Idle),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: CaptureEvent) -> StateResult<CaptureState> {
        tracing::debug!(from = ?self.state, event = ?event, "request state transition");
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(from = ?from, event = ?event, "invalid state transition requested");
            StateError::InvalidStateTransition { from, event }
        })?;

        let record = StateTransition::new(Some(self.state), event, next);
        self.state = next;
        self.transition_history.push(record);

        Ok(self.state)
    }
}

#[cfg(test)]
impl StateMachine {
    fn history(&self) -> &[StateTransition] {
        &self.transition_history
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
