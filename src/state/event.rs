use super::CaptureState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    Begin,
    SnapshotAcquired,
    Composed,
    Fail,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: Option<CaptureState>,
    pub event: CaptureEvent,
    pub to: CaptureState,
}

impl StateTransition {
    pub fn new(from: Option<CaptureState>, event: CaptureEvent, to: CaptureState) -> Self {
        Self { from, event, to }
    }
}
