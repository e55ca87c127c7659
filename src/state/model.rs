/// Stage of the capture pipeline for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
    Composing,
    Ready,
    Failed,
}
