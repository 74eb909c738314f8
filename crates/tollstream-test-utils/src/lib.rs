pub mod helpers;
pub mod mock_backend;
pub mod recording_gate;

pub use helpers::*;
pub use mock_backend::{CallCounts, MockBackend, TickStep};
pub use recording_gate::{GateCall, RecordingGate};
