//! Playback gate.

/// The media element a session gates.
///
/// The session only tells the gate whether it may play; it never owns the
/// playback position. Media events (seek, buffering, ended) stay on the
/// gate's side and are never billing triggers.
pub trait PlaybackGate: Send {
    /// Playback may continue. `playback` is the location the backend handed
    /// back with the grant, when it sent one.
    fn resume(&mut self, playback: Option<&str>);

    /// Playback must stop until the next grant.
    fn pause(&mut self);
}

/// A gate with nothing behind it, for headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedGate;

impl PlaybackGate for DetachedGate {
    fn resume(&mut self, _playback: Option<&str>) {}

    fn pause(&mut self) {}
}
