//! Session controller actor.
//!
//! One tokio task owns all session state. [`SessionHandle`]s send it
//! commands with oneshot replies; state is published on a watch channel and
//! events on an unbounded mpsc stream.
//!
//! The authorizer is moved into the in-flight request future and handed
//! back with the result. While a request is outstanding the actor simply
//! does not hold an authorizer, so it cannot issue a second one.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use tollstream_settle::{PaymentResolution, WindowAuthorizer, WindowGrant, WindowResult};
use tollstream_types::{window_charge, Amount, ContentId, ErrorKind, SessionState, WINDOW_PERIOD};
use tollstream_x402::PaymentRequired;

use crate::clock::CreditClock;
use crate::error::{SessionError, SessionResult};
use crate::event::{SessionEvent, SessionSnapshot};
use crate::gate::PlaybackGate;

/// Receiving end of a session's event stream.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Command channel depth. Commands are tiny and handled immediately.
const COMMAND_BUFFER: usize = 32;

/// Parameters fixed for the life of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Content being watched.
    pub content_id: ContentId,
    /// Price per second in minor units.
    pub rate_per_second_minor: Amount,
    /// Time between window requests while authorized.
    pub window_period: Duration,
}

impl SessionConfig {
    /// Create a config with the standard window period.
    pub fn new(content_id: ContentId, rate_per_second_minor: Amount) -> Self {
        Self {
            content_id,
            rate_per_second_minor,
            window_period: WINDOW_PERIOD,
        }
    }

    /// Override the window period.
    pub fn with_window_period(mut self, period: Duration) -> Self {
        self.window_period = period;
        self
    }
}

type Reply = oneshot::Sender<SessionResult<()>>;

enum Command {
    Start(Reply),
    Stop(Reply),
    Resume(Reply),
    ResolvePayment(PaymentResolution, Reply),
}

/// What an in-flight request does before asking for the window.
enum Operation {
    Request,
    Resolve(PaymentResolution),
}

type InFlight = BoxFuture<'static, (Box<dyn WindowAuthorizer>, WindowResult)>;

/// Cheap, cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Begin metering. A duplicate start is a no-op.
    pub async fn start(&self) -> SessionResult<()> {
        self.request(Command::Start).await
    }

    /// Stop the session and release server-side resources.
    ///
    /// Safe to call any number of times, from any state, including while a
    /// window request is in flight. Returns once the session is closed.
    pub async fn stop(&self) -> SessionResult<()> {
        match self.request(Command::Stop).await {
            Err(SessionError::Closed) => Ok(()),
            other => other,
        }
    }

    /// Request a window again after a failure or an out-of-band payment.
    pub async fn resume(&self) -> SessionResult<()> {
        self.request(Command::Resume).await
    }

    /// Resolve the outstanding payment requirement and retry the window.
    pub async fn resolve_payment(&self, resolution: PaymentResolution) -> SessionResult<()> {
        self.request(|reply| Command::ResolvePayment(resolution, reply))
            .await
    }

    /// Current state, accrued spend and window count.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshots as they change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until the session reaches `Closed`.
    pub async fn closed(&self) {
        let mut rx = self.snapshot.clone();
        let _ = rx.wait_for(|s| s.state.is_terminal()).await;
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> SessionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("snapshot", &*self.snapshot.borrow())
            .finish()
    }
}

/// Spawns session actors.
pub struct SessionController;

impl SessionController {
    /// Spawn a session on the current tokio runtime.
    ///
    /// The session starts `Idle`; nothing is requested until
    /// [`SessionHandle::start`]. Dropping every handle stops the session.
    pub fn spawn(
        config: SessionConfig,
        authorizer: Box<dyn WindowAuthorizer>,
        gate: Box<dyn PlaybackGate>,
    ) -> (SessionHandle, SessionEvents) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        info!(
            content_id = %config.content_id,
            rate = config.rate_per_second_minor,
            model = %authorizer.model(),
            "Session created"
        );

        let actor = SessionActor {
            clock: CreditClock::new(config.window_period),
            config,
            snapshot: SessionSnapshot::default(),
            authorizer: Some(authorizer),
            in_flight: None,
            gate,
            events: event_tx,
            snapshot_tx,
            stop_waiters: Vec::new(),
        };
        tokio::spawn(actor.run(command_rx));

        (
            SessionHandle {
                commands: command_tx,
                snapshot: snapshot_rx,
            },
            event_rx,
        )
    }
}

struct SessionActor {
    config: SessionConfig,
    snapshot: SessionSnapshot,
    authorizer: Option<Box<dyn WindowAuthorizer>>,
    in_flight: Option<InFlight>,
    gate: Box<dyn PlaybackGate>,
    clock: CreditClock,
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    stop_waiters: Vec<Reply>,
}

/// Await the in-flight request, or never complete when there is none.
async fn next_result(slot: &mut Option<InFlight>) -> (Box<dyn WindowAuthorizer>, WindowResult) {
    match slot {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut accepting = true;

        loop {
            tokio::select! {
                command = commands.recv(), if accepting => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        debug!("All session handles dropped");
                        accepting = false;
                        self.begin_stop(None);
                    }
                },
                _ = self.clock.fired(), if self.clock.is_armed() => {
                    self.clock.disarm();
                    self.on_clock();
                }
                (authorizer, result) = next_result(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.in_flight = None;
                    self.authorizer = Some(authorizer);
                    self.on_result(result);
                }
                else => self.begin_stop(None),
            }

            if self.snapshot.state == SessionState::Stopping && self.in_flight.is_none() {
                self.teardown().await;
                break;
            }
        }

        debug!(content_id = %self.config.content_id, "Session task exiting");
    }

    fn on_command(&mut self, command: Command) {
        let state = self.snapshot.state;
        match command {
            Command::Start(reply) => {
                let result = match state {
                    SessionState::Idle => {
                        self.dispatch(Operation::Request);
                        Ok(())
                    }
                    SessionState::Stopping | SessionState::Closed => Err(SessionError::Closed),
                    _ => Ok(()),
                };
                let _ = reply.send(result);
            }
            Command::Stop(reply) => self.begin_stop(Some(reply)),
            Command::Resume(reply) => {
                let result = match state {
                    SessionState::Idle => Err(SessionError::NotStarted),
                    SessionState::Failed | SessionState::PaymentRequired => {
                        self.dispatch(Operation::Request);
                        Ok(())
                    }
                    SessionState::Requesting | SessionState::Authorized => Ok(()),
                    SessionState::Stopping | SessionState::Closed => Err(SessionError::Closed),
                };
                let _ = reply.send(result);
            }
            Command::ResolvePayment(resolution, reply) => {
                let result = match state {
                    SessionState::PaymentRequired => {
                        self.dispatch(Operation::Resolve(resolution));
                        Ok(())
                    }
                    SessionState::Stopping | SessionState::Closed => Err(SessionError::Closed),
                    state => Err(SessionError::InvalidState {
                        op: "resolve_payment",
                        state,
                    }),
                };
                let _ = reply.send(result);
            }
        }
    }

    fn on_clock(&mut self) {
        if self.snapshot.state == SessionState::Authorized {
            self.dispatch(Operation::Request);
        } else {
            debug!(state = %self.snapshot.state, "Ignoring clock fire");
        }
    }

    /// Issue one window request. The caller has checked the state allows it.
    fn dispatch(&mut self, operation: Operation) {
        self.clock.disarm();
        debug_assert!(
            self.authorizer.is_some(),
            "window requested while one is in flight"
        );

        let Some(mut authorizer) = self.authorizer.take() else {
            // Only reachable if a caller skipped the state check.
            self.fail(ErrorKind::ProtocolViolation, "window requested while one is in flight".into());
            return;
        };

        self.set_state(SessionState::Requesting);
        debug!(content_id = %self.config.content_id, "Requesting window");

        self.in_flight = Some(
            async move {
                let result = match authorizer.open().await {
                    Err(e) => WindowResult::Error(e),
                    Ok(()) => match operation {
                        Operation::Request => authorizer.request_window().await,
                        Operation::Resolve(resolution) => {
                            match authorizer.resolve_payment(resolution).await {
                                Ok(()) => authorizer.request_window().await,
                                Err(e) => WindowResult::Error(e),
                            }
                        }
                    },
                };
                (authorizer, result)
            }
            .boxed(),
        );
    }

    fn on_result(&mut self, result: WindowResult) {
        let stopping = self.snapshot.state == SessionState::Stopping;

        match result {
            WindowResult::Granted(grant) => self.on_grant(grant, stopping),
            WindowResult::PaymentRequired(requirement) => {
                if stopping {
                    debug!("Payment required while stopping; ignoring");
                    return;
                }
                self.on_payment_required(requirement);
            }
            WindowResult::Error(e) => {
                if stopping {
                    warn!(error = %e, "Window request failed while stopping");
                    return;
                }
                self.fail(e.kind(), e.to_string());
            }
        }
    }

    fn on_grant(&mut self, grant: WindowGrant, stopping: bool) {
        let charge = window_charge(self.config.rate_per_second_minor, grant.seconds);
        let Some(accrued) = charge.and_then(|c| self.snapshot.accrued_minor.checked_add(c)) else {
            if stopping {
                error!(seconds = grant.seconds, "Accrued spend overflow while stopping");
            } else {
                self.fail(
                    ErrorKind::ProtocolViolation,
                    format!("accrued spend overflows at {} seconds", grant.seconds),
                );
            }
            return;
        };

        let delta = accrued - self.snapshot.accrued_minor;
        self.snapshot.accrued_minor = accrued;
        if grant.seconds > 0 {
            self.snapshot.windows_granted += 1;
        }
        if delta > 0 {
            debug!(delta, accrued, seconds = grant.seconds, "Window charged");
            self.emit(SessionEvent::SpendDelta {
                delta_minor: delta,
                accrued_minor: accrued,
                seconds: grant.seconds,
            });
        }
        if let Some(note) = grant.settlement {
            info!(transaction = %note.transaction, amount = ?note.amount, "Settlement observed");
            self.emit(SessionEvent::Settled {
                transaction: note.transaction,
                amount: note.amount,
            });
        }

        if stopping {
            self.publish();
            return;
        }

        if grant.seconds > 0 {
            self.gate.resume(grant.playback_reference.as_deref());
        }
        self.set_state(SessionState::Authorized);
        self.clock.arm();
        self.publish();
    }

    fn on_payment_required(&mut self, requirement: PaymentRequired) {
        self.clock.disarm();
        self.gate.pause();
        info!(
            content_id = %self.config.content_id,
            accepts = requirement.accepts.len(),
            "Payment required"
        );
        self.set_state(SessionState::PaymentRequired);
        self.emit(SessionEvent::PaymentRequired { requirement });
    }

    fn fail(&mut self, kind: ErrorKind, message: String) {
        match kind {
            ErrorKind::ProtocolViolation => error!(%kind, %message, "Session failed"),
            _ => warn!(%kind, %message, "Session failed"),
        }
        self.clock.disarm();
        self.gate.pause();
        self.set_state(SessionState::Failed);
        self.emit(SessionEvent::Error { kind, message });
    }

    fn begin_stop(&mut self, reply: Option<Reply>) {
        self.clock.disarm();
        if let Some(reply) = reply {
            self.stop_waiters.push(reply);
        }
        if self.snapshot.state != SessionState::Stopping {
            self.set_state(SessionState::Stopping);
        }
    }

    async fn teardown(&mut self) {
        self.clock.disarm();

        if let Some(authorizer) = self.authorizer.as_mut() {
            match authorizer.close().await {
                Ok(Some(summary)) => {
                    info!(
                        channel_id = %summary.channel_id,
                        total_seconds = summary.total_seconds_streamed,
                        total_owed = summary.total_amount_owed,
                        "Channel closed"
                    );
                    if let Some(transaction) = summary.settlement_tx_id.clone() {
                        self.emit(SessionEvent::Settled {
                            transaction,
                            amount: Some(summary.total_amount_settled),
                        });
                    }
                    self.snapshot.channel = Some(summary);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to release session resources"),
            }
        }

        self.gate.pause();
        self.set_state(SessionState::Closed);
        info!(
            content_id = %self.config.content_id,
            accrued = self.snapshot.accrued_minor,
            windows = self.snapshot.windows_granted,
            "Session closed"
        );

        for waiter in self.stop_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    fn set_state(&mut self, to: SessionState) {
        let from = self.snapshot.state;
        if from == to {
            return;
        }
        debug!(%from, %to, "Session state change");
        self.snapshot.state = to;
        self.emit(SessionEvent::StateChanged { from, to });
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }

    fn emit(&self, event: SessionEvent) {
        // The caller may have dropped the event stream; the session keeps going.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::DetachedGate;

    /// An actor whose authorizer is already lent out to a request.
    fn busy_actor() -> SessionActor {
        let (events, _) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        SessionActor {
            clock: CreditClock::new(WINDOW_PERIOD),
            config: SessionConfig::new(ContentId::new("c-1"), 5),
            snapshot: SessionSnapshot::default(),
            authorizer: None,
            in_flight: None,
            gate: Box::new(DetachedGate),
            events,
            snapshot_tx,
            stop_waiters: Vec::new(),
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "window requested while one is in flight")]
    fn test_overlapping_dispatch_panics_in_debug() {
        let mut actor = busy_actor();
        actor.dispatch(Operation::Request);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_overlapping_dispatch_fails_session_in_release() {
        let mut actor = busy_actor();
        actor.dispatch(Operation::Request);
        assert_eq!(actor.snapshot.state, SessionState::Failed);
    }
}
