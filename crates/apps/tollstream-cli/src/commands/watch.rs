//! Watch command: run a metered session against the backend.

use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use tollstream_session::{PlaybackGate, SessionConfig, SessionController, SessionEvent};
use tollstream_settle::{
    ChallengeAdapter, ChannelApi, ChannelTickAdapter, ContentApi, HttpBackend, PaymentResolution,
    RetryConfig, RetryPolicy, SettlementNote, StreamApi, WindowAuthorizer,
};
use tollstream_types::{Amount, Content, ContentId, SessionState, SettlementModel};
use tollstream_x402::{PaymentRequired, PaymentSignature};

use crate::cli::WatchArgs;
use crate::config::{format_usdc, CliConfig};
use crate::error::CliResult;
use crate::output::{describe_event, OutputFormat, Render, StopReason, WatchOutput};
use crate::{progress, prompt, signals};

/// Playback gate that reports play/pause on the terminal.
pub struct TerminalGate {
    bar: ProgressBar,
    playing: bool,
}

impl TerminalGate {
    /// Report through `bar`; a hidden bar keeps the gate silent.
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            playing: false,
        }
    }
}

impl PlaybackGate for TerminalGate {
    fn resume(&mut self, playback: Option<&str>) {
        if self.playing {
            return;
        }
        self.playing = true;
        debug!(playback = ?playback, "Playback resumed");
        match playback {
            Some(url) => self.bar.println(format!("▶ playing {}", url)),
            None => self.bar.println("▶ playing"),
        }
    }

    fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.playing = false;
        debug!("Playback paused");
        self.bar.println("⏸ paused");
    }
}

/// Resolved options for one watch run.
#[derive(Debug, Clone)]
struct WatchOptions {
    model: SettlementModel,
    viewer_id: String,
    retry: RetryConfig,
    duration: Option<Duration>,
    auto_pay: bool,
    signature: Option<String>,
    max_spend: Option<Amount>,
    interactive: bool,
    show_events: bool,
}

/// Execute the watch command.
pub async fn watch(config: CliConfig, format: OutputFormat, args: WatchArgs) -> CliResult<String> {
    let backend = Arc::new(HttpBackend::new(&config.backend_config()?)?);
    let content_id = ContentId::new(args.content_id);
    let human = format == OutputFormat::Human;

    let item = if human {
        progress::with_spinner("Fetching content", backend.get_content(&content_id)).await?
    } else {
        backend.get_content(&content_id).await?
    };

    // Without an explicit duration, watch the whole item; unknown length
    // runs until interrupted.
    let duration = args
        .duration
        .or((item.duration_seconds > 0).then_some(item.duration_seconds))
        .map(Duration::from_secs);

    let options = WatchOptions {
        model: args.model.map(Into::into).unwrap_or(config.session.model),
        viewer_id: config.api.viewer_id.clone(),
        retry: config.retry,
        duration,
        auto_pay: args.auto_pay || config.session.auto_pay,
        signature: args.signature,
        max_spend: args.max_spend.or(config.session.max_spend_minor),
        interactive: human && prompt::is_interactive(),
        show_events: human && config.display.show_events,
    };

    let bar = if human {
        progress::window_bar(item.window_count())
    } else {
        progress::hidden()
    };

    let output = run_session(backend, &item, options, bar, signals::shutdown_signal()).await?;
    Ok(output.render(format))
}

fn authorizer_for<A>(
    backend: Arc<A>,
    content_id: &ContentId,
    options: &WatchOptions,
) -> Box<dyn WindowAuthorizer>
where
    A: ChannelApi + StreamApi + 'static,
{
    match options.model {
        SettlementModel::Channel => Box::new(
            ChannelTickAdapter::new(backend, content_id.clone(), options.viewer_id.clone())
                .with_retry(RetryPolicy::from_config(&options.retry)),
        ),
        SettlementModel::X402 => Box::new(ChallengeAdapter::new(backend, content_id.clone())),
    }
}

fn payment_prompt(required: &PaymentRequired) -> String {
    match required.primary() {
        Ok(req) => format!(
            "Pay {} {} to {} for the next window?",
            req.amount, req.asset, req.pay_to
        ),
        Err(_) => "Pay for the next window?".to_string(),
    }
}

/// Whether one more window at `window_price` stays within `cap`.
/// An unpriceable window never fits under a cap.
fn next_window_fits(accrued: Amount, window_price: Option<Amount>, cap: Option<Amount>) -> bool {
    let Some(cap) = cap else {
        return true;
    };
    window_price
        .and_then(|price| accrued.checked_add(price))
        .is_some_and(|next| next <= cap)
}

/// Drive one session until a stop condition, then stop it and summarize.
async fn run_session<A>(
    backend: Arc<A>,
    item: &Content,
    options: WatchOptions,
    bar: ProgressBar,
    mut shutdown: watch::Receiver<bool>,
) -> CliResult<WatchOutput>
where
    A: ChannelApi + StreamApi + 'static,
{
    let authorizer = authorizer_for(backend, &item.id, &options);
    let config = SessionConfig::new(item.id.clone(), item.price_per_second_minor);
    let gate = TerminalGate::new(bar.clone());
    let (handle, mut events) = SessionController::spawn(config, authorizer, Box::new(gate));

    info!(
        content_id = %item.id,
        model = %options.model,
        rate = item.price_per_second_minor,
        "Watching"
    );
    let started = Instant::now();
    let deadline = options.duration.map(|d| started + d);
    let window_price = item.window_price();

    let mut signature = options.signature.clone().map(PaymentSignature::from_header);
    let mut settlements = Vec::new();
    let mut last_error = None;

    let reason = if !next_window_fits(0, window_price, options.max_spend) {
        StopReason::BudgetReached
    } else {
        handle.start().await?;
        loop {
            let timer = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                Ok(()) = shutdown.changed() => break StopReason::Interrupted,
                _ = timer => break StopReason::Elapsed,
                event = events.recv() => {
                    let Some(event) = event else {
                        break StopReason::Closed;
                    };
                    if options.show_events {
                        bar.println(describe_event(&event));
                    }
                    match event {
                        SessionEvent::SpendDelta { accrued_minor, .. } => {
                            bar.inc(1);
                            bar.set_message(format_usdc(accrued_minor));
                            if !next_window_fits(accrued_minor, window_price, options.max_spend) {
                                break StopReason::BudgetReached;
                            }
                        }
                        SessionEvent::Settled { transaction, amount } => {
                            settlements.push(SettlementNote { transaction, amount });
                        }
                        SessionEvent::PaymentRequired { requirement } => {
                            if options.model == SettlementModel::Channel {
                                last_error = Some(
                                    "channel needs funds; top it up and watch again".to_string(),
                                );
                                break StopReason::PaymentDeclined;
                            }
                            let accrued = handle.snapshot().accrued_minor;
                            if !next_window_fits(accrued, window_price, options.max_spend) {
                                break StopReason::BudgetReached;
                            }
                            let resolution = if let Some(sig) = signature.take() {
                                Some(PaymentResolution::Signature(sig))
                            } else if options.auto_pay {
                                Some(PaymentResolution::Auto)
                            } else if options.interactive {
                                let confirmed =
                                    prompt::confirm_async(payment_prompt(&requirement), bar.clone())
                                        .await
                                        .unwrap_or(false);
                                confirmed.then_some(PaymentResolution::Auto)
                            } else {
                                None
                            };
                            let Some(resolution) = resolution else {
                                break StopReason::PaymentDeclined;
                            };
                            if let Err(e) = handle.resolve_payment(resolution).await {
                                last_error = Some(e.to_string());
                                break StopReason::Failed;
                            }
                        }
                        SessionEvent::Error { message, .. } => {
                            last_error = Some(message);
                            break StopReason::Failed;
                        }
                        SessionEvent::StateChanged { to: SessionState::Closed, .. } => {
                            break StopReason::Closed;
                        }
                        SessionEvent::StateChanged { .. } => {}
                    }
                }
            }
        }
    };

    info!(reason = %reason, "Stopping session");
    handle.stop().await?;
    bar.finish_and_clear();

    // Close may have settled the channel
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Settled { transaction, amount } = event {
            settlements.push(SettlementNote { transaction, amount });
        }
    }

    let snapshot = handle.snapshot();
    Ok(WatchOutput {
        content_id: item.id.to_string(),
        model: options.model,
        reason,
        state: snapshot.state,
        accrued_minor: snapshot.accrued_minor,
        windows_granted: snapshot.windows_granted,
        elapsed_secs: started.elapsed().as_secs(),
        settlements,
        channel: snapshot.channel,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollstream_test_utils::{test_content, MockBackend, TickStep, TEST_VIEWER};

    fn options(model: SettlementModel, duration_secs: Option<u64>) -> WatchOptions {
        WatchOptions {
            model,
            viewer_id: TEST_VIEWER.to_string(),
            retry: RetryConfig::default(),
            duration: duration_secs.map(Duration::from_secs),
            auto_pay: false,
            signature: None,
            max_spend: None,
            interactive: false,
            show_events: false,
        }
    }

    async fn run(
        backend: &MockBackend,
        item: &Content,
        options: WatchOptions,
    ) -> WatchOutput {
        let (_tx, rx) = watch::channel(false);
        run_session(Arc::new(backend.clone()), item, options, progress::hidden(), rx)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_watch_until_elapsed() {
        let item = test_content("c-1", 5);
        let backend = MockBackend::new().with_content(item.clone());

        let output = run(&backend, &item, options(SettlementModel::Channel, Some(25))).await;

        assert_eq!(output.reason, StopReason::Elapsed);
        assert_eq!(output.state, SessionState::Closed);
        assert_eq!(output.windows_granted, 3);
        assert_eq!(output.accrued_minor, 150);

        let channel = output.channel.unwrap();
        assert_eq!(channel.total_seconds_streamed, 30);
        assert_eq!(channel.total_amount_settled, 150);
        assert_eq!(output.settlements.len(), 1);
        assert_eq!(output.settlements[0].amount, Some(150));
        assert_eq!(backend.calls().close, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spend_cap_stops_session() {
        let item = test_content("c-1", 5);
        let backend = MockBackend::new().with_content(item.clone());
        let mut opts = options(SettlementModel::Channel, None);
        opts.max_spend = Some(100);

        let output = run(&backend, &item, opts).await;

        assert_eq!(output.reason, StopReason::BudgetReached);
        assert_eq!(output.accrued_minor, 100);
        assert_eq!(backend.calls().close, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spend_cap_between_windows_never_overshoots() {
        let item = test_content("c-1", 5);
        let backend = MockBackend::new().with_content(item.clone());
        let mut opts = options(SettlementModel::Channel, None);
        opts.max_spend = Some(120);

        let output = run(&backend, &item, opts).await;

        assert_eq!(output.reason, StopReason::BudgetReached);
        assert_eq!(output.accrued_minor, 100);
        assert_eq!(output.windows_granted, 2);
        assert_eq!(backend.calls().close, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spend_cap_below_one_window_never_opens() {
        let item = test_content("c-1", 5);
        let backend = MockBackend::new().with_content(item.clone());
        let mut opts = options(SettlementModel::Channel, Some(60));
        opts.max_spend = Some(30);

        let output = run(&backend, &item, opts).await;

        assert_eq!(output.reason, StopReason::BudgetReached);
        assert_eq!(output.accrued_minor, 0);
        assert_eq!(output.windows_granted, 0);
        assert_eq!(backend.calls().open, 0);
        assert!(output.channel.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spend_cap_stops_auto_pay() {
        let item = test_content("c-1", 50);
        let backend = MockBackend::new().with_content(item.clone());
        let mut opts = options(SettlementModel::X402, Some(60));
        opts.auto_pay = true;
        opts.max_spend = Some(700);

        let output = run(&backend, &item, opts).await;

        assert_eq!(output.reason, StopReason::BudgetReached);
        assert_eq!(output.accrued_minor, 500);
        assert_eq!(backend.calls().pay, 1);
    }

    #[test]
    fn test_next_window_fits() {
        assert!(next_window_fits(1_000, Some(50), None));
        assert!(next_window_fits(50, Some(50), Some(100)));
        assert!(!next_window_fits(100, Some(50), Some(120)));
        assert!(!next_window_fits(0, None, Some(u64::MAX)));
        assert!(!next_window_fits(u64::MAX, Some(1), Some(u64::MAX)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_session() {
        let item = test_content("c-1", 5);
        let backend = MockBackend::new().with_content(item.clone());
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            let _ = tx.send(true);
        });

        let output = run_session(
            Arc::new(backend.clone()),
            &item,
            options(SettlementModel::Channel, None),
            progress::hidden(),
            rx,
        )
        .await
        .unwrap();

        assert_eq!(output.reason, StopReason::Interrupted);
        assert_eq!(output.windows_granted, 2);
        assert_eq!(output.state, SessionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_payment_required_is_declined() {
        let item = test_content("c-1", 5);
        let backend = MockBackend::new()
            .with_content(item.clone())
            .with_ticks([TickStep::PaymentRequired]);

        let output = run(&backend, &item, options(SettlementModel::Channel, Some(60))).await;

        assert_eq!(output.reason, StopReason::PaymentDeclined);
        assert!(output.last_error.unwrap().contains("top it up"));
        assert_eq!(output.accrued_minor, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_x402_auto_pay() {
        let item = test_content("c-1", 50);
        let backend = MockBackend::new().with_content(item.clone());
        let mut opts = options(SettlementModel::X402, Some(15));
        opts.auto_pay = true;

        let output = run(&backend, &item, opts).await;

        assert_eq!(output.reason, StopReason::Elapsed);
        assert_eq!(output.windows_granted, 2);
        assert_eq!(output.accrued_minor, 1_000);
        assert_eq!(backend.calls().pay, 2);
        assert!(output
            .settlements
            .iter()
            .all(|note| note.amount == Some(500)));
        assert!(output.channel.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_x402_signature_then_decline() {
        let item = test_content("c-1", 50);
        let backend = MockBackend::new().with_content(item.clone());
        let mut opts = options(SettlementModel::X402, Some(60));
        opts.signature = Some("sig-1".to_string());

        let output = run(&backend, &item, opts).await;

        assert_eq!(output.reason, StopReason::PaymentDeclined);
        assert_eq!(output.windows_granted, 1);
        assert_eq!(output.accrued_minor, 500);
        assert_eq!(backend.signatures_seen(), vec!["sig-1".to_string()]);
        assert_eq!(backend.calls().pay, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_x402_without_payment_declines() {
        let item = test_content("c-1", 50);
        let backend = MockBackend::new().with_content(item.clone());

        let output = run(&backend, &item, options(SettlementModel::X402, Some(60))).await;

        assert_eq!(output.reason, StopReason::PaymentDeclined);
        assert_eq!(output.accrued_minor, 0);
        assert_eq!(output.state, SessionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_failure_reports_error() {
        let item = test_content("c-1", 5);
        let backend = MockBackend::new()
            .with_content(item.clone())
            .with_ticks([TickStep::Grant(10), TickStep::ServerError(500)]);

        let output = run(&backend, &item, options(SettlementModel::Channel, Some(60))).await;

        assert_eq!(output.reason, StopReason::Failed);
        assert_eq!(output.accrued_minor, 50);
        assert!(output.last_error.is_some());
        assert_eq!(backend.calls().close, 1);
    }

    #[test]
    fn test_terminal_gate_tracks_playing() {
        let mut gate = TerminalGate::new(progress::hidden());
        gate.resume(Some("https://cdn.test/c-1.m3u8"));
        assert!(gate.playing);
        gate.resume(None);
        gate.pause();
        assert!(!gate.playing);
    }
}
