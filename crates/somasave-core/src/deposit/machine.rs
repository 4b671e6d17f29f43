use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{
    DepositInitiation, DepositRequest, DepositStatusResponse, Money, PaymentStatus, TxReferences,
};

use super::scheduler::{Scheduler, TimerHandle};

/// Interval between status checks while awaiting confirmation.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// One extra check shortly after entering confirmation, ahead of the
/// first interval tick.
pub const FIRST_CHECK_DELAY: Duration = Duration::from_secs(2);

/// How long a settled deposit stays on screen before the flow closes.
pub const SUCCESS_CLOSE_DELAY: Duration = Duration::from_secs(2);

const INVALID_AMOUNT: &str = "Please enter a valid amount";
const MISSING_PHONE: &str = "Please enter your phone number";
const LOGIN_REQUIRED: &str = "Please log in again to make a deposit";
const TIMED_OUT: &str = "No confirmation received. Check your phone and try again.";

/// The two backend calls the flow needs.
#[async_trait]
pub trait PaymentsApi: Send + Sync + 'static {
    async fn initiate_deposit(&self, request: &DepositRequest) -> Result<DepositInitiation, ApiError>;
    async fn verify_deposit(&self, tx_ref: &str) -> Result<DepositStatusResponse, ApiError>;
}

#[async_trait]
impl PaymentsApi for ApiClient {
    async fn initiate_deposit(&self, request: &DepositRequest) -> Result<DepositInitiation, ApiError> {
        ApiClient::initiate_deposit(self, request).await
    }

    async fn verify_deposit(&self, tx_ref: &str) -> Result<DepositStatusResponse, ApiError> {
        ApiClient::verify_deposit(self, tx_ref).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepositReceipt {
    pub tx_ref: String,
    pub amount: Money,
    pub new_balance: Option<Money>,
}

/// Notifications for the surface driving the flow.
#[derive(Debug, Clone, PartialEq)]
pub enum DepositEvent {
    ValidationFailed(String),
    Rejected(String),
    /// Accepted by the backend; the member confirms on their phone.
    AwaitingConfirmation(TxReferences),
    Succeeded(DepositReceipt),
    Failed(String),
    TimedOut,
    /// Back to input, either cancelled or after showing a success.
    Closed,
}

/// Read-only view of where the flow is.
#[derive(Debug, Clone, PartialEq)]
pub enum DepositPhase {
    Input { error: Option<String> },
    Submitting,
    AwaitingConfirmation { tx_ref: String, internal_reference: String },
    Succeeded(DepositReceipt),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DepositError {
    #[error("{0}")]
    Validation(String),

    #[error("A deposit is already in progress")]
    Busy,

    #[error("{0}")]
    Rejected(String),

    #[error("Deposit was cancelled")]
    Cancelled,
}

pub type SuccessCallback = Box<dyn Fn(&DepositReceipt) + Send + Sync>;

#[derive(Default)]
pub struct DepositOptions {
    /// Give up waiting after this long. `None` polls until the backend
    /// settles or the member cancels.
    pub max_poll_duration: Option<Duration>,
    pub on_success: Option<SuccessCallback>,
}

/// Timers alive while awaiting confirmation. Dropped, they cancel.
struct PollTimers {
    _recurring: TimerHandle,
    _first_check: TimerHandle,
    _deadline: Option<TimerHandle>,
}

enum Phase {
    Input {
        error: Option<String>,
    },
    Submitting,
    Polling {
        refs: TxReferences,
        amount: Money,
        _timers: PollTimers,
    },
    Succeeded {
        receipt: DepositReceipt,
        _close: TimerHandle,
    },
}

impl Phase {
    fn view(&self) -> DepositPhase {
        match self {
            Phase::Input { error } => DepositPhase::Input { error: error.clone() },
            Phase::Submitting => DepositPhase::Submitting,
            Phase::Polling { refs, .. } => DepositPhase::AwaitingConfirmation {
                tx_ref: refs.tx_ref.clone(),
                internal_reference: refs.internal_reference.clone(),
            },
            Phase::Succeeded { receipt, .. } => DepositPhase::Succeeded(receipt.clone()),
        }
    }
}

struct State {
    phase: Phase,
    /// Bumped on every submission and every exit from confirmation, so
    /// results and timers from an earlier attempt are recognisably stale.
    generation: u64,
}

struct Shared {
    api: Arc<dyn PaymentsApi>,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<State>,
    events: mpsc::UnboundedSender<DepositEvent>,
    on_success: Option<SuccessCallback>,
    max_poll_duration: Option<Duration>,
}

fn validate(amount: &str, phone: &str) -> Result<(Money, String), String> {
    let amount: Money = amount.parse().map_err(|_| INVALID_AMOUNT.to_string())?;
    if !amount.is_positive() {
        return Err(INVALID_AMOUNT.to_string());
    }
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(MISSING_PHONE.to_string());
    }
    Ok((amount, phone.to_string()))
}

fn initiation_error_message(error: &ApiError) -> String {
    match error {
        ApiError::Unauthorized => LOGIN_REQUIRED.to_string(),
        other => other.to_string(),
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: DepositEvent) {
        if self.events.send(event).is_err() {
            debug!("Deposit event receiver dropped");
        }
    }

    fn is_polling(&self, generation: u64) -> bool {
        let state = self.lock();
        state.generation == generation && matches!(state.phase, Phase::Polling { .. })
    }

    fn start_polling(self: &Arc<Self>, generation: u64, tx_ref: &str) -> PollTimers {
        let weak = Arc::downgrade(self);

        let recurring = {
            let weak = weak.clone();
            let tx_ref = tx_ref.to_string();
            self.scheduler.schedule_repeating(
                POLL_INTERVAL,
                Box::new(move || check_status(weak.clone(), generation, tx_ref.clone()).boxed()),
            )
        };
        let first_check = self.scheduler.schedule(
            FIRST_CHECK_DELAY,
            check_status(weak.clone(), generation, tx_ref.to_string()).boxed(),
        );
        let deadline = self.max_poll_duration.map(|limit| {
            let weak = weak.clone();
            self.scheduler.schedule(
                limit,
                async move {
                    if let Some(shared) = weak.upgrade() {
                        shared.time_out(generation);
                    }
                }
                .boxed(),
            )
        });

        PollTimers {
            _recurring: recurring,
            _first_check: first_check,
            _deadline: deadline,
        }
    }

    /// Apply one status check. Anything other than a settled answer leaves
    /// the flow polling.
    fn resolve(self: &Arc<Self>, generation: u64, result: Result<DepositStatusResponse, ApiError>) {
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Deposit status check failed, will retry");
                return;
            }
        };

        let mut state = self.lock();
        if state.generation != generation {
            debug!("Ignoring status for a previous deposit");
            return;
        }
        let (refs, amount) = match &state.phase {
            Phase::Polling { refs, amount, .. } => (refs.clone(), *amount),
            _ => return,
        };

        match status.status {
            PaymentStatus::Completed => {
                let receipt = DepositReceipt {
                    tx_ref: refs.tx_ref,
                    amount: status.amount.unwrap_or(amount),
                    new_balance: status.new_balance,
                };
                state.generation += 1;
                let close = self.schedule_close(state.generation);
                let previous = std::mem::replace(
                    &mut state.phase,
                    Phase::Succeeded {
                        receipt: receipt.clone(),
                        _close: close,
                    },
                );
                drop(state);
                drop(previous);

                info!(tx_ref = %receipt.tx_ref, amount = %receipt.amount, "Deposit confirmed");
                self.emit(DepositEvent::Succeeded(receipt.clone()));
                if let Some(ref on_success) = self.on_success {
                    on_success(&receipt);
                }
            }
            PaymentStatus::Failed => {
                let reason = status.failure_reason();
                state.generation += 1;
                let previous = std::mem::replace(
                    &mut state.phase,
                    Phase::Input {
                        error: Some(reason.clone()),
                    },
                );
                drop(state);
                drop(previous);

                info!(tx_ref = %refs.tx_ref, reason = %reason, "Deposit failed");
                self.emit(DepositEvent::Failed(reason));
            }
            PaymentStatus::Pending | PaymentStatus::Unknown => {
                debug!(tx_ref = %refs.tx_ref, status = ?status.status, "Deposit still pending");
            }
        }
    }

    fn schedule_close(self: &Arc<Self>, generation: u64) -> TimerHandle {
        let weak = Arc::downgrade(self);
        self.scheduler.schedule(
            SUCCESS_CLOSE_DELAY,
            async move {
                if let Some(shared) = weak.upgrade() {
                    shared.auto_close(generation);
                }
            }
            .boxed(),
        )
    }

    fn auto_close(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || !matches!(state.phase, Phase::Succeeded { .. }) {
            return;
        }
        state.generation += 1;
        let previous = std::mem::replace(&mut state.phase, Phase::Input { error: None });
        drop(state);
        drop(previous);
        self.emit(DepositEvent::Closed);
    }

    fn time_out(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || !matches!(state.phase, Phase::Polling { .. }) {
            return;
        }
        state.generation += 1;
        let previous = std::mem::replace(
            &mut state.phase,
            Phase::Input {
                error: Some(TIMED_OUT.to_string()),
            },
        );
        drop(state);
        drop(previous);

        warn!("Gave up waiting for deposit confirmation");
        self.emit(DepositEvent::TimedOut);
    }
}

async fn check_status(weak: Weak<Shared>, generation: u64, tx_ref: String) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    if !shared.is_polling(generation) {
        return;
    }
    let result = shared.api.verify_deposit(&tx_ref).await;
    shared.resolve(generation, result);
}

/// A single deposit attempt at a time, from amount entry to confirmation.
///
/// Timers are owned by the confirmation phase itself, so any transition
/// out of it (settled, failed, timed out, cancelled, dropped) cancels them.
pub struct DepositFlow {
    shared: Arc<Shared>,
}

impl DepositFlow {
    pub fn new(
        api: Arc<dyn PaymentsApi>,
        scheduler: Arc<dyn Scheduler>,
        options: DepositOptions,
    ) -> (Self, mpsc::UnboundedReceiver<DepositEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            api,
            scheduler,
            state: Mutex::new(State {
                phase: Phase::Input { error: None },
                generation: 0,
            }),
            events: tx,
            on_success: options.on_success,
            max_poll_duration: options.max_poll_duration,
        });
        (Self { shared }, rx)
    }

    pub fn phase(&self) -> DepositPhase {
        self.shared.lock().phase.view()
    }

    /// Validate and initiate a deposit. On acceptance the flow starts
    /// polling and this returns the reference pair; the outcome arrives as
    /// events.
    pub async fn submit(&self, amount: &str, phone_number: &str) -> Result<TxReferences, DepositError> {
        let (request, generation) = {
            let mut state = self.shared.lock();
            if !matches!(state.phase, Phase::Input { .. }) {
                return Err(DepositError::Busy);
            }
            match validate(amount, phone_number) {
                Ok((amount, phone_number)) => {
                    state.generation += 1;
                    state.phase = Phase::Submitting;
                    (DepositRequest { amount, phone_number }, state.generation)
                }
                Err(message) => {
                    state.phase = Phase::Input {
                        error: Some(message.clone()),
                    };
                    drop(state);
                    self.shared.emit(DepositEvent::ValidationFailed(message.clone()));
                    return Err(DepositError::Validation(message));
                }
            }
        };

        debug!(amount = %request.amount, "Initiating deposit");
        let outcome = self
            .shared
            .api
            .initiate_deposit(&request)
            .await
            .map_err(|e| initiation_error_message(&e))
            .and_then(DepositInitiation::accepted);

        let mut state = self.shared.lock();
        if state.generation != generation || !matches!(state.phase, Phase::Submitting) {
            debug!("Deposit cancelled while submitting");
            return Err(DepositError::Cancelled);
        }

        match outcome {
            Ok(refs) => {
                let timers = self.shared.start_polling(generation, &refs.tx_ref);
                state.phase = Phase::Polling {
                    refs: refs.clone(),
                    amount: request.amount,
                    _timers: timers,
                };
                drop(state);

                info!(tx_ref = %refs.tx_ref, "Deposit initiated, awaiting confirmation");
                self.shared.emit(DepositEvent::AwaitingConfirmation(refs.clone()));
                Ok(refs)
            }
            Err(message) => {
                state.phase = Phase::Input {
                    error: Some(message.clone()),
                };
                drop(state);

                warn!(error = %message, "Deposit initiation rejected");
                self.shared.emit(DepositEvent::Rejected(message.clone()));
                Err(DepositError::Rejected(message))
            }
        }
    }

    /// Close the flow from any phase. Cancels every timer and discards
    /// in-flight work. Returns whether there was anything to close.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.lock();
        if matches!(state.phase, Phase::Input { .. }) {
            return false;
        }
        state.generation += 1;
        let previous = std::mem::replace(&mut state.phase, Phase::Input { error: None });
        drop(state);
        drop(previous);

        debug!("Deposit flow closed");
        self.shared.emit(DepositEvent::Closed);
        true
    }
}

impl Drop for DepositFlow {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::deposit::TokioScheduler;

    /// Accepts every initiation unless told otherwise and answers status
    /// checks from a script, then PENDING forever.
    #[derive(Default)]
    struct ScriptedPayments {
        reject_with: Mutex<Option<ApiError>>,
        statuses: Mutex<VecDeque<Result<DepositStatusResponse, ApiError>>>,
        initiations: AtomicUsize,
        checks: AtomicUsize,
    }

    impl ScriptedPayments {
        fn with_statuses(statuses: Vec<Result<DepositStatusResponse, ApiError>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Default::default()
            }
        }

        fn checks(&self) -> usize {
            self.checks.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentsApi for ScriptedPayments {
        async fn initiate_deposit(&self, request: &DepositRequest) -> Result<DepositInitiation, ApiError> {
            self.initiations.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = self.reject_with.lock().unwrap().take() {
                return Err(e);
            }
            Ok(DepositInitiation {
                success: true,
                tx_ref: Some("SOMA-TX-1".to_string()),
                internal_reference: Some("INT-1".to_string()),
                message: None,
                error: None,
                amount: Some(request.amount),
                phone_number: Some(request.phone_number.clone()),
            })
        }

        async fn verify_deposit(&self, tx_ref: &str) -> Result<DepositStatusResponse, ApiError> {
            assert_eq!(tx_ref, "SOMA-TX-1");
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(status(PaymentStatus::Pending)))
        }
    }

    fn status(status: PaymentStatus) -> DepositStatusResponse {
        DepositStatusResponse {
            status,
            amount: None,
            new_balance: None,
            message: None,
            error: None,
        }
    }

    fn completed(amount: f64, new_balance: f64) -> DepositStatusResponse {
        DepositStatusResponse {
            amount: Some(Money::new(amount)),
            new_balance: Some(Money::new(new_balance)),
            ..status(PaymentStatus::Completed)
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<DepositEvent>) -> Vec<DepositEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn advance_to(start: tokio::time::Instant, secs: f64) {
        tokio::time::sleep_until(start + Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test]
    async fn test_validation_never_reaches_network() {
        let api = Arc::new(ScriptedPayments::default());
        let (flow, mut rx) = DepositFlow::new(api.clone(), Arc::new(TokioScheduler::new()), DepositOptions::default());

        assert_eq!(
            flow.submit("abc", "0772000000").await,
            Err(DepositError::Validation(INVALID_AMOUNT.to_string()))
        );
        assert_eq!(
            flow.submit("0", "0772000000").await,
            Err(DepositError::Validation(INVALID_AMOUNT.to_string()))
        );
        assert_eq!(
            flow.submit("5000", "   ").await,
            Err(DepositError::Validation(MISSING_PHONE.to_string()))
        );
        assert_eq!(api.initiations.load(Ordering::SeqCst), 0);
        assert_eq!(
            flow.phase(),
            DepositPhase::Input {
                error: Some(MISSING_PHONE.to_string())
            }
        );
        assert_eq!(drain(&mut rx).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_pending_completed_settles_once() {
        let start = tokio::time::Instant::now();
        let api = Arc::new(ScriptedPayments::with_statuses(vec![
            Ok(status(PaymentStatus::Pending)),
            Ok(status(PaymentStatus::Pending)),
            Ok(completed(5000.0, 15000.0)),
        ]));
        let scheduler = Arc::new(TokioScheduler::new());
        let receipts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&receipts);
        let options = DepositOptions {
            on_success: Some(Box::new(move |r: &DepositReceipt| {
                seen.lock().unwrap().push((r.amount, r.new_balance));
            })),
            ..Default::default()
        };
        let (flow, mut rx) = DepositFlow::new(api.clone(), scheduler.clone(), options);

        let refs = flow.submit("5000", "0772000000").await.unwrap();
        assert_eq!(refs.internal_reference, "INT-1");
        assert!(matches!(flow.phase(), DepositPhase::AwaitingConfirmation { .. }));

        // checks at 2s (first), 3s and 6s (interval)
        advance_to(start, 2.5).await;
        assert_eq!(api.checks(), 1);
        advance_to(start, 3.5).await;
        assert_eq!(api.checks(), 2);
        advance_to(start, 6.5).await;
        assert_eq!(api.checks(), 3);

        let receipt = DepositReceipt {
            tx_ref: "SOMA-TX-1".to_string(),
            amount: Money::new(5000.0),
            new_balance: Some(Money::new(15000.0)),
        };
        assert_eq!(flow.phase(), DepositPhase::Succeeded(receipt.clone()));
        assert_eq!(
            receipts.lock().unwrap().as_slice(),
            [(Money::new(5000.0), Some(Money::new(15000.0)))]
        );
        // only the close timer is left
        assert_eq!(scheduler.pending(), 1);

        advance_to(start, 20.0).await;
        assert_eq!(api.checks(), 3);
        assert_eq!(flow.phase(), DepositPhase::Input { error: None });
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(
            drain(&mut rx),
            vec![
                DepositEvent::AwaitingConfirmation(refs),
                DepositEvent::Succeeded(receipt),
                DepositEvent::Closed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick() {
        let api = Arc::new(ScriptedPayments::default());
        let scheduler = Arc::new(TokioScheduler::new());
        let (flow, _rx) = DepositFlow::new(api.clone(), scheduler.clone(), DepositOptions::default());

        flow.submit("5000", "0772000000").await.unwrap();
        assert_eq!(scheduler.pending(), 2);

        assert!(flow.cancel());
        assert!(!flow.cancel());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(flow.phase(), DepositPhase::Input { error: None });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.checks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submit_polls_once() {
        let start = tokio::time::Instant::now();
        let api = Arc::new(ScriptedPayments::default());
        let scheduler = Arc::new(TokioScheduler::new());
        let (flow, _rx) = DepositFlow::new(api.clone(), scheduler.clone(), DepositOptions::default());

        let (a, b) = tokio::join!(flow.submit("5000", "0772000000"), flow.submit("5000", "0772000000"));
        assert!(a.is_ok());
        assert_eq!(b, Err(DepositError::Busy));
        assert_eq!(api.initiations.load(Ordering::SeqCst), 1);

        advance_to(start, 2.5).await;
        assert_eq!(api.checks(), 1);
        assert_eq!(scheduler.pending(), 1);
        advance_to(start, 3.5).await;
        assert_eq!(api.checks(), 2);
        advance_to(start, 6.5).await;
        assert_eq!(api.checks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_returns_to_input() {
        let api = Arc::new(ScriptedPayments::with_statuses(vec![Ok(status(PaymentStatus::Failed))]));
        let scheduler = Arc::new(TokioScheduler::new());
        let (flow, mut rx) = DepositFlow::new(api.clone(), scheduler.clone(), DepositOptions::default());

        flow.submit("5000", "0772000000").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let reason = "Payment failed or was cancelled".to_string();
        assert_eq!(flow.phase(), DepositPhase::Input { error: Some(reason.clone()) });
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(drain(&mut rx).last(), Some(&DepositEvent::Failed(reason)));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.checks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_keep_polling() {
        let api = Arc::new(ScriptedPayments::with_statuses(vec![
            Err(ApiError::ServerError("bad gateway".to_string())),
            Ok(completed(2000.0, 2000.0)),
        ]));
        let (flow, _rx) = DepositFlow::new(api.clone(), Arc::new(TokioScheduler::new()), DepositOptions::default());

        flow.submit("2000", "0772000000").await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(matches!(flow.phase(), DepositPhase::Succeeded(_)));
        assert_eq!(api.checks(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_initiation_asks_for_login() {
        let api = Arc::new(ScriptedPayments::default());
        *api.reject_with.lock().unwrap() = Some(ApiError::Unauthorized);
        let scheduler = Arc::new(TokioScheduler::new());
        let (flow, _rx) = DepositFlow::new(api.clone(), scheduler.clone(), DepositOptions::default());

        assert_eq!(
            flow.submit("5000", "0772000000").await,
            Err(DepositError::Rejected(LOGIN_REQUIRED.to_string()))
        );
        assert_eq!(
            flow.phase(),
            DepositPhase::Input {
                error: Some(LOGIN_REQUIRED.to_string())
            }
        );
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_deadline_times_out() {
        let api = Arc::new(ScriptedPayments::default());
        let scheduler = Arc::new(TokioScheduler::new());
        let options = DepositOptions {
            max_poll_duration: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        let (flow, mut rx) = DepositFlow::new(api.clone(), scheduler.clone(), options);

        flow.submit("5000", "0772000000").await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(
            flow.phase(),
            DepositPhase::Input {
                error: Some(TIMED_OUT.to_string())
            }
        );
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(drain(&mut rx).last(), Some(&DepositEvent::TimedOut));
        let checks = api.checks();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.checks(), checks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timers() {
        let api = Arc::new(ScriptedPayments::default());
        let scheduler = Arc::new(TokioScheduler::new());
        let (flow, _rx) = DepositFlow::new(api.clone(), scheduler.clone(), DepositOptions::default());

        flow.submit("5000", "0772000000").await.unwrap();
        drop(flow);
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.checks(), 0);
    }
}
