//! Mobile-money deposit confirmation.
//!
//! A deposit is initiated against the backend, after which the member
//! approves it on their phone. `DepositFlow` polls for the outcome and
//! reports it as `DepositEvent`s.

pub mod machine;
pub mod scheduler;

pub use machine::{
    DepositError, DepositEvent, DepositFlow, DepositOptions, DepositPhase, DepositReceipt, PaymentsApi,
    SuccessCallback, FIRST_CHECK_DELAY, POLL_INTERVAL, SUCCESS_CLOSE_DELAY,
};
pub use scheduler::{RepeatingTask, Scheduler, Task, TimerHandle, TokioScheduler};
