//! Data models for SomaSave backend entities.
//!
//! - `Money`, `SignedAmount`: amounts normalized at decode time
//! - `DepositRequest`, `DepositInitiation`, `DepositStatusResponse`: mobile-money deposits
//! - `PushSubscription`, `NotificationPayload`: web push registration and delivery
//! - `DashboardStats`, `Transaction`: member dashboard figures
//! - `User`, `LoginResponse`: authentication

pub mod dashboard;
pub mod money;
pub mod notification;
pub mod payment;
pub mod push;
pub mod user;

pub use dashboard::{DashboardStats, Transaction};
pub use money::{Money, ParseMoneyError, SignedAmount};
pub use notification::NotificationPayload;
pub use payment::{DepositInitiation, DepositRequest, DepositStatusResponse, PaymentStatus, TxReferences};
pub use push::{PushSubscription, SubscriptionKeys, UnsubscribeRequest};
pub use user::{LoginRequest, LoginResponse, User};
