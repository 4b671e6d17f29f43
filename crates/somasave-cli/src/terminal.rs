//! Worker host for a terminal: there are no windows to claim or focus, and
//! notifications are printed.

use async_trait::async_trait;
use somasave_core::models::NotificationPayload;
use somasave_core::worker::{ClientWindow, Clients, Notifier, WorkerError};
use url::Url;

pub struct TerminalClients;

#[async_trait]
impl Clients for TerminalClients {
    async fn claim(&self) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn windows(&self) -> Result<Vec<ClientWindow>, WorkerError> {
        Ok(Vec::new())
    }

    async fn navigate(&self, _id: &str, _url: &Url) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn focus(&self, _id: &str) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn open_window(&self, url: &Url) -> Result<(), WorkerError> {
        println!("Open {} in your browser", url);
        Ok(())
    }
}

pub struct TerminalNotifier;

#[async_trait]
impl Notifier for TerminalNotifier {
    async fn show(&self, notification: &NotificationPayload) -> Result<(), WorkerError> {
        println!("[{}] {}", notification.title, notification.body);
        Ok(())
    }
}
