use serde::{Deserialize, Serialize};

use super::Money;

#[derive(Debug, Clone, Serialize)]
pub struct DepositRequest {
    pub amount: Money,
    pub phone_number: String,
}

/// Reference pair handed back when the backend accepts a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReferences {
    /// Correlates status checks with the mobile-money provider.
    pub tx_ref: String,
    /// The backend's own ledger reference.
    pub internal_reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositInitiation {
    #[serde(default = "default_true")]
    pub success: bool,
    pub tx_ref: Option<String>,
    pub internal_reference: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub amount: Option<Money>,
    pub phone_number: Option<String>,
}

fn default_true() -> bool {
    true
}

impl DepositInitiation {
    /// Resolve the response into a reference pair, or the backend's reason
    /// for declining.
    pub fn accepted(self) -> Result<TxReferences, String> {
        let reason = self
            .error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Failed to initiate deposit".to_string());

        if !self.success {
            return Err(reason);
        }

        match self.tx_ref.filter(|r| !r.is_empty()) {
            Some(tx_ref) => Ok(TxReferences {
                internal_reference: self.internal_reference.unwrap_or_else(|| tx_ref.clone()),
                tx_ref,
            }),
            None => Err(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    /// Anything else the provider reports is treated as not yet settled.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositStatusResponse {
    pub status: PaymentStatus,
    pub amount: Option<Money>,
    pub new_balance: Option<Money>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl DepositStatusResponse {
    pub fn failure_reason(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Payment failed or was cancelled".to_string())
    }
}
