use serde::{Deserialize, Serialize};

use super::{Money, SignedAmount};

/// Aggregate figures from `GET /dashboard/stats/`.
///
/// The view adds fields over time; unknown ones are kept in `extra`.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardStats {
    #[serde(default, alias = "total_savings")]
    pub savings_balance: Money,
    #[serde(default)]
    pub loan_balance: Money,
    #[serde(default)]
    pub shares: Money,
    #[serde(default, alias = "transactions")]
    pub recent_transactions: Vec<Transaction>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type", alias = "transaction_type", default)]
    pub kind: String,
    pub amount: SignedAmount,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl DashboardStats {
    pub fn total_credits(&self) -> Money {
        Money::from_minor(
            self.recent_transactions
                .iter()
                .filter(|t| t.amount.is_credit())
                .map(|t| t.amount.amount().minor_units())
                .sum(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_normalizes_transaction_signs() {
        let json = r#"{
            "total_savings": "1250000.00",
            "loan_balance": 350000,
            "recent_transactions": [
                {"type": "Savings Deposit", "amount": "+500,000", "date": "Dec 15, 2024"},
                {"type": "Loan Repayment", "amount": "-350,000", "date": "Dec 10, 2024"},
                {"type": "Dividend Payment", "amount": "+45,000"}
            ],
            "member_since": "2023"
        }"#;
        let stats: DashboardStats = serde_json::from_str(json).unwrap();

        assert_eq!(stats.savings_balance, Money::new(1_250_000.0));
        assert_eq!(stats.recent_transactions.len(), 3);
        assert!(!stats.recent_transactions[1].amount.is_credit());
        assert_eq!(stats.total_credits(), Money::new(545_000.0));
        assert_eq!(stats.extra["member_since"], "2023");
    }
}
