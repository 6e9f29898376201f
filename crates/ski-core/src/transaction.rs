//! # Payment Transactions
//!
//! One row per money movement attempt against a booking.

use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Deposit,
    Balance,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Succeeded,
    Declined,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub booking_id: Uuid,
    /// Provider charge/intent id (e.g. `pi_...`)
    pub provider_payment_id: Option<String>,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    pub provider: String,
    /// Opaque provider payload, kept for audits
    pub provider_response: Option<serde_json::Value>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// A transaction already settled by the provider
    pub fn succeeded(
        booking_id: Uuid,
        payment_type: PaymentType,
        amount: Money,
        provider: impl Into<String>,
        provider_payment_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            provider_payment_id,
            amount,
            payment_type,
            status: TransactionStatus::Succeeded,
            provider: provider.into(),
            provider_response: None,
            scheduled_at: None,
            processed_at: Some(now),
            created_at: now,
        }
    }

    /// A scheduled attempt not yet sent to the provider
    pub fn scheduled(
        booking_id: Uuid,
        payment_type: PaymentType,
        amount: Money,
        provider: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            provider_payment_id: None,
            amount,
            payment_type,
            status: TransactionStatus::Pending,
            provider: provider.into(),
            provider_response: None,
            scheduled_at: Some(now),
            processed_at: None,
            created_at: now,
        }
    }

    /// Builder: attach raw provider payload
    pub fn with_response(mut self, response: serde_json::Value) -> Self {
        self.provider_response = Some(response);
        self
    }

    /// Record the provider's verdict on a scheduled attempt
    pub fn settle(
        &mut self,
        status: TransactionStatus,
        provider_payment_id: Option<String>,
        response: Option<serde_json::Value>,
    ) {
        self.status = status;
        if provider_payment_id.is_some() {
            self.provider_payment_id = provider_payment_id;
        }
        if response.is_some() {
            self.provider_response = response;
        }
        self.processed_at = Some(Utc::now());
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == TransactionStatus::Succeeded
    }
}

/// Sum of succeeded transactions
pub fn collected_total(transactions: &[PaymentTransaction]) -> Money {
    transactions
        .iter()
        .filter(|t| t.is_succeeded())
        .map(|t| t.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collected_total_ignores_unsettled() {
        let booking_id = Uuid::new_v4();
        let deposit = PaymentTransaction::succeeded(
            booking_id,
            PaymentType::Deposit,
            Money::from_cents(5550),
            "stripe",
            Some("pi_1".to_string()),
        );
        let mut declined = PaymentTransaction::scheduled(
            booking_id,
            PaymentType::Balance,
            Money::from_cents(12950),
            "stripe",
        );
        declined.settle(TransactionStatus::Declined, None, None);
        let pending = PaymentTransaction::scheduled(
            booking_id,
            PaymentType::Balance,
            Money::from_cents(12950),
            "stripe",
        );

        assert_eq!(
            collected_total(&[deposit, declined, pending]),
            Money::from_cents(5550)
        );
    }

    #[test]
    fn test_settle_keeps_existing_ids() {
        let mut txn = PaymentTransaction::scheduled(
            Uuid::new_v4(),
            PaymentType::Balance,
            Money::from_euros(10),
            "stripe",
        );
        txn.settle(TransactionStatus::Succeeded, Some("pi_9".to_string()), None);
        txn.settle(TransactionStatus::Succeeded, None, None);
        assert_eq!(txn.provider_payment_id.as_deref(), Some("pi_9"));
        assert!(txn.processed_at.is_some());
    }
}
