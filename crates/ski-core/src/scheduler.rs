//! # Installment Scheduler
//!
//! Collects outstanding balances off-session on their due date. Invoked by an
//! external trigger (cron or the operator endpoint); holds no timers itself.
//!
//! Each booking is isolated: a decline, an error or a timeout on one booking
//! is recorded in the batch report and the batch moves on. A failed charge
//! never fails the booking. It stays `partial` and the operator gets a hosted
//! payment link to forward to the customer. One single-use link is issued per
//! booking and handed out again on later runs.

use crate::booking::Booking;
use crate::error::{BookingError, BookingResult};
use crate::metadata::balance_metadata;
use crate::money::Money;
use crate::policy::BookingPolicy;
use crate::processor::{
    ChargeOutcome, ChargeResult, OffSessionCharge, PaymentLink, PaymentLinkRequest,
    SharedProcessor,
};
use crate::store::SharedStore;
use crate::transaction::{PaymentTransaction, PaymentType, TransactionStatus};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Outcome of one `process_due` run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceBatchReport {
    pub target_date: NaiveDate,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BalanceFailure>,
}

/// One booking whose balance was not collected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceFailure {
    pub booking_id: Uuid,
    pub email: String,
    pub amount: Money,
    pub error: String,
    /// Fallback link for the operator to forward, when one could be created
    pub payment_link: Option<String>,
}

enum ChargeAttempt {
    Succeeded(ChargeResult),
    Failed(String),
}

pub struct InstallmentScheduler {
    processor: SharedProcessor,
    store: SharedStore,
    policy: BookingPolicy,
}

impl InstallmentScheduler {
    pub fn new(processor: SharedProcessor, store: SharedStore, policy: BookingPolicy) -> Self {
        Self {
            processor,
            store,
            policy,
        }
    }

    /// Charge every balance due on or before `target_date`.
    ///
    /// Only the initial store query can fail the batch.
    #[instrument(skip(self))]
    pub async fn process_due(&self, target_date: NaiveDate) -> BookingResult<BalanceBatchReport> {
        let due = self.store.get_bookings_due_for_payment(target_date).await?;
        info!(count = due.len(), "processing due balances");

        let mut report = BalanceBatchReport {
            target_date,
            processed: 0,
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
        };

        for booking in due {
            report.processed += 1;
            match self.collect(booking).await {
                Ok(()) => report.succeeded += 1,
                Err(failure) => {
                    report.failed += 1;
                    report.errors.push(failure);
                }
            }
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "balance batch finished"
        );
        Ok(report)
    }

    /// Operator-requested fallback link for one booking's outstanding balance
    #[instrument(skip(self))]
    pub async fn create_balance_link(&self, booking_id: Uuid) -> BookingResult<PaymentLink> {
        let mut booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound {
                booking_id: booking_id.to_string(),
            })?;
        let amount = booking.collectable_balance()?;
        let minted = booking.balance_link.is_none();
        let link = self.issue_link(&mut booking, amount).await?;
        if minted {
            self.store.update_booking(&booking).await?;
        }
        Ok(link)
    }

    /// The booking's outstanding link, minted on first use
    async fn issue_link(&self, booking: &mut Booking, amount: Money) -> BookingResult<PaymentLink> {
        if let Some(link) = &booking.balance_link {
            info!(booking_id = %booking.id, link_id = %link.id, "reusing balance link");
            return Ok(link.clone());
        }
        let link = self
            .processor
            .create_payment_link(&link_request(booking, amount))
            .await?;
        info!(booking_id = %booking.id, link_id = %link.id, "balance link created");
        booking.balance_link = Some(link.clone());
        Ok(link)
    }

    async fn collect(&self, mut booking: Booking) -> Result<(), BalanceFailure> {
        let amount = match booking.collectable_balance() {
            Ok(amount) => amount,
            Err(e) => return Err(failure(&booking, Money::ZERO, e.to_string(), None)),
        };

        let (customer_id, payment_method_id) = match (
            booking.processor_customer_id.clone(),
            booking.payment_method_id.clone(),
        ) {
            (Some(customer), Some(method)) => (customer, method),
            _ => {
                let reason = "no stored payment method".to_string();
                return Err(self.fall_back(&mut booking, amount, reason, None).await);
            }
        };

        let mut transaction = match self
            .store
            .create_payment_transaction(PaymentTransaction::scheduled(
                booking.id,
                PaymentType::Balance,
                amount,
                self.processor.provider_name(),
            ))
            .await
        {
            Ok(recorded) => recorded.into_inner(),
            Err(e) => {
                // nothing charged yet, so a link is safe
                let reason = format!("could not record charge attempt: {}", e);
                return Err(self.fall_back(&mut booking, amount, reason, None).await);
            }
        };

        let charge = OffSessionCharge {
            amount,
            customer_id,
            payment_method_id,
            description: format!("Balance for {} ({})", booking.package_name, booking.dates),
            metadata: balance_metadata(booking.id),
            idempotency_key: format!("balance-{}", booking.id),
        };

        match self.attempt(&charge).await {
            ChargeAttempt::Succeeded(result) => {
                transaction.settle(TransactionStatus::Succeeded, result.payment_id, result.raw);
                if let Err(e) = self.record_success(&mut booking, &transaction).await {
                    error!(
                        alert = true,
                        booking_id = %booking.id,
                        error = %e,
                        "balance charged but not recorded"
                    );
                    return Err(failure(
                        &booking,
                        amount,
                        format!("charged but not recorded: {}", e),
                        None,
                    ));
                }
                info!(booking_id = %booking.id, amount = %amount, "balance collected");
                Ok(())
            }
            ChargeAttempt::Failed(reason) => {
                transaction.settle(
                    TransactionStatus::Declined,
                    None,
                    Some(serde_json::json!({ "error": reason })),
                );
                Err(self
                    .fall_back(&mut booking, amount, reason, Some(&transaction))
                    .await)
            }
        }
    }

    async fn attempt(&self, charge: &OffSessionCharge) -> ChargeAttempt {
        match tokio::time::timeout(
            self.policy.charge_timeout,
            self.processor.charge_off_session(charge),
        )
        .await
        {
            Ok(Ok(result)) => {
                if let ChargeOutcome::Declined { reason } = &result.outcome {
                    return ChargeAttempt::Failed(reason.clone());
                }
                ChargeAttempt::Succeeded(result)
            }
            Ok(Err(e)) => ChargeAttempt::Failed(e.to_string()),
            Err(_) => ChargeAttempt::Failed(
                BookingError::Timeout(format!(
                    "charge exceeded {}s",
                    self.policy.charge_timeout.as_secs()
                ))
                .to_string(),
            ),
        }
    }

    async fn record_success(
        &self,
        booking: &mut Booking,
        transaction: &PaymentTransaction,
    ) -> BookingResult<()> {
        self.store.update_payment_transaction(transaction).await?;
        booking.mark_balance_paid()?;
        self.store.update_booking(booking).await?;
        Ok(())
    }

    /// Record the failed attempt and hand the operator a payment link
    async fn fall_back(
        &self,
        booking: &mut Booking,
        amount: Money,
        reason: String,
        transaction: Option<&PaymentTransaction>,
    ) -> BalanceFailure {
        warn!(booking_id = %booking.id, reason = %reason, "balance charge failed");

        if let Some(transaction) = transaction {
            if let Err(e) = self.store.update_payment_transaction(transaction).await {
                error!(alert = true, booking_id = %booking.id, error = %e, "could not record declined charge");
            }
        }
        booking.note_balance_failure(reason.clone());
        let link = self.issue_link(booking, amount).await;
        if let Err(e) = self.store.update_booking(booking).await {
            error!(alert = true, booking_id = %booking.id, error = %e, "could not annotate booking");
        }

        match link {
            Ok(link) => failure(booking, amount, reason, Some(link.url)),
            Err(e) => {
                error!(booking_id = %booking.id, error = %e, "fallback link failed");
                failure(
                    booking,
                    amount,
                    format!("{}; payment link failed: {}", reason, e),
                    None,
                )
            }
        }
    }
}

fn link_request(booking: &Booking, amount: Money) -> PaymentLinkRequest {
    PaymentLinkRequest {
        amount,
        description: format!(
            "Remaining balance for {} ({})",
            booking.package_name, booking.dates
        ),
        metadata: balance_metadata(booking.id),
    }
}

fn failure(
    booking: &Booking,
    amount: Money,
    error: String,
    payment_link: Option<String>,
) -> BalanceFailure {
    BalanceFailure {
        booking_id: booking.id,
        email: booking.email.clone(),
        amount,
        error,
        payment_link,
    }
}
