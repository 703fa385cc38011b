//! Payment summary calculator.
//!
//! Derived figures are never stored; every ledger read recomputes them from
//! the current payment rows and the sale total.

use crate::models::Payment;
use rust_decimal::Decimal;
use serde::Serialize;

/// Snapshot of how much of a sale's total has been collected, scheduled,
/// and how much is still free to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    /// Sum of amounts with status `paid`.
    pub paid: Decimal,
    /// Sum of amounts with status `pending` (scheduled but not collected).
    pub pending_scheduled: Decimal,
    /// Amount eligible for a "pay in full" action: max(0, total - paid).
    pub remaining: Decimal,
    /// Amount still free to allocate into new pending payments:
    /// max(0, total - paid - pending_scheduled). Gates the add-payment
    /// affordance.
    pub remaining_to_schedule: Decimal,
}

impl PaymentSummary {
    pub fn compute(payments: &[Payment], total: Decimal) -> Self {
        let mut paid = Decimal::ZERO;
        let mut pending_scheduled = Decimal::ZERO;

        for payment in payments {
            if payment.is_paid() {
                paid += payment.amount;
            } else {
                pending_scheduled += payment.amount;
            }
        }

        // A manual override can push the ledger past the sale total; both
        // remaining figures clamp at zero instead of going negative.
        let remaining = (total - paid).max(Decimal::ZERO);
        let remaining_to_schedule = (total - paid - pending_scheduled).max(Decimal::ZERO);

        Self {
            paid,
            pending_scheduled,
            remaining,
            remaining_to_schedule,
        }
    }

    pub fn can_add_payment(&self) -> bool {
        self.remaining_to_schedule > Decimal::ZERO
    }
}
