//! Installment planner.
//!
//! Splits a remaining balance into N dated parts. The per-part base is the
//! balance divided by N rounded *down* to cents; the final part absorbs the
//! remainder so the parts always sum back to the balance exactly.

use chrono::{Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::future::Future;
use thiserror::Error;

pub const MIN_INSTALLMENTS: u32 = 1;
pub const MAX_INSTALLMENTS: u32 = 4;
pub const DEFAULT_SPACING_DAYS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("installment amount must be positive")]
    NonPositiveAmount,
    #[error("amount is too small to split into {0} parts")]
    AmountTooSmall(u32),
    #[error("installment count {0} is outside {MIN_INSTALLMENTS}..={MAX_INSTALLMENTS}")]
    CountOutOfRange(u32),
    #[error("installment index {0} is out of bounds")]
    IndexOutOfBounds(usize),
}

/// One part of an installment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentPart {
    pub ordinal: u32,
    pub count: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

impl InstallmentPart {
    /// Audit label recorded on the payment created from this part.
    pub fn label(&self) -> String {
        format!("Installment {}/{}", self.ordinal, self.count)
    }
}

/// Transient breakdown of a remaining amount into N dated parts. Never
/// persisted; materialized into pending payments on confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentPlan {
    parts: Vec<InstallmentPart>,
}

impl InstallmentPlan {
    /// Build a plan for `remaining` split into `count` parts, dated from
    /// `first_due` at the default spacing.
    pub fn split(remaining: Decimal, count: u32, first_due: NaiveDate) -> Result<Self, PlanError> {
        if remaining <= Decimal::ZERO {
            return Err(PlanError::NonPositiveAmount);
        }
        if !(MIN_INSTALLMENTS..=MAX_INSTALLMENTS).contains(&count) {
            return Err(PlanError::CountOutOfRange(count));
        }

        let base = (remaining / Decimal::from(count))
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        // Every part must be a valid payment amount, so a base that floors
        // to zero cents makes the plan unrepresentable.
        if base.is_zero() {
            return Err(PlanError::AmountTooSmall(count));
        }
        let last = remaining - base * Decimal::from(count - 1);

        let parts = (1..=count)
            .map(|ordinal| {
                let due_date = first_due
                    .checked_add_days(Days::new(DEFAULT_SPACING_DAYS * u64::from(ordinal - 1)))
                    .unwrap_or(first_due);
                InstallmentPart {
                    ordinal,
                    count,
                    amount: if ordinal == count { last } else { base },
                    due_date,
                }
            })
            .collect();

        Ok(Self { parts })
    }

    /// Adjust one part's due date before confirmation. Dates are
    /// independently adjustable; amounts are not.
    pub fn with_date(mut self, index: usize, due_date: NaiveDate) -> Result<Self, PlanError> {
        let part = self
            .parts
            .get_mut(index)
            .ok_or(PlanError::IndexOutOfBounds(index))?;
        part.due_date = due_date;
        Ok(self)
    }

    pub fn parts(&self) -> &[InstallmentPart] {
        &self.parts
    }

    pub fn total(&self) -> Decimal {
        self.parts.iter().map(|p| p.amount).sum()
    }

    /// Drive `create` over the parts strictly in order, stopping at the
    /// first failure. Earlier results are kept either way; the caller
    /// decides how to report a partial outcome.
    pub async fn materialize<T, E, F, Fut>(&self, mut create: F) -> MaterializeOutcome<T, E>
    where
        F: FnMut(InstallmentPart) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut created = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            match create(part.clone()).await {
                Ok(item) => created.push(item),
                Err(error) => {
                    return MaterializeOutcome::Partial {
                        created,
                        failed_ordinal: part.ordinal,
                        error,
                    };
                }
            }
        }
        MaterializeOutcome::Complete(created)
    }
}

/// Result of materializing a plan part by part.
#[derive(Debug)]
pub enum MaterializeOutcome<T, E> {
    Complete(Vec<T>),
    Partial {
        created: Vec<T>,
        failed_ordinal: u32,
        error: E,
    },
}
