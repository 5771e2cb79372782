// src/services/payments.rs
use bigdecimal::{BigDecimal, Zero};
use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use std::sync::Arc;

use crate::models::{
    IndexSnapshot, Lease, NewPayment, OwnerId, Payment, PaymentChanges, PaymentDraft,
    PaymentStatus, PaymentType,
};
use crate::services::error::{EngineError, EngineResult};
use crate::services::store::{IndexStore, LeaseStore, PaymentStore};

/// A single payment may cover at most this many months of rent.
pub const MAX_RENT_MULTIPLE: u32 = 3;

/// Whole calendar months from `start` to `as_of`. A month counts once its day is reached.
pub fn whole_months_between(start: NaiveDate, as_of: NaiveDate) -> i64 {
    let mut months = (as_of.year() - start.year()) as i64 * 12 + as_of.month() as i64 - start.month() as i64;
    if as_of.day() < start.day() {
        months -= 1;
    }
    months.max(0)
}

fn validate_amount(amount: &BigDecimal, lease: &Lease) -> EngineResult<()> {
    if *amount <= BigDecimal::zero() {
        return Err(EngineError::rule("Payment amount must be greater than zero"));
    }
    let ceiling = &lease.monthly_rent * &BigDecimal::from(MAX_RENT_MULTIPLE);
    if *amount > ceiling {
        return Err(EngineError::rule(format!(
            "Payment amount cannot exceed {} months of rent in a single payment",
            MAX_RENT_MULTIPLE
        )));
    }
    Ok(())
}

fn validate_date(payment_date: NaiveDate, lease: &Lease) -> EngineResult<()> {
    if payment_date < lease.start_date {
        return Err(EngineError::rule("Payment date cannot be before lease start date"));
    }
    Ok(())
}

/// Payment recording tied to owned leases, with an index snapshot taken at creation.
pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    leases: Arc<dyn LeaseStore>,
    indices: Arc<dyn IndexStore>,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn PaymentStore>, leases: Arc<dyn LeaseStore>, indices: Arc<dyn IndexStore>) -> Self {
        PaymentService {
            payments,
            leases,
            indices,
        }
    }

    async fn owned_lease(&self, owner: OwnerId, lease_id: i64) -> EngineResult<Lease> {
        match self.leases.find_lease(owner, lease_id).await? {
            Some(lease) if !lease.deleted => Ok(lease),
            _ => Err(EngineError::not_found("Lease", lease_id)),
        }
    }

    async fn snapshot_for(&self, lease: &Lease) -> EngineResult<Option<IndexSnapshot>> {
        let Some(index_type) = lease.adjustment_index.index_type() else {
            return Ok(None);
        };
        match self.indices.latest(&lease.country_code, index_type).await? {
            Some(value) => Ok(Some(IndexSnapshot {
                index_type,
                value: value.value,
                value_date: value.value_date,
            })),
            None => {
                warn!("No {} data for {}, payment recorded without index snapshot", index_type, lease.country_code);
                Ok(None)
            }
        }
    }

    pub async fn create(&self, owner: OwnerId, draft: PaymentDraft) -> EngineResult<Payment> {
        let lease = self.owned_lease(owner, draft.lease_id).await?;
        validate_date(draft.payment_date, &lease)?;
        validate_amount(&draft.amount, &lease)?;

        let snapshot = self.snapshot_for(&lease).await?;
        let payment = self
            .payments
            .insert_payment(&NewPayment {
                owner_id: owner,
                lease_id: lease.id,
                amount: draft.amount,
                payment_date: draft.payment_date,
                payment_type: draft.payment_type.unwrap_or_default(),
                status: draft.status.unwrap_or_default(),
                description: draft.description,
                snapshot,
            })
            .await?;
        info!("Recorded payment {} of {} for lease {}", payment.id, payment.amount, lease.id);
        Ok(payment)
    }

    /// Updates mutable fields. The index snapshot stays as recorded.
    pub async fn update(&self, owner: OwnerId, id: i64, changes: PaymentChanges) -> EngineResult<Payment> {
        let mut payment = self.get(owner, id).await?;
        let lease = self.owned_lease(owner, payment.lease_id).await?;

        if let Some(amount) = changes.amount {
            validate_amount(&amount, &lease)?;
            payment.amount = amount;
        }
        if let Some(payment_date) = changes.payment_date {
            validate_date(payment_date, &lease)?;
            payment.payment_date = payment_date;
        }
        if let Some(payment_type) = changes.payment_type {
            payment.payment_type = payment_type;
        }
        if let Some(status) = changes.status {
            payment.status = status;
        }
        if changes.description.is_some() {
            payment.description = changes.description;
        }

        let saved = self.payments.update_payment(&payment).await?;
        info!("Updated payment {}", id);
        Ok(saved)
    }

    pub async fn delete(&self, owner: OwnerId, id: i64) -> EngineResult<()> {
        if !self.payments.delete_payment(owner, id).await? {
            return Err(EngineError::not_found("Payment", id));
        }
        info!("Deleted payment {}", id);
        Ok(())
    }

    pub async fn get(&self, owner: OwnerId, id: i64) -> EngineResult<Payment> {
        self.payments
            .find_payment(owner, id)
            .await?
            .ok_or_else(|| EngineError::not_found("Payment", id))
    }

    pub async fn list_for_lease(&self, owner: OwnerId, lease_id: i64) -> EngineResult<Vec<Payment>> {
        self.owned_lease(owner, lease_id).await?;
        self.payments.payments_for_lease(owner, lease_id).await
    }

    /// Sum of PAID payments, optionally restricted to one payment type.
    pub async fn total_paid(
        &self,
        owner: OwnerId,
        lease_id: i64,
        payment_type: Option<PaymentType>,
    ) -> EngineResult<BigDecimal> {
        let payments = self.list_for_lease(owner, lease_id).await?;
        Ok(payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .filter(|p| payment_type.map_or(true, |t| p.payment_type == t))
            .fold(BigDecimal::zero(), |acc, p| acc + &p.amount))
    }

    /// `rent * (whole months since start + 1) - paid rent`, never negative.
    pub async fn outstanding_rent(&self, owner: OwnerId, lease_id: i64, as_of: NaiveDate) -> EngineResult<BigDecimal> {
        let lease = self.owned_lease(owner, lease_id).await?;
        if as_of < lease.start_date {
            return Ok(BigDecimal::zero());
        }
        let months_due = whole_months_between(lease.start_date, as_of) + 1;
        let due = &lease.monthly_rent * &BigDecimal::from(months_due);
        let paid = self.total_paid(owner, lease_id, Some(PaymentType::Rent)).await?;
        let outstanding = due - paid;
        if outstanding < BigDecimal::zero() {
            Ok(BigDecimal::zero())
        } else {
            Ok(outstanding)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn months_count_once_the_day_is_reached() {
        assert_eq!(whole_months_between(date(2024, 1, 15), date(2024, 1, 20)), 0);
        assert_eq!(whole_months_between(date(2024, 1, 15), date(2024, 2, 14)), 0);
        assert_eq!(whole_months_between(date(2024, 1, 15), date(2024, 2, 15)), 1);
        assert_eq!(whole_months_between(date(2023, 11, 1), date(2024, 2, 1)), 3);
        assert_eq!(whole_months_between(date(2024, 3, 1), date(2024, 1, 1)), 0);
    }
}
