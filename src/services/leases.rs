// src/services/leases.rs
use bigdecimal::{BigDecimal, Zero};
use chrono::{Local, NaiveDate, Utc};
use log::{info, warn};
use std::sync::Arc;

use crate::models::{
    normalize_country_code, AdjustmentIndex, Lease, LeaseChanges, LeaseDraft, LeaseStatus,
    NewLease, OwnerId,
};
use crate::services::catalog::IndexCatalog;
use crate::services::error::{EngineError, EngineResult};
use crate::services::store::{GuardedWrite, LeaseFilter, LeaseStore, PaymentStore};

pub const MIN_LEASE_DAYS: i64 = 30;
pub const DEFAULT_COUNTRY: &str = "AR";
pub const DEFAULT_ADJUSTMENT_FREQUENCY_MONTHS: i32 = 12;

pub const OVERLAP_MESSAGE: &str = "There is already an active lease for this property during the specified period";
pub const HAS_PAYMENTS_MESSAGE: &str = "Cannot delete lease with existing payments. Terminate the lease instead.";

/// Checks the date rules every lease interval must satisfy.
pub fn validate_dates(start: NaiveDate, end: NaiveDate) -> EngineResult<()> {
    if end <= start {
        return Err(EngineError::rule("End date must be after start date"));
    }
    if (end - start).num_days() < MIN_LEASE_DAYS {
        return Err(EngineError::rule(format!("Lease must be at least {} days long", MIN_LEASE_DAYS)));
    }
    Ok(())
}

fn validate_rent(rent: &BigDecimal) -> EngineResult<()> {
    if *rent <= BigDecimal::zero() {
        return Err(EngineError::rule("Monthly rent must be greater than zero"));
    }
    Ok(())
}

fn validate_frequency(months: i32) -> EngineResult<()> {
    if months < 1 {
        return Err(EngineError::rule("Adjustment frequency must be at least one month"));
    }
    Ok(())
}

/// State machine over leases: ACTIVE <-> TERMINATED, implicit EXPIRED, and an
/// orthogonal soft-delete flag. Every call is scoped to one owner.
pub struct LeaseManager {
    leases: Arc<dyn LeaseStore>,
    payments: Arc<dyn PaymentStore>,
    catalog: Arc<IndexCatalog>,
}

impl LeaseManager {
    pub fn new(leases: Arc<dyn LeaseStore>, payments: Arc<dyn PaymentStore>, catalog: Arc<IndexCatalog>) -> Self {
        LeaseManager {
            leases,
            payments,
            catalog,
        }
    }

    fn resolve_country(&self, raw: Option<&str>) -> EngineResult<String> {
        let country = normalize_country_code(raw.unwrap_or(DEFAULT_COUNTRY));
        if !self.catalog.is_supported(&country) {
            return Err(EngineError::rule(format!("Country {} is not supported", country)));
        }
        Ok(country)
    }

    fn check_index(&self, index: AdjustmentIndex, country: &str) -> EngineResult<()> {
        if !self.catalog.is_valid_index(index, country) {
            return Err(EngineError::rule(format!(
                "Adjustment index {} is not available for country {}",
                index, country
            )));
        }
        Ok(())
    }

    /// ICL where the country offers it, fixed rent elsewhere.
    fn default_index(&self, country: &str) -> AdjustmentIndex {
        if self.catalog.is_valid_index(AdjustmentIndex::Icl, country) {
            AdjustmentIndex::Icl
        } else {
            AdjustmentIndex::None
        }
    }

    async fn live_lease(&self, owner: OwnerId, id: i64) -> EngineResult<Lease> {
        match self.leases.find_lease(owner, id).await? {
            Some(lease) if !lease.deleted => Ok(lease),
            _ => Err(EngineError::not_found("Lease", id)),
        }
    }

    async fn deleted_lease(&self, owner: OwnerId, id: i64) -> EngineResult<Lease> {
        match self.leases.find_lease(owner, id).await? {
            Some(lease) if lease.deleted => Ok(lease),
            _ => Err(EngineError::not_found("Deleted lease", id)),
        }
    }

    async fn save(&self, lease: &Lease, check_overlap: bool) -> EngineResult<Lease> {
        match self.leases.save_lease(lease, check_overlap).await? {
            GuardedWrite::Written(saved) => Ok(saved),
            GuardedWrite::Overlap => {
                warn!("Lease {} rejected: overlaps an active lease on property {}", lease.id, lease.property_unit_id);
                Err(EngineError::rule(OVERLAP_MESSAGE))
            }
        }
    }

    pub async fn create(&self, owner: OwnerId, draft: LeaseDraft) -> EngineResult<Lease> {
        let property_unit_id = draft
            .property_unit_id
            .ok_or_else(|| EngineError::rule("Property unit is required"))?;
        if !self.leases.property_unit_owned(owner, property_unit_id).await? {
            return Err(EngineError::not_found("PropertyUnit", property_unit_id));
        }

        let mut tenant_ids = draft.tenant_ids.clone();
        tenant_ids.sort_unstable();
        tenant_ids.dedup();
        if tenant_ids.is_empty() {
            return Err(EngineError::rule("At least one tenant is required"));
        }
        for tenant_id in &tenant_ids {
            if !self.leases.tenant_owned(owner, *tenant_id).await? {
                return Err(EngineError::not_found("Tenant", *tenant_id));
            }
        }

        validate_dates(draft.start_date, draft.end_date)?;
        validate_rent(&draft.monthly_rent)?;

        let country_code = self.resolve_country(draft.country_code.as_deref())?;
        let adjustment_index = draft
            .adjustment_index
            .unwrap_or_else(|| self.default_index(&country_code));
        self.check_index(adjustment_index, &country_code)?;

        let adjustment_frequency_months = draft
            .adjustment_frequency_months
            .unwrap_or(DEFAULT_ADJUSTMENT_FREQUENCY_MONTHS);
        validate_frequency(adjustment_frequency_months)?;

        let status = draft.status.unwrap_or(LeaseStatus::Active);
        let new_lease = NewLease {
            owner_id: owner,
            property_unit_id,
            tenant_ids,
            start_date: draft.start_date,
            end_date: draft.end_date,
            monthly_rent: draft.monthly_rent,
            status,
            adjustment_index,
            adjustment_frequency_months,
            country_code,
        };

        match self.leases.insert_lease(&new_lease, status == LeaseStatus::Active).await? {
            GuardedWrite::Written(lease) => {
                info!(
                    "Created lease {} on property {} ({} to {}, {})",
                    lease.id, lease.property_unit_id, lease.start_date, lease.end_date, lease.status.as_str()
                );
                Ok(lease)
            }
            GuardedWrite::Overlap => {
                warn!("Lease creation rejected: overlap on property {}", property_unit_id);
                Err(EngineError::rule(OVERLAP_MESSAGE))
            }
        }
    }

    pub async fn update(&self, owner: OwnerId, id: i64, changes: LeaseChanges) -> EngineResult<Lease> {
        let current = self.live_lease(owner, id).await?;
        let mut updated = current.clone();

        if let Some(start) = changes.start_date {
            updated.start_date = start;
        }
        if let Some(end) = changes.end_date {
            updated.end_date = end;
        }
        let dates_changed = updated.start_date != current.start_date || updated.end_date != current.end_date;
        if dates_changed {
            validate_dates(updated.start_date, updated.end_date)?;
        }

        if let Some(rent) = changes.monthly_rent {
            validate_rent(&rent)?;
            updated.monthly_rent = rent;
        }
        if let Some(country) = changes.country_code.as_deref() {
            updated.country_code = self.resolve_country(Some(country))?;
        }
        if let Some(index) = changes.adjustment_index {
            updated.adjustment_index = index;
        }
        if changes.country_code.is_some() || changes.adjustment_index.is_some() {
            self.check_index(updated.adjustment_index, &updated.country_code)?;
        }
        if let Some(months) = changes.adjustment_frequency_months {
            validate_frequency(months)?;
            updated.adjustment_frequency_months = months;
        }
        if let Some(status) = changes.status {
            updated.status = status;
        }

        let becomes_active = updated.status == LeaseStatus::Active && current.status != LeaseStatus::Active;
        let check_overlap = updated.status == LeaseStatus::Active && (dates_changed || becomes_active);
        let saved = self.save(&updated, check_overlap).await?;
        if saved.status != current.status {
            info!(
                "Lease {} status {} -> {}",
                id,
                current.status.as_str(),
                saved.status.as_str()
            );
        } else {
            info!("Updated lease {}", id);
        }
        Ok(saved)
    }

    pub async fn terminate(&self, owner: OwnerId, id: i64) -> EngineResult<Lease> {
        let mut lease = self.live_lease(owner, id).await?;
        let previous = lease.status;
        lease.status = LeaseStatus::Terminated;
        let saved = self.save(&lease, false).await?;
        info!("Lease {} status {} -> TERMINATED", id, previous.as_str());
        Ok(saved)
    }

    pub async fn reactivate(&self, owner: OwnerId, id: i64) -> EngineResult<Lease> {
        self.reactivate_on(owner, id, Local::now().date_naive()).await
    }

    /// Reactivation as of `today`: EXPIRED when the lease already ended.
    pub async fn reactivate_on(&self, owner: OwnerId, id: i64, today: NaiveDate) -> EngineResult<Lease> {
        let mut lease = self.live_lease(owner, id).await?;
        if lease.status != LeaseStatus::Terminated {
            warn!("Lease {} cannot be reactivated from {}", id, lease.status.as_str());
            return Err(EngineError::rule("Only terminated leases can be reactivated"));
        }

        lease.status = if lease.end_date < today {
            LeaseStatus::Expired
        } else {
            LeaseStatus::Active
        };
        let saved = self.save(&lease, true).await?;
        info!("Lease {} status TERMINATED -> {}", id, saved.status.as_str());
        Ok(saved)
    }

    pub async fn soft_delete(&self, owner: OwnerId, id: i64) -> EngineResult<Lease> {
        let mut lease = self.live_lease(owner, id).await?;
        lease.deleted = true;
        lease.deleted_at = Some(Utc::now());
        let saved = self.save(&lease, false).await?;
        info!("Soft-deleted lease {}", id);
        Ok(saved)
    }

    pub async fn restore(&self, owner: OwnerId, id: i64) -> EngineResult<Lease> {
        let mut lease = self.deleted_lease(owner, id).await?;
        lease.deleted = false;
        lease.deleted_at = None;
        let saved = self.save(&lease, lease.status == LeaseStatus::Active).await?;
        info!("Restored lease {} with status {}", id, saved.status.as_str());
        Ok(saved)
    }

    /// Irreversibly removes a soft-deleted lease together with its payments.
    pub async fn permanently_delete(&self, owner: OwnerId, id: i64) -> EngineResult<()> {
        self.deleted_lease(owner, id).await?;
        if !self.leases.delete_lease(owner, id).await? {
            return Err(EngineError::not_found("Deleted lease", id));
        }
        info!("Permanently deleted lease {}", id);
        Ok(())
    }

    /// Removes a live lease outright. Refused while payments reference it.
    pub async fn hard_delete(&self, owner: OwnerId, id: i64) -> EngineResult<()> {
        self.live_lease(owner, id).await?;
        let payments = self.payments.count_payments_for_lease(id).await?;
        if payments > 0 {
            warn!("Lease {} has {} payments, refusing hard delete", id, payments);
            return Err(EngineError::rule(HAS_PAYMENTS_MESSAGE));
        }
        if !self.leases.delete_lease(owner, id).await? {
            return Err(EngineError::not_found("Lease", id));
        }
        info!("Deleted lease {}", id);
        Ok(())
    }

    pub async fn get(&self, owner: OwnerId, id: i64) -> EngineResult<Lease> {
        self.live_lease(owner, id).await
    }

    pub async fn list(&self, owner: OwnerId) -> EngineResult<Vec<Lease>> {
        self.leases.list_leases(owner, LeaseFilter::live()).await
    }

    pub async fn list_deleted(&self, owner: OwnerId) -> EngineResult<Vec<Lease>> {
        self.leases.list_leases(owner, LeaseFilter::deleted()).await
    }

    pub async fn list_for_property(&self, owner: OwnerId, property_unit_id: i64) -> EngineResult<Vec<Lease>> {
        if !self.leases.property_unit_owned(owner, property_unit_id).await? {
            return Err(EngineError::not_found("PropertyUnit", property_unit_id));
        }
        self.leases.list_leases(owner, LeaseFilter::for_property(property_unit_id)).await
    }

    pub async fn list_for_tenant(&self, owner: OwnerId, tenant_id: i64) -> EngineResult<Vec<Lease>> {
        if !self.leases.tenant_owned(owner, tenant_id).await? {
            return Err(EngineError::not_found("Tenant", tenant_id));
        }
        self.leases.list_leases(owner, LeaseFilter::for_tenant(tenant_id)).await
    }

    /// ACTIVE, non-deleted leases covering `date`.
    pub async fn active_on(&self, owner: OwnerId, date: NaiveDate) -> EngineResult<Vec<Lease>> {
        let leases = self.leases.list_leases(owner, LeaseFilter::live()).await?;
        Ok(leases.into_iter().filter(|l| l.is_active_on(date)).collect())
    }

    /// Whether a lease over `[start, end]` would collide with an active one.
    pub async fn has_overlap(
        &self,
        property_unit_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> EngineResult<bool> {
        let hits = self
            .leases
            .find_overlapping(property_unit_id, start, end, exclude_id)
            .await?;
        Ok(!hits.is_empty())
    }
}
