// src/services/store.rs
//! Persistence ports. `DbStore` and `MemoryStore` both implement them.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    IndexType, IndexValue, Lease, NewIndexValue, NewLease, NewPayment, OwnerId, Payment,
    UpsertOutcome,
};
use crate::services::error::EngineResult;

/// Time series of index observations keyed by `(index_type, country, date)`.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Inserts unless a row already exists for the same type, country and date.
    async fn upsert_if_absent(&self, value: &NewIndexValue) -> EngineResult<UpsertOutcome>;

    async fn latest(&self, country: &str, index_type: IndexType) -> EngineResult<Option<IndexValue>>;

    async fn exact(
        &self,
        country: &str,
        index_type: IndexType,
        date: NaiveDate,
    ) -> EngineResult<Option<IndexValue>>;

    /// Most recent observation with `value_date <= date`.
    async fn closest_on_or_before(
        &self,
        country: &str,
        index_type: IndexType,
        date: NaiveDate,
    ) -> EngineResult<Option<IndexValue>>;

    /// Observations within `[from, to]`, newest first.
    async fn range(
        &self,
        country: &str,
        index_type: IndexType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<IndexValue>>;

    /// The max-date row of every type that has data for `country`.
    async fn latest_per_type(&self, country: &str) -> EngineResult<Vec<IndexValue>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseScope {
    Live,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseFilter {
    pub scope: LeaseScope,
    pub property_unit_id: Option<i64>,
    pub tenant_id: Option<i64>,
}

impl LeaseFilter {
    pub fn live() -> Self {
        LeaseFilter {
            scope: LeaseScope::Live,
            property_unit_id: None,
            tenant_id: None,
        }
    }

    pub fn deleted() -> Self {
        LeaseFilter {
            scope: LeaseScope::Deleted,
            ..Self::live()
        }
    }

    pub fn for_property(property_unit_id: i64) -> Self {
        LeaseFilter {
            property_unit_id: Some(property_unit_id),
            ..Self::live()
        }
    }

    pub fn for_tenant(tenant_id: i64) -> Self {
        LeaseFilter {
            tenant_id: Some(tenant_id),
            ..Self::live()
        }
    }

    pub fn matches(&self, lease: &Lease) -> bool {
        let scope_ok = match self.scope {
            LeaseScope::Live => !lease.deleted,
            LeaseScope::Deleted => lease.deleted,
        };
        scope_ok
            && self.property_unit_id.map_or(true, |p| lease.property_unit_id == p)
            && self.tenant_id.map_or(true, |t| lease.tenant_ids.contains(&t))
    }
}

/// Result of a write guarded by the overlap invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardedWrite<T> {
    Written(T),
    /// Another ACTIVE, non-deleted lease on the same property overlaps.
    Overlap,
}

/// Lease persistence plus the ownership lookups the lifecycle needs.
///
/// Guarded writes evaluate the overlap check and apply the write atomically
/// with respect to other lease writes on the same property unit.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    async fn property_unit_owned(&self, owner: OwnerId, property_unit_id: i64) -> EngineResult<bool>;

    async fn tenant_owned(&self, owner: OwnerId, tenant_id: i64) -> EngineResult<bool>;

    /// Inserts the lease. With `check_overlap` the insert is refused on conflict.
    async fn insert_lease(&self, lease: &NewLease, check_overlap: bool) -> EngineResult<GuardedWrite<Lease>>;

    /// Overwrites the stored row with `lease`. The overlap check excludes `lease.id`.
    async fn save_lease(&self, lease: &Lease, check_overlap: bool) -> EngineResult<GuardedWrite<Lease>>;

    async fn find_lease(&self, owner: OwnerId, id: i64) -> EngineResult<Option<Lease>>;

    async fn list_leases(&self, owner: OwnerId, filter: LeaseFilter) -> EngineResult<Vec<Lease>>;

    /// ACTIVE, non-deleted leases on the property whose interval meets `[start, end]`.
    async fn find_overlapping(
        &self,
        property_unit_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> EngineResult<Vec<Lease>>;

    /// Removes the row and its payments. Returns false when nothing matched.
    async fn delete_lease(&self, owner: OwnerId, id: i64) -> EngineResult<bool>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_payment(&self, payment: &NewPayment) -> EngineResult<Payment>;

    async fn find_payment(&self, owner: OwnerId, id: i64) -> EngineResult<Option<Payment>>;

    /// Persists mutable fields only. The index snapshot is never rewritten.
    async fn update_payment(&self, payment: &Payment) -> EngineResult<Payment>;

    async fn delete_payment(&self, owner: OwnerId, id: i64) -> EngineResult<bool>;

    /// Payments of a lease, newest payment date first.
    async fn payments_for_lease(&self, owner: OwnerId, lease_id: i64) -> EngineResult<Vec<Payment>>;

    async fn count_payments_for_lease(&self, lease_id: i64) -> EngineResult<i64>;
}
