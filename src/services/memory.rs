// src/services/memory.rs
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::models::{
    IndexType, IndexValue, Lease, NewIndexValue, NewLease, NewPayment, OwnerId, Payment,
    UpsertOutcome,
};
use crate::services::error::{EngineError, EngineResult};
use crate::services::store::{GuardedWrite, IndexStore, LeaseFilter, LeaseStore, PaymentStore};

type SeriesKey = (String, IndexType, NaiveDate);

#[derive(Default)]
struct Tables {
    index_values: BTreeMap<SeriesKey, IndexValue>,
    property_units: HashMap<i64, OwnerId>,
    tenants: HashMap<i64, OwnerId>,
    leases: BTreeMap<i64, Lease>,
    payments: BTreeMap<i64, Payment>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_overlap(&self, property_unit_id: i64, start: NaiveDate, end: NaiveDate, exclude_id: Option<i64>) -> bool {
        self.leases.values().any(|l| {
            l.property_unit_id == property_unit_id
                && Some(l.id) != exclude_id
                && l.blocks_property()
                && l.overlaps(start, end)
        })
    }
}

/// Process-local store. Every check-and-write runs under one write lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a property unit owned by `owner` and returns its id.
    pub async fn add_property_unit(&self, owner: OwnerId) -> i64 {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        tables.property_units.insert(id, owner);
        id
    }

    pub async fn add_tenant(&self, owner: OwnerId) -> i64 {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        tables.tenants.insert(id, owner);
        id
    }

    pub async fn index_value_count(&self) -> usize {
        self.tables.read().await.index_values.len()
    }
}

fn series_bounds(country: &str, index_type: IndexType, from: NaiveDate, to: NaiveDate) -> (SeriesKey, SeriesKey) {
    ((country.to_string(), index_type, from), (country.to_string(), index_type, to))
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn upsert_if_absent(&self, value: &NewIndexValue) -> EngineResult<UpsertOutcome> {
        let mut tables = self.tables.write().await;
        let key = (value.country_code.clone(), value.index_type, value.value_date);
        if tables.index_values.contains_key(&key) {
            debug!("{} {} {} already stored", value.country_code, value.index_type, value.value_date);
            return Ok(UpsertOutcome::Skipped);
        }
        let id = tables.next_id();
        tables.index_values.insert(
            key,
            IndexValue {
                id,
                index_type: value.index_type,
                country_code: value.country_code.clone(),
                value_date: value.value_date,
                value: value.value.clone(),
                source: value.source.clone(),
                raw_payload: value.raw_payload.clone(),
                recorded_at: Utc::now(),
            },
        );
        Ok(UpsertOutcome::Inserted)
    }

    async fn latest(&self, country: &str, index_type: IndexType) -> EngineResult<Option<IndexValue>> {
        self.closest_on_or_before(country, index_type, NaiveDate::MAX).await
    }

    async fn exact(&self, country: &str, index_type: IndexType, date: NaiveDate) -> EngineResult<Option<IndexValue>> {
        let tables = self.tables.read().await;
        Ok(tables
            .index_values
            .get(&(country.to_string(), index_type, date))
            .cloned())
    }

    async fn closest_on_or_before(
        &self,
        country: &str,
        index_type: IndexType,
        date: NaiveDate,
    ) -> EngineResult<Option<IndexValue>> {
        let tables = self.tables.read().await;
        let (lo, hi) = series_bounds(country, index_type, NaiveDate::MIN, date);
        Ok(tables.index_values.range(lo..=hi).next_back().map(|(_, v)| v.clone()))
    }

    async fn range(
        &self,
        country: &str,
        index_type: IndexType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<IndexValue>> {
        if from > to {
            return Ok(Vec::new());
        }
        let tables = self.tables.read().await;
        let (lo, hi) = series_bounds(country, index_type, from, to);
        Ok(tables.index_values.range(lo..=hi).rev().map(|(_, v)| v.clone()).collect())
    }

    async fn latest_per_type(&self, country: &str) -> EngineResult<Vec<IndexValue>> {
        let mut rows = Vec::new();
        for index_type in IndexType::ALL {
            if let Some(value) = self.latest(country, index_type).await? {
                rows.push(value);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn property_unit_owned(&self, owner: OwnerId, property_unit_id: i64) -> EngineResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.property_units.get(&property_unit_id) == Some(&owner))
    }

    async fn tenant_owned(&self, owner: OwnerId, tenant_id: i64) -> EngineResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.tenants.get(&tenant_id) == Some(&owner))
    }

    async fn insert_lease(&self, lease: &NewLease, check_overlap: bool) -> EngineResult<GuardedWrite<Lease>> {
        let mut tables = self.tables.write().await;
        if check_overlap && tables.has_overlap(lease.property_unit_id, lease.start_date, lease.end_date, None) {
            return Ok(GuardedWrite::Overlap);
        }
        let id = tables.next_id();
        let stored = Lease {
            id,
            owner_id: lease.owner_id,
            property_unit_id: lease.property_unit_id,
            tenant_ids: lease.tenant_ids.clone(),
            start_date: lease.start_date,
            end_date: lease.end_date,
            monthly_rent: lease.monthly_rent.clone(),
            status: lease.status,
            adjustment_index: lease.adjustment_index,
            adjustment_frequency_months: lease.adjustment_frequency_months,
            country_code: lease.country_code.clone(),
            deleted: false,
            deleted_at: None,
        };
        tables.leases.insert(id, stored.clone());
        Ok(GuardedWrite::Written(stored))
    }

    async fn save_lease(&self, lease: &Lease, check_overlap: bool) -> EngineResult<GuardedWrite<Lease>> {
        let mut tables = self.tables.write().await;
        if check_overlap && tables.has_overlap(lease.property_unit_id, lease.start_date, lease.end_date, Some(lease.id)) {
            return Ok(GuardedWrite::Overlap);
        }
        tables.leases.insert(lease.id, lease.clone());
        Ok(GuardedWrite::Written(lease.clone()))
    }

    async fn find_lease(&self, owner: OwnerId, id: i64) -> EngineResult<Option<Lease>> {
        let tables = self.tables.read().await;
        Ok(tables.leases.get(&id).filter(|l| l.owner_id == owner).cloned())
    }

    async fn list_leases(&self, owner: OwnerId, filter: LeaseFilter) -> EngineResult<Vec<Lease>> {
        let tables = self.tables.read().await;
        Ok(tables
            .leases
            .values()
            .filter(|l| l.owner_id == owner && filter.matches(l))
            .cloned()
            .collect())
    }

    async fn find_overlapping(
        &self,
        property_unit_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> EngineResult<Vec<Lease>> {
        let tables = self.tables.read().await;
        Ok(tables
            .leases
            .values()
            .filter(|l| {
                l.property_unit_id == property_unit_id
                    && Some(l.id) != exclude_id
                    && l.blocks_property()
                    && l.overlaps(start, end)
            })
            .cloned()
            .collect())
    }

    async fn delete_lease(&self, owner: OwnerId, id: i64) -> EngineResult<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables.leases.get(&id).map_or(false, |l| l.owner_id == owner);
        if !owned {
            return Ok(false);
        }
        tables.leases.remove(&id);
        tables.payments.retain(|_, p| p.lease_id != id);
        Ok(true)
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, payment: &NewPayment) -> EngineResult<Payment> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let snapshot = payment.snapshot.clone();
        let stored = Payment {
            id,
            owner_id: payment.owner_id,
            lease_id: payment.lease_id,
            amount: payment.amount.clone(),
            payment_date: payment.payment_date,
            payment_type: payment.payment_type,
            status: payment.status,
            description: payment.description.clone(),
            index_type: snapshot.as_ref().map(|s| s.index_type),
            index_value_at_payment: snapshot.as_ref().map(|s| s.value.clone()),
            index_date: snapshot.as_ref().map(|s| s.value_date),
        };
        tables.payments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_payment(&self, owner: OwnerId, id: i64) -> EngineResult<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).filter(|p| p.owner_id == owner).cloned())
    }

    async fn update_payment(&self, payment: &Payment) -> EngineResult<Payment> {
        let mut tables = self.tables.write().await;
        let stored = match tables.payments.get_mut(&payment.id) {
            Some(stored) => stored,
            None => return Err(EngineError::not_found("Payment", payment.id)),
        };
        stored.amount = payment.amount.clone();
        stored.payment_date = payment.payment_date;
        stored.payment_type = payment.payment_type;
        stored.status = payment.status;
        stored.description = payment.description.clone();
        Ok(stored.clone())
    }

    async fn delete_payment(&self, owner: OwnerId, id: i64) -> EngineResult<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables.payments.get(&id).map_or(false, |p| p.owner_id == owner);
        if owned {
            tables.payments.remove(&id);
        }
        Ok(owned)
    }

    async fn payments_for_lease(&self, owner: OwnerId, lease_id: i64) -> EngineResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.owner_id == owner && p.lease_id == lease_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    async fn count_payments_for_lease(&self, lease_id: i64) -> EngineResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.payments.values().filter(|p| p.lease_id == lease_id).count() as i64)
    }
}
