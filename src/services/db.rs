// src/services/db.rs
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::models::{
    AdjustmentIndex, IndexType, IndexValue, Lease, LeaseStatus, NewIndexValue, NewLease,
    NewPayment, OwnerId, Payment, PaymentStatus, PaymentType, UpsertOutcome,
};
use crate::services::error::{EngineError, EngineResult};
use crate::services::store::{
    GuardedWrite, IndexStore, LeaseFilter, LeaseScope, LeaseStore, PaymentStore,
};

/// Schema applied by `setup_db` and `DbStore::migrate`.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS index_values (
    id BIGSERIAL PRIMARY KEY,
    index_type TEXT NOT NULL,
    country_code CHAR(2) NOT NULL,
    value_date DATE NOT NULL,
    value NUMERIC(20, 6) NOT NULL,
    source TEXT NOT NULL,
    raw_payload TEXT,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_index_values_series_day UNIQUE (index_type, country_code, value_date)
);
CREATE INDEX IF NOT EXISTS idx_index_values_lookup
    ON index_values (index_type, country_code, value_date DESC);

CREATE TABLE IF NOT EXISTS property_units (
    id BIGSERIAL PRIMARY KEY,
    owner_id BIGINT NOT NULL,
    address TEXT
);

CREATE TABLE IF NOT EXISTS tenants (
    id BIGSERIAL PRIMARY KEY,
    owner_id BIGINT NOT NULL,
    full_name TEXT
);

CREATE TABLE IF NOT EXISTS leases (
    id BIGSERIAL PRIMARY KEY,
    owner_id BIGINT NOT NULL,
    property_unit_id BIGINT NOT NULL REFERENCES property_units (id),
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    monthly_rent NUMERIC(14, 2) NOT NULL,
    status TEXT NOT NULL,
    adjustment_index TEXT NOT NULL,
    adjustment_frequency_months INTEGER NOT NULL DEFAULT 12,
    country_code CHAR(2) NOT NULL DEFAULT 'AR',
    deleted BOOLEAN,
    deleted_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_leases_property ON leases (property_unit_id, status);

CREATE TABLE IF NOT EXISTS lease_tenants (
    lease_id BIGINT NOT NULL REFERENCES leases (id) ON DELETE CASCADE,
    tenant_id BIGINT NOT NULL REFERENCES tenants (id),
    PRIMARY KEY (lease_id, tenant_id)
);

CREATE TABLE IF NOT EXISTS payments (
    id BIGSERIAL PRIMARY KEY,
    owner_id BIGINT NOT NULL,
    lease_id BIGINT NOT NULL REFERENCES leases (id) ON DELETE CASCADE,
    amount NUMERIC(14, 2) NOT NULL,
    payment_date DATE NOT NULL,
    payment_type TEXT NOT NULL,
    status TEXT NOT NULL,
    description TEXT,
    index_type TEXT,
    index_value_at_payment NUMERIC(20, 6),
    index_date DATE
);
"#;

const INDEX_COLUMNS: &str =
    "id, index_type, country_code, value_date, value, source, raw_payload, recorded_at";

const LEASE_COLUMNS: &str = r#"
    l.id, l.owner_id, l.property_unit_id,
    ARRAY(SELECT lt.tenant_id FROM lease_tenants lt WHERE lt.lease_id = l.id ORDER BY lt.tenant_id) AS tenant_ids,
    l.start_date, l.end_date, l.monthly_rent, l.status, l.adjustment_index,
    l.adjustment_frequency_months, l.country_code, l.deleted, l.deleted_at
"#;

const PAYMENT_COLUMNS: &str = "id, owner_id, lease_id, amount, payment_date, payment_type, status, \
     description, index_type, index_value_at_payment, index_date";

#[derive(Debug, FromRow)]
struct IndexValueRow {
    id: i64,
    index_type: String,
    country_code: String,
    value_date: NaiveDate,
    value: BigDecimal,
    source: String,
    raw_payload: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<IndexValueRow> for IndexValue {
    type Error = EngineError;

    fn try_from(row: IndexValueRow) -> Result<Self, Self::Error> {
        Ok(IndexValue {
            id: row.id,
            index_type: parse_column(&row.index_type)?,
            country_code: row.country_code.trim().to_string(),
            value_date: row.value_date,
            value: row.value,
            source: row.source,
            raw_payload: row.raw_payload,
            recorded_at: row.recorded_at,
        })
    }
}

/// Soft-delete state as stored. Rows written before the flag existed carry NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeletionState {
    Active,
    SoftDeleted,
    Legacy,
}

impl DeletionState {
    fn from_column(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => DeletionState::SoftDeleted,
            Some(false) => DeletionState::Active,
            None => DeletionState::Legacy,
        }
    }

    fn is_deleted(self) -> bool {
        match self {
            DeletionState::SoftDeleted => true,
            DeletionState::Active | DeletionState::Legacy => false,
        }
    }
}

#[derive(Debug, FromRow)]
struct LeaseRow {
    id: i64,
    owner_id: i64,
    property_unit_id: i64,
    tenant_ids: Vec<i64>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    monthly_rent: BigDecimal,
    status: String,
    adjustment_index: String,
    adjustment_frequency_months: i32,
    country_code: String,
    deleted: Option<bool>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<LeaseRow> for Lease {
    type Error = EngineError;

    fn try_from(row: LeaseRow) -> Result<Self, Self::Error> {
        let deletion = DeletionState::from_column(row.deleted);
        Ok(Lease {
            id: row.id,
            owner_id: row.owner_id,
            property_unit_id: row.property_unit_id,
            tenant_ids: row.tenant_ids,
            start_date: row.start_date,
            end_date: row.end_date,
            monthly_rent: row.monthly_rent,
            status: parse_column::<LeaseStatus>(&row.status)?,
            adjustment_index: parse_column::<AdjustmentIndex>(&row.adjustment_index)?,
            adjustment_frequency_months: row.adjustment_frequency_months,
            country_code: row.country_code.trim().to_string(),
            deleted: deletion.is_deleted(),
            deleted_at: if deletion.is_deleted() { row.deleted_at } else { None },
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: i64,
    owner_id: i64,
    lease_id: i64,
    amount: BigDecimal,
    payment_date: NaiveDate,
    payment_type: String,
    status: String,
    description: Option<String>,
    index_type: Option<String>,
    index_value_at_payment: Option<BigDecimal>,
    index_date: Option<NaiveDate>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = EngineError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let index_type = match row.index_type.as_deref() {
            Some(raw) => Some(parse_column::<IndexType>(raw)?),
            None => None,
        };
        Ok(Payment {
            id: row.id,
            owner_id: row.owner_id,
            lease_id: row.lease_id,
            amount: row.amount,
            payment_date: row.payment_date,
            payment_type: parse_column::<PaymentType>(&row.payment_type)?,
            status: parse_column::<PaymentStatus>(&row.status)?,
            description: row.description,
            index_type,
            index_value_at_payment: row.index_value_at_payment,
            index_date: row.index_date,
        })
    }
}

fn parse_column<T>(raw: &str) -> EngineResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| EngineError::store(format!("corrupt row: {}", e)))
}

fn rows_into<R, T>(rows: Vec<R>) -> EngineResult<Vec<T>>
where
    T: TryFrom<R, Error = EngineError>,
{
    rows.into_iter().map(T::try_from).collect()
}

pub struct DbStore {
    pub(crate) pool: PgPool,
}

impl DbStore {
    pub async fn new(database_url: &str) -> EngineResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        info!("Connected to Postgres");
        Ok(Self { pool })
    }

    /// Creates missing tables and indexes.
    pub async fn migrate(&self) -> EngineResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        info!("Schema is up to date");
        Ok(())
    }

    /// Serialises lease writes on one property unit for the rest of `tx`.
    async fn lock_property_unit(tx: &mut Transaction<'_, Postgres>, property_unit_id: i64) -> EngineResult<()> {
        let locked: Option<(i64,)> = sqlx::query_as("SELECT id FROM property_units WHERE id = $1 FOR UPDATE")
            .bind(property_unit_id)
            .fetch_optional(&mut **tx)
            .await?;
        match locked {
            Some(_) => Ok(()),
            None => Err(EngineError::not_found("PropertyUnit", property_unit_id)),
        }
    }

    async fn overlap_exists(
        tx: &mut Transaction<'_, Postgres>,
        property_unit_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> EngineResult<bool> {
        let hit: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM leases
            WHERE property_unit_id = $1
              AND status = 'ACTIVE'
              AND COALESCE(deleted, FALSE) = FALSE
              AND start_date <= $3
              AND end_date >= $2
              AND ($4::BIGINT IS NULL OR id <> $4)
            LIMIT 1
            "#,
        )
        .bind(property_unit_id)
        .bind(start)
        .bind(end)
        .bind(exclude_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(hit.is_some())
    }

    async fn fetch_lease_by_id(&self, id: i64) -> EngineResult<Option<Lease>> {
        let sql = format!("SELECT {} FROM leases l WHERE l.id = $1", LEASE_COLUMNS);
        let row: Option<LeaseRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Lease::try_from).transpose()
    }
}

#[async_trait]
impl IndexStore for DbStore {
    async fn upsert_if_absent(&self, value: &NewIndexValue) -> EngineResult<UpsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO index_values (index_type, country_code, value_date, value, source, raw_payload, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (index_type, country_code, value_date) DO NOTHING
            "#,
        )
        .bind(value.index_type.as_str())
        .bind(&value.country_code)
        .bind(value.value_date)
        .bind(&value.value)
        .bind(&value.source)
        .bind(&value.raw_payload)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("{} {} {} already stored", value.country_code, value.index_type, value.value_date);
            Ok(UpsertOutcome::Skipped)
        } else {
            Ok(UpsertOutcome::Inserted)
        }
    }

    async fn latest(&self, country: &str, index_type: IndexType) -> EngineResult<Option<IndexValue>> {
        let sql = format!(
            "SELECT {} FROM index_values WHERE country_code = $1 AND index_type = $2 \
             ORDER BY value_date DESC LIMIT 1",
            INDEX_COLUMNS
        );
        let row: Option<IndexValueRow> = sqlx::query_as(&sql)
            .bind(country)
            .bind(index_type.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(IndexValue::try_from).transpose()
    }

    async fn exact(&self, country: &str, index_type: IndexType, date: NaiveDate) -> EngineResult<Option<IndexValue>> {
        let sql = format!(
            "SELECT {} FROM index_values WHERE country_code = $1 AND index_type = $2 AND value_date = $3",
            INDEX_COLUMNS
        );
        let row: Option<IndexValueRow> = sqlx::query_as(&sql)
            .bind(country)
            .bind(index_type.as_str())
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.map(IndexValue::try_from).transpose()
    }

    async fn closest_on_or_before(
        &self,
        country: &str,
        index_type: IndexType,
        date: NaiveDate,
    ) -> EngineResult<Option<IndexValue>> {
        let sql = format!(
            "SELECT {} FROM index_values WHERE country_code = $1 AND index_type = $2 AND value_date <= $3 \
             ORDER BY value_date DESC LIMIT 1",
            INDEX_COLUMNS
        );
        let row: Option<IndexValueRow> = sqlx::query_as(&sql)
            .bind(country)
            .bind(index_type.as_str())
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.map(IndexValue::try_from).transpose()
    }

    async fn range(
        &self,
        country: &str,
        index_type: IndexType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<IndexValue>> {
        let sql = format!(
            "SELECT {} FROM index_values WHERE country_code = $1 AND index_type = $2 \
             AND value_date BETWEEN $3 AND $4 ORDER BY value_date DESC",
            INDEX_COLUMNS
        );
        let rows: Vec<IndexValueRow> = sqlx::query_as(&sql)
            .bind(country)
            .bind(index_type.as_str())
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        rows_into(rows)
    }

    async fn latest_per_type(&self, country: &str) -> EngineResult<Vec<IndexValue>> {
        let sql = format!(
            "SELECT DISTINCT ON (index_type) {} FROM index_values WHERE country_code = $1 \
             ORDER BY index_type, value_date DESC",
            INDEX_COLUMNS
        );
        let rows: Vec<IndexValueRow> = sqlx::query_as(&sql).bind(country).fetch_all(&self.pool).await?;
        rows_into(rows)
    }
}

#[async_trait]
impl LeaseStore for DbStore {
    async fn property_unit_owned(&self, owner: OwnerId, property_unit_id: i64) -> EngineResult<bool> {
        let hit: Option<(i64,)> = sqlx::query_as("SELECT id FROM property_units WHERE id = $1 AND owner_id = $2")
            .bind(property_unit_id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hit.is_some())
    }

    async fn tenant_owned(&self, owner: OwnerId, tenant_id: i64) -> EngineResult<bool> {
        let hit: Option<(i64,)> = sqlx::query_as("SELECT id FROM tenants WHERE id = $1 AND owner_id = $2")
            .bind(tenant_id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hit.is_some())
    }

    async fn insert_lease(&self, lease: &NewLease, check_overlap: bool) -> EngineResult<GuardedWrite<Lease>> {
        let mut tx = self.pool.begin().await?;
        Self::lock_property_unit(&mut tx, lease.property_unit_id).await?;

        if check_overlap
            && Self::overlap_exists(&mut tx, lease.property_unit_id, lease.start_date, lease.end_date, None).await?
        {
            tx.rollback().await?;
            return Ok(GuardedWrite::Overlap);
        }

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO leases (owner_id, property_unit_id, start_date, end_date, monthly_rent, status,
                                adjustment_index, adjustment_frequency_months, country_code, deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)
            RETURNING id
            "#,
        )
        .bind(lease.owner_id)
        .bind(lease.property_unit_id)
        .bind(lease.start_date)
        .bind(lease.end_date)
        .bind(&lease.monthly_rent)
        .bind(lease.status.as_str())
        .bind(lease.adjustment_index.as_str())
        .bind(lease.adjustment_frequency_months)
        .bind(&lease.country_code)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO lease_tenants (lease_id, tenant_id) SELECT $1, UNNEST($2::BIGINT[])")
            .bind(id)
            .bind(&lease.tenant_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        match self.fetch_lease_by_id(id).await? {
            Some(stored) => Ok(GuardedWrite::Written(stored)),
            None => Err(EngineError::store(format!("lease {} vanished after insert", id))),
        }
    }

    async fn save_lease(&self, lease: &Lease, check_overlap: bool) -> EngineResult<GuardedWrite<Lease>> {
        let mut tx = self.pool.begin().await?;
        Self::lock_property_unit(&mut tx, lease.property_unit_id).await?;

        if check_overlap
            && Self::overlap_exists(&mut tx, lease.property_unit_id, lease.start_date, lease.end_date, Some(lease.id))
                .await?
        {
            tx.rollback().await?;
            return Ok(GuardedWrite::Overlap);
        }

        let result = sqlx::query(
            r#"
            UPDATE leases SET
                start_date = $3,
                end_date = $4,
                monthly_rent = $5,
                status = $6,
                adjustment_index = $7,
                adjustment_frequency_months = $8,
                country_code = $9,
                deleted = $10,
                deleted_at = $11
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(lease.id)
        .bind(lease.owner_id)
        .bind(lease.start_date)
        .bind(lease.end_date)
        .bind(&lease.monthly_rent)
        .bind(lease.status.as_str())
        .bind(lease.adjustment_index.as_str())
        .bind(lease.adjustment_frequency_months)
        .bind(&lease.country_code)
        .bind(lease.deleted)
        .bind(lease.deleted_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(EngineError::not_found("Lease", lease.id));
        }
        tx.commit().await?;
        Ok(GuardedWrite::Written(lease.clone()))
    }

    async fn find_lease(&self, owner: OwnerId, id: i64) -> EngineResult<Option<Lease>> {
        let sql = format!("SELECT {} FROM leases l WHERE l.id = $1 AND l.owner_id = $2", LEASE_COLUMNS);
        let row: Option<LeaseRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Lease::try_from).transpose()
    }

    async fn list_leases(&self, owner: OwnerId, filter: LeaseFilter) -> EngineResult<Vec<Lease>> {
        let sql = format!(
            r#"
            SELECT {} FROM leases l
            WHERE l.owner_id = $1
              AND COALESCE(l.deleted, FALSE) = $2
              AND ($3::BIGINT IS NULL OR l.property_unit_id = $3)
              AND ($4::BIGINT IS NULL OR EXISTS (
                    SELECT 1 FROM lease_tenants lt WHERE lt.lease_id = l.id AND lt.tenant_id = $4))
            ORDER BY l.start_date DESC, l.id
            "#,
            LEASE_COLUMNS
        );
        let rows: Vec<LeaseRow> = sqlx::query_as(&sql)
            .bind(owner)
            .bind(filter.scope == LeaseScope::Deleted)
            .bind(filter.property_unit_id)
            .bind(filter.tenant_id)
            .fetch_all(&self.pool)
            .await?;
        rows_into(rows)
    }

    async fn find_overlapping(
        &self,
        property_unit_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> EngineResult<Vec<Lease>> {
        let sql = format!(
            r#"
            SELECT {} FROM leases l
            WHERE l.property_unit_id = $1
              AND l.status = 'ACTIVE'
              AND COALESCE(l.deleted, FALSE) = FALSE
              AND l.start_date <= $3
              AND l.end_date >= $2
              AND ($4::BIGINT IS NULL OR l.id <> $4)
            ORDER BY l.start_date
            "#,
            LEASE_COLUMNS
        );
        let rows: Vec<LeaseRow> = sqlx::query_as(&sql)
            .bind(property_unit_id)
            .bind(start)
            .bind(end)
            .bind(exclude_id)
            .fetch_all(&self.pool)
            .await?;
        rows_into(rows)
    }

    async fn delete_lease(&self, owner: OwnerId, id: i64) -> EngineResult<bool> {
        let result = sqlx::query("DELETE FROM leases WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaymentStore for DbStore {
    async fn insert_payment(&self, payment: &NewPayment) -> EngineResult<Payment> {
        let snapshot = payment.snapshot.as_ref();
        let sql = format!(
            r#"
            INSERT INTO payments (owner_id, lease_id, amount, payment_date, payment_type, status,
                                  description, index_type, index_value_at_payment, index_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let row: PaymentRow = sqlx::query_as(&sql)
            .bind(payment.owner_id)
            .bind(payment.lease_id)
            .bind(&payment.amount)
            .bind(payment.payment_date)
            .bind(payment.payment_type.as_str())
            .bind(payment.status.as_str())
            .bind(&payment.description)
            .bind(snapshot.map(|s| s.index_type.as_str()))
            .bind(snapshot.map(|s| s.value.clone()))
            .bind(snapshot.map(|s| s.value_date))
            .fetch_one(&self.pool)
            .await?;
        Payment::try_from(row)
    }

    async fn find_payment(&self, owner: OwnerId, id: i64) -> EngineResult<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1 AND owner_id = $2", PAYMENT_COLUMNS);
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn update_payment(&self, payment: &Payment) -> EngineResult<Payment> {
        let sql = format!(
            r#"
            UPDATE payments SET amount = $3, payment_date = $4, payment_type = $5, status = $6, description = $7
            WHERE id = $1 AND owner_id = $2
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(payment.id)
            .bind(payment.owner_id)
            .bind(&payment.amount)
            .bind(payment.payment_date)
            .bind(payment.payment_type.as_str())
            .bind(payment.status.as_str())
            .bind(&payment.description)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Payment::try_from(row),
            None => Err(EngineError::not_found("Payment", payment.id)),
        }
    }

    async fn delete_payment(&self, owner: OwnerId, id: i64) -> EngineResult<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn payments_for_lease(&self, owner: OwnerId, lease_id: i64) -> EngineResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE owner_id = $1 AND lease_id = $2 ORDER BY payment_date DESC, id DESC",
            PAYMENT_COLUMNS
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(owner)
            .bind(lease_id)
            .fetch_all(&self.pool)
            .await?;
        rows_into(rows)
    }

    async fn count_payments_for_lease(&self, lease_id: i64) -> EngineResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE lease_id = $1")
            .bind(lease_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_null_flag_reads_as_not_deleted() {
        assert!(!DeletionState::from_column(None).is_deleted());
        assert!(!DeletionState::from_column(Some(false)).is_deleted());
        assert!(DeletionState::from_column(Some(true)).is_deleted());
        assert_eq!(DeletionState::from_column(None), DeletionState::Legacy);
    }

    #[test]
    fn lease_row_mapping_drops_stale_deleted_at_for_live_rows() {
        let row = LeaseRow {
            id: 1,
            owner_id: 2,
            property_unit_id: 3,
            tenant_ids: vec![4, 5],
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            monthly_rent: BigDecimal::from(1000),
            status: "ACTIVE".to_string(),
            adjustment_index: "DOLAR_MEP".to_string(),
            adjustment_frequency_months: 6,
            country_code: "AR".to_string(),
            deleted: None,
            deleted_at: Some(Utc::now()),
        };
        let lease = Lease::try_from(row).unwrap();
        assert!(!lease.deleted);
        assert!(lease.deleted_at.is_none());
        assert_eq!(lease.adjustment_index, AdjustmentIndex::DolarMep);
        assert_eq!(lease.tenant_ids, vec![4, 5]);
    }

    #[test]
    fn unknown_enum_text_is_reported_as_store_error() {
        let err = parse_column::<IndexType>("UVA").unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable { .. }));
    }
}
