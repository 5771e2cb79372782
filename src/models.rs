// src/models.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Landlord identifier. Every lease and payment operation is scoped by it.
pub type OwnerId = i64;

/// Economic series kept in the index value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    /// Rent contract index published daily by the central bank.
    Icl,
    /// Consumer price index, stored as the monthly percentage change.
    Ipc,
    DolarBlue,
    DolarOficial,
    DolarMep,
}

/// How stored values of a series must be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    /// Absolute level; the ratio of two observations is the adjustment factor.
    Level,
    /// Each value is already a month-over-month percentage.
    MonthlyRate,
}

impl IndexType {
    pub const ALL: [IndexType; 5] = [
        IndexType::Icl,
        IndexType::Ipc,
        IndexType::DolarBlue,
        IndexType::DolarOficial,
        IndexType::DolarMep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Icl => "ICL",
            IndexType::Ipc => "IPC",
            IndexType::DolarBlue => "DOLAR_BLUE",
            IndexType::DolarOficial => "DOLAR_OFICIAL",
            IndexType::DolarMep => "DOLAR_MEP",
        }
    }

    pub fn kind(&self) -> SeriesKind {
        match self {
            IndexType::Ipc => SeriesKind::MonthlyRate,
            IndexType::Icl
            | IndexType::DolarBlue
            | IndexType::DolarOficial
            | IndexType::DolarMep => SeriesKind::Level,
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_identifier(s);
        IndexType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("Unknown index type: {}", s))
    }
}

/// Adjustment index a lease is escalated with. `None` means fixed rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentIndex {
    #[default]
    Icl,
    Ipc,
    DolarBlue,
    DolarOficial,
    DolarMep,
    None,
}

impl AdjustmentIndex {
    pub const ALL: [AdjustmentIndex; 6] = [
        AdjustmentIndex::Icl,
        AdjustmentIndex::Ipc,
        AdjustmentIndex::DolarBlue,
        AdjustmentIndex::DolarOficial,
        AdjustmentIndex::DolarMep,
        AdjustmentIndex::None,
    ];

    /// Series backing this adjustment index, if any.
    pub fn index_type(self) -> Option<IndexType> {
        match self {
            AdjustmentIndex::Icl => Some(IndexType::Icl),
            AdjustmentIndex::Ipc => Some(IndexType::Ipc),
            AdjustmentIndex::DolarBlue => Some(IndexType::DolarBlue),
            AdjustmentIndex::DolarOficial => Some(IndexType::DolarOficial),
            AdjustmentIndex::DolarMep => Some(IndexType::DolarMep),
            AdjustmentIndex::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self.index_type() {
            Some(index_type) => index_type.as_str(),
            None => "NONE",
        }
    }
}

impl From<IndexType> for AdjustmentIndex {
    fn from(index_type: IndexType) -> Self {
        match index_type {
            IndexType::Icl => AdjustmentIndex::Icl,
            IndexType::Ipc => AdjustmentIndex::Ipc,
            IndexType::DolarBlue => AdjustmentIndex::DolarBlue,
            IndexType::DolarOficial => AdjustmentIndex::DolarOficial,
            IndexType::DolarMep => AdjustmentIndex::DolarMep,
        }
    }
}

impl fmt::Display for AdjustmentIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AdjustmentIndex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_identifier(s);
        AdjustmentIndex::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == wanted)
            .ok_or_else(|| format!("Unknown adjustment index: {}", s))
    }
}

fn normalize_identifier(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace('-', "_")
}

/// Uppercases an ISO 3166-1 alpha-2 code received at a boundary.
pub fn normalize_country_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// An observation produced by a fetcher, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIndexValue {
    pub index_type: IndexType,
    pub country_code: String,
    pub value_date: NaiveDate,
    pub value: BigDecimal,
    pub source: String,
    pub raw_payload: Option<String>,
}

/// A persisted observation. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexValue {
    pub id: i64,
    pub index_type: IndexType,
    pub country_code: String,
    pub value_date: NaiveDate,
    pub value: BigDecimal,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaseStatus {
    Active,
    Expired,
    Terminated,
}

impl LeaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseStatus::Active => "ACTIVE",
            LeaseStatus::Expired => "EXPIRED",
            LeaseStatus::Terminated => "TERMINATED",
        }
    }
}

impl FromStr for LeaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_identifier(s).as_str() {
            "ACTIVE" => Ok(LeaseStatus::Active),
            "EXPIRED" => Ok(LeaseStatus::Expired),
            "TERMINATED" => Ok(LeaseStatus::Terminated),
            other => Err(format!("Unknown lease status: {}", other)),
        }
    }
}

/// Two closed date intervals overlap iff `s1 <= e2 && e1 >= s2`.
pub fn intervals_overlap(s1: NaiveDate, e1: NaiveDate, s2: NaiveDate, e2: NaiveDate) -> bool {
    s1 <= e2 && e1 >= s2
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub id: i64,
    pub owner_id: OwnerId,
    pub property_unit_id: i64,
    pub tenant_ids: Vec<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_rent: BigDecimal,
    pub status: LeaseStatus,
    pub adjustment_index: AdjustmentIndex,
    pub adjustment_frequency_months: i32,
    pub country_code: String,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Lease {
    /// Stored status with the implicit ACTIVE -> EXPIRED transition applied.
    pub fn effective_status(&self, today: NaiveDate) -> LeaseStatus {
        match self.status {
            LeaseStatus::Active if self.end_date < today => LeaseStatus::Expired,
            status => status,
        }
    }

    /// The lease as presented to callers on `today`.
    pub fn presented_on(mut self, today: NaiveDate) -> Self {
        self.status = self.effective_status(today);
        self
    }

    /// Whether this lease counts against the overlap invariant.
    pub fn blocks_property(&self) -> bool {
        self.status == LeaseStatus::Active && !self.deleted
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.blocks_property() && self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        intervals_overlap(self.start_date, self.end_date, start, end)
    }
}

/// Lease creation request as received from the API layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseDraft {
    pub property_unit_id: Option<i64>,
    #[serde(default)]
    pub tenant_ids: Vec<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_rent: BigDecimal,
    pub status: Option<LeaseStatus>,
    pub adjustment_index: Option<AdjustmentIndex>,
    pub adjustment_frequency_months: Option<i32>,
    pub country_code: Option<String>,
}

/// A validated lease ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLease {
    pub owner_id: OwnerId,
    pub property_unit_id: i64,
    pub tenant_ids: Vec<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_rent: BigDecimal,
    pub status: LeaseStatus,
    pub adjustment_index: AdjustmentIndex,
    pub adjustment_frequency_months: i32,
    pub country_code: String,
}

/// Partial lease update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseChanges {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent: Option<BigDecimal>,
    pub status: Option<LeaseStatus>,
    pub adjustment_index: Option<AdjustmentIndex>,
    pub adjustment_frequency_months: Option<i32>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    #[default]
    Rent,
    Deposit,
    Maintenance,
    Utility,
    Other,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Rent => "RENT",
            PaymentType::Deposit => "DEPOSIT",
            PaymentType::Maintenance => "MAINTENANCE",
            PaymentType::Utility => "UTILITY",
            PaymentType::Other => "OTHER",
        }
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_identifier(s).as_str() {
            "RENT" => Ok(PaymentType::Rent),
            "DEPOSIT" => Ok(PaymentType::Deposit),
            "MAINTENANCE" => Ok(PaymentType::Maintenance),
            "UTILITY" => Ok(PaymentType::Utility),
            "OTHER" => Ok(PaymentType::Other),
            other => Err(format!("Unknown payment type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Paid,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Pending => "PENDING",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_identifier(s).as_str() {
            "PAID" => Ok(PaymentStatus::Paid),
            "PENDING" => Ok(PaymentStatus::Pending),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

/// Index observation in effect when a payment was recorded. Kept for audit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub index_type: IndexType,
    pub value: BigDecimal,
    pub value_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub owner_id: OwnerId,
    pub lease_id: i64,
    pub amount: BigDecimal,
    pub payment_date: NaiveDate,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub index_type: Option<IndexType>,
    pub index_value_at_payment: Option<BigDecimal>,
    pub index_date: Option<NaiveDate>,
}

impl Payment {
    pub fn snapshot(&self) -> Option<IndexSnapshot> {
        match (self.index_type, &self.index_value_at_payment, self.index_date) {
            (Some(index_type), Some(value), Some(value_date)) => Some(IndexSnapshot {
                index_type,
                value: value.clone(),
                value_date,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    pub lease_id: i64,
    pub amount: BigDecimal,
    pub payment_date: NaiveDate,
    pub payment_type: Option<PaymentType>,
    pub status: Option<PaymentStatus>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub owner_id: OwnerId,
    pub lease_id: i64,
    pub amount: BigDecimal,
    pub payment_date: NaiveDate,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub snapshot: Option<IndexSnapshot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChanges {
    pub amount: Option<BigDecimal>,
    pub payment_date: Option<NaiveDate>,
    pub payment_type: Option<PaymentType>,
    pub status: Option<PaymentStatus>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn every_adjustment_index_maps_to_a_series_except_none() {
        for index in AdjustmentIndex::ALL {
            match index {
                AdjustmentIndex::None => assert!(index.index_type().is_none()),
                other => {
                    let series = other.index_type().unwrap();
                    assert_eq!(AdjustmentIndex::from(series), other);
                }
            }
        }
    }

    #[test]
    fn identifiers_parse_case_insensitively() {
        assert_eq!("dolar-blue".parse::<IndexType>().unwrap(), IndexType::DolarBlue);
        assert_eq!("icl".parse::<AdjustmentIndex>().unwrap(), AdjustmentIndex::Icl);
        assert_eq!("none".parse::<AdjustmentIndex>().unwrap(), AdjustmentIndex::None);
        assert!("none".parse::<IndexType>().is_err());
        assert!("UVA".parse::<AdjustmentIndex>().is_err());
    }

    #[test]
    fn ipc_is_the_only_monthly_rate_series() {
        let monthly: Vec<_> = IndexType::ALL
            .iter()
            .filter(|t| t.kind() == SeriesKind::MonthlyRate)
            .collect();
        assert_eq!(monthly, vec![&IndexType::Ipc]);
    }

    #[test]
    fn overlap_is_inclusive_on_both_ends() {
        let (s1, e1) = (date(2024, 1, 1), date(2024, 12, 31));
        assert!(intervals_overlap(s1, e1, date(2024, 12, 31), date(2025, 6, 1)));
        assert!(intervals_overlap(s1, e1, date(2023, 6, 1), date(2024, 1, 1)));
        assert!(!intervals_overlap(s1, e1, date(2025, 1, 1), date(2025, 12, 31)));
    }

    #[test]
    fn active_lease_past_its_end_reads_as_expired() {
        let lease = Lease {
            id: 1,
            owner_id: 7,
            property_unit_id: 3,
            tenant_ids: vec![1],
            start_date: date(2023, 1, 1),
            end_date: date(2023, 12, 31),
            monthly_rent: BigDecimal::from(1000),
            status: LeaseStatus::Active,
            adjustment_index: AdjustmentIndex::Icl,
            adjustment_frequency_months: 12,
            country_code: "AR".to_string(),
            deleted: false,
            deleted_at: None,
        };
        assert_eq!(lease.effective_status(date(2023, 6, 1)), LeaseStatus::Active);
        assert_eq!(lease.effective_status(date(2024, 1, 1)), LeaseStatus::Expired);
        assert!(lease.blocks_property());

        let presented = lease.clone().presented_on(date(2024, 1, 1));
        assert_eq!(presented.status, LeaseStatus::Expired);
        assert_eq!(lease.status, LeaseStatus::Active);
    }
}
