// src/services/calculations.rs
use bigdecimal::{BigDecimal, One, RoundingMode, Zero};
use chrono::{Local, Months, NaiveDate};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::models::{AdjustmentIndex, IndexType, IndexValue, SeriesKind};
use crate::services::error::EngineResult;
use crate::services::store::IndexStore;

/// Scale of adjustment factors and intermediate ratios.
pub const FACTOR_SCALE: i64 = 6;
/// Scale of monetary amounts and percentages.
pub const MONEY_SCALE: i64 = 2;

pub fn round_factor(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(FACTOR_SCALE, RoundingMode::HalfUp)
}

pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(MONEY_SCALE, RoundingMode::HalfUp)
}

fn hundred() -> BigDecimal {
    BigDecimal::from(100)
}

/// `round6(to / from)`, or `None` when the divisor is zero.
fn ratio(to: &BigDecimal, from: &BigDecimal) -> Option<BigDecimal> {
    if from.is_zero() {
        None
    } else {
        Some(round_factor(&(to / from)))
    }
}

/// `(Π(1 + round6(vᵢ/100)) - 1) * 100` over monthly percentages, rounded to 2 digits.
pub fn compound_monthly_rates<'a, I>(rates: I) -> BigDecimal
where
    I: IntoIterator<Item = &'a BigDecimal>,
{
    let product = rates.into_iter().fold(BigDecimal::one(), |acc, rate| {
        acc * (BigDecimal::one() + round_factor(&(rate / &hundred())))
    });
    round_money(&((product - BigDecimal::one()) * hundred()))
}

/// Percentage change between two level observations, rounded to 2 digits.
fn level_change(current: &BigDecimal, past: &BigDecimal) -> Option<BigDecimal> {
    ratio(current, past).map(|r| round_money(&((r - BigDecimal::one()) * hundred())))
}

/// Adjusted rent for a lease at a payment date, with the observations behind it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentQuote {
    pub lease_id: i64,
    pub base_rent: BigDecimal,
    pub adjustment_index: AdjustmentIndex,
    pub lease_start_date: NaiveDate,
    pub payment_date: NaiveDate,
    pub adjusted_rent: BigDecimal,
    pub adjustment_factor: BigDecimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_at_lease_start: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_date_at_lease_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_at_payment_date: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_date_at_payment_date: Option<NaiveDate>,
}

/// Read-only financial math over the index store.
///
/// Missing data never raises: factors fall back to `1` and percentage changes
/// to `0`, each with a warning. Store failures still propagate.
#[derive(Clone)]
pub struct AdjustmentCalculator {
    store: Arc<dyn IndexStore>,
}

impl AdjustmentCalculator {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        AdjustmentCalculator { store }
    }

    pub async fn adjustment_factor(
        &self,
        country: &str,
        index: AdjustmentIndex,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<BigDecimal> {
        let Some(index_type) = index.index_type() else {
            return Ok(BigDecimal::one());
        };

        let from_value = self.store.closest_on_or_before(country, index_type, from).await?;
        let to_value = self.store.closest_on_or_before(country, index_type, to).await?;

        let (Some(from_value), Some(to_value)) = (from_value, to_value) else {
            warn!(
                "Missing {} data for {} between {} and {}, using factor 1",
                index_type, country, from, to
            );
            return Ok(BigDecimal::one());
        };

        match ratio(&to_value.value, &from_value.value) {
            Some(factor) => Ok(factor),
            None => {
                warn!("{} value at {} is zero, using factor 1", index_type, from_value.value_date);
                Ok(BigDecimal::one())
            }
        }
    }

    pub async fn adjusted_rent(
        &self,
        base_rent: &BigDecimal,
        country: &str,
        index: AdjustmentIndex,
        lease_start: NaiveDate,
        payment_date: NaiveDate,
    ) -> EngineResult<BigDecimal> {
        if *base_rent <= BigDecimal::zero() || index.index_type().is_none() {
            return Ok(base_rent.clone());
        }

        let factor = self.adjustment_factor(country, index, lease_start, payment_date).await?;
        let adjusted = round_money(&(base_rent * &factor));
        info!(
            "Adjusted rent: base={}, index={}, factor={}, adjusted={}",
            base_rent, index, factor, adjusted
        );
        Ok(adjusted)
    }

    pub async fn annual_percentage_change(&self, country: &str, index: AdjustmentIndex) -> EngineResult<BigDecimal> {
        self.annual_percentage_change_at(country, index, Local::now().date_naive()).await
    }

    /// Year-over-year change as seen on `as_of`.
    ///
    /// Level series compare the latest observation on or before `as_of` with the
    /// observation one year before that observation's own date.
    pub async fn annual_percentage_change_at(
        &self,
        country: &str,
        index: AdjustmentIndex,
        as_of: NaiveDate,
    ) -> EngineResult<BigDecimal> {
        let Some(index_type) = index.index_type() else {
            return Ok(BigDecimal::zero());
        };

        match index_type.kind() {
            SeriesKind::MonthlyRate => {
                let Some(year_ago) = as_of.checked_sub_months(Months::new(12)) else {
                    return Ok(BigDecimal::zero());
                };
                let rows = self.store.range(country, index_type, year_ago, as_of).await?;
                if rows.is_empty() {
                    warn!("No {} data for {} in the last year, annual change is 0", index_type, country);
                    return Ok(BigDecimal::zero());
                }
                Ok(compound_monthly_rates(rows.iter().take(12).map(|v| &v.value)))
            }
            SeriesKind::Level => self.level_change_over(country, index_type, as_of, Months::new(12)).await,
        }
    }

    pub async fn monthly_percentage_change(&self, country: &str, index: AdjustmentIndex) -> EngineResult<BigDecimal> {
        self.monthly_percentage_change_at(country, index, Local::now().date_naive()).await
    }

    pub async fn monthly_percentage_change_at(
        &self,
        country: &str,
        index: AdjustmentIndex,
        as_of: NaiveDate,
    ) -> EngineResult<BigDecimal> {
        let Some(index_type) = index.index_type() else {
            return Ok(BigDecimal::zero());
        };

        match index_type.kind() {
            SeriesKind::MonthlyRate => match self.store.closest_on_or_before(country, index_type, as_of).await? {
                Some(latest) => Ok(round_money(&latest.value)),
                None => {
                    warn!("No {} data for {}, monthly change is 0", index_type, country);
                    Ok(BigDecimal::zero())
                }
            },
            SeriesKind::Level => self.level_change_over(country, index_type, as_of, Months::new(1)).await,
        }
    }

    async fn level_change_over(
        &self,
        country: &str,
        index_type: IndexType,
        as_of: NaiveDate,
        horizon: Months,
    ) -> EngineResult<BigDecimal> {
        let Some(current) = self.store.closest_on_or_before(country, index_type, as_of).await? else {
            warn!("No {} data for {}, change is 0", index_type, country);
            return Ok(BigDecimal::zero());
        };
        let Some(reference_date) = current.value_date.checked_sub_months(horizon) else {
            return Ok(BigDecimal::zero());
        };
        let Some(past) = self.store.closest_on_or_before(country, index_type, reference_date).await? else {
            warn!("No {} data for {} on or before {}, change is 0", index_type, country, reference_date);
            return Ok(BigDecimal::zero());
        };

        match level_change(&current.value, &past.value) {
            Some(change) => Ok(change),
            None => {
                warn!("{} value at {} is zero, change is 0", index_type, past.value_date);
                Ok(BigDecimal::zero())
            }
        }
    }

    /// Builds the adjusted-rent breakdown for one lease and payment date.
    pub async fn quote(
        &self,
        lease_id: i64,
        base_rent: &BigDecimal,
        country: &str,
        index: AdjustmentIndex,
        lease_start: NaiveDate,
        payment_date: NaiveDate,
    ) -> EngineResult<RentQuote> {
        let mut quote = RentQuote {
            lease_id,
            base_rent: base_rent.clone(),
            adjustment_index: index,
            lease_start_date: lease_start,
            payment_date,
            adjusted_rent: base_rent.clone(),
            adjustment_factor: BigDecimal::one(),
            message: None,
            index_at_lease_start: None,
            index_date_at_lease_start: None,
            index_at_payment_date: None,
            index_date_at_payment_date: None,
        };

        let Some(index_type) = index.index_type() else {
            quote.message = Some("No adjustment index configured for this lease".to_string());
            return Ok(quote);
        };

        quote.adjusted_rent = self
            .adjusted_rent(base_rent, country, index, lease_start, payment_date)
            .await?;
        quote.adjustment_factor = self
            .adjustment_factor(country, index, lease_start, payment_date)
            .await?;

        let at_start: Option<IndexValue> = self.store.closest_on_or_before(country, index_type, lease_start).await?;
        let at_payment: Option<IndexValue> = self.store.closest_on_or_before(country, index_type, payment_date).await?;
        if at_start.is_none() || at_payment.is_none() {
            quote.message = Some(format!("Not enough {} data to adjust the rent", index_type));
        }
        if let Some(v) = at_start {
            quote.index_at_lease_start = Some(v.value);
            quote.index_date_at_lease_start = Some(v.value_date);
        }
        if let Some(v) = at_payment {
            quote.index_at_payment_date = Some(v.value);
            quote.index_date_at_payment_date = Some(v.value_date);
        }
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewIndexValue;
    use crate::services::memory::MemoryStore;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    async fn seed(store: &MemoryStore, index_type: IndexType, rows: &[(NaiveDate, &str)]) {
        for (value_date, value) in rows {
            store
                .upsert_if_absent(&NewIndexValue {
                    index_type,
                    country_code: "AR".to_string(),
                    value_date: *value_date,
                    value: dec(value),
                    source: "test".to_string(),
                    raw_payload: None,
                })
                .await
                .unwrap();
        }
    }

    async fn calculator_with(index_type: IndexType, rows: &[(NaiveDate, &str)]) -> AdjustmentCalculator {
        let store = Arc::new(MemoryStore::new());
        seed(&store, index_type, rows).await;
        AdjustmentCalculator::new(store)
    }

    #[tokio::test]
    async fn factor_for_same_date_is_one() {
        let calc = calculator_with(IndexType::Icl, &[(date(2024, 1, 1), "4.123456")]).await;
        let factor = calc
            .adjustment_factor("AR", AdjustmentIndex::Icl, date(2024, 2, 1), date(2024, 2, 1))
            .await
            .unwrap();
        assert_eq!(factor, BigDecimal::one());
    }

    #[tokio::test]
    async fn factor_uses_closest_values_and_six_digits() {
        let calc = calculator_with(IndexType::Icl, &[(date(2024, 1, 1), "3"), (date(2024, 3, 1), "4")]).await;
        let factor = calc
            .adjustment_factor("AR", AdjustmentIndex::Icl, date(2024, 1, 15), date(2024, 3, 20))
            .await
            .unwrap();
        assert_eq!(factor.to_string(), "1.333333");
    }

    #[tokio::test]
    async fn missing_or_zero_data_is_neutral() {
        let empty = AdjustmentCalculator::new(Arc::new(MemoryStore::new()));
        let factor = empty
            .adjustment_factor("AR", AdjustmentIndex::Ipc, date(2024, 1, 1), date(2024, 6, 1))
            .await
            .unwrap();
        assert_eq!(factor, BigDecimal::one());
        let rent = empty
            .adjusted_rent(&dec("1500.00"), "AR", AdjustmentIndex::Icl, date(2024, 1, 1), date(2024, 6, 1))
            .await
            .unwrap();
        assert_eq!(rent.to_string(), "1500.00");

        let zero = calculator_with(IndexType::Icl, &[(date(2024, 1, 1), "0"), (date(2024, 2, 1), "5")]).await;
        let factor = zero
            .adjustment_factor("AR", AdjustmentIndex::Icl, date(2024, 1, 1), date(2024, 2, 1))
            .await
            .unwrap();
        assert_eq!(factor, BigDecimal::one());
    }

    #[tokio::test]
    async fn adjusted_rent_rounds_to_cents() {
        let calc = calculator_with(IndexType::Icl, &[(date(2024, 1, 1), "100"), (date(2024, 7, 1), "103.45")]).await;
        let rent = calc
            .adjusted_rent(&dec("1000.00"), "AR", AdjustmentIndex::Icl, date(2024, 1, 1), date(2024, 7, 10))
            .await
            .unwrap();
        assert_eq!(rent.to_string(), "1034.50");
    }

    #[tokio::test]
    async fn non_positive_rent_and_fixed_leases_are_untouched() {
        let calc = calculator_with(IndexType::Icl, &[(date(2024, 1, 1), "100"), (date(2024, 7, 1), "200")]).await;
        let zero = calc
            .adjusted_rent(&dec("0"), "AR", AdjustmentIndex::Icl, date(2024, 1, 1), date(2024, 7, 1))
            .await
            .unwrap();
        assert!(zero.is_zero());
        let fixed = calc
            .adjusted_rent(&dec("800.5"), "AR", AdjustmentIndex::None, date(2024, 1, 1), date(2024, 7, 1))
            .await
            .unwrap();
        assert_eq!(fixed.to_string(), "800.5");
    }

    #[test]
    fn twelve_months_of_two_percent_compound_to_26_82() {
        let rates = vec![dec("2.0"); 12];
        assert_eq!(compound_monthly_rates(rates.iter()).to_string(), "26.82");
    }

    #[test]
    fn each_monthly_factor_is_rounded_to_six_digits() {
        let rates: Vec<BigDecimal> = [
            "4.578744", "4.940768", "7.628627", "5.402293", "8.329781", "7.948558", "1.915801", "0.396522",
            "5.234574", "6.485352", "5.76033", "7.061843",
        ]
        .iter()
        .map(|r| dec(r))
        .collect();
        // full-precision factors would give 89.01
        assert_eq!(compound_monthly_rates(rates.iter()).to_string(), "89.02");
    }

    #[tokio::test]
    async fn annual_change_for_monthly_rate_series_compounds_last_year() {
        let rows: Vec<(NaiveDate, &str)> = (1..=12).map(|m| (date(2024, m, 28), "2.0")).collect();
        let calc = calculator_with(IndexType::Ipc, &rows).await;
        let change = calc
            .annual_percentage_change_at("AR", AdjustmentIndex::Ipc, date(2024, 12, 31))
            .await
            .unwrap();
        assert_eq!(change.to_string(), "26.82");
    }

    #[tokio::test]
    async fn annual_change_for_level_series_anchors_to_latest_observation() {
        let calc = calculator_with(
            IndexType::Icl,
            &[(date(2023, 3, 1), "10"), (date(2024, 3, 1), "15"), (date(2024, 2, 1), "14")],
        )
        .await;
        let change = calc
            .annual_percentage_change_at("AR", AdjustmentIndex::Icl, date(2024, 9, 1))
            .await
            .unwrap();
        assert_eq!(change.to_string(), "50.00");

        let monthly = calc
            .monthly_percentage_change_at("AR", AdjustmentIndex::Icl, date(2024, 9, 1))
            .await
            .unwrap();
        assert_eq!(monthly.to_string(), "7.14");
    }

    #[tokio::test]
    async fn monthly_change_for_monthly_rate_series_is_latest_value() {
        let calc = calculator_with(IndexType::Ipc, &[(date(2024, 1, 31), "20.6"), (date(2024, 2, 29), "13.245")]).await;
        let change = calc
            .monthly_percentage_change_at("AR", AdjustmentIndex::Ipc, date(2024, 3, 15))
            .await
            .unwrap();
        assert_eq!(change.to_string(), "13.25");
    }

    #[tokio::test]
    async fn changes_without_data_are_zero() {
        let calc = AdjustmentCalculator::new(Arc::new(MemoryStore::new()));
        for index in [AdjustmentIndex::Ipc, AdjustmentIndex::DolarBlue, AdjustmentIndex::None] {
            assert!(calc.annual_percentage_change_at("AR", index, date(2024, 1, 1)).await.unwrap().is_zero());
            assert!(calc.monthly_percentage_change_at("AR", index, date(2024, 1, 1)).await.unwrap().is_zero());
        }
    }

    #[tokio::test]
    async fn quote_reports_observations_used() {
        let calc = calculator_with(IndexType::Icl, &[(date(2024, 1, 1), "100"), (date(2024, 7, 1), "103.45")]).await;
        let quote = calc
            .quote(9, &dec("1000.00"), "AR", AdjustmentIndex::Icl, date(2024, 1, 5), date(2024, 7, 5))
            .await
            .unwrap();
        assert_eq!(quote.adjusted_rent.to_string(), "1034.50");
        assert_eq!(quote.adjustment_factor.to_string(), "1.034500");
        assert_eq!(quote.index_date_at_lease_start, Some(date(2024, 1, 1)));
        assert_eq!(quote.index_date_at_payment_date, Some(date(2024, 7, 1)));
        assert!(quote.message.is_none());

        let fixed = calc
            .quote(9, &dec("1000.00"), "AR", AdjustmentIndex::None, date(2024, 1, 5), date(2024, 7, 5))
            .await
            .unwrap();
        assert_eq!(fixed.adjustment_factor, BigDecimal::one());
        assert!(fixed.message.is_some());
    }
}
