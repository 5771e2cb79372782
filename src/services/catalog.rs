// src/services/catalog.rs
use crate::models::{normalize_country_code, AdjustmentIndex};
use serde::Serialize;
use std::collections::BTreeMap;

/// Static per-country configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    #[serde(rename = "code")]
    pub country_code: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "currency")]
    pub currency_code: String,
    #[serde(rename = "hasIndices")]
    pub supports_auto_indices: bool,
    #[serde(rename = "availableIndices")]
    pub available_indices: Vec<AdjustmentIndex>,
}

/// Country -> adjustment index configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct IndexCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Default for IndexCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl IndexCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| (normalize_country_code(&e.country_code), e))
            .collect();
        IndexCatalog { entries }
    }

    /// Argentina with automatic indices, plus fixed-rent-only countries.
    pub fn standard() -> Self {
        let mut entries = vec![CatalogEntry {
            country_code: "AR".to_string(),
            display_name: "Argentina".to_string(),
            currency_code: "ARS".to_string(),
            supports_auto_indices: true,
            available_indices: vec![
                AdjustmentIndex::Icl,
                AdjustmentIndex::Ipc,
                AdjustmentIndex::DolarBlue,
                AdjustmentIndex::DolarMep,
                AdjustmentIndex::DolarOficial,
                AdjustmentIndex::None,
            ],
        }];

        let fixed_only = [
            ("US", "United States", "USD"),
            ("ES", "Spain", "EUR"),
            ("MX", "Mexico", "MXN"),
            ("CL", "Chile", "CLP"),
            ("CO", "Colombia", "COP"),
            ("UY", "Uruguay", "UYU"),
            ("BR", "Brazil", "BRL"),
            ("PE", "Peru", "PEN"),
        ];
        entries.extend(fixed_only.iter().map(|(code, name, currency)| CatalogEntry {
            country_code: code.to_string(),
            display_name: name.to_string(),
            currency_code: currency.to_string(),
            supports_auto_indices: false,
            available_indices: vec![AdjustmentIndex::None],
        }));

        Self::new(entries)
    }

    pub fn entry(&self, country_code: &str) -> Option<&CatalogEntry> {
        self.entries.get(&normalize_country_code(country_code))
    }

    /// Unknown countries only allow fixed rent.
    pub fn available_indices(&self, country_code: &str) -> Vec<AdjustmentIndex> {
        match self.entry(country_code) {
            Some(entry) => entry.available_indices.clone(),
            None => vec![AdjustmentIndex::None],
        }
    }

    pub fn is_valid_index(&self, index: AdjustmentIndex, country_code: &str) -> bool {
        self.available_indices(country_code).contains(&index)
    }

    pub fn is_supported(&self, country_code: &str) -> bool {
        self.entry(country_code).is_some()
    }

    /// All entries, ordered by display name.
    pub fn countries(&self) -> Vec<&CatalogEntry> {
        let mut countries: Vec<&CatalogEntry> = self.entries.values().collect();
        countries.sort_by_key(|e| e.display_name.to_lowercase());
        countries
    }

    pub fn auto_index_countries(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.supports_auto_indices)
            .map(|e| e.country_code.clone())
            .collect()
    }
}
